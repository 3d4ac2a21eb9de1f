//! Module discovery.
//!
//! A module root is any immediate sub-directory of a configured root path
//! that contains a `module.toml` or `module.json`. Roots are scanned
//! non-recursively, in the order given.
//!
//! A malformed descriptor only costs that module its place in the registry.
//! Two descriptors claiming the same id in one pass fail the whole pass:
//! there is no safe way to pick one silently.

use crate::descriptor::{ModuleDescriptor, JSON_DESCRIPTOR, TOML_DESCRIPTOR};
use crate::error::DiscoveryError;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Immutable catalog of discovered modules, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<ModuleDescriptor>>,
}

impl ModuleRegistry {
    /// Scan `roots` and build a fresh registry.
    pub fn discover<P: AsRef<Path>>(roots: &[P]) -> Result<Self, DiscoveryError> {
        let mut descriptors = Vec::new();

        for root in roots {
            let root = root.as_ref();
            debug!("Scanning module root: {:?}", root);
            discover_in_directory(root, &mut descriptors);
        }

        let registry = Self::from_descriptors(descriptors)?;
        info!("Discovered {} module(s)", registry.len());
        Ok(registry)
    }

    /// Build a registry from descriptors that were parsed elsewhere.
    pub fn from_descriptors<I>(descriptors: I) -> Result<Self, DiscoveryError>
    where
        I: IntoIterator<Item = ModuleDescriptor>,
    {
        let mut modules = BTreeMap::new();

        for descriptor in descriptors {
            match modules.entry(descriptor.id.clone()) {
                Entry::Occupied(existing) => {
                    let existing: &Arc<ModuleDescriptor> = existing.get();
                    return Err(DiscoveryError::DuplicateModule {
                        id: descriptor.id,
                        first: existing.root.clone(),
                        second: descriptor.root,
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(descriptor));
                }
            }
        }

        Ok(Self { modules })
    }

    /// Get a module by id.
    pub fn get(&self, id: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.modules.get(id)
    }

    /// Check if a module id was discovered.
    pub fn contains(&self, id: &str) -> bool {
        self.modules.contains_key(id)
    }

    /// All module ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    /// Iterate descriptors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.modules.values()
    }

    /// Number of discovered modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if nothing was discovered.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Check whether `dir` looks like a module root.
pub fn is_module_root(dir: &Path) -> bool {
    dir.join(TOML_DESCRIPTOR).is_file() || dir.join(JSON_DESCRIPTOR).is_file()
}

/// Collect every parsable module directly under `dir`.
///
/// Unreadable roots and malformed descriptors are logged and skipped.
pub fn discover_in_directory(dir: &Path, descriptors: &mut Vec<ModuleDescriptor>) {
    if !dir.exists() {
        debug!("Module root {:?} does not exist", dir);
        return;
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("Failed to read module root {:?}: {}", dir, e);
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    paths.sort();

    for path in paths {
        if !is_module_root(&path) {
            debug!("Skipping {:?}: no module descriptor", path);
            continue;
        }

        match ModuleDescriptor::from_root(&path) {
            Ok(descriptor) => {
                info!(
                    module = %descriptor.id,
                    "Discovered module: {} v{} at {:?}",
                    descriptor.name(),
                    descriptor.version,
                    path
                );
                descriptors.push(descriptor);
            }
            Err(e) => {
                warn!("Skipping module at {:?}: {}", path, e);
            }
        }
    }
}
