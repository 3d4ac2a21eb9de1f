//! On-disk asset indexes.
//!
//! Each module keeps its content under `assets/<kind>/` in its root
//! directory. The file stem of every regular file there is the asset name;
//! the module id is its namespace. Sub-directories are not scanned.

use modgate_host_api::{AssetIndexes, AssetKind, StaticAssetIndex};
use modgate_runtime::{Environment, ModuleDescriptor};
use std::path::Path;
use tracing::{debug, warn};

/// Directory under a module root holding its assets.
pub const ASSETS_DIR: &str = "assets";

/// Build one index per asset kind from the loaded modules' directories.
///
/// The host's assets are not on disk and are not indexed here.
pub fn scan_environment(environment: &Environment) -> AssetIndexes {
    let mut indexes = AssetIndexes::new();

    for kind in AssetKind::ALL {
        let mut ids = Vec::new();
        for module in environment.modules() {
            if module.trusted {
                continue;
            }
            scan_module(module, kind, &mut ids);
        }
        debug!("Indexed {} {} asset(s)", ids.len(), kind);
        indexes.insert(kind, StaticAssetIndex::new(ids));
    }

    indexes
}

/// Collect `module:stem` ids for one module and kind.
fn scan_module(module: &ModuleDescriptor, kind: AssetKind, ids: &mut Vec<String>) {
    let dir = module.root.join(ASSETS_DIR).join(kind.as_str());
    for stem in file_stems(&dir) {
        ids.push(format!("{}:{}", module.id, stem));
    }
}

fn file_stems(dir: &Path) -> Vec<String> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!("Failed to read asset directory {:?}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut stems: Vec<String> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        })
        .collect();
    stems.sort();
    stems
}
