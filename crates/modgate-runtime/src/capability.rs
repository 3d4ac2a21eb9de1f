//! Capability catalog.
//!
//! The catalog lists every symbol a module may reach outside its own
//! namespace. It starts from a base grant set (the host namespace and the
//! runtime namespace) and grows by statically scanning the API each module
//! declares as exported. Scanning reads descriptors only; no module code runs.
//!
//! Building and using the catalog are separate types: [`CatalogBuilder`] is
//! the only mutable form and is consumed by [`CatalogBuilder::freeze`]. The
//! resulting [`CapabilityCatalog`] has no mutating methods, so once frozen
//! its decisions never change.

use crate::composer::Environment;
use crate::descriptor::ModuleDescriptor;
use crate::symbol::SymbolPath;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

/// Default namespace of the minimal runtime every module needs.
pub const DEFAULT_RUNTIME_NAMESPACE: &str = "core";

/// A unit of API surface a module may be granted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CapabilityGrant {
    /// Every symbol of a namespace.
    Namespace { namespace: String },
    /// One symbol.
    Symbol { path: SymbolPath },
}

impl std::fmt::Display for CapabilityGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityGrant::Namespace { namespace } => write!(f, "{}:*", namespace),
            CapabilityGrant::Symbol { path } => write!(f, "{}", path),
        }
    }
}

/// Outcome of a catalog lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// The target lives in the caller's own namespace.
    OwnModule,
    /// The target's whole namespace is granted.
    NamespaceGrant,
    /// The target symbol is granted.
    SymbolGrant,
    /// Nothing grants the target.
    Denied,
}

impl AccessDecision {
    pub fn is_granted(self) -> bool {
        !matches!(self, AccessDecision::Denied)
    }
}

/// Mutable catalog under construction.
#[derive(Debug)]
pub struct CatalogBuilder {
    host_id: String,
    runtime_namespace: String,
    namespaces: BTreeSet<String>,
    symbols: HashSet<SymbolPath>,
}

impl CatalogBuilder {
    /// Seed the base grant set: the host namespace and the runtime namespace.
    pub fn new(host_id: impl Into<String>, runtime_namespace: impl Into<String>) -> Self {
        let host_id = host_id.into();
        let runtime_namespace = runtime_namespace.into();

        let mut namespaces = BTreeSet::new();
        namespaces.insert(host_id.clone());
        namespaces.insert(runtime_namespace.clone());

        Self {
            host_id,
            runtime_namespace,
            namespaces,
            symbols: HashSet::new(),
        }
    }

    /// Seed the base grant set for an environment's host.
    pub fn for_environment(environment: &Environment, runtime_namespace: impl Into<String>) -> Self {
        Self::new(environment.host_id(), runtime_namespace)
    }

    /// Grant a whole namespace to every module.
    pub fn grant_namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.namespaces.insert(namespace.into());
        self
    }

    /// Grant one symbol to every module.
    pub fn grant_symbol(&mut self, path: SymbolPath) -> &mut Self {
        self.symbols.insert(path);
        self
    }

    /// Add the exported API of one module. Returns how many grants it added.
    pub fn scan_module(&mut self, module: &ModuleDescriptor) -> usize {
        let before = self.symbols.len();
        for name in &module.api.exports {
            self.symbols
                .insert(SymbolPath::new(module.id.as_str(), name.as_str()));
        }
        let added = self.symbols.len() - before;
        debug!(module = %module.id, "Scanned {} exported symbol(s)", added);
        added
    }

    /// Add the exported API of every module in the environment, host included.
    pub fn scan(&mut self, environment: &Environment) -> usize {
        environment
            .modules()
            .iter()
            .map(|module| self.scan_module(module))
            .sum()
    }

    /// Freeze the catalog. No grants can be added afterwards.
    pub fn freeze(self) -> CapabilityCatalog {
        info!(
            "Capability catalog frozen: {} namespace grant(s), {} symbol grant(s)",
            self.namespaces.len(),
            self.symbols.len()
        );
        CapabilityCatalog {
            host_id: self.host_id,
            runtime_namespace: self.runtime_namespace,
            namespaces: self.namespaces,
            symbols: self.symbols,
        }
    }
}

/// Frozen, read-only set of grants.
#[derive(Debug)]
pub struct CapabilityCatalog {
    host_id: String,
    runtime_namespace: String,
    namespaces: BTreeSet<String>,
    symbols: HashSet<SymbolPath>,
}

impl CapabilityCatalog {
    /// Decide whether `caller` may reach `target`.
    pub fn decide(&self, caller: &str, target: &SymbolPath) -> AccessDecision {
        if target.module == caller {
            AccessDecision::OwnModule
        } else if self.namespaces.contains(&target.module) {
            AccessDecision::NamespaceGrant
        } else if self.symbols.contains(target) {
            AccessDecision::SymbolGrant
        } else {
            AccessDecision::Denied
        }
    }

    /// Whether some grant covers `target` for modules other than its owner.
    pub fn is_granted(&self, target: &SymbolPath) -> bool {
        self.namespaces.contains(&target.module) || self.symbols.contains(target)
    }

    /// Id of the host module the catalog was built for.
    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    pub fn runtime_namespace(&self) -> &str {
        &self.runtime_namespace
    }

    /// Every grant, sorted.
    pub fn grants(&self) -> Vec<CapabilityGrant> {
        let mut grants: Vec<CapabilityGrant> = self
            .namespaces
            .iter()
            .map(|ns| CapabilityGrant::Namespace {
                namespace: ns.clone(),
            })
            .chain(
                self.symbols
                    .iter()
                    .map(|path| CapabilityGrant::Symbol { path: path.clone() }),
            )
            .collect();
        grants.sort();
        grants
    }

    /// Number of grants.
    pub fn len(&self) -> usize {
        self.namespaces.len() + self.symbols.len()
    }

    /// Never true: the base grants are always present.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
