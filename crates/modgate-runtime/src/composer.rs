//! Dependency-aware environment composition.
//!
//! The composer takes the trusted host module plus every discovered module
//! and resolves the largest set whose dependency constraints are satisfied
//! inside that set. Modules that cannot be satisfied are dropped and
//! reported; they never fail the build as a whole.
//!
//! The result is an [`Environment`]: the load set in dependency-first order
//! and a single `module:symbol` lookup table spanning all of it.

use crate::capability::DEFAULT_RUNTIME_NAMESPACE;
use crate::descriptor::ModuleDescriptor;
use crate::error::{CompositionError, ResolutionError};
use crate::registry::ModuleRegistry;
use crate::symbol::{SymbolEntry, SymbolKind, SymbolPath};
use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves modules against each other and builds an [`Environment`].
pub struct DependencyComposer {
    host: Arc<ModuleDescriptor>,
    runtime_namespace: String,
}

impl DependencyComposer {
    /// Create a composer around the trusted host module.
    ///
    /// The default runtime namespace is reserved; see
    /// [`DependencyComposer::with_runtime_namespace`].
    pub fn new(host: ModuleDescriptor) -> Self {
        Self {
            host: Arc::new(host),
            runtime_namespace: DEFAULT_RUNTIME_NAMESPACE.to_string(),
        }
    }

    /// Reserve `namespace` as the runtime namespace. No discovered module may
    /// take it as its id.
    pub fn with_runtime_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.runtime_namespace = namespace.into();
        self
    }

    /// Compose the host with every module of every registry.
    ///
    /// Each registry is one discovery pass. When two passes supply the same
    /// id the higher version is kept; identical versions are ambiguous and
    /// fail the composition.
    pub fn compose(self, registries: &[&ModuleRegistry]) -> Result<Environment, CompositionError> {
        let host = self.host;
        if !host.trusted {
            return Err(CompositionError::UntrustedHost(host.id.clone()));
        }

        let mut unresolved = Vec::new();
        let candidates =
            collect_candidates(&host, &self.runtime_namespace, registries, &mut unresolved)?;
        let loaded = resolve(&host, &candidates, &mut unresolved);

        for (dependency, reason) in host_gaps(&host, &candidates, &loaded) {
            warn!(module = %host.id, "Host dependency '{}' unavailable: {}", dependency, reason);
        }

        let order = load_order(&host, &candidates, &loaded);
        let environment = Environment::build(host, order, unresolved);

        info!(
            "Environment composed: {} module(s) loaded, {} excluded",
            environment.len(),
            environment.unresolved().len()
        );
        Ok(environment)
    }
}

fn collect_candidates(
    host: &ModuleDescriptor,
    runtime_namespace: &str,
    registries: &[&ModuleRegistry],
    unresolved: &mut Vec<ResolutionError>,
) -> Result<BTreeMap<String, Arc<ModuleDescriptor>>, CompositionError> {
    let mut candidates: BTreeMap<String, Arc<ModuleDescriptor>> = BTreeMap::new();

    for registry in registries {
        for descriptor in registry.iter() {
            if descriptor.id == host.id {
                let error = ResolutionError::ShadowsHost {
                    module: descriptor.id.clone(),
                    path: descriptor.root.clone(),
                };
                warn!(module = %descriptor.id, "{}", error);
                unresolved.push(error);
                continue;
            }

            if descriptor.id == runtime_namespace {
                let error = ResolutionError::ReservedNamespace {
                    module: descriptor.id.clone(),
                    path: descriptor.root.clone(),
                };
                warn!(module = %descriptor.id, "{}", error);
                unresolved.push(error);
                continue;
            }

            if descriptor.trusted {
                let error = ResolutionError::TrustedModule {
                    module: descriptor.id.clone(),
                    path: descriptor.root.clone(),
                };
                warn!(module = %descriptor.id, "{}", error);
                unresolved.push(error);
                continue;
            }

            match candidates.entry(descriptor.id.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(descriptor));
                }
                Entry::Occupied(mut slot) => {
                    let current = slot.get();
                    match descriptor.version.cmp(&current.version) {
                        Ordering::Greater => {
                            info!(
                                module = %descriptor.id,
                                "v{} at {:?} supersedes v{} at {:?}",
                                descriptor.version, descriptor.root, current.version, current.root
                            );
                            slot.insert(Arc::clone(descriptor));
                        }
                        Ordering::Less => {
                            info!(
                                module = %descriptor.id,
                                "v{} at {:?} superseded by v{} at {:?}",
                                descriptor.version, descriptor.root, current.version, current.root
                            );
                        }
                        Ordering::Equal => {
                            return Err(CompositionError::AmbiguousModule {
                                id: descriptor.id.clone(),
                                version: descriptor.version.to_string(),
                                first: current.root.clone(),
                                second: descriptor.root.clone(),
                            });
                        }
                    }
                }
            }
        }
    }

    Ok(candidates)
}

/// Find the first constraint of `descriptor` that the current load set breaks.
fn first_gap(
    descriptor: &ModuleDescriptor,
    host: &ModuleDescriptor,
    candidates: &BTreeMap<String, Arc<ModuleDescriptor>>,
    loaded: &BTreeSet<String>,
) -> Option<ResolutionError> {
    for dependency in &descriptor.dependencies {
        let target = if dependency.id == host.id {
            Some(host)
        } else {
            candidates.get(&dependency.id).map(|d| d.as_ref())
        };

        let Some(target) = target else {
            return Some(ResolutionError::MissingDependency {
                module: descriptor.id.clone(),
                dependency: dependency.id.clone(),
                requirement: dependency.requirement.to_string(),
            });
        };

        if !dependency.accepts(&target.version) {
            return Some(ResolutionError::VersionMismatch {
                module: descriptor.id.clone(),
                dependency: dependency.id.clone(),
                requirement: dependency.requirement.to_string(),
                found: target.version.to_string(),
            });
        }

        if target.id != host.id && !loaded.contains(&target.id) {
            return Some(ResolutionError::DependencyExcluded {
                module: descriptor.id.clone(),
                dependency: dependency.id.clone(),
            });
        }
    }

    None
}

/// Drop modules until every remaining one is satisfied.
fn resolve(
    host: &ModuleDescriptor,
    candidates: &BTreeMap<String, Arc<ModuleDescriptor>>,
    unresolved: &mut Vec<ResolutionError>,
) -> BTreeSet<String> {
    let mut loaded: BTreeSet<String> = candidates.keys().cloned().collect();

    loop {
        let mut dropped = Vec::new();

        for id in &loaded {
            let descriptor = &candidates[id];
            if let Some(error) = first_gap(descriptor, host, candidates, &loaded) {
                warn!(module = %id, "Excluding module: {}", error);
                dropped.push(id.clone());
                unresolved.push(error);
            }
        }

        if dropped.is_empty() {
            return loaded;
        }
        for id in dropped {
            loaded.remove(&id);
        }
    }
}

fn host_gaps(
    host: &ModuleDescriptor,
    candidates: &BTreeMap<String, Arc<ModuleDescriptor>>,
    loaded: &BTreeSet<String>,
) -> Vec<(String, ResolutionError)> {
    host.dependencies
        .iter()
        .filter_map(|dependency| {
            let single = ModuleDescriptor {
                dependencies: vec![dependency.clone()],
                ..host.clone()
            };
            first_gap(&single, host, candidates, loaded).map(|e| (dependency.id.clone(), e))
        })
        .collect()
}

/// Host first, then dependencies before dependents, ties broken by id.
///
/// Depth-first over an explicit stack; chain length is bounded by memory,
/// not by the call stack.
fn load_order(
    host: &Arc<ModuleDescriptor>,
    candidates: &BTreeMap<String, Arc<ModuleDescriptor>>,
    loaded: &BTreeSet<String>,
) -> Vec<Arc<ModuleDescriptor>> {
    let mut order = vec![Arc::clone(host)];
    let mut visited: HashSet<&str> = HashSet::new();

    for root in loaded {
        if !visited.insert(root.as_str()) {
            continue;
        }

        // Each frame holds a module and the index of its next dependency.
        let mut stack: Vec<(&Arc<ModuleDescriptor>, usize)> = vec![(&candidates[root], 0)];
        while let Some(top) = stack.last_mut() {
            let descriptor = top.0;
            match descriptor.dependencies.get(top.1) {
                Some(dependency) => {
                    top.1 += 1;
                    let id = dependency.id.as_str();
                    if loaded.contains(id) && visited.insert(id) {
                        stack.push((&candidates[id], 0));
                    }
                }
                None => {
                    order.push(Arc::clone(descriptor));
                    stack.pop();
                }
            }
        }
    }
    order
}

/// The resolved load set and its unified symbol table.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug)]
pub struct Environment {
    modules: Vec<Arc<ModuleDescriptor>>,
    index: HashMap<String, usize>,
    symbols: Vec<SymbolEntry>,
    symbol_index: HashMap<SymbolPath, usize>,
    unresolved: Vec<ResolutionError>,
}

impl Environment {
    fn build(
        host: Arc<ModuleDescriptor>,
        order: Vec<Arc<ModuleDescriptor>>,
        unresolved: Vec<ResolutionError>,
    ) -> Self {
        debug_assert!(Arc::ptr_eq(&order[0], &host));

        let index = order
            .iter()
            .enumerate()
            .map(|(i, module)| (module.id.clone(), i))
            .collect();

        let mut symbols = Vec::new();
        for module in &order {
            let api = &module.api;
            let declared = api
                .exports
                .iter()
                .map(|s| (s, SymbolKind::Export))
                .chain(api.internal.iter().map(|s| (s, SymbolKind::Internal)))
                .chain(api.commands.iter().map(|s| (s, SymbolKind::CommandHandler)));

            for (name, kind) in declared {
                symbols.push(SymbolEntry {
                    path: SymbolPath::new(module.id.as_str(), name.as_str()),
                    kind,
                });
            }
            debug!(module = %module.id, "Indexed {} symbol(s)", api.all_symbols().count());
        }

        let symbol_index = symbols
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.path.clone(), i))
            .collect();

        Self {
            modules: order,
            index,
            symbols,
            symbol_index,
            unresolved,
        }
    }

    /// The trusted host module.
    pub fn host(&self) -> &Arc<ModuleDescriptor> {
        &self.modules[0]
    }

    /// Id of the trusted host module.
    pub fn host_id(&self) -> &str {
        &self.modules[0].id
    }

    /// Loaded modules in load order, host first.
    pub fn modules(&self) -> &[Arc<ModuleDescriptor>] {
        &self.modules
    }

    /// Get a loaded module by id.
    pub fn module(&self, id: &str) -> Option<&Arc<ModuleDescriptor>> {
        self.index.get(id).map(|&i| &self.modules[i])
    }

    /// Check if a module is part of the environment.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Loaded module ids in load order.
    pub fn ids(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.id.as_str()).collect()
    }

    /// Number of loaded modules, host included.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Always false: the host is always loaded.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules that were left out, with the reason.
    pub fn unresolved(&self) -> &[ResolutionError] {
        &self.unresolved
    }

    /// Look up a symbol by module and name.
    pub fn symbol(&self, module: &str, name: &str) -> Option<&SymbolEntry> {
        self.lookup(&SymbolPath::new(module, name))
    }

    /// Look up a symbol by path.
    pub fn lookup(&self, path: &SymbolPath) -> Option<&SymbolEntry> {
        self.symbol_index.get(path).map(|&i| &self.symbols[i])
    }

    /// Look up a `module:symbol` string.
    pub fn resolve(&self, qualified: &str) -> Option<&SymbolEntry> {
        SymbolPath::parse(qualified)
            .ok()
            .and_then(|path| self.lookup(&path))
    }

    /// Every symbol, in module load order then declaration order.
    pub fn symbols(&self) -> &[SymbolEntry] {
        &self.symbols
    }

    /// Symbols of one kind, in load order.
    pub fn symbols_of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = &SymbolEntry> {
        self.symbols.iter().filter(move |entry| entry.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn module(id: &str, version: &str, deps: &[(&str, &str)]) -> ModuleDescriptor {
        let mut toml = format!("[module]\nid = \"{}\"\nversion = \"{}\"\n", id, version);
        for (dep, req) in deps {
            toml.push_str(&format!(
                "\n[[dependencies]]\nid = \"{}\"\nversion = \"{}\"\n",
                dep, req
            ));
        }
        ModuleDescriptor::from_toml_str(&toml, Path::new(id)).unwrap()
    }

    fn host() -> ModuleDescriptor {
        module("engine", "2.0.0", &[]).into_host()
    }

    fn registry(modules: Vec<ModuleDescriptor>) -> ModuleRegistry {
        ModuleRegistry::from_descriptors(modules).unwrap()
    }

    #[test]
    fn test_satisfied_dependencies() {
        let registry = registry(vec![
            module("a", "1.2", &[]),
            module("b", "1.0.0", &[("a", ">=1.0")]),
        ]);

        let env = DependencyComposer::new(host()).compose(&[&registry]).unwrap();

        assert_eq!(env.ids(), vec!["engine", "a", "b"]);
        assert!(env.unresolved().is_empty());
    }

    #[test]
    fn test_missing_dependency_excludes_module() {
        let registry = registry(vec![module("c", "1.0.0", &[("d", "1.0")])]);

        let env = DependencyComposer::new(host()).compose(&[&registry]).unwrap();

        assert_eq!(env.ids(), vec!["engine"]);
        assert_eq!(env.unresolved().len(), 1);
        assert!(matches!(
            &env.unresolved()[0],
            ResolutionError::MissingDependency { module, dependency, .. }
                if module == "c" && dependency == "d"
        ));
    }

    #[test]
    fn test_exclusion_is_transitive() {
        let registry = registry(vec![
            module("a", "1.0.0", &[("missing", "*")]),
            module("b", "1.0.0", &[("a", "*")]),
            module("c", "1.0.0", &[("b", "*")]),
            module("d", "1.0.0", &[]),
        ]);

        let env = DependencyComposer::new(host()).compose(&[&registry]).unwrap();

        assert_eq!(env.ids(), vec!["engine", "d"]);
        let mut excluded: Vec<&str> = env.unresolved().iter().map(|e| e.module()).collect();
        excluded.sort();
        assert_eq!(excluded, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_version_mismatch() {
        let registry = registry(vec![
            module("a", "0.9.0", &[]),
            module("b", "1.0.0", &[("a", ">=1.0")]),
        ]);

        let env = DependencyComposer::new(host()).compose(&[&registry]).unwrap();

        assert_eq!(env.ids(), vec!["engine", "a"]);
        assert!(matches!(
            &env.unresolved()[0],
            ResolutionError::VersionMismatch { found, .. } if found == "0.9.0"
        ));
    }

    #[test]
    fn test_dependency_on_host() {
        let registry = registry(vec![
            module("a", "1.0.0", &[("engine", "^2")]),
            module("b", "1.0.0", &[("engine", "^3")]),
        ]);

        let env = DependencyComposer::new(host()).compose(&[&registry]).unwrap();

        assert_eq!(env.ids(), vec!["engine", "a"]);
        assert_eq!(env.unresolved().len(), 1);
    }

    #[test]
    fn test_load_order_puts_dependencies_first() {
        let registry = registry(vec![
            module("alpha", "1.0.0", &[("zeta", "*")]),
            module("zeta", "1.0.0", &[]),
        ]);

        let env = DependencyComposer::new(host()).compose(&[&registry]).unwrap();

        assert_eq!(env.ids(), vec!["engine", "zeta", "alpha"]);
    }

    #[test]
    fn test_cycles_are_tolerated() {
        let registry = registry(vec![
            module("a", "1.0.0", &[("b", "*")]),
            module("b", "1.0.0", &[("a", "*")]),
        ]);

        let env = DependencyComposer::new(host()).compose(&[&registry]).unwrap();

        assert_eq!(env.len(), 3);
        assert!(env.unresolved().is_empty());
    }

    #[test]
    fn test_higher_version_wins_across_registries() {
        let bundled = registry(vec![module("a", "1.0.0", &[])]);
        let user = registry(vec![module("a", "1.1.0", &[])]);

        let env = DependencyComposer::new(host())
            .compose(&[&bundled, &user])
            .unwrap();

        assert_eq!(env.module("a").unwrap().version.to_string(), "1.1.0");

        let env = DependencyComposer::new(host())
            .compose(&[&user, &bundled])
            .unwrap();
        assert_eq!(env.module("a").unwrap().version.to_string(), "1.1.0");
    }

    #[test]
    fn test_equal_versions_across_registries_are_fatal() {
        let bundled = registry(vec![module("a", "1.0.0", &[])]);
        let user = registry(vec![module("a", "1.0", &[])]);

        let result = DependencyComposer::new(host()).compose(&[&bundled, &user]);
        assert!(matches!(
            result,
            Err(CompositionError::AmbiguousModule { id, .. }) if id == "a"
        ));
    }

    #[test]
    fn test_module_cannot_shadow_host() {
        let registry = registry(vec![module("engine", "9.0.0", &[])]);

        let env = DependencyComposer::new(host()).compose(&[&registry]).unwrap();

        assert_eq!(env.host().version.to_string(), "2.0.0");
        assert!(env.host().trusted);
        assert!(matches!(
            &env.unresolved()[0],
            ResolutionError::ShadowsHost { .. }
        ));
    }

    #[test]
    fn test_untrusted_host_is_rejected() {
        let result = DependencyComposer::new(module("engine", "1.0.0", &[])).compose(&[]);
        assert!(matches!(result, Err(CompositionError::UntrustedHost(_))));
    }

    #[test]
    fn test_symbol_table() {
        let toml = r#"
[module]
id = "a"
version = "1.0.0"

[api]
exports = ["Widget"]
internal = ["InternalHelper"]
commands = ["ResetCommand"]
"#;
        let a = ModuleDescriptor::from_toml_str(toml, Path::new("a")).unwrap();
        let registry = registry(vec![a]);

        let env = DependencyComposer::new(host()).compose(&[&registry]).unwrap();

        assert_eq!(env.resolve("a:Widget").unwrap().kind, SymbolKind::Export);
        assert_eq!(
            env.symbol("a", "InternalHelper").unwrap().kind,
            SymbolKind::Internal
        );
        assert_eq!(env.symbols_of_kind(SymbolKind::CommandHandler).count(), 1);
        assert!(env.resolve("a:Missing").is_none());
        assert!(env.resolve("garbage").is_none());
    }

    #[test]
    fn test_trusted_module_is_rejected() {
        let registry = registry(vec![
            module("a", "1.0.0", &[]).into_host(),
            module("b", "1.0.0", &[("a", "*")]),
        ]);

        let env = DependencyComposer::new(host()).compose(&[&registry]).unwrap();

        assert_eq!(env.ids(), vec!["engine"]);
        assert_eq!(env.modules().iter().filter(|m| m.trusted).count(), 1);
        assert!(matches!(
            &env.unresolved()[0],
            ResolutionError::TrustedModule { module, .. } if module == "a"
        ));
        assert!(matches!(
            &env.unresolved()[1],
            ResolutionError::MissingDependency { module, .. } if module == "b"
        ));
    }

    #[test]
    fn test_custom_runtime_namespace_is_reserved() {
        let registry = registry(vec![module("core", "1.0.0", &[]), module("rt", "1.0.0", &[])]);

        let env = DependencyComposer::new(host())
            .with_runtime_namespace("rt")
            .compose(&[&registry])
            .unwrap();

        assert_eq!(env.ids(), vec!["engine", "core"]);
        assert!(matches!(
            &env.unresolved()[0],
            ResolutionError::ReservedNamespace { module, .. } if module == "rt"
        ));
    }

    #[test]
    fn test_long_dependency_chain() {
        let depth = 20_000;
        let id = |i: usize| format!("m{:05}", i);
        let modules: Vec<ModuleDescriptor> = (0..depth)
            .map(|i| {
                if i + 1 < depth {
                    let next = id(i + 1);
                    module(&id(i), "1.0.0", &[(next.as_str(), "*")])
                } else {
                    module(&id(i), "1.0.0", &[])
                }
            })
            .collect();

        let env = DependencyComposer::new(host())
            .compose(&[&registry(modules)])
            .unwrap();

        // m00000 is visited first and needs the whole chain below it.
        assert_eq!(env.len(), depth + 1);
        assert_eq!(env.modules()[1].id, id(depth - 1));
        assert_eq!(env.modules()[depth].id, "m00000");
    }
}
