//! Integration tests for the modgate host.
//!
//! These tests run the full startup pipeline against module trees written
//! to temporary directories and drive the resulting console:
//! - Discovery across several passes with the version tie-break
//! - Exclusion of modules with unsatisfied dependencies
//! - Command registration and sandboxed execution
//! - Inventory of on-disk assets

use async_trait::async_trait;
use modgate_daemon::config::Config;
use modgate_daemon::console::host_handlers;
use modgate_daemon::pipeline::{host_descriptor, EnforcerMode, ModuleHost};
use modgate_host_api::{
    AssetKind, CommandError, CommandHandler, ItemCategory, ModuleContext,
};
use modgate_runtime::{AccessDecision, ResolutionError, SymbolPath};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// Writes a module directory with the given descriptor body and asset files.
fn create_test_module(root: &Path, dir: &str, descriptor: &str, assets: &[&str]) -> PathBuf {
    let module_dir = root.join(dir);
    std::fs::create_dir_all(&module_dir).unwrap();
    std::fs::write(module_dir.join("module.toml"), descriptor).unwrap();

    for asset in assets {
        let path = module_dir.join("assets").join(asset);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "").unwrap();
    }
    module_dir
}

/// Config scanning only the given passes.
fn create_test_config(roots: Vec<PathBuf>, bundled: Vec<PathBuf>) -> Config {
    let mut config = Config::default();
    config.modules.roots = roots;
    config.modules.bundled_roots = bundled;
    config.modules.include_user_dir = false;
    config
}

/// Reports the sandbox decision for its single `module:symbol` argument.
#[derive(Default)]
struct CheckCommand;

#[async_trait]
impl CommandHandler for CheckCommand {
    async fn execute(&self, ctx: &ModuleContext, args: &[String]) -> Result<String, CommandError> {
        let target = args
            .first()
            .ok_or_else(|| CommandError::Usage("Check <module:symbol>".to_string()))?;
        let path = SymbolPath::parse(target).map_err(|e| CommandError::Failed(e.to_string()))?;
        match ctx.check(&path) {
            Ok(decision) => Ok(format!("{:?}", decision)),
            Err(violation) => Ok(format!("denied: {}", violation)),
        }
    }
}

#[derive(Default)]
struct ResolveCommand;

#[async_trait]
impl CommandHandler for ResolveCommand {
    async fn execute(&self, _ctx: &ModuleContext, _args: &[String]) -> Result<String, CommandError> {
        Ok("module resolve".to_string())
    }
}

fn start(config: &Config, register: impl FnOnce(&mut modgate_host_api::HandlerCatalog)) -> ModuleHost {
    let host = host_descriptor().unwrap();
    let mut handlers = host_handlers(&host.id);
    register(&mut handlers);
    ModuleHost::start(config, host, &handlers, EnforcerMode::Isolated).unwrap()
}

// ============================================================================
// Startup Tests
// ============================================================================

#[tokio::test]
async fn test_full_startup() {
    let temp_dir = TempDir::new().unwrap();
    let mods = temp_dir.path().join("mods");

    create_test_module(
        &mods,
        "a",
        "[module]\nid = \"a\"\nversion = \"1.0.0\"\n[api]\nexports = [\"Widget\"]\ninternal = [\"InternalHelper\"]\n",
        &["items/PlasmaClip.json", "items/IonEngine.json", "items/Widget.json", "sounds/hum.ogg"],
    );
    create_test_module(
        &mods,
        "b",
        "[module]\nid = \"b\"\nversion = \"1.0.0\"\n[[dependencies]]\nid = \"a\"\nversion = \">=1.0\"\n[api]\ncommands = [\"CheckCommand\", \"ResolveCommand\"]\n",
        &[],
    );
    create_test_module(
        &mods,
        "c",
        "[module]\nid = \"c\"\nversion = \"1.0.0\"\n[[dependencies]]\nid = \"missing\"\n",
        &["items/LostArmor.json"],
    );
    std::fs::create_dir_all(mods.join("not-a-module")).unwrap();

    let config = create_test_config(vec![mods], Vec::new());
    let host = start(&config, |handlers| {
        handlers
            .register::<CheckCommand>("b", "CheckCommand")
            .register::<ResolveCommand>("b", "ResolveCommand");
    });

    // Composition
    assert_eq!(host.environment.ids(), vec!["engine", "a", "b"]);
    assert!(matches!(
        host.environment.unresolved(),
        [ResolutionError::MissingDependency { .. }]
    ));

    // The host's Resolve command wins over the module's.
    assert_eq!(host.registration.names(), vec!["Resolve", "Check"]);
    assert_eq!(host.registration.conflicts().count(), 1);
    assert_eq!(host.console.provider_of("resolve"), Some("engine"));

    // Sandboxed execution on behalf of module b.
    let check = |target: &str| {
        let line = format!("check {}", target);
        let console = &host.console;
        async move { console.execute_line(&line).await.unwrap().unwrap() }
    };
    assert_eq!(check("a:Widget").await, format!("{:?}", AccessDecision::SymbolGrant));
    assert!(check("a:InternalHelper").await.starts_with("denied"));
    assert_eq!(check("engine:Log").await, format!("{:?}", AccessDecision::NamespaceGrant));
    assert_eq!(check("core:Anything").await, format!("{:?}", AccessDecision::NamespaceGrant));
    assert_eq!(check("b:Private").await, format!("{:?}", AccessDecision::OwnModule));

    // The host itself is never restricted.
    let resolved = host
        .console
        .execute_line("Resolve a:InternalHelper")
        .await
        .unwrap();
    assert_eq!(resolved.as_deref(), Some("a:InternalHelper (Internal)"));

    // Inventory
    let inventory = host.inventory.as_ref().unwrap();
    let a = inventory.module("a").unwrap();
    assert_eq!(a.items(ItemCategory::Clip), 1);
    assert_eq!(a.items(ItemCategory::Engine), 1);
    assert_eq!(a.items(ItemCategory::Other), 1);
    assert_eq!(a.count(AssetKind::Sound), 1);
    assert_eq!(inventory.module("b").unwrap().total(), 0);
    assert!(inventory.module("c").is_none());
    assert_eq!(inventory.modules.len(), 3);
}

#[test]
fn test_higher_version_wins_across_passes() {
    let temp_dir = TempDir::new().unwrap();
    let user = temp_dir.path().join("user");
    let bundled = temp_dir.path().join("bundled");

    create_test_module(
        &user,
        "warp",
        "[module]\nid = \"warp\"\nversion = \"1.2.0\"\n",
        &[],
    );
    let newer = create_test_module(
        &bundled,
        "warp-drive",
        "[module]\nid = \"warp\"\nversion = \"1.10.0\"\n",
        &[],
    );

    let config = create_test_config(vec![user], vec![bundled]);
    let host = start(&config, |_| {});

    assert_eq!(host.registries.len(), 2);
    let warp = host.environment.module("warp").unwrap();
    assert_eq!(warp.version.to_string(), "1.10.0");
    assert_eq!(warp.root, newer);
}

#[test]
fn test_duplicate_in_one_pass_fails_startup() {
    let temp_dir = TempDir::new().unwrap();
    let mods = temp_dir.path().join("mods");

    create_test_module(&mods, "one", "[module]\nid = \"dup\"\nversion = \"1.0.0\"\n", &[]);
    create_test_module(&mods, "two", "[module]\nid = \"dup\"\nversion = \"2.0.0\"\n", &[]);

    let config = create_test_config(vec![mods], Vec::new());
    let host = host_descriptor().unwrap();
    let handlers = host_handlers(&host.id);
    let result = ModuleHost::start(&config, host, &handlers, EnforcerMode::Isolated);

    let message = format!("{:#}", result.err().unwrap());
    assert!(message.contains("dup"), "{}", message);
}

#[test]
fn test_module_shadowing_host_is_excluded() {
    let temp_dir = TempDir::new().unwrap();
    let mods = temp_dir.path().join("mods");

    create_test_module(
        &mods,
        "engine",
        "[module]\nid = \"engine\"\nversion = \"9.0.0\"\n[api]\nexports = [\"Backdoor\"]\n",
        &[],
    );

    let config = create_test_config(vec![mods], Vec::new());
    let host = start(&config, |_| {});

    assert_eq!(host.environment.len(), 1);
    assert_eq!(host.environment.host().version.to_string(), "0.1.0");
    assert!(host.environment.symbol("engine", "Backdoor").is_none());
}

#[test]
fn test_report_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = create_test_config(vec![temp_dir.path().to_path_buf()], Vec::new());
    config.report.enabled = false;

    let host = start(&config, |_| {});
    assert!(host.inventory.is_none());
    assert!(host.emit_report(config.report.format).is_ok());
    assert_eq!(host.enforcer.catalog().runtime_namespace(), "core");
}

#[test]
fn test_configured_runtime_namespace_is_reserved() {
    let temp_dir = TempDir::new().unwrap();
    let mods = temp_dir.path().join("mods");

    create_test_module(
        &mods,
        "rt",
        "[module]\nid = \"rt\"\nversion = \"1.0.0\"\n[api]\ninternal = [\"InternalHelper\"]\n",
        &["sounds/hum.ogg"],
    );
    create_test_module(&mods, "a", "[module]\nid = \"a\"\nversion = \"1.0.0\"\n", &[]);

    let mut config = create_test_config(vec![mods], Vec::new());
    config.host.runtime_namespace = "rt".to_string();
    let host = start(&config, |_| {});

    assert_eq!(host.environment.ids(), vec!["engine", "a"]);
    assert!(matches!(
        host.environment.unresolved(),
        [ResolutionError::ReservedNamespace { .. }]
    ));
    assert!(host.environment.symbol("rt", "InternalHelper").is_none());

    // Nothing from the rejected module is reported as loaded.
    let inventory = host.inventory.as_ref().unwrap();
    assert!(inventory.module("rt").is_none());
    assert_eq!(inventory.totals[&AssetKind::Sound], 0);
}
