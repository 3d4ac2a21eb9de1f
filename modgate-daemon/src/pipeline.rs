//! # Startup Pipeline
//!
//! Runs the host's startup sequence once, in order:
//!
//! ```text
//! discover ─▶ compose ─▶ scan/freeze ─▶ install ─▶ register commands ─▶ report
//! ```
//!
//! Everything produced here is immutable afterwards and shared via `Arc`.

use crate::assets;
use crate::config::{Config, ReportFormat};
use crate::console::Console;
use anyhow::{Context, Result};
use modgate_host_api::{
    AssetInventoryReporter, CommandRegistrar, HandlerCatalog, InventoryReport, RegistrationReport,
};
use modgate_runtime::{
    CatalogBuilder, DependencyComposer, Environment, ModuleDescriptor, ModuleRegistry,
    SandboxEnforcer,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Descriptor of the host, compiled into the binary.
const HOST_DESCRIPTOR: &str = include_str!("../host.toml");

/// Parse the embedded host descriptor.
pub fn host_descriptor() -> Result<ModuleDescriptor> {
    let descriptor = ModuleDescriptor::from_toml_str(HOST_DESCRIPTOR, Path::new("."))
        .context("Failed to parse embedded host descriptor")?;
    Ok(descriptor.into_host())
}

/// How the frozen catalog is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcerMode {
    /// Publish the process-wide enforcer. Only one pipeline per process may
    /// use this.
    Install,
    /// Keep the enforcer private to this host.
    Isolated,
}

/// Everything the startup pipeline produced.
pub struct ModuleHost {
    pub registries: Vec<ModuleRegistry>,
    pub environment: Arc<Environment>,
    pub enforcer: Arc<SandboxEnforcer>,
    pub console: Console,
    pub registration: RegistrationReport,
    pub inventory: Option<InventoryReport>,
}

impl ModuleHost {
    /// Run the startup pipeline.
    pub fn start(
        config: &Config,
        host: ModuleDescriptor,
        handlers: &HandlerCatalog,
        mode: EnforcerMode,
    ) -> Result<Self> {
        info!("Starting module host '{}'", host);

        let mut registries = Vec::new();
        for pass in config.discovery_passes()? {
            let registry = ModuleRegistry::discover(&pass)
                .with_context(|| format!("Module discovery failed in {:?}", pass))?;
            registries.push(registry);
        }

        let passes: Vec<&ModuleRegistry> = registries.iter().collect();
        let environment = DependencyComposer::new(host)
            .with_runtime_namespace(config.host.runtime_namespace.clone())
            .compose(&passes)
            .context("Failed to compose module environment")?;
        let environment = Arc::new(environment);

        let mut builder =
            CatalogBuilder::for_environment(&environment, config.host.runtime_namespace.clone());
        builder.scan(&environment);
        let catalog = builder.freeze();

        let enforcer = match mode {
            EnforcerMode::Install => {
                SandboxEnforcer::install(catalog).context("Failed to install sandbox")?
            }
            EnforcerMode::Isolated => SandboxEnforcer::new(catalog),
        };
        info!("Sandbox ready ({:?})", mode);

        let mut console = Console::new(Arc::clone(&environment), Arc::clone(&enforcer));
        let registration = CommandRegistrar::new(handlers).register_commands(&environment, &mut console);

        let inventory = if config.report.enabled {
            let indexes = assets::scan_environment(&environment);
            Some(AssetInventoryReporter::report(&environment, &indexes))
        } else {
            None
        };

        Ok(Self {
            registries,
            environment,
            enforcer,
            console,
            registration,
            inventory,
        })
    }

    /// Emit the inventory report in the configured format.
    pub fn emit_report(&self, format: ReportFormat) -> Result<()> {
        let Some(report) = &self.inventory else {
            return Ok(());
        };

        match format {
            ReportFormat::Log => report.log(),
            ReportFormat::Json => {
                let json = report
                    .to_json()
                    .context("Failed to serialize inventory report")?;
                println!("{}", json);
            }
        }
        Ok(())
    }
}
