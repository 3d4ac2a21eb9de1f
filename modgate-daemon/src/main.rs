//! # modgate
//!
//! The modgate host.
//!
//! This binary is responsible for:
//! - Discovering modules in the configured roots
//! - Composing them into one dependency-consistent environment
//! - Freezing the capability catalog and installing the sandbox
//! - Registering module command handlers with the console
//! - Reporting which assets each module contributes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          modgate                             │
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │   Module     │  │  Dependency  │  │  Capability  │      │
//! │  │   Registry   │─▶│   Composer   │─▶│   Catalog    │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! │                                              │               │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │    Asset     │  │   Command    │  │   Sandbox    │      │
//! │  │  Inventory   │  │  Registrar   │  │   Enforcer   │      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                      ┌──────────────┐
//!                      │   Console    │
//!                      │   (stdin)    │
//!                      └──────────────┘
//! ```
//!
//! ## Configuration
//!
//! The host reads configuration from `$XDG_CONFIG_HOME/modgate/config.toml`,
//! or from the path given as `--config <path>` (or as the only argument).
//!
//! ## Running
//!
//! ```bash
//! # Start the host
//! cargo run --bin modgate
//!
//! # With debug logging
//! RUST_LOG=debug cargo run --bin modgate -- --config ./modgate.toml
//! ```

use anyhow::{Context, Result};
use modgate_daemon::config::Config;
use modgate_daemon::console::host_handlers;
use modgate_daemon::pipeline::{host_descriptor, EnforcerMode, ModuleHost};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Config path from `--config <path>` or a single positional argument.
fn config_path_from_args() -> Result<Option<PathBuf>> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        None => Ok(None),
        Some("--config") => args
            .next()
            .map(|path| Some(PathBuf::from(path)))
            .context("--config requires a path"),
        Some(path) => Ok(Some(PathBuf::from(path))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // An explicit config path must load; the default location falls back
    // to built-in defaults.
    let (config, load_error) = match config_path_from_args()? {
        Some(path) => (Config::load(&path)?, None),
        None => match Config::load_default() {
            Ok(cfg) => (cfg, None),
            Err(e) => (Config::default(), Some(e)),
        },
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.host.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!("Starting modgate v{}", env!("CARGO_PKG_VERSION"));
    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {:#}", e);
    }

    let host = host_descriptor()?;
    let handlers = host_handlers(&host.id);
    let module_host = ModuleHost::start(&config, host, &handlers, EnforcerMode::Install)?;
    module_host.emit_report(config.report.format)?;

    info!(
        "Host startup complete: {} module(s), {} command(s)",
        module_host.environment.len(),
        module_host.registration.registered.len()
    );
    info!("Type 'help' for commands; Ctrl+D or Ctrl+C to stop");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read console input")? else {
                    break;
                };
                match module_host.console.execute_line(&line).await {
                    Ok(Some(output)) => println!("{}", output),
                    Ok(None) => {}
                    Err(e) => error!("{}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    info!("Host stopped");
    Ok(())
}
