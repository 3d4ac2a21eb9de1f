//! # modgate-host-api
//!
//! Host-side API for applications built on modgate.
//!
//! This crate provides the bridge between a composed module environment and
//! the host application. It allows hosts to:
//!
//! - Register the command handlers modules declare with their dispatcher
//! - Summarize which assets each module contributes
//! - Hand module code an access-checked view of the environment

pub mod command;
pub mod host;
pub mod inventory;
pub mod registrar;

pub use command::{
    derive_command_name, CommandDispatcher, CommandError, CommandHandler, HandlerCatalog,
    RegisteredCommand,
};
pub use host::{AccessError, LogLevel, ModuleContext};
pub use inventory::{
    AssetIndex, AssetIndexes, AssetInventoryReporter, AssetKind, InventoryReport, ItemCategory,
    ModuleInventory, StaticAssetIndex,
};
pub use registrar::{CommandRegistrar, RegisteredEntry, RegistrationError, RegistrationReport};
