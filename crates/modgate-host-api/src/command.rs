//! Command handlers and their constructors.
//!
//! Handler types implement [`CommandHandler`]. Which module provides which
//! handler type is declared in the module's descriptor (`api.commands`); how
//! to build one is registered ahead of time in a [`HandlerCatalog`], keyed by
//! module id and type name. Registration never inspects types at runtime.

use crate::host::ModuleContext;
use async_trait::async_trait;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

/// Suffix stripped from handler type names to form command names.
pub const COMMAND_SUFFIX: &str = "Command";

/// Error returned by a handler while executing.
#[derive(Error, Debug)]
pub enum CommandError {
    /// The arguments were not understood.
    #[error("Usage: {0}")]
    Usage(String),

    /// The handler ran and failed.
    #[error("Command failed: {0}")]
    Failed(String),

    /// The handler reached for a symbol it may not use.
    #[error(transparent)]
    Access(#[from] crate::host::AccessError),
}

/// A console command provided by a module.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Run the command with whitespace-split arguments.
    async fn execute(&self, ctx: &ModuleContext, args: &[String]) -> Result<String, CommandError>;

    /// One-line help text.
    fn description(&self) -> &str {
        ""
    }
}

/// Derive a command name from a handler type name.
///
/// `ResetCommand` becomes `Reset`; a type named just `Command` keeps its name.
pub fn derive_command_name(type_name: &str) -> &str {
    match type_name.strip_suffix(COMMAND_SUFFIX) {
        Some(stripped) if !stripped.is_empty() => stripped,
        _ => type_name,
    }
}

type HandlerFactory =
    Box<dyn Fn() -> Result<Box<dyn CommandHandler>, String> + Send + Sync + 'static>;

/// Constructors for handler types, keyed by `(module id, type name)`.
#[derive(Default)]
pub struct HandlerCatalog {
    factories: HashMap<(String, String), HandlerFactory>,
}

impl HandlerCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler type built with its no-argument constructor.
    pub fn register<T>(&mut self, module: &str, type_name: &str) -> &mut Self
    where
        T: CommandHandler + Default + 'static,
    {
        self.register_fallible(module, type_name, || {
            Ok(Box::new(T::default()) as Box<dyn CommandHandler>)
        })
    }

    /// Register a handler type whose constructor may fail.
    pub fn register_fallible<F>(&mut self, module: &str, type_name: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Result<Box<dyn CommandHandler>, String> + Send + Sync + 'static,
    {
        self.factories.insert(
            (module.to_string(), type_name.to_string()),
            Box::new(factory),
        );
        self
    }

    /// Check whether a constructor is known.
    pub fn contains(&self, module: &str, type_name: &str) -> bool {
        self.factories
            .contains_key(&(module.to_string(), type_name.to_string()))
    }

    /// Build one handler instance.
    ///
    /// Returns `None` when no constructor is registered. A constructor that
    /// panics is reported as a failure.
    pub fn instantiate(
        &self,
        module: &str,
        type_name: &str,
    ) -> Option<Result<Box<dyn CommandHandler>, String>> {
        let factory = self
            .factories
            .get(&(module.to_string(), type_name.to_string()))?;

        let result = catch_unwind(AssertUnwindSafe(factory)).unwrap_or_else(|panic| {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "constructor panicked".to_string());
            Err(reason)
        });
        Some(result)
    }

    /// Number of registered constructors.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

/// A handler instance bound to the module that declared it.
pub struct RegisteredCommand {
    pub module: String,
    pub type_name: String,
    pub handler: Box<dyn CommandHandler>,
}

impl std::fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("module", &self.module)
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// The host's command dispatcher, as seen by the registrar.
pub trait CommandDispatcher {
    /// Register `command` under `name`.
    fn register_command(&mut self, name: &str, command: RegisteredCommand);

    /// Check if `name` is taken.
    fn has_command(&self, name: &str) -> bool;
}
