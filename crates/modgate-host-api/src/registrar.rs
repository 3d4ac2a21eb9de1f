//! Command registration.
//!
//! Walks every command handler declared in the environment, builds one
//! instance of each and hands it to the host's dispatcher. A handler that
//! cannot be built, or whose name is already taken, is logged and skipped;
//! the rest are still registered.
//!
//! Name collisions are resolved first-registered-wins. Handlers are visited
//! in environment load order, so the host's own commands are always
//! registered before any module can claim the same name.

use crate::command::{derive_command_name, CommandDispatcher, HandlerCatalog, RegisteredCommand};
use modgate_runtime::{Environment, SymbolKind, SymbolPath};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, info, warn};

/// A handler that was not registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// No constructor was registered for the declared type.
    #[error("No constructor for command handler {handler}")]
    MissingConstructor { handler: SymbolPath },

    /// The constructor failed.
    #[error("Error creating instance of {handler}: {reason}")]
    ConstructorFailed { handler: SymbolPath, reason: String },

    /// The derived name was already registered.
    #[error("Command '{name}' from {handler} conflicts with {existing}; keeping {existing}")]
    NameConflict {
        name: String,
        handler: SymbolPath,
        existing: String,
    },
}

impl RegistrationError {
    /// The handler type this error is about.
    pub fn handler(&self) -> &SymbolPath {
        match self {
            RegistrationError::MissingConstructor { handler }
            | RegistrationError::ConstructorFailed { handler, .. }
            | RegistrationError::NameConflict { handler, .. } => handler,
        }
    }
}

/// A handler that was registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEntry {
    pub name: String,
    pub handler: SymbolPath,
}

/// Outcome of one registration pass.
#[derive(Debug, Default)]
pub struct RegistrationReport {
    pub registered: Vec<RegisteredEntry>,
    pub errors: Vec<RegistrationError>,
}

impl RegistrationReport {
    /// Names registered in this pass, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.registered.iter().map(|e| e.name.as_str()).collect()
    }

    /// Name conflicts found in this pass.
    pub fn conflicts(&self) -> impl Iterator<Item = &RegistrationError> {
        self.errors
            .iter()
            .filter(|e| matches!(e, RegistrationError::NameConflict { .. }))
    }
}

/// Registers the environment's command handlers with a dispatcher.
pub struct CommandRegistrar<'a> {
    handlers: &'a HandlerCatalog,
}

impl<'a> CommandRegistrar<'a> {
    pub fn new(handlers: &'a HandlerCatalog) -> Self {
        Self { handlers }
    }

    /// Register every declared command handler.
    pub fn register_commands(
        &self,
        environment: &Environment,
        dispatcher: &mut dyn CommandDispatcher,
    ) -> RegistrationReport {
        let mut report = RegistrationReport::default();
        let mut owners: HashMap<String, SymbolPath> = HashMap::new();

        for entry in environment.symbols_of_kind(SymbolKind::CommandHandler) {
            let handler = entry.path.clone();
            let name = derive_command_name(entry.name()).to_string();

            if dispatcher.has_command(&name) {
                let existing = owners
                    .get(&name)
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "a built-in command".to_string());
                let error = RegistrationError::NameConflict {
                    name,
                    handler,
                    existing,
                };
                warn!("{}", error);
                report.errors.push(error);
                continue;
            }

            let instance = match self.handlers.instantiate(entry.module(), entry.name()) {
                Some(Ok(instance)) => instance,
                Some(Err(reason)) => {
                    let error = RegistrationError::ConstructorFailed { handler, reason };
                    error!("{}", error);
                    report.errors.push(error);
                    continue;
                }
                None => {
                    let error = RegistrationError::MissingConstructor { handler };
                    error!("{}", error);
                    report.errors.push(error);
                    continue;
                }
            };

            dispatcher.register_command(
                &name,
                RegisteredCommand {
                    module: handler.module.clone(),
                    type_name: handler.symbol.clone(),
                    handler: instance,
                },
            );
            info!(module = %handler.module, "Registered command '{}' ({})", name, handler);

            owners.insert(name.clone(), handler.clone());
            report.registered.push(RegisteredEntry { name, handler });
        }

        info!(
            "Registered {} command(s), {} skipped",
            report.registered.len(),
            report.errors.len()
        );
        report
    }
}
