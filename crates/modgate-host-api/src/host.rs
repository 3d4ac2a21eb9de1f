//! Host access for module code.
//!
//! Module code never touches the environment directly. It receives a
//! [`ModuleContext`] bound to its own module id, and every cross-module
//! lookup is checked by the sandbox before the symbol table is consulted.

use modgate_runtime::{
    AccessDecision, Environment, SandboxEnforcer, SecurityViolation, SymbolEntry, SymbolPath,
};
use std::sync::Arc;
use thiserror::Error;

/// Failure to reach a symbol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// The sandbox refused the access.
    #[error(transparent)]
    Violation(#[from] SecurityViolation),

    /// The access was allowed but no such symbol is declared.
    #[error("Symbol not found: {0}")]
    NotFound(String),
}

/// Log level for module logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Access-checked view of the environment for one module.
#[derive(Clone)]
pub struct ModuleContext {
    module_id: String,
    environment: Arc<Environment>,
    enforcer: Arc<SandboxEnforcer>,
}

impl ModuleContext {
    /// Bind a context to `module_id`.
    pub fn new(
        module_id: impl Into<String>,
        environment: Arc<Environment>,
        enforcer: Arc<SandboxEnforcer>,
    ) -> Self {
        Self {
            module_id: module_id.into(),
            environment,
            enforcer,
        }
    }

    /// Id of the module this context acts for.
    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// Check access to `target` without resolving it.
    pub fn check(&self, target: &SymbolPath) -> Result<AccessDecision, SecurityViolation> {
        self.enforcer.check(&self.module_id, target)
    }

    /// Resolve a `module:symbol` path on behalf of this module.
    pub fn resolve(&self, target: &str) -> Result<&SymbolEntry, AccessError> {
        let path = SymbolPath::parse(target)?;
        self.check(&path)?;
        self.environment
            .lookup(&path)
            .ok_or_else(|| AccessError::NotFound(path.to_string()))
    }

    /// Ids of the modules in the environment, in load order.
    ///
    /// Module identities are public; their symbols are not.
    pub fn module_ids(&self) -> Vec<&str> {
        self.environment.ids()
    }

    /// Log a message attributed to this module (always allowed).
    pub fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => tracing::trace!(module = %self.module_id, "{}", message),
            LogLevel::Debug => tracing::debug!(module = %self.module_id, "{}", message),
            LogLevel::Info => tracing::info!(module = %self.module_id, "{}", message),
            LogLevel::Warn => tracing::warn!(module = %self.module_id, "{}", message),
            LogLevel::Error => tracing::error!(module = %self.module_id, "{}", message),
        }
    }
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("module_id", &self.module_id)
            .finish_non_exhaustive()
    }
}
