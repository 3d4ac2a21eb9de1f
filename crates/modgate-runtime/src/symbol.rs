//! Namespace-qualified symbols.
//!
//! Every symbol in an environment is addressed as `module:symbol`.

use crate::error::SecurityViolation;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A `module:symbol` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolPath {
    pub module: String,
    pub symbol: String,
}

impl SymbolPath {
    pub fn new(module: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            symbol: symbol.into(),
        }
    }

    /// Parse `module:symbol`. Both halves must be non-empty.
    pub fn parse(path: &str) -> Result<Self, SecurityViolation> {
        match path.split_once(':') {
            Some((module, symbol))
                if !module.is_empty() && !symbol.is_empty() && !symbol.contains(':') =>
            {
                Ok(Self::new(module, symbol))
            }
            _ => Err(SecurityViolation::MalformedPath(path.to_string())),
        }
    }
}

impl fmt::Display for SymbolPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.symbol)
    }
}

/// What a declared symbol is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    /// Part of the module's public API.
    Export,
    /// Usable only inside the declaring module.
    Internal,
    /// A console command handler type.
    CommandHandler,
}

impl SymbolKind {
    /// Whether other modules can ever be granted this symbol.
    pub fn is_public(self) -> bool {
        !matches!(self, SymbolKind::Internal)
    }
}

/// A symbol in the environment's lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolEntry {
    pub path: SymbolPath,
    pub kind: SymbolKind,
}

impl SymbolEntry {
    pub fn module(&self) -> &str {
        &self.path.module
    }

    pub fn name(&self) -> &str {
        &self.path.symbol
    }
}
