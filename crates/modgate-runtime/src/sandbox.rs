//! Sandbox enforcement.
//!
//! Every cross-module access goes through [`SandboxEnforcer::check`], which
//! consults the frozen [`CapabilityCatalog`]. Anything the catalog does not
//! grant is refused.
//!
//! One enforcer is installed per process with [`SandboxEnforcer::install`].
//! The slot is write-once: a second installation is an error, and there is
//! no way to uninstall. Until installation, [`check_access`] denies
//! everything.
//!
//! ```text
//! Uninstalled ──CatalogBuilder::new──▶ Scanning ──freeze + install──▶ Installed
//! ```

use crate::capability::{AccessDecision, CapabilityCatalog};
use crate::error::{SandboxError, SecurityViolation};
use crate::symbol::SymbolPath;
use std::sync::{Arc, OnceLock};
use tracing::{info, trace, warn};

static ENFORCER: OnceLock<Arc<SandboxEnforcer>> = OnceLock::new();

/// Lifecycle of the process-wide enforcer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Uninstalled,
    Installed,
}

/// Report whether the process-wide enforcer is installed.
pub fn state() -> SandboxState {
    if ENFORCER.get().is_some() {
        SandboxState::Installed
    } else {
        SandboxState::Uninstalled
    }
}

/// The installed enforcer, if any.
pub fn current() -> Option<Arc<SandboxEnforcer>> {
    ENFORCER.get().cloned()
}

/// Check an access against the process-wide enforcer.
///
/// Fails closed when nothing is installed yet.
pub fn check_access(caller: &str, target: &SymbolPath) -> Result<AccessDecision, SecurityViolation> {
    match ENFORCER.get() {
        Some(enforcer) => enforcer.check(caller, target),
        None => {
            warn!(caller, target = %target, "Access attempted before sandbox installation");
            Err(SecurityViolation::EnforcerNotInstalled {
                caller: caller.to_string(),
                target: target.to_string(),
            })
        }
    }
}

/// Access checkpoint backed by a frozen catalog.
///
/// Holds no interior mutability, so concurrent checks from any number of
/// threads need no locking.
#[derive(Debug)]
pub struct SandboxEnforcer {
    catalog: CapabilityCatalog,
}

impl SandboxEnforcer {
    /// Create an enforcer that is not published process-wide.
    pub fn new(catalog: CapabilityCatalog) -> Arc<Self> {
        Arc::new(Self { catalog })
    }

    /// Publish the process-wide enforcer.
    ///
    /// Succeeds exactly once per process.
    pub fn install(catalog: CapabilityCatalog) -> Result<Arc<Self>, SandboxError> {
        let enforcer = Self::new(catalog);
        ENFORCER
            .set(Arc::clone(&enforcer))
            .map_err(|_| SandboxError::AlreadyInstalled)?;

        info!(
            host = enforcer.catalog.host_id(),
            grants = enforcer.catalog.len(),
            "Sandbox enforcer installed"
        );
        Ok(enforcer)
    }

    /// Check whether `caller` may reach `target`.
    ///
    /// The host module is trusted and may reach anything.
    pub fn check(&self, caller: &str, target: &SymbolPath) -> Result<AccessDecision, SecurityViolation> {
        if caller == self.catalog.host_id() {
            trace!(caller, target = %target, "Host access");
            return Ok(AccessDecision::OwnModule);
        }

        match self.catalog.decide(caller, target) {
            AccessDecision::Denied => {
                warn!(caller, target = %target, "Security violation: access denied");
                Err(SecurityViolation::Denied {
                    caller: caller.to_string(),
                    target: target.to_string(),
                })
            }
            granted => {
                trace!(caller, target = %target, decision = ?granted, "Access granted");
                Ok(granted)
            }
        }
    }

    /// Check a `module:symbol` string.
    pub fn check_path(&self, caller: &str, target: &str) -> Result<AccessDecision, SecurityViolation> {
        let path = SymbolPath::parse(target)?;
        self.check(caller, &path)
    }

    /// The frozen catalog this enforcer consults.
    pub fn catalog(&self) -> &CapabilityCatalog {
        &self.catalog
    }
}
