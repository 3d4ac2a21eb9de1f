//! # modgate-runtime
//!
//! Module composition and sandboxing for modgate hosts.
//!
//! This crate provides:
//! - Module discovery from configured root directories
//! - Module descriptor parsing
//! - Dependency resolution into a single environment
//! - Capability-based security model
//!
//! ## Module Structure
//!
//! Modules are directories containing:
//! - `module.toml` (or `module.json`) - Module identity, dependencies and declared API
//! - `assets/` - Content consumed by the host's asset subsystems
//!
//! ## Security Model
//!
//! Modules may only reach symbols outside their own namespace when the frozen
//! capability catalog grants them. The host namespace and the runtime
//! namespace are granted to everyone; every other grant comes from a module
//! exporting the symbol. Everything else is denied.
//!
//! ## Startup
//!
//! ```text
//! ModuleRegistry::discover ─▶ DependencyComposer::compose ─▶ Environment
//!        Environment ─▶ CatalogBuilder::scan ─▶ freeze ─▶ SandboxEnforcer::install
//! ```

pub mod capability;
pub mod composer;
pub mod descriptor;
pub mod error;
pub mod registry;
pub mod sandbox;
pub mod symbol;

pub use capability::{
    AccessDecision, CapabilityCatalog, CapabilityGrant, CatalogBuilder, DEFAULT_RUNTIME_NAMESPACE,
};
pub use composer::{DependencyComposer, Environment};
pub use descriptor::{DeclaredApi, Dependency, ModuleDescriptor, ModuleManifest};
pub use error::{
    CompositionError, DescriptorError, DescriptorResult, DiscoveryError, ResolutionError,
    SandboxError, SecurityViolation,
};
pub use registry::ModuleRegistry;
pub use sandbox::{SandboxEnforcer, SandboxState};
pub use symbol::{SymbolEntry, SymbolKind, SymbolPath};
