//! Error types for the modgate runtime.
//!
//! Errors are split by how far they are allowed to travel. Problems local to
//! one module (a malformed descriptor, an unsatisfied dependency, a denied
//! access) are recoverable and only ever fail that module or that access.
//! Identity problems (duplicate ids, a second enforcer installation) are
//! fatal to the pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// A single module descriptor could not be read or is invalid.
///
/// Always recoverable: discovery skips the module and logs the reason.
#[derive(Error, Debug)]
pub enum DescriptorError {
    /// Descriptor is structurally valid but carries unusable values.
    #[error("Invalid descriptor: {0}")]
    Invalid(String),

    /// Version string is not a valid version.
    #[error("Invalid version '{value}': {source}")]
    Version {
        value: String,
        #[source]
        source: semver::Error,
    },

    /// Dependency requirement is not a valid version requirement.
    #[error("Invalid version requirement '{value}': {source}")]
    Requirement {
        value: String,
        #[source]
        source: semver::Error,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fatal failure of a whole discovery pass.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Two descriptors in one pass claim the same id.
    #[error("Duplicate module id '{id}' at {first:?} and {second:?}")]
    DuplicateModule {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// Why a module was left out of the environment.
///
/// Recoverable per module: the module is excluded and the rest of the
/// environment is built without it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    /// No module with the required id was discovered.
    #[error("Module '{module}' requires '{dependency}' ({requirement}), which is not available")]
    MissingDependency {
        module: String,
        dependency: String,
        requirement: String,
    },

    /// The dependency exists but its version does not satisfy the requirement.
    #[error("Module '{module}' requires '{dependency}' ({requirement}), found {found}")]
    VersionMismatch {
        module: String,
        dependency: String,
        requirement: String,
        found: String,
    },

    /// The dependency was itself excluded.
    #[error("Module '{module}' requires '{dependency}', which was excluded")]
    DependencyExcluded { module: String, dependency: String },

    /// A discovered module tried to take the host module's id.
    #[error("Module '{module}' at {path:?} shadows the host module and was rejected")]
    ShadowsHost { module: String, path: PathBuf },

    /// A discovered module tried to take the runtime namespace as its id.
    #[error("Module '{module}' at {path:?} claims the reserved runtime namespace and was rejected")]
    ReservedNamespace { module: String, path: PathBuf },

    /// A discovered module arrived marked as trusted; only the host may be.
    #[error("Module '{module}' at {path:?} is marked trusted but is not the host and was rejected")]
    TrustedModule { module: String, path: PathBuf },
}

impl ResolutionError {
    /// Id of the module this error excluded.
    pub fn module(&self) -> &str {
        match self {
            ResolutionError::MissingDependency { module, .. }
            | ResolutionError::VersionMismatch { module, .. }
            | ResolutionError::DependencyExcluded { module, .. }
            | ResolutionError::ShadowsHost { module, .. }
            | ResolutionError::ReservedNamespace { module, .. }
            | ResolutionError::TrustedModule { module, .. } => module,
        }
    }
}

/// Fatal failure of environment composition.
#[derive(Error, Debug)]
pub enum CompositionError {
    /// Two discovery passes supplied the same id at the same version.
    #[error("Module '{id}' v{version} is supplied by both {first:?} and {second:?}")]
    AmbiguousModule {
        id: String,
        version: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// The host descriptor is not marked as trusted.
    #[error("Host module '{0}' must be trusted")]
    UntrustedHost(String),
}

/// An access that the sandbox refused.
///
/// Fatal to the attempted operation only. The process keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityViolation {
    /// The target symbol is not granted to the caller.
    #[error("Module '{caller}' may not access '{target}'")]
    Denied { caller: String, target: String },

    /// An access was attempted before any enforcer was installed.
    #[error("No sandbox enforcer is installed; access to '{target}' by '{caller}' denied")]
    EnforcerNotInstalled { caller: String, target: String },

    /// The target is not a `module:symbol` path.
    #[error("Malformed symbol path '{0}'")]
    MalformedPath(String),
}

/// Misuse of the process-wide sandbox lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// An enforcer is already installed for this process.
    #[error("A sandbox enforcer is already installed for this process")]
    AlreadyInstalled,
}

/// Result type for descriptor operations.
pub type DescriptorResult<T> = std::result::Result<T, DescriptorError>;
