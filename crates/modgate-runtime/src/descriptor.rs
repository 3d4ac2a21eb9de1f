//! Module descriptor parsing.
//!
//! Each module root holds a `module.toml` (or `module.json`) describing its
//! identity, the modules it depends on, and the API it declares. Parsing is
//! purely declarative: nothing inside the module runs while its descriptor
//! is read.

use crate::error::{DescriptorError, DescriptorResult};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Preferred descriptor file name.
pub const TOML_DESCRIPTOR: &str = "module.toml";

/// Alternate descriptor file name.
pub const JSON_DESCRIPTOR: &str = "module.json";

/// Descriptor file as written on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Module identity.
    pub module: ModuleSection,

    /// Modules this one needs, in declaration order.
    #[serde(default)]
    pub dependencies: Vec<DependencyEntry>,

    /// Declared API surface.
    #[serde(default)]
    pub api: DeclaredApi,
}

/// The `[module]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleSection {
    /// Unique identifier for the module.
    pub id: String,

    /// Version string (semver, `1.2` is read as `1.2.0`).
    pub version: String,

    /// Human-readable name.
    #[serde(default)]
    pub display_name: Option<String>,

    /// Module description.
    #[serde(default)]
    pub description: Option<String>,

    /// Module author(s).
    #[serde(default)]
    pub authors: Vec<String>,
}

/// One `[[dependencies]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyEntry {
    pub id: String,

    /// Version requirement, any version when omitted.
    #[serde(default)]
    pub version: Option<String>,
}

/// Symbols a module declares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredApi {
    /// Symbols other modules may use.
    #[serde(default)]
    pub exports: Vec<String>,

    /// Symbols only the module itself may use.
    #[serde(default)]
    pub internal: Vec<String>,

    /// Command handler type names.
    #[serde(default)]
    pub commands: Vec<String>,
}

impl DeclaredApi {
    /// Every declared symbol name, in declaration order.
    pub fn all_symbols(&self) -> impl Iterator<Item = &str> {
        self.exports
            .iter()
            .chain(&self.internal)
            .chain(&self.commands)
            .map(String::as_str)
    }
}

/// A validated dependency constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub id: String,
    pub requirement: VersionReq,
}

impl Dependency {
    /// Check whether a module version satisfies this constraint.
    pub fn accepts(&self, version: &Version) -> bool {
        self.requirement.matches(version)
    }
}

/// A validated module descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescriptor {
    pub id: String,
    pub version: Version,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub dependencies: Vec<Dependency>,
    pub api: DeclaredApi,

    /// Directory the module was loaded from.
    pub root: PathBuf,

    /// Only the host module is trusted.
    pub trusted: bool,
}

impl ModuleDescriptor {
    /// Load the descriptor of the module rooted at `root`.
    ///
    /// `module.toml` wins over `module.json` when both exist.
    pub fn from_root(root: &Path) -> DescriptorResult<Self> {
        let toml_path = root.join(TOML_DESCRIPTOR);
        if toml_path.is_file() {
            let content = std::fs::read_to_string(&toml_path)?;
            return Self::from_toml_str(&content, root);
        }

        let json_path = root.join(JSON_DESCRIPTOR);
        let content = std::fs::read_to_string(&json_path)?;
        Self::from_json_str(&content, root)
    }

    /// Parse a descriptor from TOML.
    pub fn from_toml_str(content: &str, root: &Path) -> DescriptorResult<Self> {
        let manifest: ModuleManifest = toml::from_str(content)?;
        Self::from_manifest(manifest, root)
    }

    /// Parse a descriptor from JSON.
    pub fn from_json_str(content: &str, root: &Path) -> DescriptorResult<Self> {
        let manifest: ModuleManifest = serde_json::from_str(content)?;
        Self::from_manifest(manifest, root)
    }

    /// Validate a raw manifest.
    pub fn from_manifest(manifest: ModuleManifest, root: &Path) -> DescriptorResult<Self> {
        let ModuleManifest {
            module,
            dependencies,
            api,
        } = manifest;

        validate_name("Module id", &module.id)?;
        let version = parse_version(&module.version)?;

        let mut seen_deps = HashSet::new();
        let dependencies = dependencies
            .into_iter()
            .map(|entry| {
                validate_name("Dependency id", &entry.id)?;
                if entry.id == module.id {
                    return Err(DescriptorError::Invalid(format!(
                        "Module '{}' cannot depend on itself",
                        module.id
                    )));
                }
                if !seen_deps.insert(entry.id.clone()) {
                    return Err(DescriptorError::Invalid(format!(
                        "Dependency '{}' is declared more than once",
                        entry.id
                    )));
                }
                let requirement = match entry.version.as_deref() {
                    Some(value) => parse_requirement(value)?,
                    None => VersionReq::STAR,
                };
                Ok(Dependency {
                    id: entry.id,
                    requirement,
                })
            })
            .collect::<DescriptorResult<Vec<_>>>()?;

        let mut seen_symbols = HashSet::new();
        for symbol in api.all_symbols() {
            validate_name("Symbol", symbol)?;
            if !seen_symbols.insert(symbol) {
                return Err(DescriptorError::Invalid(format!(
                    "Symbol '{}' is declared more than once",
                    symbol
                )));
            }
        }

        Ok(Self {
            id: module.id,
            version,
            display_name: module.display_name,
            description: module.description,
            authors: module.authors,
            dependencies,
            api,
            root: root.to_path_buf(),
            trusted: false,
        })
    }

    /// Mark this descriptor as the trusted host module.
    pub fn into_host(mut self) -> Self {
        self.trusted = true;
        self
    }

    /// Display name, falling back to the id.
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }

    /// Look up the constraint on `id`, if any.
    pub fn dependency(&self, id: &str) -> Option<&Dependency> {
        self.dependencies.iter().find(|dep| dep.id == id)
    }
}

impl std::fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.id, self.version)
    }
}

fn validate_name(what: &str, value: &str) -> DescriptorResult<()> {
    if value.trim().is_empty() {
        return Err(DescriptorError::Invalid(format!("{} cannot be empty", what)));
    }
    if value.contains(':') || value.chars().any(char::is_whitespace) {
        return Err(DescriptorError::Invalid(format!(
            "{} '{}' may not contain ':' or whitespace",
            what, value
        )));
    }
    Ok(())
}

/// Parse a module version, padding missing minor/patch components.
pub fn parse_version(value: &str) -> DescriptorResult<Version> {
    let trimmed = value.trim();
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);

    let padded = match core.split('.').count() {
        1 => format!("{}.0.0{}", core, suffix),
        2 => format!("{}.0{}", core, suffix),
        _ => trimmed.to_string(),
    };

    Version::parse(&padded).map_err(|source| DescriptorError::Version {
        value: value.to_string(),
        source,
    })
}

/// Parse a dependency version requirement.
pub fn parse_requirement(value: &str) -> DescriptorResult<VersionReq> {
    VersionReq::parse(value.trim()).map_err(|source| DescriptorError::Requirement {
        value: value.to_string(),
        source,
    })
}
