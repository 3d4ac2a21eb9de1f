//! Configuration file loading and management
//!
//! This module handles loading and parsing the host configuration from
//! `$XDG_CONFIG_HOME/modgate/config.toml`. If the configuration file doesn't
//! exist, a default configuration is created with documented comments.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main host configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Host-wide settings
    #[serde(default)]
    pub host: HostConfig,
    /// Where modules are discovered
    #[serde(default)]
    pub modules: ModulesConfig,
    /// Asset inventory report
    #[serde(default)]
    pub report: ReportConfig,
}

/// Host settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    /// Namespace every module may use
    /// Default: "core"
    pub runtime_namespace: String,
    /// Log level (trace, debug, info, warn, error)
    /// Default: "info"
    pub log_level: String,
}

/// Module discovery settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModulesConfig {
    /// Roots scanned together as one discovery pass
    /// Default: ["modules"]
    pub roots: Vec<PathBuf>,
    /// Roots of modules shipped with the host, scanned as a separate pass
    pub bundled_roots: Vec<PathBuf>,
    /// Also scan `$XDG_DATA_HOME/modgate/modules` as a separate pass
    /// Default: true
    pub include_user_dir: bool,
}

/// Output format of the inventory report
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// One log line per module and asset kind
    #[default]
    Log,
    /// Pretty JSON on stdout
    Json,
}

/// Inventory report settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    /// Whether to report assets at startup
    /// Default: true
    pub enabled: bool,
    /// Default: "log"
    pub format: ReportFormat,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            runtime_namespace: modgate_runtime::DEFAULT_RUNTIME_NAMESPACE.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from("modules")],
            bundled_roots: Vec::new(),
            include_user_dir: true,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            format: ReportFormat::Log,
        }
    }
}

impl Config {
    /// Load configuration from the specified path
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// The parsed configuration or an error if loading/parsing fails
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the default XDG config location
    ///
    /// If the configuration file doesn't exist, creates a default configuration
    /// file with documented comments.
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_file(&config_path)?;
        }

        Self::load(&config_path)
    }

    /// Get the default configuration file path
    ///
    /// Returns `$XDG_CONFIG_HOME/modgate/config.toml`
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.toml"))
    }

    /// Create a default configuration file with documented comments
    fn create_default_file(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, Self::default_config_content())
            .with_context(|| format!("Failed to write default config file: {}", path.display()))?;

        tracing::info!("Created default configuration file at: {}", path.display());
        Ok(())
    }

    /// Generate the default configuration file content with comments
    fn default_config_content() -> String {
        r#"# modgate Host Configuration
# This file configures module discovery and the startup report.

[host]
# Namespace every module is allowed to use, in addition to the host's own.
# Default: "core"
runtime_namespace = "core"

# Log level: trace, debug, info, warn, error
# RUST_LOG takes precedence when set.
# Default: "info"
log_level = "info"

[modules]
# Directories whose immediate sub-directories are module roots.
# All of them are scanned as one pass: a module id may appear only once.
# Relative paths are resolved against the working directory.
roots = ["modules"]

# Modules shipped with the host, scanned as a separate pass.
# When a module id appears in more than one pass, the higher version wins.
bundled_roots = []

# Also scan $XDG_DATA_HOME/modgate/modules as a separate pass.
include_user_dir = true

[report]
# Summarize each module's assets at startup.
enabled = true

# "log" writes the summary to the log, "json" prints it to stdout.
format = "log"
"#
        .to_string()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.host.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log_level: {}. Must be one of: {}",
                self.host.log_level,
                valid_log_levels.join(", ")
            );
        }

        let namespace = &self.host.runtime_namespace;
        if namespace.is_empty() {
            anyhow::bail!("host.runtime_namespace must not be empty");
        }
        if namespace.contains(':') || namespace.chars().any(char::is_whitespace) {
            anyhow::bail!(
                "Invalid runtime_namespace: '{}'. Must not contain ':' or whitespace",
                namespace
            );
        }

        Ok(())
    }

    /// Get the per-user module directory
    ///
    /// Returns `$XDG_DATA_HOME/modgate/modules`
    pub fn user_modules_dir(&self) -> Result<PathBuf> {
        Ok(project_dirs()?.data_dir().join("modules"))
    }

    /// Discovery passes, in scan order
    ///
    /// Configured roots form the first pass, then the user directory and the
    /// bundled roots each form their own. Empty passes are left out.
    pub fn discovery_passes(&self) -> Result<Vec<Vec<PathBuf>>> {
        let mut passes = Vec::new();

        if !self.modules.roots.is_empty() {
            passes.push(self.modules.roots.clone());
        }
        if self.modules.include_user_dir {
            passes.push(vec![self.user_modules_dir()?]);
        }
        if !self.modules.bundled_roots.is_empty() {
            passes.push(self.modules.bundled_roots.clone());
        }

        Ok(passes)
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "modgate", "modgate")
        .context("Failed to determine project directories")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host.runtime_namespace, "core");
        assert_eq!(config.host.log_level, "info");
        assert_eq!(config.modules.roots, vec![PathBuf::from("modules")]);
        assert!(config.modules.bundled_roots.is_empty());
        assert!(config.modules.include_user_dir);
        assert!(config.report.enabled);
        assert_eq!(config.report.format, ReportFormat::Log);
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[host]
runtime_namespace = "rt"
log_level = "debug"

[modules]
roots = ["mods", "/opt/game/mods"]
bundled_roots = ["bundled"]
include_user_dir = false

[report]
enabled = false
format = "json"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.host.runtime_namespace, "rt");
        assert_eq!(config.host.log_level, "debug");
        assert_eq!(config.modules.roots.len(), 2);
        assert_eq!(config.modules.bundled_roots, vec![PathBuf::from("bundled")]);
        assert!(!config.modules.include_user_dir);
        assert!(!config.report.enabled);
        assert_eq!(config.report.format, ReportFormat::Json);
    }

    #[test]
    fn test_load_minimal_config() {
        let config_content = r#"
[host]
runtime_namespace = "core"
log_level = "warn"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.host.log_level, "warn");
        assert_eq!(config.modules, ModulesConfig::default());
        assert_eq!(config.report, ReportConfig::default());
    }

    #[test]
    fn test_load_partial_sections() {
        let config_content = r#"
[host]
log_level = "debug"

[modules]
roots = ["x"]

[report]
format = "json"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(config_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.host.log_level, "debug");
        assert_eq!(config.host.runtime_namespace, "core");
        assert_eq!(config.modules.roots, vec![PathBuf::from("x")]);
        assert!(config.modules.include_user_dir);
        assert!(config.modules.bundled_roots.is_empty());
        assert!(config.report.enabled);
        assert_eq!(config.report.format, ReportFormat::Json);
    }

    #[test]
    fn test_load_unknown_report_format() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[report]\nenabled = true\nformat = \"xml\"\n")
            .unwrap();

        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_default_content_parses() {
        let config: Config = toml::from_str(&Config::default_config_content()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.host.log_level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_runtime_namespace() {
        let mut config = Config::default();
        config.host.runtime_namespace = String::new();
        assert!(config.validate().is_err());

        config.host.runtime_namespace = "core:extra".to_string();
        assert!(config.validate().is_err());

        config.host.runtime_namespace = "my core".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discovery_passes() {
        let mut config = Config::default();
        config.modules.include_user_dir = false;
        assert_eq!(
            config.discovery_passes().unwrap(),
            vec![vec![PathBuf::from("modules")]]
        );

        config.modules.bundled_roots = vec![PathBuf::from("bundled")];
        config.modules.include_user_dir = true;
        let passes = config.discovery_passes().unwrap();
        assert_eq!(passes.len(), 3);
        assert!(passes[1][0].ends_with("modules"));
        assert!(passes[1][0].to_string_lossy().contains("modgate"));
        assert_eq!(passes[2], vec![PathBuf::from("bundled")]);

        config.modules.roots.clear();
        config.modules.include_user_dir = false;
        assert_eq!(config.discovery_passes().unwrap().len(), 1);
    }

    #[test]
    fn test_full_config_roundtrip() {
        let mut config = Config::default();
        config.host.log_level = "debug".to_string();
        config.report.format = ReportFormat::Json;
        config.modules.bundled_roots.push(PathBuf::from("bundled"));

        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, deserialized);
    }
}
