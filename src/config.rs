//! Configuration management for kwci
//!
//! Settings come from a TOML file with environment variable overrides on top.
//! The file is looked up in this order: the `--config` argument, the
//! `KWCI_CONFIG` environment variable, then `kwci.toml` in the working
//! directory. With no file at all, built-in defaults are used.
//!
//! # Environment Variables
//!
//! - `KWCI_CONFIG`: Path of the configuration file
//! - `KWCI_LICENSE_HOST`: Global license host
//! - `KWCI_LICENSE_PORT`: Global license port
//! - `KWCI_REQUEST_TIMEOUT`: Web API timeout in seconds - default: "30"
//! - `KWCI_LOG_LEVEL`: Logging level - default: "info"
//! - `KWCI_TIMESTAMP_FORMAT`: Layout of `--last-sync` values - default: "%Y-%m-%dT%H:%M:%S"
//!
//! # Example
//!
//! ```
//! use kwci::KwciConfig;
//!
//! let config = KwciConfig::from_toml_str(r#"
//!     [license]
//!     host = "licenses.example.com"
//!     port = "27000"
//!
//!     [[servers]]
//!     name = "main"
//!     url = "http://kw.example.com:8080"
//! "#).unwrap();
//!
//! config.validate().unwrap();
//! assert_eq!(config.find_server("main").unwrap().url, "http://kw.example.com:8080");
//! ```

use crate::sync::{validate_timestamp_format, DEFAULT_TIMESTAMP_FORMAT};
use crate::xsync::XSyncOptions;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONFIG_FILE: &str = "kwci.toml";
pub const CONFIG_ENV: &str = "KWCI_CONFIG";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration file {path:?}: {message}")]
    Syntax { path: PathBuf, message: String },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Failed to parse an environment override
    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },

    #[error("No server configuration named \"{0}\"")]
    UnknownServer(String),

    #[error("No install configuration named \"{0}\"")]
    UnknownInstall(String),
}

/// License server address; the port is kept as text the way the vendor tools read it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: String,
}

impl LicenseConfig {
    pub fn is_empty(&self) -> bool {
        self.host.trim().is_empty() && self.port.trim().is_empty()
    }
}

impl fmt::Display for LicenseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.port, self.host)
    }
}

/// A Klocwork server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    #[serde(default)]
    pub url: String,
    /// Server-specific license; the global license applies when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<LicenseConfig>,
}

/// A Klocwork tools installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallConfig {
    pub name: String,
    /// Directories prepended to `PATH`, usually the install's `bin`
    #[serde(default)]
    pub paths: Vec<String>,
}

/// What the current job uses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct JobConfig {
    pub server: Option<String>,
    pub install: Option<String>,
    pub project: Option<String>,
    /// Ltoken file path; `$VAR` references are expanded against the job environment
    pub ltoken: Option<String>,
    pub create_project: bool,
}

/// Main configuration structure for kwci
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct KwciConfig {
    /// Global license, used by servers without their own
    pub license: LicenseConfig,

    pub servers: Vec<ServerConfig>,

    pub installs: Vec<InstallConfig>,

    pub job: JobConfig,

    pub xsync: XSyncOptions,

    /// Web API request timeout in seconds
    pub request_timeout_secs: u64,

    /// strftime layout of `--last-sync` values
    pub timestamp_format: String,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for KwciConfig {
    fn default() -> Self {
        Self {
            license: LicenseConfig::default(),
            servers: Vec::new(),
            installs: Vec::new(),
            job: JobConfig::default(),
            xsync: XSyncOptions::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl KwciConfig {
    /// Loads the configuration file (if any) and applies environment overrides
    ///
    /// An explicitly named file must exist; the implicit `kwci.toml` is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match Self::locate(explicit) {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("No configuration file, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(path.to_path_buf());
        }
        if let Some(path) = env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.is_file().then_some(default)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Syntax {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Syntax {
            path: PathBuf::from("<inline>"),
            message: e.to_string(),
        })
    }

    /// Applies `KWCI_*` environment variables over the loaded values
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(host) = env::var("KWCI_LICENSE_HOST") {
            self.license.host = host;
        }
        if let Ok(port) = env::var("KWCI_LICENSE_PORT") {
            self.license.port = port;
        }

        if let Ok(timeout) = env::var("KWCI_REQUEST_TIMEOUT") {
            self.request_timeout_secs =
                timeout
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| ConfigError::ParseError {
                        field: "KWCI_REQUEST_TIMEOUT".to_string(),
                        error: e.to_string(),
                    })?;
        }

        if let Ok(level) = env::var("KWCI_LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
        if let Ok(format) = env::var("KWCI_TIMESTAMP_FORMAT") {
            self.timestamp_format = format;
        }
        Ok(())
    }

    /// Validates the configuration
    ///
    /// Checks that:
    /// - The request timeout is between 1 second and 10 minutes
    /// - Log level is valid
    /// - License ports are numeric
    /// - Server and install names are unique
    /// - The timestamp format is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 10 minutes".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        check_port("global license", &self.license.port)?;

        let mut names = HashSet::new();
        for server in &self.servers {
            if server.name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "Server name cannot be empty".to_string(),
                ));
            }
            if !names.insert(server.name.as_str()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "Duplicate server name: {}",
                    server.name
                )));
            }
            if let Some(license) = &server.license {
                check_port(&format!("server \"{}\" license", server.name), &license.port)?;
            }
        }

        let mut names = HashSet::new();
        for install in &self.installs {
            if install.name.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "Install name cannot be empty".to_string(),
                ));
            }
            if !names.insert(install.name.as_str()) {
                return Err(ConfigError::ValidationFailed(format!(
                    "Duplicate install name: {}",
                    install.name
                )));
            }
        }

        validate_timestamp_format(&self.timestamp_format)
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;

        Ok(())
    }

    pub fn find_server(&self, name: &str) -> Result<&ServerConfig, ConfigError> {
        self.servers
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ConfigError::UnknownServer(name.to_string()))
    }

    pub fn find_install(&self, name: &str) -> Result<&InstallConfig, ConfigError> {
        self.installs
            .iter()
            .find(|i| i.name == name)
            .ok_or_else(|| ConfigError::UnknownInstall(name.to_string()))
    }

    /// Server named by `name`, falling back to the job's server
    pub fn selected_server(
        &self,
        name: Option<&str>,
    ) -> Result<Option<&ServerConfig>, ConfigError> {
        name.or(self.job.server.as_deref())
            .map(|n| self.find_server(n))
            .transpose()
    }

    /// Install named by `name`, falling back to the job's install
    pub fn selected_install(
        &self,
        name: Option<&str>,
    ) -> Result<Option<&InstallConfig>, ConfigError> {
        name.or(self.job.install.as_deref())
            .map(|n| self.find_install(n))
            .transpose()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn check_port(what: &str, port: &str) -> Result<(), ConfigError> {
    if port.is_empty() || port.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ConfigError::ValidationFailed(format!(
            "Port of {} must be a number, got \"{}\"",
            what, port
        )))
    }
}

impl fmt::Display for KwciConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "kwci Configuration:")?;
        if self.license.is_empty() {
            writeln!(f, "  Global License: (not set)")?;
        } else {
            writeln!(f, "  Global License: {}", self.license)?;
        }
        writeln!(f, "  Servers:")?;
        for server in &self.servers {
            match &server.license {
                Some(license) => writeln!(
                    f,
                    "    {} -> {} (license {})",
                    server.name, server.url, license
                )?,
                None => writeln!(f, "    {} -> {}", server.name, server.url)?,
            }
        }
        writeln!(f, "  Installs:")?;
        for install in &self.installs {
            writeln!(f, "    {} -> {}", install.name, install.paths.join(", "))?;
        }
        if let Some(project) = &self.job.project {
            writeln!(f, "  Project: {}", project)?;
        }
        writeln!(f, "  Last Sync Type: {}", self.xsync.last_sync_type)?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Timestamp Format: {}", self.timestamp_format)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::LastSyncType;
    use crate::xsync::IssueStatus;
    use serial_test::serial;
    use std::env;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    const SAMPLE: &str = r#"
log-level = "debug"
request-timeout-secs = 45

[license]
host = "licenses.example.com"
port = "27000"

[[servers]]
name = "main"
url = "http://kw.example.com:8080"

[[servers]]
name = "legacy"
url = "http://old-kw:8080"
license = { host = "old-licenses", port = "27001" }

[[installs]]
name = "kw-2023"
paths = ["/opt/klocwork/bin"]

[job]
server = "main"
install = "kw-2023"
project = "app"
ltoken = "$HOME/.klocwork/ltoken"

[xsync]
dry-run = true
last-sync-type = "manual"
manual-sync = "7d"
project-regexp = "^app"
statuses = ["fix", "not-a-problem"]
"#;

    fn clear_overrides() -> Vec<EnvGuard> {
        [
            "KWCI_LICENSE_HOST",
            "KWCI_LICENSE_PORT",
            "KWCI_REQUEST_TIMEOUT",
            "KWCI_LOG_LEVEL",
            "KWCI_TIMESTAMP_FORMAT",
            CONFIG_ENV,
        ]
        .into_iter()
        .map(EnvGuard::unset)
        .collect()
    }

    #[test]
    fn test_default_configuration() {
        let config = KwciConfig::default();

        assert!(config.servers.is_empty());
        assert!(config.installs.is_empty());
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.timestamp_format, DEFAULT_TIMESTAMP_FORMAT);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.xsync.last_sync_type, LastSyncType::Full);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_file() {
        let config = KwciConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.request_timeout_secs, 45);
        assert_eq!(config.license.port, "27000");
        assert_eq!(config.servers.len(), 2);
        assert_eq!(
            config.find_server("legacy").unwrap().license,
            Some(LicenseConfig {
                host: "old-licenses".to_string(),
                port: "27001".to_string(),
            })
        );
        assert_eq!(config.find_install("kw-2023").unwrap().paths, ["/opt/klocwork/bin"]);
        assert_eq!(config.job.project.as_deref(), Some("app"));
        assert!(config.xsync.dry_run);
        assert_eq!(config.xsync.last_sync_type, LastSyncType::Manual);
        assert_eq!(
            config.xsync.statuses,
            vec![IssueStatus::Fix, IssueStatus::NotAProblem]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_syntax_error() {
        let result = KwciConfig::from_toml_str("[[servers]\nname = ");
        assert!(matches!(result, Err(ConfigError::Syntax { .. })));
    }

    #[test]
    fn test_unknown_names() {
        let config = KwciConfig::from_toml_str(SAMPLE).unwrap();

        assert!(matches!(
            config.find_server("nope"),
            Err(ConfigError::UnknownServer(_))
        ));
        assert!(matches!(
            config.find_install("nope"),
            Err(ConfigError::UnknownInstall(_))
        ));
    }

    #[test]
    fn test_selected_falls_back_to_job() {
        let config = KwciConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.selected_server(None).unwrap().unwrap().name, "main");
        assert_eq!(
            config.selected_server(Some("legacy")).unwrap().unwrap().name,
            "legacy"
        );
        assert_eq!(config.selected_install(None).unwrap().unwrap().name, "kw-2023");
        assert!(KwciConfig::default().selected_server(None).unwrap().is_none());
    }

    #[test]
    fn test_configuration_validation_invalid_timeout() {
        let mut config = KwciConfig::default();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.request_timeout_secs = 601;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_configuration_validation_invalid_log_level() {
        let mut config = KwciConfig::default();
        config.log_level = "invalid".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_configuration_validation_non_numeric_port() {
        let mut config = KwciConfig::default();
        config.license.port = "27k".to_string();
        assert!(config.validate().is_err());

        let mut config = KwciConfig::from_toml_str(SAMPLE).unwrap();
        config.servers[1].license = Some(LicenseConfig {
            host: "h".to_string(),
            port: "port".to_string(),
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("legacy"));
    }

    #[test]
    fn test_configuration_validation_duplicate_names() {
        let mut config = KwciConfig::from_toml_str(SAMPLE).unwrap();
        config.servers[1].name = "main".to_string();

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Duplicate server name"));
    }

    #[test]
    fn test_configuration_validation_timestamp_format() {
        let mut config = KwciConfig::default();
        config.timestamp_format = "%Y-%".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn test_environment_variable_overrides() {
        let _clear = clear_overrides();
        let _guards = vec![
            EnvGuard::set("KWCI_LICENSE_HOST", "env-licenses"),
            EnvGuard::set("KWCI_LICENSE_PORT", "27010"),
            EnvGuard::set("KWCI_REQUEST_TIMEOUT", "60"),
            EnvGuard::set("KWCI_LOG_LEVEL", "WARN"),
            EnvGuard::set("KWCI_TIMESTAMP_FORMAT", "%d/%m/%Y %H:%M"),
        ];

        let mut config = KwciConfig::from_toml_str(SAMPLE).unwrap();
        config.apply_env_overrides().unwrap();

        assert_eq!(config.license.host, "env-licenses");
        assert_eq!(config.license.port, "27010");
        assert_eq!(config.request_timeout_secs, 60);
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.timestamp_format, "%d/%m/%Y %H:%M");
    }

    #[test]
    #[serial]
    fn test_invalid_timeout_override() {
        let _clear = clear_overrides();
        let _guard = EnvGuard::set("KWCI_REQUEST_TIMEOUT", "soon");

        let mut config = KwciConfig::default();
        assert!(matches!(
            config.apply_env_overrides(),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_load_from_explicit_file() {
        let _clear = clear_overrides();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ci.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = KwciConfig::load(Some(&path)).unwrap();
        assert_eq!(config.job.server.as_deref(), Some("main"));
    }

    #[test]
    #[serial]
    fn test_load_from_env_path() {
        let _clear = clear_overrides();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ci.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let _guard = EnvGuard::set(CONFIG_ENV, path.to_str().unwrap());

        let config = KwciConfig::load(None).unwrap();
        assert_eq!(config.request_timeout_secs, 45);
    }

    #[test]
    #[serial]
    fn test_load_missing_explicit_file() {
        let _clear = clear_overrides();
        let result = KwciConfig::load(Some(Path::new("/nonexistent/kwci.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_display() {
        let config = KwciConfig::from_toml_str(SAMPLE).unwrap();
        let display = format!("{}", config);

        assert!(display.contains("kwci Configuration:"));
        assert!(display.contains("27000@licenses.example.com"));
        assert!(display.contains("legacy -> http://old-kw:8080 (license 27001@old-licenses)"));
    }
}
