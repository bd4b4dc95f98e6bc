//! Configuration loading and config file resolution
//!
//! Resolution priority for the config file:
//! 1. Explicit path (highest priority)
//! 2. `FID_CONFIG` environment variable
//! 3. Platform config dir (`~/.config/fid/config.toml` on Linux)
//! 4. Compiled defaults (fallback)
//!
//! A missing config file is not an error: a warning is logged and compiled
//! defaults are used. A file that exists but does not parse is an error.

use crate::identifier::{is_industry_code, is_region_code};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "FID_CONFIG";

/// Where a loaded configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Parsed from this file
    File(PathBuf),
    /// Resolved path does not exist; compiled defaults used
    Missing(PathBuf),
    /// No candidate path at all; compiled defaults used
    Defaults,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Missing(path) => warn!(
                "Config file {} not found, using compiled defaults",
                path.display()
            ),
            ConfigSource::Defaults => warn!("No config file available, using compiled defaults"),
        }
    }
}

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FidConfig {
    pub classification: ClassificationConfig,
    pub allocator: AllocatorConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Signal fusion defaults and lexicon asset locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationConfig {
    /// Fused confidence below this marks the result for manual review
    pub confidence_threshold: f64,
    /// Industry code used when no keyword matches ("unclassified food manufacturing")
    pub default_industry_code: String,
    pub default_industry_confidence: f64,
    /// Region code used when no region candidate qualifies
    pub default_region_code: String,
    pub default_region_confidence: f64,
    /// Replacement industry lexicon (TOML); built-in table when unset
    pub industry_lexicon_path: Option<PathBuf>,
    /// Replacement region lexicon (TOML); built-in table when unset
    pub region_lexicon_path: Option<PathBuf>,
    /// Replacement phone prefix tables (TOML); built-in tables when unset
    pub phone_prefix_path: Option<PathBuf>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            default_industry_code: "140".to_string(),
            default_industry_confidence: 0.5,
            default_region_code: "BJ".to_string(),
            default_region_confidence: 0.3,
            industry_lexicon_path: None,
            region_lexicon_path: None,
            phone_prefix_path: None,
        }
    }
}

/// Sequence allocator retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Compare-and-set attempts before `AllocationExhausted`
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Upper bound on a single store round-trip
    pub store_timeout_ms: u64,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 10,
            max_backoff_ms: 200,
            store_timeout_ms: 5000,
        }
    }
}

/// SQLite store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; OS-dependent default when unset
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    /// SQLite busy_timeout applied to every connection
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 8,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    /// Configured path, or the OS-dependent default
    pub fn database_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(default_database_path)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl FidConfig {
    /// Resolve the config file and load it, falling back to defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let (config, source) = Self::resolve(explicit_path)?;
        source.log();
        Ok(config)
    }

    /// Like [`FidConfig::load`], but leaves reporting the source to the
    /// caller (for use before a tracing subscriber is installed)
    pub fn resolve(explicit_path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        match resolve_config_path(explicit_path, CONFIG_ENV_VAR) {
            Some(path) if path.exists() => {
                let config = Self::from_file(&path)?;
                Ok((config, ConfigSource::File(path)))
            }
            Some(path) => Ok((Self::default(), ConfigSource::Missing(path))),
            None => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }

    /// Read and validate one TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FidConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot honor
    pub fn validate(&self) -> Result<()> {
        let c = &self.classification;

        for (name, value) in [
            ("confidence_threshold", c.confidence_threshold),
            ("default_industry_confidence", c.default_industry_confidence),
            ("default_region_confidence", c.default_region_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!(
                    "classification.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if !is_industry_code(&c.default_industry_code) {
            return Err(Error::Config(format!(
                "classification.default_industry_code '{}' must be exactly 3 digits",
                c.default_industry_code
            )));
        }
        if !is_region_code(&c.default_region_code) {
            return Err(Error::Config(format!(
                "classification.default_region_code '{}' must be exactly 2 uppercase letters",
                c.default_region_code
            )));
        }

        if self.allocator.max_attempts == 0 {
            return Err(Error::Config(
                "allocator.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.allocator.initial_backoff_ms > self.allocator.max_backoff_ms {
            return Err(Error::Config(format!(
                "allocator.initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.allocator.initial_backoff_ms, self.allocator.max_backoff_ms
            )));
        }
        if self.database.max_connections == 0 {
            return Err(Error::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Config file resolution following the priority order in the module docs
pub fn resolve_config_path(explicit_path: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Explicit path
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config dir
    dirs::config_dir().map(|d| d.join("fid").join("config.toml"))
}

/// Write configuration as TOML (creates parent directories)
pub fn write_toml_config(config: &FidConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config).map_err(|e| Error::Config(e.to_string()))?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Get OS-dependent default database path
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("fid").join("fid.db"))
        .unwrap_or_else(|| PathBuf::from("./fid_data/fid.db"))
}
