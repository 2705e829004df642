//! Configuration loading for MediaGuard services
//!
//! Resolution order for the configuration file:
//! 1. Command-line argument (`--config`)
//! 2. `MEDIAGUARD_CONFIG` environment variable
//! 3. Platform config directory (`~/.config/mediaguard/config.toml` on Linux)
//! 4. Compiled defaults
//!
//! A missing file never aborts startup: the service logs a warning and runs on
//! defaults. A file that exists but does not parse is a configuration error.
//!
//! Provider credentials may additionally be supplied through `MEDIAGUARD_*`
//! environment variables, which take priority over the file.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "MEDIAGUARD_CONFIG";

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "MEDIAGUARD_";

/// Bootstrap configuration loaded from TOML
///
/// Every field has a compiled default, so an empty file (or no file) is valid.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,

    /// HTTP server port
    pub port: u16,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,

    /// Explanation text profile ("ownership" or "takedown")
    pub explanation_profile: String,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Upload limits and allow-lists
    pub limits: LimitsConfig,

    /// Per-client submission rate limits
    pub rate_limit: RateLimitConfig,

    /// Fan-out dispatch settings
    pub dispatch: DispatchConfig,

    /// Third-party provider credentials
    pub providers: ProviderCredentials,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8000,
            logging: LoggingConfig::default(),
            limits: LimitsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            dispatch: DispatchConfig::default(),
            providers: ProviderCredentials::default(),
            cors_origins: vec![
                "http://localhost:8000".to_string(),
                "http://127.0.0.1:8000".to_string(),
            ],
            explanation_profile: "ownership".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Upload limits
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum accepted upload size in bytes (default: 50 MiB)
    pub max_file_size: usize,

    /// Accepted filename extensions, lower case with leading dot
    pub allowed_extensions: Vec<String>,

    /// Accepted sniffed content types
    pub allowed_content_types: Vec<String>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            allowed_extensions: [".jpg", ".jpeg", ".png", ".gif", ".mp3", ".wav", ".mp4"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            allowed_content_types: [
                "image/jpeg",
                "image/png",
                "image/gif",
                "audio/mpeg",
                "audio/wav",
                "audio/x-wav",
                "video/mp4",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Sliding-window rate limits per client
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Submissions allowed in any 60 second window
    pub per_minute: usize,

    /// Submissions allowed in any 3600 second window
    pub per_hour: usize,

    /// Key clients by the first `X-Forwarded-For` entry instead of the peer
    /// address. Only safe behind a reverse proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: 20,
            per_hour: 100,
            trust_forwarded_for: false,
        }
    }
}

/// Dispatch configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Outer safety timeout applied to each provider call
    pub provider_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            provider_timeout_secs: 45,
        }
    }
}

impl DispatchConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.max(1))
    }
}

/// Provider credentials
///
/// `Debug` output redacts every value so configs can be logged safely.
#[derive(Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProviderCredentials {
    pub google_vision_api_key: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub tineye_api_key: Option<String>,
    pub sensity_api_token: Option<String>,
    pub acrcloud_access_key: Option<String>,
    pub acrcloud_secret_key: Option<String>,
}

impl ProviderCredentials {
    /// (environment suffix, slot) pairs for every credential field
    fn slots(&mut self) -> [(&'static str, &mut Option<String>); 7] {
        [
            ("GOOGLE_VISION_API_KEY", &mut self.google_vision_api_key),
            ("AWS_ACCESS_KEY_ID", &mut self.aws_access_key_id),
            ("AWS_SECRET_ACCESS_KEY", &mut self.aws_secret_access_key),
            ("TINEYE_API_KEY", &mut self.tineye_api_key),
            ("SENSITY_API_TOKEN", &mut self.sensity_api_token),
            ("ACRCLOUD_ACCESS_KEY", &mut self.acrcloud_access_key),
            ("ACRCLOUD_SECRET_KEY", &mut self.acrcloud_secret_key),
        ]
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(value: &Option<String>) -> &'static str {
            if value.is_some() {
                "<set>"
            } else {
                "<unset>"
            }
        }

        f.debug_struct("ProviderCredentials")
            .field("google_vision_api_key", &redact(&self.google_vision_api_key))
            .field("aws_access_key_id", &redact(&self.aws_access_key_id))
            .field("aws_secret_access_key", &redact(&self.aws_secret_access_key))
            .field("tineye_api_key", &redact(&self.tineye_api_key))
            .field("sensity_api_token", &redact(&self.sensity_api_token))
            .field("acrcloud_access_key", &redact(&self.acrcloud_access_key))
            .field("acrcloud_secret_key", &redact(&self.acrcloud_secret_key))
            .finish()
    }
}

/// Validate a credential value (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

impl TomlConfig {
    /// Apply `MEDIAGUARD_*` environment overrides
    ///
    /// Credentials and the log level are the only overridable values.
    pub fn apply_env_overrides(&mut self) {
        for (suffix, slot) in self.providers.slots() {
            let var = format!("{}{}", ENV_PREFIX, suffix);
            if let Ok(value) = std::env::var(&var) {
                if is_valid_key(&value) {
                    debug!("Credential {} loaded from environment", var);
                    *slot = Some(value);
                }
            }
        }

        if let Ok(level) = std::env::var(format!("{}LOG_LEVEL", ENV_PREFIX)) {
            if !level.trim().is_empty() {
                self.logging.level = level;
            }
        }
    }
}

/// Resolves and loads the configuration file
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Resolve the configuration file path
    ///
    /// Explicit paths (CLI, environment) are returned even if they do not exist so
    /// that the caller can report them. The platform default is returned only if
    /// present on disk.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        default_config_path().filter(|p| p.exists())
    }

    /// Load configuration and apply environment overrides
    pub fn load(&self) -> Result<TomlConfig> {
        let mut config = match self.resolve_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(&path)?
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using compiled defaults",
                    path.display()
                );
                TomlConfig::default()
            }
            None => {
                info!("No config file found, using compiled defaults");
                TomlConfig::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }
}

/// Platform config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mediaguard").join("config.toml"))
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Write a config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}
