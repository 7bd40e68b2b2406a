//! Configuration module for Drivemirror.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::RemoteId;

/// Environment variable selecting a named configuration profile.
pub const ENV_VAR: &str = "DRIVEMIRROR_ENV";

/// Profile used when [`ENV_VAR`] is unset.
pub const DEFAULT_ENV: &str = "development";

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Drivemirror.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

/// Local watch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Local directory mirrored onto the remote root.
    pub root: PathBuf,
    /// Dispatch every pre-existing file as a creation at startup.
    pub initial_scan: bool,
    /// Milliseconds a new file's size must stay constant before upload (0 disables).
    pub stability_check_ms: u64,
}

/// Remote store endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the metadata API.
    pub base_url: String,
    /// Base URL of the media upload API.
    pub upload_url: String,
    /// Well-known identifier of the remote root node.
    pub root_id: String,
}

/// Credentials for the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OAuth client id; needed to refresh tokens.
    pub client_id: Option<String>,
    /// OAuth client secret; needed to refresh tokens.
    pub client_secret: Option<String>,
    /// Bearer token used as-is when no refresh is possible.
    pub access_token: Option<String>,
    /// Long-lived token exchanged for a fresh access token at startup.
    pub refresh_token: Option<String>,
    /// OAuth token endpoint.
    pub token_url: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/drivemirror/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Path of a named profile, e.g. `$XDG_CONFIG_HOME/drivemirror/production.yaml`.
    pub fn environment_path(dir: &Path, env: &str) -> PathBuf {
        dir.join(format!("{env}.yaml"))
    }

    /// Picks the file to load.
    ///
    /// An explicit path always wins. Otherwise the profile named by
    /// `env` (normally the value of [`ENV_VAR`]) is used when that file exists,
    /// and [`Config::default_path`] when it does not.
    pub fn resolve_path(explicit: Option<&Path>, env: Option<&str>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }

        let env = env.unwrap_or(DEFAULT_ENV);
        let profile = Self::environment_path(&Self::config_dir(), env);
        if profile.exists() {
            profile
        } else {
            Self::default_path()
        }
    }

    fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("drivemirror")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

// Config derives Default because all its fields implement Default.
// (clippy::derivable_impls)

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Drive"),
            initial_scan: true,
            stability_check_ms: 500,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.googleapis.com/drive/v2".to_string(),
            upload_url: "https://www.googleapis.com/upload/drive/v2".to_string(),
            root_id: "root".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            access_token: None,
            refresh_token: None,
            token_url: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl SyncConfig {
    /// The sync root with a leading `~` replaced by the home directory.
    pub fn expanded_root(&self) -> PathBuf {
        match self.root.strip_prefix("~") {
            Ok(rest) => match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => self.root.clone(),
            },
            Err(_) => self.root.clone(),
        }
    }
}

impl AuthConfig {
    /// Returns true when a refresh token and client credentials are all present.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"remote.root_id"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        // Check sync root only when it does not start with `~` (tilde is expanded at runtime).
        let root_str = self.sync.root.to_string_lossy();
        if !root_str.starts_with('~') && !self.sync.root.is_dir() {
            errors.push(ValidationError {
                field: "sync.root".into(),
                message: format!("directory does not exist: {}", self.sync.root.display()),
            });
        }

        // --- remote ---
        if !is_http_url(&self.remote.base_url) {
            errors.push(ValidationError {
                field: "remote.base_url".into(),
                message: format!("must be an http(s) URL, got '{}'", self.remote.base_url),
            });
        }
        if !is_http_url(&self.remote.upload_url) {
            errors.push(ValidationError {
                field: "remote.upload_url".into(),
                message: format!("must be an http(s) URL, got '{}'", self.remote.upload_url),
            });
        }
        if let Err(e) = RemoteId::new(self.remote.root_id.clone()) {
            errors.push(ValidationError {
                field: "remote.root_id".into(),
                message: e.to_string(),
            });
        }

        // --- auth ---
        if self.auth.access_token.is_none() && !self.auth.can_refresh() {
            errors.push(ValidationError {
                field: "auth".into(),
                message: "either access_token or refresh_token with client_id and \
                          client_secret must be set"
                    .into(),
            });
        }
        if self.auth.can_refresh() && !is_http_url(&self.auth.token_url) {
            errors.push(ValidationError {
                field: "auth.token_url".into(),
                message: format!("must be an http(s) URL, got '{}'", self.auth.token_url),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use drivemirror_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .sync_root(PathBuf::from("/home/user/Drive"))
///     .auth_access_token("ya29.token")
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder pre-populated with default values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // -- sync --

    pub fn sync_root(mut self, root: PathBuf) -> Self {
        self.config.sync.root = root;
        self
    }

    pub fn sync_initial_scan(mut self, enabled: bool) -> Self {
        self.config.sync.initial_scan = enabled;
        self
    }

    pub fn sync_stability_check_ms(mut self, ms: u64) -> Self {
        self.config.sync.stability_check_ms = ms;
        self
    }

    // -- remote --

    pub fn remote_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.base_url = url.into();
        self
    }

    pub fn remote_upload_url(mut self, url: impl Into<String>) -> Self {
        self.config.remote.upload_url = url.into();
        self
    }

    pub fn remote_root_id(mut self, id: impl Into<String>) -> Self {
        self.config.remote.root_id = id.into();
        self
    }

    // -- auth --

    pub fn auth_client(mut self, id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.config.auth.client_id = Some(id.into());
        self.config.auth.client_secret = Some(secret.into());
        self
    }

    pub fn auth_access_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth.access_token = Some(token.into());
        self
    }

    pub fn auth_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth.refresh_token = Some(token.into());
        self
    }

    pub fn auth_token_url(mut self, url: impl Into<String>) -> Self {
        self.config.auth.token_url = url.into();
        self
    }

    // -- logging --

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Consume the builder and return the [`Config`] without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
