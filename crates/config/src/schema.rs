use figment::{
    Figment,
    providers::{Env, Format as _, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("problum/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Paths of the session endpoints, relative to `base_url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "EndpointsConfig::default_login")]
    pub login: String,
    #[serde(default = "EndpointsConfig::default_register")]
    pub register: String,
    /// Credential renewal; called without an `Authorization` header.
    #[serde(default = "EndpointsConfig::default_refresh")]
    pub refresh: String,
    #[serde(default = "EndpointsConfig::default_logout")]
    pub logout: String,
}

impl EndpointsConfig {
    fn default_login() -> String {
        "/auth/login".to_string()
    }
    fn default_register() -> String {
        "/auth/register".to_string()
    }
    fn default_refresh() -> String {
        "/auth/refresh".to_string()
    }
    fn default_logout() -> String {
        "/auth/logout".to_string()
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            login: Self::default_login(),
            register: Self::default_register(),
            refresh: Self::default_refresh(),
            logout: Self::default_logout(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive (defaults to `info`).
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::Text,
        }
    }
}

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API root every request path is joined to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    /// Per-request transport timeout in seconds (defaults to 30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoints: EndpointsConfig::default(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Transport timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parses configuration from a YAML string, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the YAML is invalid or extraction fails.
    #[allow(clippy::result_large_err)]
    pub fn from_yaml(yaml: &str) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::string(yaml))
            .extract()
    }

    /// Loads configuration from a file path, merged with defaults.
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if the file cannot be read or parsed.
    #[allow(clippy::result_large_err)]
    pub fn from_file(path: &Path) -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .extract()
    }

    /// Defaults, then the optional YAML file, then `PROBLUM_*` variables
    /// (nested keys split on `__`, e.g. `PROBLUM_LOG__LEVEL`).
    ///
    /// # Errors
    ///
    /// Returns a [`figment::Error`] if any source fails to parse.
    #[allow(clippy::result_large_err)]
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(p) = path {
            figment = figment.merge(Yaml::file(p));
        }
        figment
            .merge(Env::prefixed("PROBLUM_").split("__"))
            .extract()
    }
}
