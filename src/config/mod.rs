//! Configuration management
//!
//! Configuration is read from `config.yml` and can be overridden by
//! `COURSEHUB_*` environment variables. Missing values fall back to defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub forum: ForumConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a reverse proxy that overwrites these headers.
    #[serde(default)]
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            trust_proxy_headers: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/coursehub.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    #[default]
    Sqlite,
    Mysql,
}

/// In-process cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound for entry lifetime in seconds
    #[serde(default = "default_ttl")]
    pub ttl_seconds: u64,
    /// Maximum number of entries
    #[serde(default = "default_max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl(),
            max_capacity: default_max_capacity(),
        }
    }
}

fn default_ttl() -> u64 {
    300
}

fn default_max_capacity() -> u64 {
    10_000
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Session lifetime in days
    #[serde(default = "default_session_days")]
    pub session_expiration_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_expiration_days: default_session_days(),
        }
    }
}

fn default_session_days() -> i64 {
    7
}

/// Forum limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumConfig {
    #[serde(default = "default_max_tags")]
    pub max_tags: usize,
    #[serde(default = "default_max_attachments")]
    pub max_attachments: usize,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            max_tags: default_max_tags(),
            max_attachments: default_max_attachments(),
        }
    }
}

fn default_max_tags() -> usize {
    10
}

fn default_max_attachments() -> usize {
    5
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// A missing or empty file yields the default configuration. Invalid YAML
    /// is reported with its location.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::ParseError {
                path: path.display().to_string(),
                message: format_yaml_error(&e),
            }
        })?;

        Ok(config)
    }

    /// Load configuration from file, apply environment overrides and validate.
    ///
    /// Recognised variables:
    /// - COURSEHUB_SERVER_HOST, COURSEHUB_SERVER_PORT, COURSEHUB_SERVER_CORS_ORIGIN
    /// - COURSEHUB_SERVER_TRUST_PROXY
    /// - COURSEHUB_DATABASE_DRIVER, COURSEHUB_DATABASE_URL
    /// - COURSEHUB_CACHE_TTL_SECONDS, COURSEHUB_CACHE_MAX_CAPACITY
    /// - COURSEHUB_AUTH_SESSION_DAYS
    /// - COURSEHUB_FORUM_MAX_TAGS, COURSEHUB_FORUM_MAX_ATTACHMENTS
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the server cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "server.port must be greater than 0".to_string(),
            ));
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.url must not be empty".to_string(),
            ));
        }
        if self.auth.session_expiration_days < 1 {
            return Err(ConfigError::ValidationError(
                "auth.session_expiration_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("COURSEHUB_SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse::<u16>("COURSEHUB_SERVER_PORT") {
            self.server.port = port;
        }
        if let Ok(cors_origin) = std::env::var("COURSEHUB_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Some(trust) = env_parse::<bool>("COURSEHUB_SERVER_TRUST_PROXY") {
            self.server.trust_proxy_headers = trust;
        }

        if let Ok(driver) = std::env::var("COURSEHUB_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {}
            }
        }
        if let Ok(url) = std::env::var("COURSEHUB_DATABASE_URL") {
            self.database.url = url;
        }

        if let Some(ttl) = env_parse::<u64>("COURSEHUB_CACHE_TTL_SECONDS") {
            self.cache.ttl_seconds = ttl;
        }
        if let Some(capacity) = env_parse::<u64>("COURSEHUB_CACHE_MAX_CAPACITY") {
            self.cache.max_capacity = capacity;
        }

        if let Some(days) = env_parse::<i64>("COURSEHUB_AUTH_SESSION_DAYS") {
            self.auth.session_expiration_days = days;
        }

        if let Some(max_tags) = env_parse::<usize>("COURSEHUB_FORUM_MAX_TAGS") {
            self.forum.max_tags = max_tags;
        }
        if let Some(max_attachments) = env_parse::<usize>("COURSEHUB_FORUM_MAX_ATTACHMENTS") {
            self.forum.max_attachments = max_attachments;
        }
    }
}

/// Read and parse an environment variable, ignoring unparsable values
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared by every test module that touches process environment.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "COURSEHUB_SERVER_HOST",
    "COURSEHUB_SERVER_PORT",
    "COURSEHUB_SERVER_CORS_ORIGIN",
    "COURSEHUB_SERVER_TRUST_PROXY",
    "COURSEHUB_DATABASE_DRIVER",
    "COURSEHUB_DATABASE_URL",
    "COURSEHUB_CACHE_TTL_SECONDS",
    "COURSEHUB_CACHE_MAX_CAPACITY",
    "COURSEHUB_AUTH_SESSION_DAYS",
    "COURSEHUB_FORUM_MAX_TAGS",
    "COURSEHUB_FORUM_MAX_ATTACHMENTS",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        super::CONFIG_ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn config_strategy() -> impl Strategy<Value = Config> {
        (
            "[a-z]{1,10}(\\.[a-z]{1,10}){0,2}",
            1u16..=65535,
            prop_oneof![Just(DatabaseDriver::Sqlite), Just(DatabaseDriver::Mysql)],
            "[a-z]{1,12}/[a-z]{1,12}\\.db",
            1u64..=86400,
            1i64..=365,
            0usize..=50,
            0usize..=20,
        )
            .prop_map(
                |(host, port, driver, url, ttl, days, max_tags, max_attachments)| Config {
                    server: ServerConfig {
                        host,
                        port,
                        cors_origin: default_cors_origin(),
                        trust_proxy_headers: false,
                    },
                    database: DatabaseConfig { driver, url },
                    cache: CacheConfig {
                        ttl_seconds: ttl,
                        max_capacity: default_max_capacity(),
                    },
                    auth: AuthConfig {
                        session_expiration_days: days,
                    },
                    forum: ForumConfig {
                        max_tags,
                        max_attachments,
                    },
                },
            )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn config_yaml_roundtrip(config in config_strategy()) {
            let yaml = serde_yaml::to_string(&config).unwrap();
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "{}", yaml).unwrap();

            let loaded = Config::load(file.path()).unwrap();
            prop_assert_eq!(&loaded.server.host, &config.server.host);
            prop_assert_eq!(loaded.server.port, config.server.port);
            prop_assert_eq!(loaded.database.driver, config.database.driver);
            prop_assert_eq!(&loaded.database.url, &config.database.url);
            prop_assert_eq!(loaded.cache.ttl_seconds, config.cache.ttl_seconds);
            prop_assert_eq!(loaded.auth.session_expiration_days, config.auth.session_expiration_days);
            prop_assert_eq!(loaded.forum.max_tags, config.forum.max_tags);
            prop_assert!(loaded.validate().is_ok());
        }

        #[test]
        fn partial_forum_section_keeps_other_defaults(max_tags in 0usize..100) {
            let mut file = NamedTempFile::new().unwrap();
            write!(file, "forum:\n  max_tags: {}\n", max_tags).unwrap();

            let loaded = Config::load(file.path()).unwrap();
            prop_assert_eq!(loaded.forum.max_tags, max_tags);
            prop_assert_eq!(loaded.forum.max_attachments, default_max_attachments());
            prop_assert_eq!(loaded.server.port, default_port());
            prop_assert_eq!(&loaded.database.url, &default_database_url());
        }

        #[test]
        fn env_port_takes_precedence(file_port in 1u16..=65535, env_port in 1u16..=65535) {
            let _guard = lock_env();
            clear_env();

            let mut file = NamedTempFile::new().unwrap();
            write!(file, "server:\n  port: {}\n", file_port).unwrap();
            std::env::set_var("COURSEHUB_SERVER_PORT", env_port.to_string());

            let loaded = Config::load_with_env(file.path());
            clear_env();

            prop_assert_eq!(loaded.unwrap().server.port, env_port);
        }
    }
}
