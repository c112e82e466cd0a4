use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// Pre-compiled regex for hostname validation (compiled once at first use)
static HOSTNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9][-a-zA-Z0-9\.]*[a-zA-Z0-9]$").unwrap());

/// Prefix of every environment variable read by [`load_config`].
pub const ENV_PREFIX: &str = "GOO_";

#[derive(Debug, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub logging: Option<LoggingSection>,
    #[serde(default)]
    pub database: Option<DatabaseSection>,
    #[serde(default)]
    pub queue: Option<QueueSection>,
    #[serde(default)]
    pub jobs: Option<JobsSection>,
    #[serde(default)]
    pub email: Option<EmailSection>,
    #[serde(default)]
    pub admin: Option<AdminSection>,
}

#[derive(Debug, Deserialize)]
pub struct ServerSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoggingSection {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSection {
    #[serde(default)]
    pub driver: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub ssl_mode: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
    #[serde(default)]
    pub auto_migrate: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct QueueSection {
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub wait_time_secs: Option<u64>,
    #[serde(default)]
    pub visibility_timeout_secs: Option<u64>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct JobsSection {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub error_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct EmailSection {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub transactional_username: Option<String>,
    #[serde(default)]
    pub transactional_password: Option<String>,
    #[serde(default)]
    pub transactional_email: Option<String>,
    #[serde(default)]
    pub transactional_name: Option<String>,
    #[serde(default)]
    pub marketing_username: Option<String>,
    #[serde(default)]
    pub marketing_password: Option<String>,
    #[serde(default)]
    pub marketing_email: Option<String>,
    #[serde(default)]
    pub marketing_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminSection {
    #[serde(default)]
    pub admin_password: Option<String>,
    #[serde(default)]
    pub metrics_password: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Load a RawConfigFile from a path. The format is inferred from the extension: .toml, .yaml/.yml, .json
pub fn load_raw_from_file<P: AsRef<Path>>(path: P) -> Result<RawConfigFile, ConfigError> {
    let path = path.as_ref();
    let s = fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase());
    parse_config_str(&s, ext.as_deref())
}

/// Parse configuration from a string with optional format hint
#[inline]
fn parse_config_str(s: &str, ext: Option<&str>) -> Result<RawConfigFile, ConfigError> {
    match ext {
        #[cfg(feature = "toml")]
        Some("toml") => toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        #[cfg(feature = "yaml")]
        Some("yaml" | "yml") => {
            serde_yaml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
        }
        #[cfg(feature = "json")]
        Some("json") => serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string())),
        _ => parse_config_auto(s),
    }
}

/// Try to parse config by attempting each enabled format
#[inline]
#[cfg_attr(
    not(any(feature = "yaml", feature = "toml", feature = "json")),
    allow(unused_variables)
)]
fn parse_config_auto(s: &str) -> Result<RawConfigFile, ConfigError> {
    #[cfg(feature = "yaml")]
    if let Ok(cfg) = serde_yaml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "toml")]
    if let Ok(cfg) = toml::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(feature = "json")]
    if let Ok(cfg) = serde_json::from_str(s) {
        return Ok(cfg);
    }

    #[cfg(any(feature = "yaml", feature = "toml", feature = "json"))]
    {
        Err(ConfigError::Parse(
            "failed to parse config as any supported format".into(),
        ))
    }

    #[cfg(not(any(feature = "yaml", feature = "toml", feature = "json")))]
    {
        Err(ConfigError::Parse("no config format enabled".into()))
    }
}

/// Concrete application configuration with defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub jobs: JobsConfig,
    pub email: EmailConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public URL of the site. Derived from the port when unset.
    pub base_url: Option<String>,
}

impl ServerConfig {
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseConfig {
    pub driver: String,
    /// Full connection URL; takes precedence over the individual fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Apply pending migrations when the server starts.
    pub auto_migrate: bool,
}

impl DatabaseConfig {
    /// Connection URL for the configured driver.
    pub fn connection_url(&self) -> String {
        if let Some(url) = self.url.as_deref().filter(|u| !u.trim().is_empty()) {
            return url.to_string();
        }
        match self.driver.as_str() {
            "sqlite" => format!("sqlite://{}.sqlite", self.name),
            _ => format!(
                "postgres://{}:{}@{}:{}/{}?sslmode={}",
                self.username, self.password, self.host, self.port, self.name, self.ssl_mode
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueueConfig {
    /// `database` or `memory`.
    pub backend: String,
    pub wait_time_secs: u64,
    pub visibility_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobsConfig {
    pub timeout_secs: u64,
    pub error_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailConfig {
    pub host: String,
    pub port: u16,
    pub transactional_username: String,
    pub transactional_password: String,
    pub transactional_email: String,
    pub transactional_name: String,
    pub marketing_username: String,
    pub marketing_password: String,
    pub marketing_email: String,
    pub marketing_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminConfig {
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,
    #[serde(skip_serializing)]
    pub metrics_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                base_url: None,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            database: DatabaseConfig {
                driver: "sqlite".to_string(),
                url: None,
                host: "localhost".to_string(),
                port: 5432,
                name: "goo".to_string(),
                username: "goo".to_string(),
                password: String::new(),
                ssl_mode: "disable".to_string(),
                max_connections: 10,
                min_connections: 1,
                auto_migrate: true,
            },
            queue: QueueConfig {
                backend: "database".to_string(),
                wait_time_secs: 20,
                visibility_timeout_secs: 30,
                poll_interval_ms: 500,
            },
            jobs: JobsConfig {
                timeout_secs: 10,
                error_backoff_ms: 1000,
            },
            email: EmailConfig {
                host: "localhost".to_string(),
                port: 1025,
                transactional_username: String::new(),
                transactional_password: String::new(),
                transactional_email: "goo.transactional@example.com".to_string(),
                transactional_name: "Goo".to_string(),
                marketing_username: String::new(),
                marketing_password: String::new(),
                marketing_email: "goo.marketing@example.com".to_string(),
                marketing_name: "Goo".to_string(),
            },
            admin: AdminConfig {
                admin_password: None,
                metrics_password: None,
            },
        }
    }
}

#[inline]
fn parse_bool(s: &str) -> Result<bool, ()> {
    match s.as_bytes() {
        b"1" | b"true" | b"TRUE" | b"True" | b"yes" | b"YES" | b"Yes" | b"y" | b"Y" => Ok(true),
        b"0" | b"false" | b"FALSE" | b"False" | b"no" | b"NO" | b"No" | b"n" | b"N" => Ok(false),
        _ => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" => Ok(true),
            "false" | "no" | "n" => Ok(false),
            _ => Err(()),
        },
    }
}

/// Helper macro to apply optional value if present
macro_rules! apply_opt {
    ($target:expr, $source:expr) => {
        if let Some(v) = $source {
            $target = v;
        }
    };
    ($target:expr, $source:expr, wrap) => {
        if let Some(v) = $source {
            $target = Some(v);
        }
    };
}

/// Load concrete `Config` from optional file and environment variables.
/// Environment variables take precedence over file values and defaults.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
    load_config_with_env(path, |key| env::var(key).ok())
}

/// Like [`load_config`], reading variables through `lookup` instead of the process environment.
pub fn load_config_with_env<P, F>(path: Option<P>, lookup: F) -> Result<Config, ConfigError>
where
    P: AsRef<Path>,
    F: Fn(&str) -> Option<String>,
{
    let mut cfg = Config::default();
    if let Some(p) = path {
        apply_file(&mut cfg, load_raw_from_file(p)?);
    }
    apply_env_overrides(&mut cfg, &Env(lookup))?;
    Ok(cfg)
}

fn apply_file(cfg: &mut Config, raw: RawConfigFile) {
    if let Some(server) = raw.server {
        apply_opt!(cfg.server.host, server.host);
        apply_opt!(cfg.server.port, server.port);
        apply_opt!(cfg.server.base_url, server.base_url, wrap);
    }
    if let Some(logging) = raw.logging {
        apply_opt!(cfg.logging.level, logging.level);
        apply_opt!(cfg.logging.json, logging.json);
    }
    if let Some(db) = raw.database {
        apply_opt!(cfg.database.driver, db.driver);
        apply_opt!(cfg.database.url, db.url, wrap);
        apply_opt!(cfg.database.host, db.host);
        apply_opt!(cfg.database.port, db.port);
        apply_opt!(cfg.database.name, db.name);
        apply_opt!(cfg.database.username, db.username);
        apply_opt!(cfg.database.password, db.password);
        apply_opt!(cfg.database.ssl_mode, db.ssl_mode);
        apply_opt!(cfg.database.max_connections, db.max_connections);
        apply_opt!(cfg.database.min_connections, db.min_connections);
        apply_opt!(cfg.database.auto_migrate, db.auto_migrate);
    }
    if let Some(queue) = raw.queue {
        apply_opt!(cfg.queue.backend, queue.backend);
        apply_opt!(cfg.queue.wait_time_secs, queue.wait_time_secs);
        apply_opt!(cfg.queue.visibility_timeout_secs, queue.visibility_timeout_secs);
        apply_opt!(cfg.queue.poll_interval_ms, queue.poll_interval_ms);
    }
    if let Some(jobs) = raw.jobs {
        apply_opt!(cfg.jobs.timeout_secs, jobs.timeout_secs);
        apply_opt!(cfg.jobs.error_backoff_ms, jobs.error_backoff_ms);
    }
    if let Some(email) = raw.email {
        apply_opt!(cfg.email.host, email.host);
        apply_opt!(cfg.email.port, email.port);
        apply_opt!(cfg.email.transactional_username, email.transactional_username);
        apply_opt!(cfg.email.transactional_password, email.transactional_password);
        apply_opt!(cfg.email.transactional_email, email.transactional_email);
        apply_opt!(cfg.email.transactional_name, email.transactional_name);
        apply_opt!(cfg.email.marketing_username, email.marketing_username);
        apply_opt!(cfg.email.marketing_password, email.marketing_password);
        apply_opt!(cfg.email.marketing_email, email.marketing_email);
        apply_opt!(cfg.email.marketing_name, email.marketing_name);
    }
    if let Some(admin) = raw.admin {
        apply_opt!(cfg.admin.admin_password, admin.admin_password, wrap);
        apply_opt!(cfg.admin.metrics_password, admin.metrics_password, wrap);
    }
}

/// Prefixed, typed access to environment variables.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn str(&self, key: &str) -> Option<String> {
        (self.0)(&format!("{ENV_PREFIX}{key}"))
    }

    fn parse<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T::Err: std::fmt::Display,
    {
        match self.str(key) {
            Some(v) => v
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::Parse(format!("invalid {ENV_PREFIX}{key}: {e}"))),
            None => Ok(None),
        }
    }

    fn bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.str(key) {
            Some(v) => parse_bool(v.trim())
                .map(Some)
                .map_err(|_| ConfigError::Parse(format!("invalid {ENV_PREFIX}{key}"))),
            None => Ok(None),
        }
    }
}

/// Apply all environment variable overrides to config
fn apply_env_overrides<F>(cfg: &mut Config, env: &Env<F>) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Server
    apply_opt!(cfg.server.host, env.str("SERVER_HOST"));
    apply_opt!(cfg.server.port, env.parse("SERVER_PORT")?);
    apply_opt!(cfg.server.base_url, env.str("BASE_URL"), wrap);

    // Logging
    apply_opt!(cfg.logging.level, env.str("LOG_LEVEL"));
    apply_opt!(cfg.logging.json, env.bool("LOG_JSON")?);

    // Database
    apply_opt!(cfg.database.driver, env.str("DATABASE_DRIVER"));
    apply_opt!(cfg.database.url, env.str("DATABASE_URL"), wrap);
    apply_opt!(cfg.database.host, env.str("DATABASE_HOST"));
    apply_opt!(cfg.database.port, env.parse("DATABASE_PORT")?);
    apply_opt!(cfg.database.name, env.str("DATABASE_NAME"));
    apply_opt!(cfg.database.username, env.str("DATABASE_USERNAME"));
    apply_opt!(cfg.database.password, env.str("DATABASE_PASSWORD"));
    apply_opt!(cfg.database.ssl_mode, env.str("DATABASE_SSL_MODE"));
    apply_opt!(cfg.database.max_connections, env.parse("DATABASE_MAX_CONNECTIONS")?);
    apply_opt!(cfg.database.min_connections, env.parse("DATABASE_MIN_CONNECTIONS")?);
    apply_opt!(cfg.database.auto_migrate, env.bool("DATABASE_AUTO_MIGRATE")?);

    // Queue
    apply_opt!(cfg.queue.backend, env.str("QUEUE_BACKEND"));
    apply_opt!(cfg.queue.wait_time_secs, env.parse("QUEUE_WAIT_TIME_SECS")?);
    apply_opt!(
        cfg.queue.visibility_timeout_secs,
        env.parse("QUEUE_VISIBILITY_TIMEOUT_SECS")?
    );
    apply_opt!(cfg.queue.poll_interval_ms, env.parse("QUEUE_POLL_INTERVAL_MS")?);

    // Jobs
    apply_opt!(cfg.jobs.timeout_secs, env.parse("JOBS_TIMEOUT_SECS")?);
    apply_opt!(cfg.jobs.error_backoff_ms, env.parse("JOBS_ERROR_BACKOFF_MS")?);

    // Email
    apply_opt!(cfg.email.host, env.str("EMAIL_HOST"));
    apply_opt!(cfg.email.port, env.parse("EMAIL_PORT")?);
    apply_opt!(cfg.email.transactional_username, env.str("TRANSACTIONAL_USERNAME"));
    apply_opt!(cfg.email.transactional_password, env.str("TRANSACTIONAL_PASSWORD"));
    apply_opt!(cfg.email.transactional_email, env.str("TRANSACTIONAL_EMAIL"));
    apply_opt!(cfg.email.transactional_name, env.str("TRANSACTIONAL_EMAIL_NAME"));
    apply_opt!(cfg.email.marketing_username, env.str("MARKETING_USERNAME"));
    apply_opt!(cfg.email.marketing_password, env.str("MARKETING_PASSWORD"));
    apply_opt!(cfg.email.marketing_email, env.str("MARKETING_EMAIL"));
    apply_opt!(cfg.email.marketing_name, env.str("MARKETING_EMAIL_NAME"));

    // Admin
    apply_opt!(cfg.admin.admin_password, env.str("ADMIN_PASSWORD"), wrap);
    apply_opt!(cfg.admin.metrics_password, env.str("METRICS_PASSWORD"), wrap);

    Ok(())
}

/// Validate higher-level constraints on the resolved configuration.
pub fn validate_config(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.server.port == 0 {
        return Err(ConfigError::Validation("server.port must be > 0".into()));
    }
    let host_ok = cfg.server.host.parse::<std::net::IpAddr>().is_ok()
        || HOSTNAME_REGEX.is_match(&cfg.server.host);
    if !host_ok {
        return Err(ConfigError::Validation(format!(
            "invalid server.host: {}",
            cfg.server.host
        )));
    }

    let base_url = cfg.server.base_url();
    match url::Url::parse(&base_url) {
        Ok(u) if u.scheme() == "http" || u.scheme() == "https" => {}
        _ => {
            return Err(ConfigError::Validation(format!(
                "server.base_url must be an http or https URL: {base_url}"
            )))
        }
    }

    match cfg.database.driver.as_str() {
        "sqlite" | "postgres" => {}
        other => {
            return Err(ConfigError::Validation(format!(
                "unsupported database driver: {other}"
            )))
        }
    }
    if cfg.database.url.is_none() && cfg.database.driver != "sqlite" {
        if cfg.database.host.is_empty() {
            return Err(ConfigError::Validation(
                "database.host must be set for non-sqlite drivers".to_string(),
            ));
        }
        if cfg.database.name.is_empty() {
            return Err(ConfigError::Validation(
                "database.name must be set for non-sqlite drivers".to_string(),
            ));
        }
    }
    if cfg.database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be > 0".to_string(),
        ));
    }
    if cfg.database.min_connections > cfg.database.max_connections {
        return Err(ConfigError::Validation(
            "database.min_connections must not exceed database.max_connections".to_string(),
        ));
    }

    match cfg.queue.backend.as_str() {
        "database" | "memory" => {}
        other => {
            return Err(ConfigError::Validation(format!(
                "unsupported queue backend: {other}"
            )))
        }
    }
    if cfg.queue.wait_time_secs == 0 {
        return Err(ConfigError::Validation(
            "queue.wait_time_secs must be > 0".to_string(),
        ));
    }
    if cfg.queue.poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "queue.poll_interval_ms must be > 0".to_string(),
        ));
    }
    if cfg.jobs.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "jobs.timeout_secs must be > 0".to_string(),
        ));
    }
    Ok(())
}
