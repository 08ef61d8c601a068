use std::net::SocketAddr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::forwarding::{ForwardingTables, TransformSpec};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub forwarding: ForwardingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }

        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }

        if self.generation.date_tokens.iter().any(|t| t.trim().is_empty()) {
            return Err("generation.date_tokens must not contain empty tokens".into());
        }

        let t = &self.forwarding.timeouts;
        if t.check_ms == 0 || t.standard_ms == 0 || t.procedure_ms == 0 {
            return Err("forwarding.timeouts must be > 0".into());
        }
        let r = &self.forwarding.retry;
        if r.max_attempts == 0 {
            return Err("forwarding.retry.max_attempts must be >= 1".into());
        }
        if r.initial_backoff_ms > r.max_backoff_ms {
            return Err("forwarding.retry.initial_backoff_ms must be <= max_backoff_ms".into());
        }

        ForwardingTables::from_config(&self.forwarding.tables())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    pub fn addr(&self) -> SocketAddr {
        let ip: std::net::IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(std::net::IpAddr::from([0, 0, 0, 0]));
        SocketAddr::from((ip, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    /// Field-name fragments that mark a date column.
    #[serde(default = "default_date_tokens")]
    pub date_tokens: Vec<String>,
}

fn default_date_tokens() -> Vec<String> {
    sqlgate_core::DEFAULT_DATE_TOKENS
        .iter()
        .map(|t| t.to_string())
        .collect()
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            date_tokens: default_date_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardingConfig {
    /// When false, generation endpoints never forward.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Value of `source` in envelope bodies.
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub default_destination: Option<DestinationConfig>,
    #[serde(default)]
    pub default_transformer: Option<TransformSpec>,
    /// Request path rules, first match wins.
    #[serde(default)]
    pub routes: Vec<DestinationRouteConfig>,
    /// Destination URL rules, first match wins.
    #[serde(default)]
    pub transformers: Vec<TransformerConfig>,
}

fn default_true() -> bool {
    true
}
fn default_source() -> String {
    "sqlgate".to_string()
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            source: default_source(),
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
            default_destination: None,
            default_transformer: None,
            routes: Vec::new(),
            transformers: Vec::new(),
        }
    }
}

impl ForwardingConfig {
    /// The swappable part of the forwarding configuration.
    pub fn tables(&self) -> RoutingTablesConfig {
        RoutingTablesConfig {
            default_destination: self.default_destination.clone(),
            default_transformer: self.default_transformer.clone(),
            routes: self.routes.clone(),
            transformers: self.transformers.clone(),
        }
    }
}

/// Per-class outbound timeouts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// GET/HEAD destinations.
    #[serde(default = "default_check_ms")]
    pub check_ms: u64,
    #[serde(default = "default_standard_ms")]
    pub standard_ms: u64,
    /// Procedure and multi-procedure generations.
    #[serde(default = "default_procedure_ms")]
    pub procedure_ms: u64,
}

fn default_check_ms() -> u64 {
    5_000
}
fn default_standard_ms() -> u64 {
    30_000
}
fn default_procedure_ms() -> u64 {
    120_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            check_ms: default_check_ms(),
            standard_ms: default_standard_ms(),
            procedure_ms: default_procedure_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    1
}
fn default_initial_backoff_ms() -> u64 {
    200
}
fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DestinationConfig {
    pub url: String,
    /// Defaults to POST.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DestinationRouteConfig {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub destination: DestinationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TransformerConfig {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub transform: TransformSpec,
}

/// Routes and transformers as one unit; also the body of the route-swap endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RoutingTablesConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_destination: Option<DestinationConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_transformer: Option<TransformSpec>,
    #[serde(default)]
    pub routes: Vec<DestinationRouteConfig>,
    #[serde(default)]
    pub transformers: Vec<TransformerConfig>,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default file looked up when no path is given.
    pub const DEFAULT_CONFIG_FILE: &str = "sqlgate.toml";

    /// Loads an optional TOML file and applies `SQLGATE__SECTION__KEY`
    /// environment overrides, then validates.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        } else if path.is_some() {
            tracing::debug!(path = %pathbuf.display(), "config file not found; using defaults");
        }
        // e.g. SQLGATE__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("SQLGATE")
                .prefix_separator("__")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
