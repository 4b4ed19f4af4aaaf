//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! `SOCKET_URL`, `API_BASE_URL` and `API_TOKEN` override the file values.

use crate::domain::types::Role;
use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

const DEFAULT_BACKEND_URL: &str = "https://zovo-backend.azurewebsites.net";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SessionConfig {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Socket.IO server base URL (http(s) or ws(s))
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_event_name")]
    pub event_name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Inbound frame queue depth between the socket reader and dispatch
    #[serde(default = "default_frame_buffer")]
    pub frame_buffer: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            event_name: default_event_name(),
            namespace: default_namespace(),
            connect_timeout_ms: default_connect_timeout_ms(),
            frame_buffer: default_frame_buffer(),
        }
    }
}

fn default_event_name() -> String {
    "locationUpdate".to_string()
}

fn default_namespace() -> String {
    "/".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_frame_buffer() -> usize {
    256
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Consecutive failed attempts before giving up (0 disables reconnect)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> u32 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self { base_url: default_api_base_url(), timeout_ms: default_api_timeout_ms(), token: None }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_BACKEND_URL.to_string()
}

fn default_api_timeout_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    user_id: Option<String>,
    role: Role,
    realtime_endpoint: Option<String>,
    event_name: String,
    namespace: String,
    connect_timeout_ms: u64,
    frame_buffer: usize,
    reconnect_initial_backoff_ms: u64,
    reconnect_max_backoff_ms: u64,
    reconnect_max_attempts: u32,
    api_base_url: String,
    api_timeout_ms: u64,
    api_token: Option<String>,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            user_id: toml_config.session.user_id,
            role: toml_config.session.role.unwrap_or(Role::Worker),
            realtime_endpoint: toml_config.realtime.endpoint,
            event_name: toml_config.realtime.event_name,
            namespace: toml_config.realtime.namespace,
            connect_timeout_ms: toml_config.realtime.connect_timeout_ms,
            frame_buffer: toml_config.realtime.frame_buffer.max(1),
            reconnect_initial_backoff_ms: toml_config.reconnect.initial_backoff_ms,
            reconnect_max_backoff_ms: toml_config.reconnect.max_backoff_ms,
            reconnect_max_attempts: toml_config.reconnect.max_attempts,
            api_base_url: toml_config.api.base_url,
            api_timeout_ms: toml_config.api.timeout_ms,
            api_token: toml_config.api.token,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file,
        }
    }

    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        // Check for --config argument
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load from a path, falling back to defaults, then apply env overrides
    pub fn load_from_path(path: &str) -> Self {
        let config = match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        };
        config.with_env_overrides(|key| env::var(key).ok())
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(args: &[String]) -> Self {
        Self::load_from_path(&Self::resolve_config_path(args))
    }

    /// Apply `SOCKET_URL`, `API_BASE_URL` and `API_TOKEN` from `lookup`
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SOCKET_URL").filter(|v| !v.is_empty()) {
            self.realtime_endpoint = Some(url);
        }
        if let Some(url) = lookup("API_BASE_URL").filter(|v| !v.is_empty()) {
            self.api_base_url = url;
        }
        if let Some(token) = lookup("API_TOKEN").filter(|v| !v.is_empty()) {
            self.api_token = Some(token);
        }
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn realtime_endpoint(&self) -> Option<&str> {
        self.realtime_endpoint.as_deref()
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn frame_buffer(&self) -> usize {
        self.frame_buffer
    }

    pub fn reconnect_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_backoff_ms)
    }

    pub fn reconnect_max_backoff(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_backoff_ms)
    }

    pub fn reconnect_max_attempts(&self) -> u32 {
        self.reconnect_max_attempts
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_millis(self.api_timeout_ms)
    }

    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder for tests and embedders that skip the TOML file
    pub fn with_realtime_endpoint(mut self, endpoint: &str) -> Self {
        self.realtime_endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_session(mut self, user_id: &str, role: Role) -> Self {
        self.user_id = Some(user_id.to_string());
        self.role = role;
        self
    }

    pub fn with_reconnect(mut self, initial_ms: u64, max_ms: u64, max_attempts: u32) -> Self {
        self.reconnect_initial_backoff_ms = initial_ms;
        self.reconnect_max_backoff_ms = max_ms;
        self.reconnect_max_attempts = max_attempts;
        self
    }
}
