//! Configuration management for Wayfarer.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the Wayfarer service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WayfarerConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    /// Gemini model configuration
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for WayfarerConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            rate_limiting: RateLimitingConfig::default(),
            gemini: GeminiConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server address
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,

    /// Origins allowed by the CORS layer
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_http_addr() -> SocketAddr {
    "127.0.0.1:8000".parse().unwrap()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

/// A single admission policy: at most `max_requests` per client within any
/// trailing window of `window_secs` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Maximum requests admitted per window
    pub max_requests: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl RateLimitPolicy {
    /// The window as a [`Duration`].
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Rate limiting configuration, one policy per protected route group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Policy for the query submission endpoint
    #[serde(default = "default_query_policy")]
    pub query: RateLimitPolicy,

    /// Policy for the history endpoints
    #[serde(default = "default_history_policy")]
    pub history: RateLimitPolicy,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            query: default_query_policy(),
            history: default_history_policy(),
        }
    }
}

fn default_query_policy() -> RateLimitPolicy {
    RateLimitPolicy {
        max_requests: 10,
        window_secs: 60,
    }
}

fn default_history_policy() -> RateLimitPolicy {
    RateLimitPolicy {
        max_requests: 5,
        window_secs: 60,
    }
}

/// Gemini model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key. Falls back to the `GEMINI_API_KEY` (then `GOOGLE_API_KEY`)
    /// environment variable when unset.
    pub api_key: Option<String>,

    /// Model name
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Base URL of the generative language API
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,

    /// Sampling temperature
    #[serde(default = "default_gemini_temperature")]
    pub temperature: f64,

    /// Output token ceiling per response
    #[serde(default = "default_gemini_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            api_base: default_gemini_api_base(),
            temperature: default_gemini_temperature(),
            max_output_tokens: default_gemini_max_output_tokens(),
        }
    }
}

impl GeminiConfig {
    /// Resolve the API key: explicit config value first, then the
    /// `GEMINI_API_KEY` and `GOOGLE_API_KEY` environment variables.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
    }
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_gemini_temperature() -> f64 {
    0.7
}

fn default_gemini_max_output_tokens() -> u32 {
    1024
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("travel_queries.db")
}

impl WayfarerConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: &str) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: WayfarerConfig = serde_yaml::from_str(&contents)
            .map_err(|e| crate::error::WayfarerError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Reject configurations that must prevent startup. A zero-valued rate
    /// limit policy or an empty model name is a deployment mistake, not a
    /// runtime condition.
    pub fn validate(&self) -> crate::error::Result<()> {
        for (name, policy) in [
            ("query", &self.rate_limiting.query),
            ("history", &self.rate_limiting.history),
        ] {
            if policy.max_requests == 0 {
                return Err(crate::error::WayfarerError::Config(format!(
                    "rate_limiting.{name}.max_requests must be greater than zero"
                )));
            }
            if policy.window_secs == 0 {
                return Err(crate::error::WayfarerError::Config(format!(
                    "rate_limiting.{name}.window_secs must be greater than zero"
                )));
            }
        }

        if self.gemini.model.is_empty() {
            return Err(crate::error::WayfarerError::Config(
                "gemini.model must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
