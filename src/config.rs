use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Carrier gateway configuration
    pub carrier: CarrierConfig,
    /// Dispatch queue configuration
    pub dispatch: DispatchConfig,
    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    /// Server host (default: 127.0.0.1)
    pub host: String,
    /// Server port (default: 8080)
    pub port: u16,
}

/// MessageBird carrier configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CarrierConfig {
    /// Access key for the MessageBird REST API
    pub access_key: String,
    /// API base URL (default: https://rest.messagebird.com)
    pub base_url: String,
}

/// Dispatch queue configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DispatchConfig {
    /// Pending requests buffered before producers wait (default: 10)
    pub queue_capacity: usize,
}

/// Rate limiting configuration for calls towards the carrier
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RateLimitConfig {
    /// Enable rate limiting (default: true)
    pub enabled: bool,
    /// Tokens added per interval (default: 1)
    pub tokens_per_interval: u32,
    /// Refill interval in milliseconds (default: 1000)
    pub interval_ms: u64,
    /// Bucket capacity (default: 1)
    pub burst: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: json or pretty (default: json)
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for CarrierConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            base_url: "https://rest.messagebird.com".to_string(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self { queue_capacity: 10 }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tokens_per_interval: 1,
            interval_ms: 1000,
            burst: 1,
        }
    }
}

impl RateLimitConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(Config::try_from(&AppConfig::default())?)
            // Add configuration file based on environment
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add local configuration file (gitignored)
            .add_source(File::with_name("config/local").required(false))
            // Add environment variables (prefixed with SMSPROXY_)
            .add_source(Environment::with_prefix("SMSPROXY").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
