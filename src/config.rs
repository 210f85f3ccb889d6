//! Configuration management for the library API

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Deployment mode gating the CORS policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Production,
    Development,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Raw deployment name (`NODE_ENV`), reported by `/health`
    pub environment: String,
}

impl ServerConfig {
    pub fn mode(&self) -> RunMode {
        if self.environment == "production" {
            RunMode::Production
        } else {
            RunMode::Development
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string; absent means every data access fails
    pub uri: Option<String>,
    /// Database name, overriding the one embedded in the URI
    pub name: Option<String>,
    pub max_pool_size: u32,
    pub server_selection_timeout_ms: u64,
    pub socket_timeout_ms: u64,
    /// Queue operations issued before the connection completes instead of failing fast
    pub buffer_commands: bool,
    pub heartbeat_interval_ms: u64,
}

impl DatabaseConfig {
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CorsConfig {
    /// Origins accepted in production, matched exactly
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BodyConfig {
    pub limit_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub body: BodyConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = env::var("NODE_ENV").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // LIBRARY_SERVER__PORT, LIBRARY_CORS__ALLOWED_ORIGINS=a,b, ...
            .add_source(
                Environment::with_prefix("LIBRARY")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            )
            .set_override("server.environment", environment)?
            .set_override_option("database.uri", env::var("MONGODB_URI").ok())?
            .set_override_option("server.port", env::var("PORT").ok())?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            environment: "development".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: None,
            name: None,
            max_pool_size: 10,
            server_selection_timeout_ms: 15_000,
            socket_timeout_ms: 45_000,
            buffer_commands: false,
            heartbeat_interval_ms: 10_000,
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![
                "https://vercel.app".to_string(),
                "https://*.vercel.app".to_string(),
            ],
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 15 * 60,
            max_requests: 100,
        }
    }
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            limit_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
