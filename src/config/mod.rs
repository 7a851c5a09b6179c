//! Configuration management
//!
//! Loaded once at startup from the environment, with `.env` support for
//! local development.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEV_SESSION_SECRET: &str = "development-session-secret-change-me";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid log format: '{}'. Expected: pretty or json",
                s
            ))),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,

    /// Bind address
    pub host: String,

    pub port: u16,

    /// Postgres URL. Without one the in-memory backends are used.
    pub database_url: Option<String>,

    pub db_max_connections: u32,

    /// Requests per second per client IP
    pub rate_limit_rps: u32,

    /// Challenge requests per minute per address
    pub challenge_rate_limit_per_minute: u32,

    /// Comma-separated CORS origins
    pub cors_allowed_origins: Option<String>,

    pub log_level: String,

    pub log_format: LogFormat,

    /// HMAC secret for session tokens
    pub session_secret: String,

    pub session_ttl_seconds: u64,

    pub nonce_ttl_seconds: u64,

    pub cookie_name: String,

    pub store_sweep_interval_seconds: u64,
}

/// Only development may run on the built-in session secret.
fn session_secret(environment: Environment, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(secret) if !secret.is_empty() => Ok(secret),
        _ if environment.is_development() => Ok(DEV_SESSION_SECRET.to_string()),
        _ => Err(ConfigError::MissingEnvVar("SESSION_SECRET".to_string())),
    }
}

fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| s.parse::<Environment>())
            .unwrap_or(Ok(Environment::Development))?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let log_format = env::var("LOG_FORMAT")
            .map(|s| s.parse::<LogFormat>())
            .unwrap_or(Ok(LogFormat::Pretty))?;

        let session_secret = session_secret(environment, env::var("SESSION_SECRET").ok())?;

        Ok(Config {
            environment,
            host,
            port,
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 5),
            rate_limit_rps: parse_or("RATE_LIMIT_RPS", 100),
            challenge_rate_limit_per_minute: parse_or("CHALLENGE_RATE_LIMIT_PER_MINUTE", 10),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format,
            session_secret,
            session_ttl_seconds: parse_or("SESSION_TTL_SECONDS", 3600),
            nonce_ttl_seconds: parse_or("NONCE_TTL_SECONDS", 300),
            cookie_name: env::var("COOKIE_NAME").unwrap_or_else(|_| "login_session".to_string()),
            store_sweep_interval_seconds: parse_or("STORE_SWEEP_INTERVAL_SECONDS", 60),
        })
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    pub fn nonce_ttl(&self) -> Duration {
        Duration::from_secs(self.nonce_ttl_seconds)
    }

    pub fn store_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.store_sweep_interval_seconds.max(1))
    }

    /// Cookies carry `Secure` outside development.
    pub fn secure_cookies(&self) -> bool {
        !self.environment.is_development()
    }

    /// Database URL with the password masked, for logging
    pub fn database_url_masked(&self) -> Option<String> {
        let url = self.database_url.as_ref()?;
        if let Some(at_pos) = url.find('@') {
            if let Some(colon_pos) = url[..at_pos].rfind(':') {
                let prefix = &url[..colon_pos + 1];
                let suffix = &url[at_pos..];
                return Some(format!("{}****{}", prefix, suffix));
            }
        }
        Some(url.clone())
    }
}
