use std::env;
use std::str::FromStr;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
    /// Buffered grant changes per watcher before it starts lagging.
    pub grant_feed_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origin.
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HS256 secret shared with the identity provider.
    pub secret: String,
    /// Clock skew tolerated on `exp`/`iat`.
    pub leeway_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for /api/pets
    pub api_per_second: u64,
    /// Burst size for /api/pets
    pub api_burst: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let log_format = lookup("LOG_FORMAT").unwrap_or_else(|| "pretty".to_string());
        let json = match log_format.to_lowercase().as_str() {
            "json" => true,
            "pretty" | "text" => false,
            _ => return Err(ConfigError::InvalidValue("LOG_FORMAT".to_string())),
        };

        Ok(Config {
            server: ServerConfig {
                host: lookup("HOST").unwrap_or(defaults.server.host),
                port: parse_or(&lookup, "PORT", defaults.server.port)?,
                frontend_url: lookup("FRONTEND_URL").unwrap_or(defaults.server.frontend_url),
            },
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: parse_or(
                    &lookup,
                    "DATABASE_MAX_CONNECTIONS",
                    defaults.database.max_connections,
                )?,
            },
            jwt: JwtConfig {
                secret: lookup("JWT_SECRET")
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                leeway_seconds: parse_or(&lookup, "JWT_LEEWAY_SECONDS", defaults.jwt.leeway_seconds)?,
            },
            rate_limit: RateLimitConfig {
                api_per_second: parse_or(
                    &lookup,
                    "RATE_LIMIT_API_PER_SECOND",
                    defaults.rate_limit.api_per_second,
                )?,
                api_burst: parse_or(&lookup, "RATE_LIMIT_API_BURST", defaults.rate_limit.api_burst)?,
            },
            logging: LoggingConfig { json },
            grant_feed_capacity: parse_or(
                &lookup,
                "GRANT_FEED_CAPACITY",
                defaults.grant_feed_capacity,
            )?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/pets.db".to_string(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: String::new(),
                leeway_seconds: 30,
            },
            rate_limit: RateLimitConfig {
                api_per_second: 10,
                api_burst: 50,
            },
            logging: LoggingConfig { json: false },
            grant_feed_capacity: 256,
        }
    }
}
