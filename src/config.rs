//! Application configuration loaded from environment variables.

use std::env;
use std::path::PathBuf;

/// HTTP header carrying the gateway-verified owner UUID.
pub const OWNER_ID_HEADER: &str = "X-Owner-Id";

/// Development default values - NEVER use in production.
pub mod defaults {
    pub const DEV_DATABASE_URL: &str = "sqlite://data/images.db?mode=rwc";
    pub const DEV_HOST: &str = "127.0.0.1";
    pub const DEV_PORT: u16 = 8080;
    pub const DEV_DATA_DIR: &str = "data/uploads";
    pub const DEV_MAX_UPLOAD_SIZE: usize = 10_485_760; // 10MB per image
    pub const DEV_SWEEP_INTERVAL_SECS: u64 = 30;
    pub const DEV_SWEEP_MIN_AGE_SECS: u64 = 60;
}

/// Runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Parse environment from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// Check if this is a development environment.
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    /// Check if this is a production environment.
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Record store backend selection.
///
/// The ephemeral backend keeps records in a process-local map and loses them
/// on restart; it exists for tests and local experiments. Business logic only
/// ever sees the `RecordStore` trait, so the choice is made exactly once here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Database,
}

impl StoreBackend {
    /// Parse backend from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "database" | "sqlite" => Some(Self::Database),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Database => write!(f, "database"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Runtime environment
    pub environment: Environment,
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL (SQLite connection string)
    pub database_url: String,
    /// Record store backend
    pub store_backend: StoreBackend,
    /// Directory for uploaded image files
    pub data_dir: PathBuf,
    /// Maximum upload size in bytes (default: 10MB)
    pub max_upload_size: usize,
    /// How often the worker sweeps for stranded pending records (seconds)
    pub sweep_interval_secs: u64,
    /// Minimum age before a pending record is eligible for the sweep (seconds)
    pub sweep_min_age_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In development mode (RUST_ENV=development):
    /// - All variables have sensible defaults
    /// - Only RUST_ENV is required
    ///
    /// In production mode (RUST_ENV=production):
    /// - Server will NOT start with the development DATABASE_URL
    /// - Server will NOT start with the ephemeral memory store
    ///
    /// Environment variables:
    /// - `RUST_ENV`: Environment (development/production) - REQUIRED
    /// - `ISS_HOST`: Server host (default: 127.0.0.1)
    /// - `ISS_PORT`: Server port (default: 8080)
    /// - `DATABASE_URL`: SQLite connection string
    /// - `ISS_STORE_BACKEND`: Record store backend (memory/database, default: database)
    /// - `ISS_DATA_DIR`: Directory for uploaded image files
    /// - `ISS_MAX_UPLOAD_SIZE`: Max upload size in bytes (default: 10MB)
    /// - `ISS_SWEEP_INTERVAL_SECS`: Pending-record sweep interval (default: 30)
    /// - `ISS_SWEEP_MIN_AGE_SECS`: Minimum pending age before sweep pickup (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        // Parse environment - required
        let env_str = env::var("RUST_ENV").map_err(|_| ConfigError::MissingEnvVar("RUST_ENV"))?;

        let environment = Environment::parse(&env_str).ok_or(ConfigError::InvalidValue(
            "RUST_ENV must be 'development' or 'production'",
        ))?;

        // Load values with defaults
        let host = env::var("ISS_HOST").unwrap_or_else(|_| defaults::DEV_HOST.to_string());

        let port = env::var("ISS_PORT")
            .unwrap_or_else(|_| defaults::DEV_PORT.to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidValue("ISS_PORT must be a valid port number"))?;

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| defaults::DEV_DATABASE_URL.to_string());

        let store_backend = match env::var("ISS_STORE_BACKEND") {
            Ok(value) => StoreBackend::parse(&value).ok_or(ConfigError::InvalidValue(
                "ISS_STORE_BACKEND must be 'memory' or 'database'",
            ))?,
            Err(_) => StoreBackend::Database,
        };

        let data_dir = env::var("ISS_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(defaults::DEV_DATA_DIR));

        let max_upload_size = env::var("ISS_MAX_UPLOAD_SIZE")
            .unwrap_or_else(|_| defaults::DEV_MAX_UPLOAD_SIZE.to_string())
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidValue("ISS_MAX_UPLOAD_SIZE must be a valid number"))?;

        let sweep_interval_secs = env::var("ISS_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| defaults::DEV_SWEEP_INTERVAL_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("ISS_SWEEP_INTERVAL_SECS must be a valid number")
            })?;

        let sweep_min_age_secs = env::var("ISS_SWEEP_MIN_AGE_SECS")
            .unwrap_or_else(|_| defaults::DEV_SWEEP_MIN_AGE_SECS.to_string())
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue("ISS_SWEEP_MIN_AGE_SECS must be a valid number")
            })?;

        let config = Config {
            environment,
            host,
            port,
            database_url,
            store_backend,
            data_dir,
            max_upload_size,
            sweep_interval_secs,
            sweep_min_age_secs,
        };

        // Validate production configuration
        if environment.is_production() {
            config.validate_production()?;
        }

        Ok(config)
    }

    /// Validate that production configuration does not use development defaults.
    fn validate_production(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.database_url == defaults::DEV_DATABASE_URL {
            errors.push(format!(
                "DATABASE_URL is using development default '{}'. Set a production SQLite path.",
                defaults::DEV_DATABASE_URL
            ));
        }

        if self.store_backend == StoreBackend::Memory {
            errors.push(
                "ISS_STORE_BACKEND=memory is ephemeral and loses all records on restart. \
                 Use the database backend in production."
                    .to_string(),
            );
        }

        if !errors.is_empty() {
            return Err(ConfigError::ProductionValidation(errors));
        }

        Ok(())
    }

    /// Get the server bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if running in development mode.
    pub fn is_development(&self) -> bool {
        self.environment.is_development()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(&'static str),

    #[error("Production configuration validation failed:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    ProductionValidation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            environment: Environment::Development,
            host: "0.0.0.0".to_string(),
            port: 3000,
            database_url: "sqlite://test/images.db?mode=rwc".to_string(),
            store_backend: StoreBackend::Database,
            data_dir: PathBuf::from("data/uploads"),
            max_upload_size: 1024,
            sweep_interval_secs: 30,
            sweep_min_age_secs: 60,
        }
    }

    #[test]
    fn test_bind_address() {
        let config = base_config();
        assert_eq!(config.bind_address(), "0.0.0.0:3000");
    }

    #[test]
    fn test_environment_parsing() {
        assert_eq!(
            Environment::parse("development"),
            Some(Environment::Development)
        );
        assert_eq!(Environment::parse("dev"), Some(Environment::Development));
        assert_eq!(
            Environment::parse("production"),
            Some(Environment::Production)
        );
        assert_eq!(Environment::parse("prod"), Some(Environment::Production));
        assert_eq!(Environment::parse("invalid"), None);
    }

    #[test]
    fn test_store_backend_parsing() {
        assert_eq!(StoreBackend::parse("memory"), Some(StoreBackend::Memory));
        assert_eq!(StoreBackend::parse("sqlite"), Some(StoreBackend::Database));
        assert_eq!(
            StoreBackend::parse("database"),
            Some(StoreBackend::Database)
        );
        assert_eq!(StoreBackend::parse("redis"), None);
    }

    #[test]
    fn test_production_validation_fails_with_dev_defaults() {
        let mut config = base_config();
        config.environment = Environment::Production;
        config.database_url = defaults::DEV_DATABASE_URL.to_string();
        config.store_backend = StoreBackend::Memory;

        let result = config.validate_production();
        assert!(result.is_err());

        if let Err(ConfigError::ProductionValidation(errors)) = result {
            assert_eq!(errors.len(), 2);
        }
    }

    #[test]
    fn test_production_validation_passes_with_proper_config() {
        let mut config = base_config();
        config.environment = Environment::Production;
        config.database_url = "sqlite:///var/lib/iss/images.db?mode=rwc".to_string();

        assert!(config.validate_production().is_ok());
    }
}
