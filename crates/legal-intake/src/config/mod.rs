use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub intake: IntakeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let directives = env::var("APP_LOG_DIRECTIVES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|directive| !directive.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                directives,
            },
            intake: IntakeConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls. `directives` holds extra per-module filters such as
/// `legal_intake::workflows::requests=debug`.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub directives: Vec<String>,
}

/// Policy dials for request intake: save latency and the insolvency eligibility thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeConfig {
    pub save_delay: Duration,
    pub overdue_share_threshold_pct: f64,
    pub min_debts: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            save_delay: Duration::from_millis(250),
            overdue_share_threshold_pct: 30.0,
            min_debts: 2,
        }
    }
}

impl IntakeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let save_delay = match env::var("INTAKE_SAVE_DELAY_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidSaveDelay)?,
            Err(_) => defaults.save_delay,
        };

        let overdue_share_threshold_pct = match env::var("INTAKE_OVERDUE_SHARE_THRESHOLD") {
            Ok(raw) => {
                let value = raw
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| ConfigError::InvalidShareThreshold)?;
                if !(0.0..=100.0).contains(&value) {
                    return Err(ConfigError::InvalidShareThreshold);
                }
                value
            }
            Err(_) => defaults.overdue_share_threshold_pct,
        };

        let min_debts = match env::var("INTAKE_MIN_DEBTS") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidMinDebts)?,
            Err(_) => defaults.min_debts,
        };

        Ok(Self {
            save_delay,
            overdue_share_threshold_pct,
            min_debts,
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSaveDelay,
    InvalidShareThreshold,
    InvalidMinDebts,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSaveDelay => {
                write!(f, "INTAKE_SAVE_DELAY_MS must be a whole number of milliseconds")
            }
            ConfigError::InvalidShareThreshold => write!(
                f,
                "INTAKE_OVERDUE_SHARE_THRESHOLD must be a percentage between 0 and 100"
            ),
            ConfigError::InvalidMinDebts => {
                write!(f, "INTAKE_MIN_DEBTS must be a non-negative integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidSaveDelay
            | ConfigError::InvalidShareThreshold
            | ConfigError::InvalidMinDebts => None,
        }
    }
}
