use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

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
    pub workflow: WorkflowConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("STUDIO_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("STUDIO_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("STUDIO_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("STUDIO_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let proposal_number_prefix =
            env::var("STUDIO_PROPOSAL_PREFIX").unwrap_or_else(|_| "PRO".to_string());
        let default_tax_rate_bps = env::var("STUDIO_DEFAULT_TAX_BPS")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidTaxRate)?;
        if default_tax_rate_bps > 10_000 {
            return Err(ConfigError::InvalidTaxRate);
        }

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            workflow: WorkflowConfig {
                proposal_number_prefix,
                default_tax_rate_bps,
            },
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

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Engagement workflow tunables.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub proposal_number_prefix: String,
    pub default_tax_rate_bps: u32,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTaxRate,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "STUDIO_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "STUDIO_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTaxRate => {
                write!(f, "STUDIO_DEFAULT_TAX_BPS must be an integer between 0 and 10000")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidTaxRate => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
