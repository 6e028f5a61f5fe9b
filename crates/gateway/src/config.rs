//! Gateway configuration from environment variables.

use crate::error::{GatewayError, Result};
use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};

/// Secret used only when `APP_ENV=development` and `JWT_SECRET` is unset.
const DEV_JWT_SECRET: &str = "dev-only-insecure-secret";

/// Which ledger store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(GatewayError::Config(format!(
                "LEDGER_STORE must be 'memory' or 'redis', got '{}'",
                other
            ))),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub http_port: u16,
    pub metrics_port: u16,
    pub jwt_secret: String,
    pub store: StoreBackend,
    pub redis_url: String,
    /// `None` disables the per-session simulator.
    pub simulator_interval: Option<Duration>,
}

impl GatewayConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let development = lookup("APP_ENV").is_some_and(|v| v == "development");

        let jwt_secret = match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => secret,
            _ if development => {
                warn!("JWT_SECRET not set, using development secret");
                DEV_JWT_SECRET.to_string()
            }
            _ => return Err(GatewayError::Config("JWT_SECRET must be set".to_string())),
        };

        let simulator_secs: u64 = parse_or(&lookup, "SIMULATOR_INTERVAL_SECS", 30)?;

        Ok(Self {
            http_port: parse_or(&lookup, "HTTP_PORT", 3001)?,
            metrics_port: parse_or(&lookup, "METRICS_PORT", 9094)?,
            jwt_secret,
            store: lookup("LEDGER_STORE")
                .map(|v| v.parse::<StoreBackend>())
                .transpose()?
                .unwrap_or(StoreBackend::Memory),
            redis_url: lookup("REDIS_URL").unwrap_or_else(|| "redis://localhost:6379".to_string()),
            simulator_interval: (simulator_secs > 0).then(|| Duration::from_secs(simulator_secs)),
        })
    }

    /// Log the effective configuration (secrets omitted).
    pub fn log(&self) {
        info!("Configuration:");
        info!("  HTTP_PORT: {}", self.http_port);
        info!("  METRICS_PORT: {}", self.metrics_port);
        info!("  LEDGER_STORE: {:?}", self.store);
        if self.store == StoreBackend::Redis {
            info!("  REDIS_URL: {}", self.redis_url);
        }
        match self.simulator_interval {
            Some(period) => info!("  SIMULATOR_INTERVAL: {:?}", period),
            None => info!("  SIMULATOR_INTERVAL: disabled"),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| GatewayError::Config(format!("invalid {}: {}", key, e))),
        None => Ok(default),
    }
}
