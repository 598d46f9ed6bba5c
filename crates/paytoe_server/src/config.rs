//! Server configuration.
//!
//! Values come from an optional TOML file, then environment variables
//! (a `.env` file is loaded by the binary) override individual keys.

use crate::payment::{Network, is_evm_address, usdc_to_atomic};
use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Longest accepted session lifetime: one day.
pub const MAX_SESSION_TTL_SECS: u64 = 86_400;

/// Configuration for the paytoe HTTP server.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    host: String,
    /// Port to bind.
    port: u16,
    /// Base URL of the x402 facilitator (verify/settle/supported).
    facilitator_url: String,
    /// Wallet that receives payments.
    pay_to: String,
    /// Settlement network.
    network: Network,
    /// Price per game in USDC, as a decimal string.
    price_usdc: String,
    /// Public URL of the paid resource, echoed in payment requirements.
    resource_url: String,
    /// Human description of the paid resource.
    resource_description: String,
    /// Lifetime of a game session.
    session_ttl_secs: u64,
    /// Period of the expired-session sweep.
    sweep_interval_secs: u64,
    /// Upper bound on each facilitator call.
    facilitator_timeout_secs: u64,
    /// Probability that the opponent plays its greedy line.
    optimal_move_probability: f64,
    /// Browser origins allowed by CORS.
    allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            facilitator_url: "https://x402.org/facilitator".to_string(),
            pay_to: ZERO_ADDRESS.to_string(),
            network: Network::BaseSepolia,
            price_usdc: "0.01".to_string(),
            resource_url: "http://localhost:3001/api/session/start".to_string(),
            resource_description: "One game of tic-tac-toe".to_string(),
            session_ttl_secs: 300,
            sweep_interval_secs: 60,
            facilitator_timeout_secs: 10,
            optimal_move_probability: paytoe_tictactoe::DEFAULT_OPTIMAL_PROBABILITY,
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        info!(port = config.port, network = %config.network, "Config file loaded");
        Ok(config)
    }

    /// Loads the file (if any), applies process environment overrides, validates.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from a key lookup (normally the environment).
    #[instrument(skip(self, lookup))]
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        override_parsed(&lookup, "HOST", &mut self.host)?;
        override_parsed(&lookup, "PORT", &mut self.port)?;
        override_parsed(&lookup, "FACILITATOR_URL", &mut self.facilitator_url)?;
        override_parsed(&lookup, "PAYMENT_ADDRESS", &mut self.pay_to)?;
        override_parsed(&lookup, "NETWORK", &mut self.network)?;
        override_parsed(&lookup, "PRICE_USDC", &mut self.price_usdc)?;
        override_parsed(&lookup, "RESOURCE_URL", &mut self.resource_url)?;
        override_parsed(&lookup, "RESOURCE_DESCRIPTION", &mut self.resource_description)?;
        override_parsed(&lookup, "SESSION_TTL_SECS", &mut self.session_ttl_secs)?;
        override_parsed(&lookup, "SWEEP_INTERVAL_SECS", &mut self.sweep_interval_secs)?;
        override_parsed(
            &lookup,
            "FACILITATOR_TIMEOUT_SECS",
            &mut self.facilitator_timeout_secs,
        )?;
        override_parsed(
            &lookup,
            "OPTIMAL_MOVE_PROBABILITY",
            &mut self.optimal_move_probability,
        )?;
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        Ok(())
    }

    /// Rejects settings the server cannot run with.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_evm_address(&self.pay_to) {
            return Err(ConfigError::new(format!(
                "PAYMENT_ADDRESS is not an EVM address: {}",
                self.pay_to
            )));
        }
        if self.pay_to.eq_ignore_ascii_case(ZERO_ADDRESS) {
            warn!("PAYMENT_ADDRESS is the zero address; payments would be burned");
        }
        match self.price_atomic() {
            Some(0) | None => {
                return Err(ConfigError::new(format!(
                    "PRICE_USDC must be a positive amount with at most 6 decimals: {}",
                    self.price_usdc
                )));
            }
            Some(_) => {}
        }
        if self.session_ttl_secs == 0 || self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(ConfigError::new(format!(
                "SESSION_TTL_SECS must be between 1 and {}: {}",
                MAX_SESSION_TTL_SECS, self.session_ttl_secs
            )));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::new("SWEEP_INTERVAL_SECS must be > 0".to_string()));
        }
        if self.facilitator_timeout_secs == 0 {
            return Err(ConfigError::new(
                "FACILITATOR_TIMEOUT_SECS must be > 0".to_string(),
            ));
        }
        if self.facilitator_url.trim().is_empty() {
            return Err(ConfigError::new("FACILITATOR_URL is empty".to_string()));
        }
        if self.allowed_origins.is_empty() {
            warn!("ALLOWED_ORIGINS is empty; browsers will be blocked by CORS");
        }
        Ok(())
    }

    /// Price in USDC atomic units (6 decimals).
    pub fn price_atomic(&self) -> Option<u128> {
        usdc_to_atomic(&self.price_usdc)
    }

    /// Session lifetime.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Sweep period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Per-call facilitator timeout.
    pub fn facilitator_timeout(&self) -> Duration {
        Duration::from_secs(self.facilitator_timeout_secs)
    }

    /// Returns a copy bound to another address.
    pub fn with_bind(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }
}

fn override_parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    field: &mut T,
) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *field = raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::new(format!("Invalid {}={:?}: {}", key, raw, e)))?;
        debug!(key, "Config overridden from environment");
    }
    Ok(())
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
