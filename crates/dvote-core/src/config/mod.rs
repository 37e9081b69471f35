//! Client configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: `Default` implementations and builder defaults
//! 2. **Config file**: TOML file named by the `DVOTE_CONFIG` env var
//! 3. **Environment variables**: `DVOTE__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`DiscoveryConfig`]: network, bootnodes and discovery tuning
//! - [`GatewayConfig`]: request deadline and score weights
//! - [`HttpClientConfig`]: shared HTTP client concurrency
//! - [`LoggingConfig`]: log level and format
//!
//! # Example
//!
//! ```toml
//! [discovery]
//! network_id = "goerli"
//! bootnodes = "https://bootnodes.vocdoni.net/gateways.json"
//! number_of_gateways = 2
//! timeout_ms = 2500
//!
//! [gateway]
//! request_timeout_ms = 15000
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

use crate::gateway::{
    bootnodes::BootnodeSource,
    discovery::{DiscoveryOptions, DiscoveryParams, DEFAULT_PARALLELISM, DEFAULT_ROUND_MULTIPLIERS},
    dvote::DEFAULT_REQUEST_TIMEOUT,
    http_client::HttpClientConfig,
    scoring::ScoreWeights,
};

/// Discovery parameters and tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Network whose gateways are discovered (e.g. `"goerli"`, `"xdai"`).
    pub network_id: String,

    /// `prod`, `stg` or `dev`. Defaults to `prod`.
    pub environment: Option<String>,

    /// Mirror URI, list of mirror URIs, or an inline bootnode document.
    pub bootnodes: Option<BootnodeSource>,

    /// Minimum number of working gateways. Defaults to `2`.
    pub number_of_gateways: Option<i64>,

    /// Base round timeout in milliseconds. Defaults to `2500`.
    pub timeout_ms: Option<i64>,

    pub resolve_names: bool,

    pub archive_pointer: Option<String>,

    /// Candidates checked concurrently per list and batch. Defaults to `2`.
    pub parallelism: usize,

    /// Round timeouts as multiples of the base timeout. Defaults to `[1, 2, 4, 16]`.
    pub round_multipliers: Vec<u32>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            network_id: String::new(),
            environment: None,
            bootnodes: None,
            number_of_gateways: None,
            timeout_ms: None,
            resolve_names: false,
            archive_pointer: None,
            parallelism: DEFAULT_PARALLELISM,
            round_multipliers: DEFAULT_ROUND_MULTIPLIERS.to_vec(),
        }
    }
}

/// Settings of requests sent to gateways.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Request deadline in milliseconds when the caller passes none. Defaults to `15000`.
    pub request_timeout_ms: u64,

    pub weights: ScoreWeights,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: u64::try_from(DEFAULT_REQUEST_TIMEOUT.as_millis())
                .unwrap_or(u64::MAX),
            weights: ScoreWeights::default(),
        }
    }
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub discovery: DiscoveryConfig,
    pub gateway: GatewayConfig,
    pub http: HttpClientConfig,
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `DVOTE__` prefix override any value, with `__`
    /// separating nested fields (e.g., `DVOTE__DISCOVERY__NETWORK_ID=xdai`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be parsed or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("discovery.parallelism", 2)?
            .set_default("gateway.request_timeout_ms", 15_000)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("DVOTE").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/dvote.toml`, or the file named by `DVOTE_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("DVOTE_CONFIG").unwrap_or_else(|_| "config/dvote.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Validates values that deserialization alone cannot reject.
    ///
    /// Discovery parameters themselves are checked by [`DiscoveryParams::validate`] when a
    /// run starts.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.discovery.parallelism == 0 {
            return Err("Discovery parallelism must be greater than 0".to_string());
        }

        if self.discovery.round_multipliers.is_empty() {
            return Err("At least one discovery round multiplier is required".to_string());
        }

        if self.discovery.round_multipliers.contains(&0) {
            return Err("Discovery round multipliers must be greater than 0".to_string());
        }

        if self.gateway.request_timeout_ms == 0 {
            return Err("Gateway request timeout must be greater than 0".to_string());
        }

        if !self.gateway.weights.is_valid() {
            return Err("Score weights must be finite, non-negative and not all zero".to_string());
        }

        if self.http.concurrent_limit == 0 {
            return Err("HTTP concurrent limit must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway.request_timeout_ms)
    }

    /// Discovery parameters taken from the `discovery` section.
    #[must_use]
    pub fn discovery_params(&self) -> DiscoveryParams {
        let discovery = &self.discovery;
        DiscoveryParams {
            network_id: discovery.network_id.clone(),
            environment: discovery.environment.clone(),
            bootnodes: discovery.bootnodes.clone(),
            number_of_gateways: discovery.number_of_gateways,
            timeout_ms: discovery.timeout_ms,
            resolve_names: discovery.resolve_names,
            archive_pointer: discovery.archive_pointer.clone(),
        }
    }

    #[must_use]
    pub fn discovery_options(&self) -> DiscoveryOptions {
        DiscoveryOptions {
            parallelism: self.discovery.parallelism,
            round_multipliers: self.discovery.round_multipliers.clone(),
            weights: self.gateway.weights,
            request_timeout: self.request_timeout(),
        }
    }
}
