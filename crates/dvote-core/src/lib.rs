//! # DVote Core
//!
//! Client library for DVote gateways.
//!
//! - **[`gateway`]**: bootnode retrieval, gateway and chain health checks, discovery rounds,
//!   ranking and pairing, and a failover pool over the discovered pairs.
//!
//! - **[`crypto`]**: canonical JSON, Ethereum personal-message signatures and recovery.
//!
//! - **[`config`]**: layered configuration (defaults, TOML file, `DVOTE__*` env vars).
//!
//! - **[`logging`]**: `tracing` subscriber setup.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dvote_core::gateway::{DiscoveryParams, GatewayDiscovery, GatewayPool, HttpClient};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let http = Arc::new(HttpClient::new()?);
//! let params = DiscoveryParams::new("goerli", "https://bootnodes.vocdoni.net/gateways.json");
//! let pool = GatewayPool::discover(GatewayDiscovery::new(http), params).await?;
//! let info = pool.send_request(serde_json::json!({ "method": "getInfo" }), None, None).await?;
//! println!("{:?}", info.field("apiList"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod gateway;
pub mod logging;
pub mod types;
pub mod utils;
