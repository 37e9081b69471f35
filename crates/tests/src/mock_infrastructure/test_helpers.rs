//! Test Helper Functions and Utilities

use std::sync::Arc;

use dvote_core::gateway::{ChainClient, GatewayClient, GatewayPair, HttpClient};

/// Shared HTTP client with default settings.
#[must_use]
pub fn http_client() -> Arc<HttpClient> {
    Arc::new(HttpClient::new().expect("http client"))
}

/// Gateway client for `uri` serving `apis`, optionally pinned to `public_key`.
#[must_use]
pub fn gateway_client(
    uri: &str,
    apis: &[&str],
    public_key: Option<String>,
    http: &Arc<HttpClient>,
) -> Arc<GatewayClient> {
    Arc::new(GatewayClient::new(
        uri,
        apis.iter().map(|api| (*api).to_string()).collect(),
        public_key,
        Arc::clone(http),
    ))
}

/// Pair of a gateway client and a chain client that is never contacted.
#[must_use]
pub fn pair(dvote: Arc<GatewayClient>, http: &Arc<HttpClient>) -> GatewayPair {
    GatewayPair { dvote, web3: Arc::new(ChainClient::new("http://127.0.0.1:1", Arc::clone(http))) }
}
