use parking_lot::RwLock;
use serde_json::Value;
use std::time::Duration;

use crate::{crypto::Signer, types::GatewayResponse};

use super::{
    discovery::{DiscoveryParams, GatewayDiscovery, GatewayPair},
    errors::{DiscoveryError, GatewayError},
};

#[derive(Debug, Default)]
struct PoolState {
    pairs: Vec<GatewayPair>,
    active: usize,
}

/// Ranked gateway pairs with failover.
///
/// Requests go to the active pair. When its gateway times out, or does not serve the
/// method, the pool moves on to the next pair that does.
#[derive(Debug)]
pub struct GatewayPool {
    discovery: GatewayDiscovery,
    params: DiscoveryParams,
    max_retries: Option<usize>,
    state: RwLock<PoolState>,
}

impl GatewayPool {
    /// Runs discovery and keeps the resulting pairs.
    pub async fn discover(
        discovery: GatewayDiscovery,
        params: DiscoveryParams,
    ) -> Result<Self, DiscoveryError> {
        let pairs = discovery.run(&params).await?;
        Ok(Self::from_pairs(discovery, params, pairs))
    }

    /// Builds a pool over already discovered pairs.
    pub fn from_pairs(
        discovery: GatewayDiscovery,
        params: DiscoveryParams,
        pairs: Vec<GatewayPair>,
    ) -> Self {
        Self {
            discovery,
            params,
            max_retries: None,
            state: RwLock::new(PoolState { pairs, active: 0 }),
        }
    }

    /// Caps failovers per request. Defaults to the number of pairs.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().pairs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().pairs.is_empty()
    }

    #[must_use]
    pub fn pairs(&self) -> Vec<GatewayPair> {
        self.state.read().pairs.clone()
    }

    #[must_use]
    pub fn active(&self) -> Option<GatewayPair> {
        let state = self.state.read();
        state.pairs.get(state.active).cloned()
    }

    /// Makes the next pair active, wrapping around, and returns it.
    pub fn shift(&self) -> Option<GatewayPair> {
        let mut state = self.state.write();
        if state.pairs.is_empty() {
            return None;
        }
        state.active = (state.active + 1) % state.pairs.len();
        state.pairs.get(state.active).cloned()
    }

    /// Activates the first pair after the current one whose gateway serves `method`.
    fn shift_to_supporting(&self, method: &str) -> Option<GatewayPair> {
        let mut state = self.state.write();
        let len = state.pairs.len();
        let next = (1..=len)
            .map(|offset| (state.active + offset) % len)
            .find(|&idx| state.pairs[idx].dvote.supports_method(method))?;
        state.active = next;
        state.pairs.get(next).cloned()
    }

    /// Reruns discovery with the original parameters and replaces the pairs.
    pub async fn refresh(&self) -> Result<(), DiscoveryError> {
        let pairs = self.discovery.run(&self.params).await?;
        tracing::info!(pairs = pairs.len(), "gateway pool refreshed");
        let mut state = self.state.write();
        state.pairs = pairs;
        state.active = 0;
        Ok(())
    }

    /// Sends through the active gateway, failing over on timeouts and unsupported methods.
    ///
    /// Integrity failures and gateway rejections are returned as is.
    pub async fn send_request(
        &self,
        body: Value,
        signer: Option<&dyn Signer>,
        timeout: Option<Duration>,
    ) -> Result<GatewayResponse, GatewayError> {
        let method = body
            .get("method")
            .and_then(Value::as_str)
            .ok_or_else(|| GatewayError::InvalidRequest("request has no method".to_string()))?
            .to_string();

        let max_retries = self.max_retries.unwrap_or_else(|| self.len());
        let mut retries = 0;
        let mut pair = self.active().ok_or(GatewayError::NotReady)?;

        loop {
            if !pair.dvote.supports_method(&method) {
                pair = self
                    .shift_to_supporting(&method)
                    .ok_or_else(|| GatewayError::UnsupportedMethod(method.clone()))?;
            }

            match pair.dvote.send_request(body.clone(), signer, timeout).await {
                Err(e) if e.is_timeout() && retries < max_retries => {
                    retries += 1;
                    tracing::warn!(
                        uri = %pair.dvote.uri(),
                        method = %method,
                        retries = retries,
                        "gateway timed out, shifting to next gateway"
                    );
                    pair = self.shift().ok_or(GatewayError::NotReady)?;
                }
                result => return result,
            }
        }
    }
}
