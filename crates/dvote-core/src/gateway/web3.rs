use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crate::{
    types::{ChainDescriptor, Environment, JsonRpcRequest, JsonRpcResponse},
    utils::{parse_hex_u64, with_deadline},
};

use super::{
    attempts::{AttemptHistory, AttemptOutcome, AttemptRecord},
    ens,
    errors::GatewayError,
    http_client::HttpClient,
    scoring::ScoreWeights,
};

/// Nodes with fewer peers are not trusted to be on the canonical chain.
pub const MIN_PEER_COUNT: u64 = 5;

/// Score quality used when a node does not report its peer count.
const UNKNOWN_PEERS_QUALITY: f64 = 50.0;

const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(10);

/// The blockchain calls discovery and contract resolution need.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn peer_count(&self) -> Result<u64, GatewayError>;

    async fn is_syncing(&self) -> Result<bool, GatewayError>;

    async fn block_number(&self) -> Result<u64, GatewayError>;

    /// Resolves an ENS name to a `0x` address, `None` when the name is not set.
    async fn resolve_name(&self, name: &str) -> Result<Option<String>, GatewayError>;
}

/// [`ChainRpc`] over HTTP JSON-RPC.
pub struct JsonRpcChain {
    uri: String,
    http_client: Arc<HttpClient>,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl JsonRpcChain {
    pub fn new(uri: impl Into<String>, http_client: Arc<HttpClient>) -> Self {
        Self {
            uri: uri.into(),
            http_client,
            request_timeout: DEFAULT_RPC_TIMEOUT,
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Performs one JSON-RPC call and returns its `result`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, GatewayError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, params, Value::from(id));
        let body = serde_json::to_vec(&request)
            .map_err(|e| GatewayError::InvalidRequest(format!("failed to encode request: {e}")))?;

        let bytes = self.http_client.post(&self.uri, body.into(), self.request_timeout).await?;

        let response: JsonRpcResponse = serde_json::from_slice(&bytes)
            .map_err(|e| GatewayError::InvalidResponse(format!("malformed JSON-RPC response: {e}")))?;

        if let Some(error) = response.error {
            tracing::debug!(uri = %self.uri, method = method, code = error.code, "chain rpc error");
            return Err(GatewayError::RpcError(error.code, error.message));
        }
        response
            .result
            .ok_or_else(|| GatewayError::InvalidResponse(format!("{method} returned no result")))
    }

    async fn call_quantity(&self, method: &str) -> Result<u64, GatewayError> {
        let result = self.call(method, json!([])).await?;
        result
            .as_str()
            .and_then(parse_hex_u64)
            .or_else(|| result.as_u64())
            .ok_or_else(|| GatewayError::InvalidResponse(format!("{method} returned {result}")))
    }

    async fn eth_call(&self, to: &str, data: &str) -> Result<Option<String>, GatewayError> {
        let result = self.call("eth_call", json!([{ "to": to, "data": data }, "latest"])).await?;
        Ok(result.as_str().and_then(ens::decode_address))
    }
}

#[async_trait]
impl ChainRpc for JsonRpcChain {
    async fn peer_count(&self) -> Result<u64, GatewayError> {
        self.call_quantity("net_peerCount").await
    }

    async fn is_syncing(&self) -> Result<bool, GatewayError> {
        // `false` when in sync, a progress object otherwise
        let result = self.call("eth_syncing", json!([])).await?;
        Ok(!matches!(result, Value::Bool(false) | Value::Null))
    }

    async fn block_number(&self) -> Result<u64, GatewayError> {
        self.call_quantity("eth_blockNumber").await
    }

    async fn resolve_name(&self, name: &str) -> Result<Option<String>, GatewayError> {
        let node = ens::namehash(name);
        let Some(resolver) = self.eth_call(ens::ENS_REGISTRY, &ens::resolver_call_data(&node)).await?
        else {
            return Ok(None);
        };
        self.eth_call(&resolver, &ens::addr_call_data(&node)).await
    }
}

/// Voting contracts located through ENS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractKind {
    EntityResolver,
    Genesis,
    Namespaces,
    Processes,
    Results,
    TokenStorageProof,
}

impl ContractKind {
    pub const ALL: [Self; 6] = [
        Self::EntityResolver,
        Self::Genesis,
        Self::Namespaces,
        Self::Processes,
        Self::Results,
        Self::TokenStorageProof,
    ];

    fn label(self) -> &'static str {
        match self {
            Self::EntityResolver => "entities",
            Self::Genesis => "genesis",
            Self::Namespaces => "namespaces",
            Self::Processes => "processes",
            Self::Results => "results",
            Self::TokenStorageProof => "erc20.proofs",
        }
    }

    /// ENS name of the contract in `env`, e.g. `entities.stg.vocdoni.eth`.
    #[must_use]
    pub fn ens_name(self, env: Environment) -> String {
        match env {
            Environment::Prod => format!("{}.vocdoni.eth", self.label()),
            other => format!("{}.{}.vocdoni.eth", self.label(), other.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ChainState {
    environment: Environment,
    contracts: HashMap<ContractKind, String>,
    last_block: Option<u64>,
    peer_count: Option<u64>,
    weight: f64,
    response_time: Option<Duration>,
    archive_pointer: Option<String>,
}

/// Client of one blockchain endpoint.
pub struct ChainClient {
    uri: String,
    rpc: Arc<dyn ChainRpc>,
    weights: ScoreWeights,
    min_peers: u64,
    state: RwLock<ChainState>,
    attempts: RwLock<AttemptHistory>,
}

impl fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainClient")
            .field("uri", &self.uri)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

impl ChainClient {
    /// Creates a client speaking JSON-RPC to `uri`.
    pub fn new(uri: impl Into<String>, http_client: Arc<HttpClient>) -> Self {
        let uri = uri.into();
        let rpc = Arc::new(JsonRpcChain::new(uri.clone(), http_client));
        Self::with_rpc(uri, rpc)
    }

    /// Creates a client over any [`ChainRpc`] implementation.
    pub fn with_rpc(uri: impl Into<String>, rpc: Arc<dyn ChainRpc>) -> Self {
        Self {
            uri: uri.into(),
            rpc,
            weights: ScoreWeights::default(),
            min_peers: MIN_PEER_COUNT,
            state: RwLock::new(ChainState::default()),
            attempts: RwLock::new(AttemptHistory::new()),
        }
    }

    pub fn from_descriptor(descriptor: &ChainDescriptor, http_client: Arc<HttpClient>) -> Self {
        Self::new(descriptor.uri.clone(), http_client)
    }

    #[must_use]
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub fn with_environment(self, environment: Environment) -> Self {
        self.state.write().environment = environment;
        self
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn rpc(&self) -> Arc<dyn ChainRpc> {
        Arc::clone(&self.rpc)
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.state.read().environment
    }

    /// Switches environment. Resolved contract addresses are dropped when it changes.
    pub fn set_environment(&self, environment: Environment) {
        let mut state = self.state.write();
        if state.environment != environment {
            state.environment = environment;
            state.contracts.clear();
        }
    }

    #[must_use]
    pub fn last_block_number(&self) -> Option<u64> {
        self.state.read().last_block
    }

    #[must_use]
    pub fn peer_count(&self) -> Option<u64> {
        self.state.read().peer_count
    }

    #[must_use]
    pub fn weight(&self) -> f64 {
        self.state.read().weight
    }

    #[must_use]
    pub fn response_time(&self) -> Option<Duration> {
        self.state.read().response_time
    }

    #[must_use]
    pub fn archive_pointer(&self) -> Option<String> {
        self.state.read().archive_pointer.clone()
    }

    pub fn set_archive_pointer(&self, pointer: Option<String>) {
        self.state.write().archive_pointer = pointer;
    }

    #[must_use]
    pub fn contract_address(&self, kind: ContractKind) -> Option<String> {
        self.state.read().contracts.get(&kind).cloned()
    }

    #[must_use]
    pub fn timed_out_last_request(&self) -> bool {
        self.attempts.read().timed_out_last()
    }

    #[must_use]
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.attempts.read().iter().cloned().collect()
    }

    pub(crate) fn attempt_history(&self) -> AttemptHistory {
        self.attempts.read().clone()
    }

    /// Returns the address of `kind`, resolving it through ENS on first use.
    pub async fn resolve_contract(&self, kind: ContractKind) -> Result<Option<String>, GatewayError> {
        let environment = {
            let state = self.state.read();
            if let Some(address) = state.contracts.get(&kind) {
                return Ok(Some(address.clone()));
            }
            state.environment
        };

        let resolved = self.rpc.resolve_name(&kind.ens_name(environment)).await?;

        if let Some(address) = &resolved {
            let mut state = self.state.write();
            // The environment may have been switched while resolving.
            if state.environment == environment {
                state.contracts.insert(kind, address.clone());
            }
        }
        Ok(resolved)
    }

    /// Resolves every known contract and returns how many have an address.
    pub async fn resolve_all_contracts(&self) -> Result<usize, GatewayError> {
        let mut resolved = 0;
        for kind in ContractKind::ALL {
            if self.resolve_contract(kind).await?.is_some() {
                resolved += 1;
            }
        }
        Ok(resolved)
    }

    /// Checks the node and refreshes peer count, block number and weight.
    ///
    /// Fails with [`GatewayError::Unhealthy`] when the node reports fewer than
    /// [`MIN_PEER_COUNT`] peers, is syncing, or, with `resolve_names`, cannot resolve the
    /// entity resolver address. A node that does not report its peer count is not filtered
    /// on peers.
    pub async fn check_status(&self, timeout: Duration, resolve_names: bool) -> Result<(), GatewayError> {
        self.check_status_in_round(timeout, resolve_names, None).await
    }

    pub async fn is_up(&self, timeout: Duration, resolve_names: bool) -> bool {
        self.check_status(timeout, resolve_names).await.is_ok()
    }

    pub(crate) async fn check_status_in_round(
        &self,
        timeout: Duration,
        resolve_names: bool,
        round: Option<u32>,
    ) -> Result<(), GatewayError> {
        let result = with_deadline(timeout, self.inspect(timeout, resolve_names))
            .await
            .unwrap_or(Err(GatewayError::Timeout));

        if let Err(e) = &result {
            tracing::debug!(uri = %self.uri, error = %e, "chain status check failed");
        }

        let outcome = match &result {
            Ok(()) => AttemptOutcome::Succeeded,
            Err(e) if e.is_timeout() => AttemptOutcome::TimedOut,
            Err(_) => AttemptOutcome::Failed,
        };
        self.attempts.write().record(round, outcome);
        result
    }

    async fn inspect(&self, timeout: Duration, resolve_names: bool) -> Result<(), GatewayError> {
        let start = Instant::now();

        let peers = match self.rpc.peer_count().await {
            Ok(peers) => Some(peers),
            // nodes that do not expose `net_*` have an unknown peer count
            Err(GatewayError::RpcError(code, message)) => {
                tracing::trace!(uri = %self.uri, code = code, message = %message, "peer count unavailable");
                None
            }
            Err(e) => return Err(e),
        };
        if let Some(peers) = peers.filter(|p| *p < self.min_peers) {
            return Err(GatewayError::Unhealthy(format!(
                "peer count {peers} below {}",
                self.min_peers
            )));
        }
        if self.rpc.is_syncing().await? {
            return Err(GatewayError::Unhealthy("node is syncing".to_string()));
        }
        let block = self.rpc.block_number().await?;
        let elapsed = start.elapsed();

        if resolve_names && self.resolve_contract(ContractKind::EntityResolver).await?.is_none() {
            return Err(GatewayError::Unhealthy(
                "entity resolver address could not be resolved".to_string(),
            ));
        }

        #[allow(clippy::cast_precision_loss)]
        let quality = peers.map_or(UNKNOWN_PEERS_QUALITY, |p| p.min(100) as f64);
        let weight = self.weights.score(elapsed, timeout, quality);

        {
            let mut state = self.state.write();
            state.peer_count = peers;
            state.last_block = Some(block);
            state.weight = weight;
            state.response_time = Some(elapsed);
        }

        tracing::debug!(
            uri = %self.uri,
            peers = ?peers,
            block = block,
            weight = weight,
            "chain status updated"
        );
        Ok(())
    }
}
