use parking_lot::RwLock;
use serde_json::{json, Value};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crate::{
    crypto::{self, Signer},
    types::{
        api_methods, is_always_allowed, GatewayDescriptor, GatewayResponse, RawResponseEnvelope,
        RequestEnvelope,
    },
    utils::{parse_hex_u64, random_hex, with_deadline},
};

use super::{
    attempts::{AttemptHistory, AttemptOutcome, AttemptRecord},
    errors::GatewayError,
    http_client::HttpClient,
    scoring::ScoreWeights,
};

/// Default deadline of a single gateway request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(15_000);

const REQUEST_ID_BYTES: usize = 8;

/// Lifecycle of a gateway client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientStatus {
    /// No endpoint URI.
    Unconfigured,
    /// Endpoint known, no successful status round trip yet.
    Prepared,
    /// A response time has been measured.
    Ready,
}

#[derive(Debug, Clone, Default)]
struct GatewayState {
    supported_apis: Vec<String>,
    health: u8,
    weight: f64,
    response_time: Option<Duration>,
    chain_id: Option<u64>,
}

/// Client of one DVote gateway.
///
/// Sends signed, replay-checked requests and keeps rolling health metrics that are
/// refreshed by [`GatewayClient::check_status`].
pub struct GatewayClient {
    uri: String,
    public_key: Option<String>,
    http_client: Arc<HttpClient>,
    weights: ScoreWeights,
    request_timeout: Duration,
    state: RwLock<GatewayState>,
    attempts: RwLock<AttemptHistory>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("uri", &self.uri)
            .field("public_key", &self.public_key)
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

impl GatewayClient {
    pub fn new(
        uri: impl Into<String>,
        supported_apis: Vec<String>,
        public_key: Option<String>,
        http_client: Arc<HttpClient>,
    ) -> Self {
        Self {
            uri: uri.into(),
            public_key: public_key.filter(|k| !k.is_empty()),
            http_client,
            weights: ScoreWeights::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            state: RwLock::new(GatewayState { supported_apis, ..GatewayState::default() }),
            attempts: RwLock::new(AttemptHistory::new()),
        }
    }

    pub fn from_descriptor(descriptor: &GatewayDescriptor, http_client: Arc<HttpClient>) -> Self {
        Self::new(
            descriptor.uri.clone(),
            descriptor.apis.clone(),
            descriptor.pub_key.clone(),
            http_client,
        )
    }

    #[must_use]
    pub fn with_weights(mut self, weights: ScoreWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Sets the deadline used when `send_request` is called without one.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    #[must_use]
    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    #[must_use]
    pub fn supported_apis(&self) -> Vec<String> {
        self.state.read().supported_apis.clone()
    }

    /// Health reported by the last successful `getInfo`, `0..=100`.
    #[must_use]
    pub fn health(&self) -> u8 {
        self.state.read().health
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
    pub fn chain_id(&self) -> Option<u64> {
        self.state.read().chain_id
    }

    #[must_use]
    pub fn status(&self) -> ClientStatus {
        if self.uri.is_empty() {
            ClientStatus::Unconfigured
        } else if self.state.read().response_time.is_none() {
            ClientStatus::Prepared
        } else {
            ClientStatus::Ready
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status() == ClientStatus::Ready
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

    /// Whether this gateway can serve `method`.
    ///
    /// Info and raw methods are always available; anything else must be declared by one of
    /// the supported APIs.
    #[must_use]
    pub fn supports_method(&self, method: &str) -> bool {
        if is_always_allowed(method) {
            return true;
        }
        self.state
            .read()
            .supported_apis
            .iter()
            .filter_map(|api| api_methods(api))
            .any(|methods| methods.contains(&method))
    }

    /// Sends a request and returns the validated response.
    ///
    /// `body` must be an object carrying a `method`. A `timestamp` is injected when absent.
    /// The request is signed when a signer is given.
    pub async fn send_request(
        &self,
        body: Value,
        signer: Option<&dyn Signer>,
        timeout: Option<Duration>,
    ) -> Result<GatewayResponse, GatewayError> {
        let timeout = timeout.unwrap_or(self.request_timeout);
        let result = self.exchange(body, signer, timeout).await;
        self.record_attempt(None, &result);
        result
    }

    /// Sends `getInfo` and refreshes health, response time, weight and supported APIs.
    ///
    /// Metrics are only replaced on success.
    pub async fn check_status(&self, timeout: Duration) -> Result<(), GatewayError> {
        self.check_status_in_round(timeout, None).await
    }

    /// Boolean form of [`GatewayClient::check_status`].
    pub async fn is_up(&self, timeout: Duration) -> bool {
        self.check_status(timeout).await.is_ok()
    }

    pub(crate) async fn check_status_in_round(
        &self,
        timeout: Duration,
        round: Option<u32>,
    ) -> Result<(), GatewayError> {
        let start = Instant::now();
        let result = self
            .exchange(json!({ "method": "getInfo" }), None, timeout)
            .await
            .and_then(|response| self.apply_info(&response, start.elapsed(), timeout));

        if let Err(e) = &result {
            tracing::debug!(uri = %self.uri, error = %e, "gateway status check failed");
        }
        self.record_attempt(round, &result);
        result
    }

    fn apply_info(
        &self,
        response: &GatewayResponse,
        elapsed: Duration,
        timeout: Duration,
    ) -> Result<(), GatewayError> {
        let apis = response
            .field("apiList")
            .and_then(Value::as_array)
            .ok_or_else(|| GatewayError::InvalidResponse("getInfo without apiList".to_string()))?
            .iter()
            .filter_map(|api| api.as_str().map(str::to_string))
            .collect::<Vec<_>>();

        let health = response
            .field("health")
            .and_then(Value::as_f64)
            .ok_or_else(|| GatewayError::InvalidResponse("getInfo without health".to_string()))?
            .clamp(0.0, 100.0);

        let chain_id = response.field("chainId").and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => parse_hex_u64(s).or_else(|| s.parse().ok()),
            _ => None,
        });

        let weight = self.weights.score(elapsed, timeout, health);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let health_byte = health.round() as u8;

        {
            let mut state = self.state.write();
            state.supported_apis = apis;
            state.health = health_byte;
            state.weight = weight;
            state.response_time = Some(elapsed);
            if chain_id.is_some() {
                state.chain_id = chain_id;
            }
        }

        tracing::debug!(
            uri = %self.uri,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            health = health,
            weight = weight,
            "gateway status updated"
        );
        Ok(())
    }

    async fn exchange(
        &self,
        body: Value,
        signer: Option<&dyn Signer>,
        timeout: Duration,
    ) -> Result<GatewayResponse, GatewayError> {
        if self.status() == ClientStatus::Unconfigured {
            return Err(GatewayError::NotReady);
        }

        let Value::Object(mut fields) = body else {
            return Err(GatewayError::InvalidRequest("request body must be an object".to_string()));
        };
        let method = fields
            .get("method")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| GatewayError::InvalidRequest("request has no method".to_string()))?
            .to_string();

        if !self.supports_method(&method) {
            return Err(GatewayError::UnsupportedMethod(method));
        }

        fields
            .entry("timestamp")
            .or_insert_with(|| Value::from(chrono::Utc::now().timestamp()));

        let id = random_hex(REQUEST_ID_BYTES);
        let request = crypto::canonicalize(&Value::Object(fields));
        let signature = match signer {
            Some(signer) => Some(crypto::sign(&request, Some(signer))?),
            None => None,
        };

        let envelope = RequestEnvelope { id: id.clone(), request, signature };
        let payload = serde_json::to_vec(&envelope)
            .map_err(|e| GatewayError::InvalidRequest(format!("failed to encode request: {e}")))?;

        tracing::trace!(uri = %self.uri, method = %method, id = %id, "sending gateway request");

        let bytes = with_deadline(timeout, self.http_client.post(&self.uri, payload.into(), timeout))
            .await
            .map_err(|_| GatewayError::Timeout)??;

        self.validate_response(&id, &bytes)
    }

    /// Checks the response envelope against the generated request id and the pinned key.
    fn validate_response(&self, id: &str, bytes: &[u8]) -> Result<GatewayResponse, GatewayError> {
        let envelope: RawResponseEnvelope<'_> = serde_json::from_slice(bytes)
            .map_err(|e| GatewayError::InvalidResponse(format!("malformed envelope: {e}")))?;

        let raw = envelope
            .response
            .ok_or_else(|| GatewayError::InvalidResponse("missing response field".to_string()))?;

        let response: GatewayResponse = serde_json::from_str(raw.get())
            .map_err(|e| GatewayError::InvalidResponse(format!("malformed response: {e}")))?;

        if response.request != id {
            return Err(GatewayError::RequestIdMismatch {
                expected: id.to_string(),
                received: response.request.clone(),
            });
        }
        if let Some(envelope_id) = envelope.id.as_deref().filter(|i| !i.is_empty()) {
            if envelope_id != id {
                return Err(GatewayError::RequestIdMismatch {
                    expected: id.to_string(),
                    received: envelope_id.to_string(),
                });
            }
        }

        if self.public_key.is_some() &&
            !crypto::verify(
                envelope.signature.as_deref(),
                self.public_key.as_deref(),
                raw.get().as_bytes(),
            )
        {
            tracing::warn!(uri = %self.uri, "gateway response signature mismatch");
            return Err(GatewayError::BadSignature);
        }

        if !response.ok {
            return Err(GatewayError::rejected(response.message.as_deref()));
        }

        Ok(response)
    }

    fn record_attempt<T>(&self, round: Option<u32>, result: &Result<T, GatewayError>) {
        let outcome = match result {
            Ok(_) => AttemptOutcome::Succeeded,
            Err(e) if e.is_timeout() => AttemptOutcome::TimedOut,
            Err(_) => AttemptOutcome::Failed,
        };
        self.attempts.write().record(round, outcome);
    }
}
