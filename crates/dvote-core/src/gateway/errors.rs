use thiserror::Error;

use crate::crypto::SignerError;

/// Rejections of discovery parameters. Raised before any network I/O and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValidationError {
    #[error("invalid network id")]
    InvalidNetworkId,

    /// The environment is not one of `prod`, `stg`, `dev`.
    #[error("invalid environment: {0}")]
    InvalidEnvironment(String),

    #[error("invalid bootnode source")]
    InvalidBootnodeSource,

    /// The requested minimum number of gateways is zero or negative.
    #[error("invalid number of gateways: {0}")]
    InvalidGatewayCount(i64),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(i64),
}

/// Errors from a single exchange with a gateway or chain endpoint.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    /// The request exceeded its deadline. The client records a timed-out attempt.
    #[error("request timeout")]
    Timeout,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Non-2xx HTTP status.
    #[error("HTTP error {0}: {1}")]
    HttpError(u16, String),

    /// The response could not be parsed or lacks mandatory fields.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// JSON-RPC error returned by a chain endpoint.
    #[error("RPC error {0}: {1}")]
    RpcError(i32, String),

    /// The client has no URI or API list yet.
    #[error("client not ready")]
    NotReady,

    #[error("method not supported by gateway: {0}")]
    UnsupportedMethod(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no signer available")]
    SigningUnavailable,

    #[error("signing failed: {0}")]
    Signing(String),

    /// The response echoes a different request id.
    #[error("request id mismatch: expected {expected}, received {received}")]
    RequestIdMismatch { expected: String, received: String },

    /// The response signature does not match the gateway's public key.
    #[error("the signature of the response does not match the gateway public key")]
    BadSignature,

    /// The gateway answered with `ok: false`.
    #[error("{0}")]
    Rejected(String),

    /// A chain endpoint failed the acceptance filter.
    #[error("endpoint unhealthy: {0}")]
    Unhealthy(String),

    #[error("concurrency limit reached: {0}")]
    ConcurrencyLimit(String),
}

impl GatewayError {
    pub(crate) const GENERIC_REJECTION: &'static str = "gateway request failed";

    /// Builds a [`GatewayError::Rejected`] from the optional gateway message.
    #[must_use]
    pub fn rejected(message: Option<&str>) -> Self {
        match message {
            Some(m) if !m.is_empty() => Self::Rejected(m.to_string()),
            _ => Self::Rejected(Self::GENERIC_REJECTION.to_string()),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` for failures that mean the response cannot be trusted.
    ///
    /// These are fatal for the request and must not be retried on another gateway.
    #[must_use]
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::RequestIdMismatch { .. } | Self::BadSignature)
    }

    /// Returns `true` if the same request may succeed later or on another endpoint.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::ConnectionFailed(_) | Self::ConcurrencyLimit(_) => true,
            Self::HttpError(status, _) => (500..=599).contains(status) || *status == 429,
            _ => false,
        }
    }
}

impl From<SignerError> for GatewayError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::Unavailable => Self::SigningUnavailable,
            other => Self::Signing(other.to_string()),
        }
    }
}

/// Errors from a discovery run.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DiscoveryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Every bootnode mirror failed or returned an unparseable document.
    #[error("could not fetch the bootnode document: {0}")]
    BootnodeFetch(String),

    #[error("bootnode document fetch timed out")]
    BootnodeTimeout,

    #[error("not enough gateways for the network: required {required}, available {available}")]
    NotEnoughGateways { required: usize, available: usize },

    #[error("none of the discovered gateways is ready")]
    NoReadyCandidates,

    /// All escalating rounds finished without meeting the minimums.
    #[error("could not find enough working gateways (dvote {dvote}, web3 {web3})")]
    Exhausted { dvote: usize, web3: usize },
}

impl DiscoveryError {
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
