//! Gateway discovery.
//!
//! Turns a bootnode document into a ranked list of working (gateway, chain endpoint) pairs:
//!
//! ```text
//! DiscoveryParams ──validate──► DiscoveryContext
//!        │
//!        ▼
//! BootnodeResolver::fetch ──► digest_network ──► dedup + shuffle
//!        │
//!        ▼
//! ┌───────────────── round r = 0..n, timeout = t * multiplier[r] ─────────────────┐
//! │  draw ≤ parallelism eligible candidates per list ──► concurrent status checks  │
//! │  repeat until no eligible candidate is left or both minimums are met           │
//! └────────────────────────────────────────────────────────────────────────────────┘
//!        │
//!        ▼
//! archive pointer ──► rank ──► pair_up ──► Vec<GatewayPair>
//! ```
//!
//! A candidate that times out stays eligible for the next, longer round. A candidate that
//! fails outright is dropped for the rest of the run.

use futures::future::join_all;
use serde::Deserialize;
use std::{sync::Arc, time::Duration};

use crate::{types::Environment, utils::shuffle};

use super::{
    attempts::is_eligible,
    bootnodes::{digest_network, BootnodeResolver, BootnodeSource},
    dvote::{GatewayClient, DEFAULT_REQUEST_TIMEOUT},
    errors::{DiscoveryError, ValidationError},
    http_client::HttpClient,
    ranking::{pair_up, rank_chain_nodes, sort_by_weight},
    scoring::ScoreWeights,
    web3::ChainClient,
};

/// Default per-round base timeout.
pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(2_500);

pub const DEFAULT_MIN_GATEWAYS: usize = 2;

pub const DEFAULT_PARALLELISM: usize = 2;

pub const DEFAULT_ROUND_MULTIPLIERS: [u32; 4] = [1, 2, 4, 16];

/// Caller-supplied discovery parameters, validated by [`DiscoveryParams::validate`].
///
/// Numeric fields are signed so that invalid negative input can be reported instead of
/// failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoveryParams {
    #[serde(default)]
    pub network_id: String,
    /// `prod`, `stg` or `dev`; `prod` when unset
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub bootnodes: Option<BootnodeSource>,
    /// Minimum number of working gateways
    #[serde(default)]
    pub number_of_gateways: Option<i64>,
    /// Base timeout of the first round in milliseconds; `0` selects the default
    #[serde(default)]
    pub timeout_ms: Option<i64>,
    /// Require chain endpoints to resolve the voting contracts through ENS
    #[serde(default)]
    pub resolve_names: bool,
    #[serde(default)]
    pub archive_pointer: Option<String>,
}

impl DiscoveryParams {
    pub fn new(network_id: impl Into<String>, bootnodes: impl Into<BootnodeSource>) -> Self {
        Self {
            network_id: network_id.into(),
            bootnodes: Some(bootnodes.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    #[must_use]
    pub fn with_number_of_gateways(mut self, count: i64) -> Self {
        self.number_of_gateways = Some(count);
        self
    }

    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: i64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn with_resolve_names(mut self, resolve_names: bool) -> Self {
        self.resolve_names = resolve_names;
        self
    }

    #[must_use]
    pub fn with_archive_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.archive_pointer = Some(pointer.into());
        self
    }

    /// Checks every parameter and produces the run-scoped context.
    pub fn validate(&self) -> Result<DiscoveryContext, ValidationError> {
        let network_id = self.network_id.trim();
        if network_id.is_empty() {
            return Err(ValidationError::InvalidNetworkId);
        }

        let environment = match self.environment.as_deref() {
            Some(env) => env.parse::<Environment>()?,
            None => Environment::default(),
        };

        let bootnodes = self.bootnodes.clone().ok_or(ValidationError::InvalidBootnodeSource)?;
        bootnodes.validate()?;

        let min_gateways = match self.number_of_gateways {
            None => DEFAULT_MIN_GATEWAYS,
            Some(n) if n <= 0 => return Err(ValidationError::InvalidGatewayCount(n)),
            Some(n) => usize::try_from(n).map_err(|_| ValidationError::InvalidGatewayCount(n))?,
        };

        let timeout = match self.timeout_ms {
            None | Some(0) => DEFAULT_DISCOVERY_TIMEOUT,
            Some(ms) if ms < 0 => return Err(ValidationError::InvalidTimeout(ms)),
            Some(ms) => Duration::from_millis(ms.unsigned_abs()),
        };

        Ok(DiscoveryContext {
            network_id: network_id.to_string(),
            environment,
            bootnodes,
            min_gateways,
            timeout,
            resolve_names: self.resolve_names,
            archive_pointer: self.archive_pointer.clone().filter(|p| !p.is_empty()),
        })
    }
}

/// Validated parameters of one discovery run.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryContext {
    pub network_id: String,
    pub environment: Environment,
    pub bootnodes: BootnodeSource,
    pub min_gateways: usize,
    pub timeout: Duration,
    pub resolve_names: bool,
    pub archive_pointer: Option<String>,
}

/// Tuning of the discovery algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOptions {
    /// Candidates checked concurrently per list and batch
    pub parallelism: usize,
    /// Round timeouts as multiples of the base timeout
    pub round_multipliers: Vec<u32>,
    pub weights: ScoreWeights,
    /// Default deadline of requests sent through the discovered gateways
    pub request_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            round_multipliers: DEFAULT_ROUND_MULTIPLIERS.to_vec(),
            weights: ScoreWeights::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// A gateway and the chain endpoint to use alongside it.
#[derive(Debug, Clone)]
pub struct GatewayPair {
    pub dvote: Arc<GatewayClient>,
    pub web3: Arc<ChainClient>,
}

/// Runs discovery against the network described by a bootnode document.
#[derive(Debug, Clone)]
pub struct GatewayDiscovery {
    http_client: Arc<HttpClient>,
    resolver: BootnodeResolver,
    options: DiscoveryOptions,
}

impl GatewayDiscovery {
    pub fn new(http_client: Arc<HttpClient>) -> Self {
        Self::with_options(http_client, DiscoveryOptions::default())
    }

    pub fn with_options(http_client: Arc<HttpClient>, options: DiscoveryOptions) -> Self {
        Self { resolver: BootnodeResolver::new(Arc::clone(&http_client)), http_client, options }
    }

    #[must_use]
    pub fn options(&self) -> &DiscoveryOptions {
        &self.options
    }

    /// Discovers, ranks and pairs working gateways.
    ///
    /// # Errors
    ///
    /// Parameter problems surface as [`DiscoveryError::Validation`] before any network I/O.
    pub async fn run(&self, params: &DiscoveryParams) -> Result<Vec<GatewayPair>, DiscoveryError> {
        let ctx = params.validate()?;

        tracing::info!(
            network = %ctx.network_id,
            environment = %ctx.environment,
            min_gateways = ctx.min_gateways,
            timeout_ms = u64::try_from(ctx.timeout.as_millis()).unwrap_or(u64::MAX),
            "starting gateway discovery"
        );

        let doc = self.resolver.fetch(&ctx.bootnodes, ctx.timeout).await?;
        let network = digest_network(&doc, &ctx.network_id);

        if network.dvote.len() < ctx.min_gateways {
            return Err(DiscoveryError::NotEnoughGateways {
                required: ctx.min_gateways,
                available: network.dvote.len(),
            });
        }

        let mut dvote: Vec<Arc<GatewayClient>> = network
            .dvote
            .iter()
            .map(|d| {
                Arc::new(
                    GatewayClient::from_descriptor(d, Arc::clone(&self.http_client))
                        .with_weights(self.options.weights)
                        .with_request_timeout(self.options.request_timeout),
                )
            })
            .collect();
        let mut web3: Vec<Arc<ChainClient>> = network
            .web3
            .iter()
            .map(|d| {
                Arc::new(
                    ChainClient::from_descriptor(d, Arc::clone(&self.http_client))
                        .with_weights(self.options.weights)
                        .with_environment(ctx.environment),
                )
            })
            .collect();
        shuffle(&mut dvote);
        shuffle(&mut web3);

        let (mut dvote, mut web3) = self.check_candidates(&ctx, &dvote, &web3).await?;

        if let Some(pointer) = &ctx.archive_pointer {
            for client in &web3 {
                client.set_archive_pointer(Some(pointer.clone()));
            }
        }

        rank_and_pair(&mut dvote, &mut web3)
    }

    /// Runs the escalating health-check rounds and returns the confirmed clients.
    pub async fn check_candidates(
        &self,
        ctx: &DiscoveryContext,
        dvote: &[Arc<GatewayClient>],
        web3: &[Arc<ChainClient>],
    ) -> Result<(Vec<Arc<GatewayClient>>, Vec<Arc<ChainClient>>), DiscoveryError> {
        let min_dvote = ctx.min_gateways;
        let min_web3 = ctx.min_gateways.min(web3.len()).max(1);
        let parallelism = self.options.parallelism.max(1);

        let mut dvote_confirmed = vec![false; dvote.len()];
        let mut web3_confirmed = vec![false; web3.len()];
        let mut dvote_ok: Vec<Arc<GatewayClient>> = Vec::new();
        let mut web3_ok: Vec<Arc<ChainClient>> = Vec::new();

        for (round, multiplier) in self.options.round_multipliers.iter().enumerate() {
            let round = u32::try_from(round).unwrap_or(u32::MAX);
            let round_timeout = ctx.timeout.saturating_mul(*multiplier);

            tracing::debug!(
                round = round,
                timeout_ms = u64::try_from(round_timeout.as_millis()).unwrap_or(u64::MAX),
                "discovery round started"
            );

            loop {
                let dvote_met = dvote_ok.len() >= min_dvote;
                let web3_met = web3_ok.len() >= min_web3;
                if dvote_met && web3_met {
                    break;
                }

                let dvote_batch: Vec<usize> = if dvote_met {
                    Vec::new()
                } else {
                    draw(dvote.len(), parallelism, |i| {
                        !dvote_confirmed[i] && is_eligible(&dvote[i].attempt_history(), round)
                    })
                };
                let web3_batch: Vec<usize> = if web3_met {
                    Vec::new()
                } else {
                    draw(web3.len(), parallelism, |i| {
                        !web3_confirmed[i] && is_eligible(&web3[i].attempt_history(), round)
                    })
                };

                if dvote_batch.is_empty() && web3_batch.is_empty() {
                    break;
                }

                let dvote_checks = join_all(
                    dvote_batch
                        .iter()
                        .map(|&i| dvote[i].check_status_in_round(round_timeout, Some(round))),
                );
                let web3_checks = join_all(web3_batch.iter().map(|&i| {
                    web3[i].check_status_in_round(round_timeout, ctx.resolve_names, Some(round))
                }));
                let (dvote_results, web3_results) = futures::join!(dvote_checks, web3_checks);

                for (i, result) in dvote_batch.into_iter().zip(dvote_results) {
                    if result.is_ok() {
                        dvote_confirmed[i] = true;
                        dvote_ok.push(Arc::clone(&dvote[i]));
                    }
                }
                for (i, result) in web3_batch.into_iter().zip(web3_results) {
                    if result.is_ok() {
                        web3_confirmed[i] = true;
                        web3_ok.push(Arc::clone(&web3[i]));
                    }
                }
            }

            if dvote_ok.len() >= min_dvote && web3_ok.len() >= min_web3 {
                tracing::info!(
                    round = round,
                    dvote = dvote_ok.len(),
                    web3 = web3_ok.len(),
                    "gateway discovery succeeded"
                );
                return Ok((dvote_ok, web3_ok));
            }
        }

        tracing::warn!(
            dvote = dvote_ok.len(),
            web3 = web3_ok.len(),
            "gateway discovery exhausted all rounds"
        );
        Err(DiscoveryError::Exhausted { dvote: dvote_ok.len(), web3: web3_ok.len() })
    }
}

/// Indices of the first `limit` candidates passing `eligible`.
fn draw<F>(len: usize, limit: usize, eligible: F) -> Vec<usize>
where
    F: Fn(usize) -> bool,
{
    (0..len).filter(|&i| eligible(i)).take(limit).collect()
}

/// Ranks confirmed clients and pairs them.
///
/// # Errors
///
/// [`DiscoveryError::NoReadyCandidates`] when no pair has a ready gateway.
pub fn rank_and_pair(
    dvote: &mut [Arc<GatewayClient>],
    web3: &mut [Arc<ChainClient>],
) -> Result<Vec<GatewayPair>, DiscoveryError> {
    sort_by_weight(dvote, |c| c.weight());
    rank_chain_nodes(web3, |c| c.last_block_number(), |c| c.weight());

    let pairs: Vec<GatewayPair> = pair_up(dvote, web3)
        .into_iter()
        .map(|(dvote, web3)| GatewayPair { dvote, web3 })
        .collect();

    if !pairs.iter().any(|p| p.dvote.is_ready()) {
        return Err(DiscoveryError::NoReadyCandidates);
    }
    Ok(pairs)
}
