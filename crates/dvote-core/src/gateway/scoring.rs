//! Weighted performance score of gateway and chain endpoints.
//!
//! The score mixes three components in `0..=100`:
//!
//! - a random jitter so equally fast nodes do not always rank in the same order
//! - the response speed, `100 * (1 - elapsed / timeout)` clamped to `0..=100`
//! - a quality signal: the reported health for gateways, the peer count (capped at 100)
//!   for chain endpoints

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::utils::random_score;

/// Weights of the score components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    /// Random jitter weight (default: 0.2)
    #[serde(default = "default_random_weight")]
    pub random: f64,

    /// Response speed weight (default: 0.6)
    #[serde(default = "default_speed_weight")]
    pub speed: f64,

    /// Health or peer-count weight (default: 0.2)
    #[serde(default = "default_health_weight")]
    pub health: f64,
}

fn default_random_weight() -> f64 {
    0.2
}
fn default_speed_weight() -> f64 {
    0.6
}
fn default_health_weight() -> f64 {
    0.2
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self { random: 0.2, speed: 0.6, health: 0.2 }
    }
}

impl ScoreWeights {
    /// Scores a round trip with fresh random jitter.
    #[must_use]
    pub fn score(&self, elapsed: Duration, timeout: Duration, quality: f64) -> f64 {
        self.score_with_jitter(random_score(), elapsed, timeout, quality)
    }

    /// Scores a round trip with a caller-supplied jitter in `0..100`.
    #[must_use]
    pub fn score_with_jitter(
        &self,
        jitter: f64,
        elapsed: Duration,
        timeout: Duration,
        quality: f64,
    ) -> f64 {
        self.random * jitter.clamp(0.0, 100.0) +
            self.speed * speed_score(elapsed, timeout) +
            self.health * quality.clamp(0.0, 100.0)
    }

    /// Returns `true` if every weight is finite and non-negative, and not all are zero.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let weights = [self.random, self.speed, self.health];
        weights.iter().all(|w| w.is_finite() && *w >= 0.0) && weights.iter().sum::<f64>() > 0.0
    }
}

/// `100` for an instant answer, `0` at or beyond the timeout.
#[must_use]
pub fn speed_score(elapsed: Duration, timeout: Duration) -> f64 {
    if timeout.is_zero() {
        return 0.0;
    }
    let ratio = elapsed.as_secs_f64() / timeout.as_secs_f64();
    (100.0 * (1.0 - ratio)).clamp(0.0, 100.0)
}
