//! Deadline wrapper for futures.
//!
//! [`with_deadline`] races a future against a timer. When the timer wins the future is
//! dropped and the caller gets [`TimedOut`]; any I/O the future started is abandoned and
//! its result is never observed.

use std::{future::Future, time::Duration};

/// The distinguished failure returned when a deadline elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Runs `fut` to completion or fails with [`TimedOut`] once `limit` elapses.
pub async fn with_deadline<F, T>(limit: Duration, fut: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| TimedOut(limit))
}
