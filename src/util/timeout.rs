//! Deadline and cancellation helpers.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{MeshError, Result};

/// Wrap a future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(MeshError::Timeout(duration.as_millis() as u64)),
    }
}

/// Apply a deadline only when one is configured.
pub async fn with_optional_timeout<T>(
    duration: Option<Duration>,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    match duration {
        Some(duration) => with_timeout(duration, future).await,
        None => future.await,
    }
}

/// Race a future against a cancellation token. Cancellation wins ties.
pub async fn until_cancelled<T>(
    token: &CancellationToken,
    what: &str,
    future: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(MeshError::Cancelled(format!("{what} cancelled"))),
        result = future => result,
    }
}
