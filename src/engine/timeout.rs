//! Deadline wrapper for test operations

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// An operation did not settle before its deadline
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{name} timed out after {}ms", .limit.as_millis())]
pub struct TimeoutError {
    /// Name of the operation that timed out
    pub name: String,
    /// The deadline it was given
    pub limit: Duration,
}

/// Race `operation` against a `limit` deadline
///
/// Resolves to the operation's output when it settles first. Otherwise the
/// operation is dropped (cancelling any work it had not yet done) and a
/// [`TimeoutError`] naming it is returned. The timer is released on every path.
pub async fn with_timeout<F>(
    name: &str,
    limit: Duration,
    operation: F,
) -> Result<F::Output, TimeoutError>
where
    F: Future,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| TimeoutError {
            name: name.to_string(),
            limit,
        })
}
