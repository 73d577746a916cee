//! Cancellation and deadline helpers for the suspension points
//! (catalog fetch, install).

use std::future::Future;
use std::time::Duration;

pub use tokio_util::sync::CancellationToken;

use crate::error::{HearthError, HearthResult};

/// Race `fut` against `cancel`.
///
/// When the token fires first the future is dropped and
/// [`HearthError::Cancelled`] is returned.
///
/// # Errors
///
/// Returns the future's own error, or `Cancelled`.
pub async fn cancellable<F, T>(operation: &str, cancel: &CancellationToken, fut: F) -> HearthResult<T>
where
    F: Future<Output = HearthResult<T>>,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(HearthError::Cancelled(operation.to_string())),
        result = fut => result,
    }
}

/// Bound `fut` by an optional deadline.
///
/// # Errors
///
/// Returns the future's own error, or [`HearthError::DeadlineExceeded`].
pub async fn with_deadline<F, T>(
    operation: &str,
    deadline: Option<Duration>,
    fut: F,
) -> HearthResult<T>
where
    F: Future<Output = HearthResult<T>>,
{
    match deadline {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            HearthError::DeadlineExceeded {
                operation: operation.to_string(),
                limit,
            }
        })?,
        None => fut.await,
    }
}

/// A token that cancels itself after `duration`.
///
/// Must be called from within a tokio runtime.
#[must_use]
pub fn cancel_after(duration: Duration) -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(duration) => child.cancel(),
            () = child.cancelled() => {},
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancellable_passes_result_through() {
        let token = CancellationToken::new();
        let out = cancellable("op", &token, async { Ok::<_, HearthError>(7) })
            .await
            .unwrap();
        assert_eq!(out, 7);
    }

    #[tokio::test]
    async fn cancellable_observes_token() {
        let token = CancellationToken::new();
        token.cancel();
        let err = cancellable("fetch", &token, async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, HearthError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, HearthError::Cancelled(op) if op == "fetch"));
    }

    #[tokio::test]
    async fn deadline_expires() {
        let err = with_deadline("install", Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, HearthError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, HearthError::DeadlineExceeded { .. }));
    }

    #[tokio::test]
    async fn sub_second_deadline_is_reported_exactly() {
        let err = with_deadline("install", Some(Duration::from_millis(250)), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, HearthError>(())
        })
        .await
        .unwrap_err();
        match &err {
            HearthError::DeadlineExceeded { operation, limit } => {
                assert_eq!(operation, "install");
                assert_eq!(*limit, Duration::from_millis(250));
            },
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "install exceeded its deadline of 250ms");
    }

    #[tokio::test]
    async fn cancel_after_fires() {
        let token = cancel_after(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .unwrap();
        assert!(token.is_cancelled());
    }
}
