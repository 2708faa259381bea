//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound a whole outbound call (acquire, write, read) by one deadline
//! - Turn an elapsed deadline into a transport timeout error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The future is dropped on expiry, so whatever it held is released by drop

use std::future::Future;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

use crate::net::TransportError;

/// Run `fut` until `deadline`. `budget` is reported in the timeout error.
pub async fn with_deadline<T, F>(deadline: Instant, budget: Duration, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(budget)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let budget = Duration::from_millis(20);
        let result: Result<(), _> = with_deadline(Instant::now() + budget, budget, async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(TransportError::Timeout(d)) if d == budget));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_result_passes_through() {
        let budget = Duration::from_millis(20);
        let result = with_deadline(Instant::now() + budget, budget, async { Err::<(), _>(TransportError::Eof) }).await;
        assert!(matches!(result, Err(TransportError::Eof)));
    }
}
