//! Bounded retry for HTTP-backed providers

use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};

/// Delay before the first retry; doubled for each further attempt
const BASE_DELAY: Duration = Duration::from_millis(500);

/// Run `operation`, retrying up to `max_retries` times on transient failures only
pub(crate) async fn retry_transient<F, Fut, T>(
    max_retries: u32,
    what: &str,
    operation: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries && e.is_transient() => {
                let delay = BASE_DELAY * 2u32.pow(attempt);
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    what,
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Map a non-success HTTP status to an error, keeping gateway failures retryable
pub(crate) async fn check_status(
    response: reqwest::Response,
    what: &str,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if matches!(status.as_u16(), 502..=504) {
        return Err(Error::UpstreamUnavailable(status.as_u16()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Llm(format!(
        "{} failed: HTTP {}: {}",
        what, status, body
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retries_transient_once() {
        let calls = AtomicU32::new(0);
        let result: Result<u32> = retry_transient(1, "probe", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(Error::UpstreamUnavailable(503))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_transient(1, "probe", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::UpstreamUnavailable(502))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_never_retries_timeouts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_transient(1, "probe", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Timeout(Duration::from_secs(1)))
        })
        .await;

        assert!(matches!(result, Err(Error::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
