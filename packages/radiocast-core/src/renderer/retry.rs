//! Retry logic for transient SOAP errors.
//!
//! Provides exponential backoff for renderer requests that fail with
//! transient UPnP errors (701, 716) or timeouts.

use std::future::Future;
use std::time::Duration;

use crate::error::SoapResult;

/// Retry delays for transient SOAP errors (exponential backoff).
const RETRY_DELAYS_MS: [u64; 3] = [200, 500, 1000];

/// Executes a SOAP request with retry logic for transient errors.
///
/// # Arguments
/// * `action` - Action name for logging
/// * `operation` - Closure that performs the SOAP request
pub(crate) async fn with_retry<T, F, Fut>(action: &str, mut operation: F) -> SoapResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SoapResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(r) => return Ok(r),
            Err(e) if e.is_transient() && attempt < RETRY_DELAYS_MS.len() => {
                let delay_ms = RETRY_DELAYS_MS[attempt];
                attempt += 1;
                log::warn!("[Renderer] {} transient error: {}", action, e);
                log::info!(
                    "[Renderer] Retrying {} (attempt {}/{}) after {}ms",
                    action,
                    attempt + 1,
                    RETRY_DELAYS_MS.len() + 1,
                    delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::soap::SoapError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn retries_transient_faults_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let result = with_retry("Play", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(SoapError::Upnp {
                        code: 701,
                        description: "Transition not available".into(),
                    })
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_last_delay() {
        let calls = AtomicUsize::new(0);
        let result: SoapResult<()> = with_retry("Play", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(SoapError::Upnp {
                    code: 716,
                    description: "Resource not found".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(SoapError::Upnp { code: 716, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), RETRY_DELAYS_MS.len() + 1);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: SoapResult<()> = with_retry("Stop", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SoapError::Parse) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
