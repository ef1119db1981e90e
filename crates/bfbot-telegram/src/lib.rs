//! Telegram adapter (teloxide).
//!
//! Delivery with retry/classification lives here; the long-poll ingestion
//! loop is in [`ingest`].

use std::{future::IntoFuture, time::Duration};

use teloxide::{ApiError, RequestError};
use tracing::{error, warn};

pub mod ingest;

/// Longest wait honored when Telegram asks the bot to back off.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30);

/// Error texts Telegram uses for recipients that can never be reached.
const PERMANENT_FAILURES: [&str; 4] = [
    "bot was blocked by the user",
    "user is deactivated",
    "PEER_ID_INVALID",
    "bot can't initiate conversation",
];

/// Terminal result of a delivery attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The message went out.
    Sent,
    /// The recipient is permanently unreachable; retrying is pointless.
    Blocked,
    /// An unclassified transport error, logged in full; not assumed
    /// transient, so not retried.
    Failed,
}

/// Run `op` until it succeeds or fails for a reason retrying cannot fix.
///
/// Rate limiting is retried without bound, sleeping the server-suggested
/// delay (clamped to [`MAX_RATE_LIMIT_WAIT`]) between attempts.
pub async fn deliver<T, Fut>(op: impl FnMut() -> Fut) -> DeliveryOutcome
where
    Fut: IntoFuture<Output = Result<T, RequestError>>,
{
    deliver_with(op, tokio::time::sleep).await
}

/// [`deliver`] with the backoff sleep supplied by the caller.
pub async fn deliver_with<T, Fut, S, SFut>(
    mut op: impl FnMut() -> Fut,
    mut sleep: S,
) -> DeliveryOutcome
where
    Fut: IntoFuture<Output = Result<T, RequestError>>,
    S: FnMut(Duration) -> SFut,
    SFut: std::future::Future<Output = ()>,
{
    loop {
        match op().await {
            Ok(_) => return DeliveryOutcome::Sent,
            Err(RequestError::RetryAfter(after)) => {
                let wait = after.min(MAX_RATE_LIMIT_WAIT);
                warn!("API rate limit hit, waiting for {}s", wait.as_secs());
                sleep(wait).await;
            }
            Err(RequestError::Api(api)) if is_permanent(&api) => return DeliveryOutcome::Blocked,
            Err(e) => {
                error!("API call failed: {e}");
                return DeliveryOutcome::Failed;
            }
        }
    }
}

fn is_permanent(api: &ApiError) -> bool {
    if matches!(
        api,
        ApiError::BotBlocked
            | ApiError::UserDeactivated
            | ApiError::CantInitiateConversation
            | ApiError::CantTalkWithBots
    ) {
        return true;
    }
    // Raw payloads teloxide could not map still carry the phrase.
    let text = api.to_string();
    PERMANENT_FAILURES.iter().any(|phrase| text.contains(phrase))
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use super::*;

    #[tokio::test]
    async fn rate_limit_wait_is_clamped_then_delivery_succeeds() {
        let calls = Cell::new(0u32);
        let slept = RefCell::new(Vec::new());

        let outcome = deliver_with(
            || {
                let n = calls.get();
                calls.set(n + 1);
                async move {
                    if n == 0 {
                        Err(RequestError::RetryAfter(Duration::from_secs(45)))
                    } else {
                        Ok(())
                    }
                }
            },
            |d| {
                slept.borrow_mut().push(d);
                async {}
            },
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::Sent);
        assert_eq!(calls.get(), 2);
        assert_eq!(*slept.borrow(), vec![Duration::from_secs(30)]);
    }

    #[tokio::test]
    async fn short_rate_limit_wait_is_honored_as_is() {
        let calls = Cell::new(0u32);
        let slept = RefCell::new(Vec::new());

        let outcome = deliver_with(
            || {
                let n = calls.get();
                calls.set(n + 1);
                async move {
                    if n == 0 {
                        Err(RequestError::RetryAfter(Duration::from_secs(5)))
                    } else {
                        Ok(())
                    }
                }
            },
            |d| {
                slept.borrow_mut().push(d);
                async {}
            },
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::Sent);
        assert_eq!(*slept.borrow(), vec![Duration::from_secs(5)]);
    }

    #[tokio::test]
    async fn blocked_recipient_is_not_retried() {
        let calls = Cell::new(0u32);

        let outcome = deliver_with(
            || {
                calls.set(calls.get() + 1);
                async {
                    Err::<(), _>(RequestError::Api(ApiError::Unknown(
                        "Forbidden: bot was blocked by the user".to_string(),
                    )))
                }
            },
            |_| async { unreachable!("no backoff for permanent failures") },
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::Blocked);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn typed_blocked_variant_is_permanent() {
        let outcome = deliver_with(
            || async { Err::<(), _>(RequestError::Api(ApiError::BotBlocked)) },
            |_| async {},
        )
        .await;
        assert_eq!(outcome, DeliveryOutcome::Blocked);
    }

    #[tokio::test]
    async fn unknown_errors_are_terminal() {
        let calls = Cell::new(0u32);

        let outcome = deliver_with(
            || {
                calls.set(calls.get() + 1);
                async {
                    Err::<(), _>(RequestError::Api(ApiError::Unknown(
                        "Bad Request: something odd".to_string(),
                    )))
                }
            },
            |_| async {},
        )
        .await;

        assert_eq!(outcome, DeliveryOutcome::Failed);
        assert_eq!(calls.get(), 1);
    }
}
