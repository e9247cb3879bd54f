//! Cooperative cancellation for evaluation sessions
//!
//! Each session owns one [`SessionInterrupt`]. Its token is threaded into every
//! suspending call (network reads, backoff waits), which race their work against
//! [`CancellationToken::cancelled`].

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::{QuillError, QuillResult};

/// Why a session was interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptReason {
    /// Caller invoked cancel
    UserCancel,
    /// Session deadline elapsed
    Timeout(Duration),
    /// Registry is shutting down
    Shutdown,
}

/// Cancellation switch for one session
#[derive(Debug, Clone)]
pub struct SessionInterrupt {
    cancellation_token: CancellationToken,
    reason: Arc<Mutex<Option<InterruptReason>>>,
}

impl Default for SessionInterrupt {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionInterrupt {
    pub fn new() -> Self {
        Self {
            cancellation_token: CancellationToken::new(),
            reason: Arc::new(Mutex::new(None)),
        }
    }

    /// Token to pass into suspending calls
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Raise the signal. Only the first reason is kept; returns whether this call won.
    pub fn interrupt(&self, reason: InterruptReason) -> bool {
        let first = {
            let mut slot = self.reason.lock();
            if slot.is_some() {
                false
            } else {
                *slot = Some(reason);
                true
            }
        };
        self.cancellation_token.cancel();
        first
    }

    pub fn is_interrupted(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    pub fn reason(&self) -> Option<InterruptReason> {
        *self.reason.lock()
    }

    /// Error matching the recorded reason
    pub fn to_error(&self) -> QuillError {
        match self.reason() {
            Some(InterruptReason::Timeout(deadline)) => QuillError::Timeout {
                seconds: deadline.as_secs(),
            },
            _ => QuillError::Cancelled,
        }
    }
}

/// Run `operation` unless `token` fires first
pub async fn run_cancellable<F, T>(token: &CancellationToken, operation: F) -> QuillResult<T>
where
    F: Future<Output = QuillResult<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(QuillError::Cancelled),
        result = operation => result,
    }
}

/// Sleep for `delay`, returning `Cancelled` as soon as `token` fires
pub async fn sleep_cancellable(token: &CancellationToken, delay: Duration) -> QuillResult<()> {
    if delay.is_zero() {
        return if token.is_cancelled() {
            Err(QuillError::Cancelled)
        } else {
            Ok(())
        };
    }
    run_cancellable(token, async {
        tokio::time::sleep(delay).await;
        Ok(())
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_first_reason_wins() {
        let interrupt = SessionInterrupt::new();
        assert!(!interrupt.is_interrupted());

        assert!(interrupt.interrupt(InterruptReason::Timeout(Duration::from_secs(120))));
        assert!(!interrupt.interrupt(InterruptReason::UserCancel));

        assert!(interrupt.is_interrupted());
        assert!(matches!(
            interrupt.to_error(),
            QuillError::Timeout { seconds: 120 }
        ));
    }

    #[tokio::test]
    async fn test_user_cancel_maps_to_cancelled() {
        let interrupt = SessionInterrupt::new();
        interrupt.interrupt(InterruptReason::UserCancel);
        assert!(interrupt.to_error().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_interrupted_promptly() {
        let interrupt = SessionInterrupt::new();
        let token = interrupt.cancellation_token();
        let started = Instant::now();

        let canceller = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.interrupt(InterruptReason::UserCancel);
        });

        let result = sleep_cancellable(&token, Duration::from_secs(30)).await;
        assert!(result.unwrap_err().is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes_without_cancel() {
        let token = CancellationToken::new();
        assert!(sleep_cancellable(&token, Duration::from_millis(500)).await.is_ok());
    }
}
