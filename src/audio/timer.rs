use std::time::Duration;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

/// Auto-leave countdown for a draining session.
///
/// Dropping the timer cancels it. Expiry only *notifies*: the callback gets
/// the timer's token and the session decides, inside its own serialized
/// loop, whether the token is still current and the queue still empty.
#[derive(Debug)]
pub struct LeaveTimer {
    token: u64,
    _guard: DropGuard,
}

impl LeaveTimer {
    pub fn arm<F>(token: u64, after: Duration, on_expiry: F) -> Self
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let child = cancel.clone();
        let deadline = tokio::time::Instant::now() + after;

        tokio::spawn(async move {
            tokio::select! {
                _ = child.cancelled() => {
                    debug!("⏱️ Auto-leave timer {} cancelled", token);
                }
                _ = tokio::time::sleep_until(deadline) => on_expiry(token),
            }
        });

        Self {
            token,
            _guard: cancel.drop_guard(),
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }
}
