//! Cooperative shutdown flag shared by the event loop and the HTTP server.
//!
//! The event loop polls [`ShutdownFlag::is_requested`] once per iteration;
//! the HTTP server awaits [`ShutdownFlag::wait`] for graceful shutdown.
//! Whoever observes the process signal calls [`ShutdownFlag::trigger`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

/// Cloneable handle to one shutdown flag.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    inner: Arc<Inner>,
}

impl ShutdownFlag {
    /// Create a flag that is not yet set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.inner.requested.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether shutdown has been requested.
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Resolve once shutdown has been requested.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a trigger in between is not lost.
            notified.as_mut().enable();
            if self.is_requested() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let flag = ShutdownFlag::new();
        let waiter = {
            let flag = flag.clone();
            tokio::spawn(async move { flag.wait().await })
        };
        assert!(!flag.is_requested());
        flag.trigger();
        let joined = tokio::time::timeout(Duration::from_secs(1), waiter).await;
        assert!(matches!(joined, Ok(Ok(()))));
        assert!(flag.is_requested());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_set() {
        let flag = ShutdownFlag::new();
        flag.trigger();
        let waited = tokio::time::timeout(Duration::from_millis(100), flag.wait()).await;
        assert!(waited.is_ok());
    }
}
