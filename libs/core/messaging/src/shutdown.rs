//! Shutdown signal shared by fetch loops, app events and handlers.

use tokio::sync::watch;

/// Shutdown signal for graceful termination.
///
/// A dropped [`ShutdownSender`] counts as a shutdown request, so tokens never
/// wait on a signal that can no longer arrive.
#[derive(Clone, Debug)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Wait for shutdown signal
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|requested| *requested).await;
    }
}

/// Shutdown sender
#[derive(Debug)]
pub struct ShutdownSender {
    tx: watch::Sender<bool>,
}

impl ShutdownSender {
    /// Signal shutdown to all tokens
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }

    /// Create another token observing this sender
    pub fn token(&self) -> ShutdownToken {
        ShutdownToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Create a shutdown channel
pub fn shutdown_channel() -> (ShutdownSender, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownSender { tx }, ShutdownToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_shutdown_wakes_waiters() {
        let (sender, mut token) = shutdown_channel();
        assert!(!token.is_shutdown());

        let waiter = tokio::spawn(async move {
            token.wait().await;
            token.is_shutdown()
        });

        sender.shutdown();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn test_wait_after_shutdown_returns_immediately() {
        let (sender, mut token) = shutdown_channel();
        sender.shutdown();

        tokio::time::timeout(Duration::from_millis(100), token.wait())
            .await
            .expect("wait should return once shutdown is set");
    }

    #[tokio::test]
    async fn test_dropped_sender_counts_as_shutdown() {
        let (sender, mut token) = shutdown_channel();
        drop(sender);

        assert!(token.is_shutdown());
        tokio::time::timeout(Duration::from_millis(100), token.wait())
            .await
            .expect("wait should return when sender is gone");
    }

    #[test]
    fn test_token_from_sender() {
        let (sender, _token) = shutdown_channel();
        let other = sender.token();
        assert!(!other.is_shutdown());
        sender.shutdown();
        assert!(other.is_shutdown());
    }
}
