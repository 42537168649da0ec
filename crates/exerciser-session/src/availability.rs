//! Advisory monitor for whether a session can be formed.
//!
//! Wraps the transport's eligibility stream in a watch channel so a
//! presentation layer can read the latest value or await a change. The
//! lifecycle manager does not consult it.

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::transport::BoxStream;

/// Latest eligibility reported by the transport.
pub struct AvailabilityMonitor {
    rx: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl AvailabilityMonitor {
    /// Starts forwarding `eligibility`. Until its first value arrives the
    /// monitor reports `false`.
    pub fn spawn(mut eligibility: BoxStream<'static, bool>) -> Self {
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            while let Some(eligible) = eligibility.next().await {
                debug!(eligible, "session eligibility changed");
                tx.send_replace(eligible);
            }
            debug!("eligibility stream ended");
        });

        Self { rx, task }
    }

    /// Whether a session can be formed right now.
    pub fn can_connect(&self) -> bool {
        *self.rx.borrow()
    }

    /// A receiver that observes every later change.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.rx.clone()
    }

    /// Waits until eligibility equals `eligible`.
    ///
    /// Returns `false` if the stream ended first with a different value.
    pub async fn wait_until(&self, eligible: bool) -> bool {
        let mut rx = self.rx.clone();
        rx.wait_for(|value| *value == eligible).await.is_ok()
    }
}

impl Drop for AvailabilityMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::time::Duration;

    #[tokio::test]
    async fn follows_the_stream() {
        let monitor = AvailabilityMonitor::spawn(stream::iter([false, true]).boxed());

        let reached = tokio::time::timeout(Duration::from_secs(1), monitor.wait_until(true))
            .await
            .unwrap();
        assert!(reached);
        assert!(monitor.can_connect());
    }

    #[tokio::test]
    async fn ended_stream_keeps_last_value() {
        let monitor = AvailabilityMonitor::spawn(stream::iter([true, false]).boxed());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!monitor.can_connect());
        assert!(!monitor.wait_until(true).await);
        assert!(monitor.wait_until(false).await);
    }

    #[tokio::test]
    async fn starts_unavailable() {
        let monitor = AvailabilityMonitor::spawn(stream::pending().boxed());
        assert!(!monitor.can_connect());
        assert!(!*monitor.subscribe().borrow());
    }
}
