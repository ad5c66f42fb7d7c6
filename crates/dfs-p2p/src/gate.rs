//! Per-connection stream gate.
//!
//! After a STREAM marker the bytes on the wire belong to the application,
//! not the decoder. The gate records which side owns the connection:
//!
//! ```text
//! Framing --(STREAM marker decoded)--> AwaitingRawBytes
//! AwaitingRawBytes --(consumer done)--> Framing
//! ```
//!
//! The read loop parks while the gate is open and resumes as soon as the
//! consumer closes it. No timers are involved.

use tokio::sync::watch;

/// Who owns the inbound bytes of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerMode {
    /// The decoder reads frames.
    Framing,
    /// Raw bytes follow; the decoder is parked.
    AwaitingRawBytes,
}

/// Shared mode flag for one connection.
#[derive(Debug)]
pub struct StreamGate {
    mode: watch::Sender<PeerMode>,
}

impl StreamGate {
    /// A gate in [`PeerMode::Framing`].
    pub fn new() -> Self {
        let (mode, _) = watch::channel(PeerMode::Framing);
        Self { mode }
    }

    /// Current mode.
    pub fn mode(&self) -> PeerMode {
        *self.mode.borrow()
    }

    /// Hand the connection to the application.
    pub fn open(&self) {
        self.mode.send_replace(PeerMode::AwaitingRawBytes);
    }

    /// Hand the connection back to the decoder.
    pub fn close(&self) {
        self.mode.send_replace(PeerMode::Framing);
    }

    /// Wait until the gate is in `target` mode.
    pub async fn wait_for(&self, target: PeerMode) {
        let mut rx = self.mode.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if current == target {
                return;
            }
            // The sender lives in `self`, so this cannot fail while we wait.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for StreamGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_starts_framing() {
        let gate = StreamGate::new();
        assert_eq!(gate.mode(), PeerMode::Framing);
        gate.open();
        assert_eq!(gate.mode(), PeerMode::AwaitingRawBytes);
        gate.close();
        assert_eq!(gate.mode(), PeerMode::Framing);
    }

    #[tokio::test]
    async fn test_wait_for_current_mode_returns_immediately() {
        let gate = StreamGate::new();
        tokio::time::timeout(Duration::from_millis(100), gate.wait_for(PeerMode::Framing))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_for_wakes_on_close() {
        let gate = Arc::new(StreamGate::new());
        gate.open();

        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait_for(PeerMode::Framing).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.close();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
