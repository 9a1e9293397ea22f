// Handoff - Rendezvous channel between the executor loops
use tokio::sync::{mpsc, oneshot};

/// The receiving loop has shut down
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("Hand-off receiver closed")]
pub struct HandoffClosed;

/// Sending half. `send` completes only once the receiver has taken the value.
#[derive(Debug)]
pub struct HandoffSender<T> {
    tx: mpsc::Sender<(T, oneshot::Sender<()>)>,
}

impl<T> Clone for HandoffSender<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

#[derive(Debug)]
pub struct HandoffReceiver<T> {
    rx: mpsc::Receiver<(T, oneshot::Sender<()>)>,
}

/// Unbuffered hand-off: each value is acknowledged by the receiver
pub fn handoff<T>() -> (HandoffSender<T>, HandoffReceiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (HandoffSender { tx }, HandoffReceiver { rx })
}

impl<T> HandoffSender<T> {
    pub async fn send(&self, value: T) -> Result<(), HandoffClosed> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx.send((value, ack_tx)).await.map_err(|_| HandoffClosed)?;
        ack_rx.await.map_err(|_| HandoffClosed)
    }
}

impl<T> HandoffReceiver<T> {
    /// Take the next value, releasing its sender. `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<T> {
        let (value, ack) = self.rx.recv().await?;
        let _ = ack.send(());
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_waits_for_receiver() {
        let (tx, mut rx) = handoff::<u32>();

        let sender = tokio::spawn(async move { tx.send(7).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!sender.is_finished());

        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(sender.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn test_send_fails_when_receiver_dropped() {
        let (tx, rx) = handoff::<u32>();
        drop(rx);
        assert_eq!(tx.send(1).await, Err(HandoffClosed));
    }
}
