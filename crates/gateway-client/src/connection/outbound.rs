//! Outbound message queue
//!
//! Handlers enqueue through [`Outbound`]; the response loop is the only
//! consumer and the only socket writer.

use super::{FrameKind, Message};
use crate::protocol::Payload;
use crate::ratelimit::{RateLimitError, RateLimiter};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Errors enqueueing an outbound message
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The connection is closing or closed
    #[error("Connection is closed")]
    Closed,

    /// The caller's scope was cancelled while waiting for queue space
    #[error("Send cancelled")]
    Cancelled,

    #[error(transparent)]
    RateLimit(#[from] RateLimitError),
}

impl SendError {
    /// Check if the send was abandoned because a scope was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled | Self::RateLimit(RateLimitError::Cancelled))
    }
}

/// Cloneable handle for enqueueing messages
#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Message>,
    accepting: Arc<RwLock<bool>>,
    limiter: Arc<RateLimiter>,
}

/// Receiving half owned by the response loop
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<Message>,
    accepting: Arc<RwLock<bool>>,
}

impl Outbound {
    /// Create a bounded queue; every payload send waits on `limiter` first
    #[must_use]
    pub fn channel(capacity: usize, limiter: Arc<RateLimiter>) -> (Self, OutboundQueue) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let accepting = Arc::new(RwLock::new(true));
        (
            Self {
                tx,
                accepting: Arc::clone(&accepting),
                limiter,
            },
            OutboundQueue { rx, accepting },
        )
    }

    /// Whether new messages are still accepted
    pub fn is_accepting(&self) -> bool {
        *self.accepting.read() && !self.tx.is_closed()
    }

    /// Encode `payload`, wait for the message limiter and enqueue it
    pub async fn send(&self, scope: &CancellationToken, payload: &Payload) -> Result<(), SendError> {
        if !self.is_accepting() {
            return Err(SendError::Closed);
        }
        self.limiter.wait(scope).await?;

        tracing::trace!(op = %payload.op, "Queueing payload");
        self.enqueue(scope, Message::binary(scope.clone(), payload.encode()))
            .await
    }

    /// Enqueue a raw message without touching the rate limiter
    pub async fn enqueue(&self, scope: &CancellationToken, message: Message) -> Result<(), SendError> {
        if !self.is_accepting() {
            return Err(SendError::Closed);
        }

        let permit = tokio::select! {
            biased;
            () = scope.cancelled() => return Err(SendError::Cancelled),
            permit = self.tx.reserve() => permit.map_err(|_| SendError::Closed)?,
        };

        // the drain may have started while this sender waited for space;
        // holding the read lock keeps it from starting until the message is in
        let accepting = self.accepting.read();
        if !*accepting {
            return Err(SendError::Closed);
        }
        permit.send(message);
        Ok(())
    }
}

impl OutboundQueue {
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Next message already in the queue, without waiting
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Refuse further sends; queued messages stay readable
    ///
    /// Returns once no sender can still slip a message in.
    pub fn stop_accepting(&self) {
        *self.accepting.write() = false;
    }

    /// Close the channel once draining is finished
    pub fn close(&mut self) {
        self.stop_accepting();
        self.rx.close();
    }
}

impl Message {
    /// Convert to a socket frame
    pub(crate) fn into_frame(self) -> tokio_tungstenite::tungstenite::Message {
        use tokio_tungstenite::tungstenite::Message as Frame;
        match self.kind {
            FrameKind::Binary => Frame::Binary(self.bytes),
            FrameKind::Text => match String::from_utf8(self.bytes) {
                Ok(text) => Frame::Text(text),
                Err(e) => Frame::Binary(e.into_bytes()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OpCode;
    use crate::ratelimit::RateLimits;
    use std::time::Duration;

    fn channel(capacity: usize) -> (Outbound, OutboundQueue) {
        Outbound::channel(capacity, RateLimits::unlimited().message)
    }

    #[tokio::test]
    async fn test_send_preserves_order() {
        let (outbound, mut queue) = channel(8);
        let scope = CancellationToken::new();

        for seq in 1..=5 {
            outbound.send(&scope, &Payload::heartbeat(Some(seq))).await.unwrap();
        }

        for seq in 1..=5u64 {
            let message = queue.recv().await.unwrap();
            let payload = Payload::decode(&message.bytes).unwrap();
            assert_eq!(payload.op, OpCode::Heartbeat);
            assert_eq!(payload.data.to_int::<u64>(), Ok(seq));
        }
    }

    #[tokio::test]
    async fn test_stop_accepting_keeps_queued() {
        let (outbound, mut queue) = channel(4);
        let scope = CancellationToken::new();
        outbound.send(&scope, &Payload::heartbeat(None)).await.unwrap();

        queue.stop_accepting();
        assert!(!outbound.is_accepting());
        assert_eq!(
            outbound.send(&scope, &Payload::heartbeat(None)).await,
            Err(SendError::Closed)
        );

        assert!(queue.try_recv().is_some());
        assert!(queue.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let (outbound, mut queue) = channel(1);
        queue.close();
        let scope = CancellationToken::new();
        assert_eq!(
            outbound.send(&scope, &Payload::heartbeat(None)).await,
            Err(SendError::Closed)
        );
    }

    #[tokio::test]
    async fn test_full_queue_observes_cancellation() {
        let (outbound, _queue) = channel(1);
        let scope = CancellationToken::new();
        outbound.send(&scope, &Payload::heartbeat(None)).await.unwrap();

        let blocked = {
            let outbound = outbound.clone();
            let scope = scope.clone();
            tokio::spawn(async move { outbound.send(&scope, &Payload::heartbeat(None)).await })
        };
        tokio::task::yield_now().await;
        scope.cancel();

        let err = blocked.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_sender_waiting_for_space_is_refused_after_drain() {
        let (outbound, mut queue) = channel(1);
        let connection = CancellationToken::new();
        outbound.send(&connection, &Payload::heartbeat(Some(1))).await.unwrap();

        // a caller with its own scope, not the connection's
        let blocked = {
            let outbound = outbound.clone();
            tokio::spawn(async move {
                let caller = CancellationToken::new();
                outbound.send(&caller, &Payload::heartbeat(Some(2))).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        queue.stop_accepting();
        assert!(queue.try_recv().is_some());

        let result = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(SendError::Closed));
        assert!(queue.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_send_waits_on_message_limiter() {
        let limiter = Arc::new(RateLimiter::new("message", Duration::from_secs(60), 1).unwrap());
        let (outbound, mut queue) = Outbound::channel(8, limiter);
        let scope = CancellationToken::new();
        outbound.send(&scope, &Payload::heartbeat(Some(1))).await.unwrap();

        let throttled = {
            let outbound = outbound.clone();
            let scope = scope.clone();
            tokio::spawn(async move { outbound.send(&scope, &Payload::heartbeat(Some(2))).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!throttled.is_finished(), "second send must wait for a token");

        scope.cancel();
        let result = tokio::time::timeout(Duration::from_secs(1), throttled)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result, Err(SendError::RateLimit(RateLimitError::Cancelled)));

        assert!(queue.try_recv().is_some());
        assert!(queue.try_recv().is_none());
    }

    #[test]
    fn test_into_frame() {
        use tokio_tungstenite::tungstenite::Message as Frame;

        let scope = CancellationToken::new();
        let text = Message::new(scope.clone(), FrameKind::Text, b"hi".to_vec());
        assert_eq!(text.into_frame(), Frame::Text("hi".to_string()));

        let binary = Message::binary(scope, vec![131, 106]);
        assert_eq!(binary.into_frame(), Frame::Binary(vec![131, 106]));
    }
}
