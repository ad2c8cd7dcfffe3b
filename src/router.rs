//! Message router
//!
//! Turns one inbound frame into zero or one broadcasts. Every failure short
//! of a broken transport is logged and dropped here; the connection stays
//! open and the sender hears nothing back.

use std::sync::Arc;

use crate::error::{RelayError, RelayResult};
use crate::protocol::{ChatMessage, InboundEnvelope, ServerMessage};
use crate::registry::{BroadcastReport, ConnectionRegistry};

/// One inbound data frame, before decoding
#[derive(Debug, Clone, Copy)]
pub enum Frame<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

impl<'a> Frame<'a> {
    pub fn decode(self) -> RelayResult<&'a str> {
        match self {
            Frame::Text(text) => Ok(text),
            Frame::Binary(bytes) => Ok(std::str::from_utf8(bytes)?),
        }
    }
}

#[derive(Debug)]
pub enum RouteOutcome {
    Broadcast(BroadcastReport),
    Discarded(RelayError),
}

impl RouteOutcome {
    pub fn is_broadcast(&self) -> bool {
        matches!(self, RouteOutcome::Broadcast(_))
    }
}

#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: Arc<ConnectionRegistry>,
}

impl MessageRouter {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Route one frame received from `from`. The sender is included in the
    /// broadcast.
    pub async fn route_frame(&self, from: &str, frame: Frame<'_>) -> RouteOutcome {
        let payload = match accept(frame) {
            Ok(msg) => {
                tracing::debug!(connection_id = %from, sender = %msg.sender, "Chat message accepted");
                ServerMessage::Chat(msg).to_json()
            }
            Err(e) => Err(e),
        };

        match payload {
            Ok(json) => RouteOutcome::Broadcast(self.registry.broadcast(json).await),
            Err(e) => {
                match &e {
                    RelayError::Unsupported(_) | RelayError::Validation(_) => {
                        tracing::debug!(connection_id = %from, "Discarding message: {}", e)
                    }
                    _ => tracing::warn!(connection_id = %from, "Bad message: {}", e),
                }
                RouteOutcome::Discarded(e)
            }
        }
    }
}

/// Decode, parse and validate a frame
fn accept(frame: Frame<'_>) -> RelayResult<ChatMessage> {
    let text = frame.decode()?;
    let envelope = InboundEnvelope::parse(text)?;
    envelope.into_chat(chrono::Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionHandle;
    use axum::extract::ws::Utf8Bytes;
    use serde_json::Value;
    use tokio::sync::mpsc;

    async fn setup() -> (MessageRouter, String, mpsc::Receiver<Utf8Bytes>) {
        let registry = Arc::new(ConnectionRegistry::new());
        let (handle, rx) = ConnectionHandle::new(16);
        let id = handle.id().to_string();
        registry.register(handle).await;
        (MessageRouter::new(registry), id, rx)
    }

    #[tokio::test]
    async fn test_valid_chat_is_broadcast_to_sender() {
        let (router, id, mut rx) = setup().await;

        let outcome = router
            .route_frame(&id, Frame::Text(r#"{"type":"chat","text":"hi","sender":"alice"}"#))
            .await;

        match outcome {
            RouteOutcome::Broadcast(report) => assert_eq!(report.delivered, 1),
            other => panic!("Expected broadcast, got {:?}", other),
        }

        let received: Value = serde_json::from_str(rx.recv().await.unwrap().as_str()).unwrap();
        assert_eq!(received["type"], "chat");
        assert_eq!(received["text"], "hi");
        assert_eq!(received["sender"], "alice");
    }

    #[tokio::test]
    async fn test_binary_utf8_frame_is_routed() {
        let (router, id, mut rx) = setup().await;

        let outcome = router
            .route_frame(&id, Frame::Binary(br#"{"type":"chat","text":"bin"}"#))
            .await;

        assert!(outcome.is_broadcast());
        assert!(rx.recv().await.unwrap().as_str().contains("\"bin\""));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_decode_error() {
        let (router, id, mut rx) = setup().await;

        let outcome = router.route_frame(&id, Frame::Binary(&[0xff, 0xfe, 0x00])).await;

        assert!(matches!(
            outcome,
            RouteOutcome::Discarded(RelayError::Decode(_))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_discarded_frames_produce_no_broadcast() {
        let (router, id, mut rx) = setup().await;

        for frame in [
            r#"{"type":"ping"}"#,
            r#"{"text":"hi"}"#,
            r#"{"type":"chat"}"#,
            "not json",
        ] {
            let outcome = router.route_frame(&id, Frame::Text(frame)).await;
            assert!(!outcome.is_broadcast(), "{} should be discarded", frame);
        }

        assert!(rx.try_recv().is_err());
        assert!(router.registry().contains(&id).await);
    }
}
