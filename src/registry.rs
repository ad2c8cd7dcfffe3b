//! Connection registry
//!
//! The set of currently open connections, and the fan-out that delivers one
//! payload to all of them. Delivery is an enqueue onto the member's bounded
//! outbound queue; the member's own task does the socket write.

use axum::extract::ws::Utf8Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::sync::mpsc::error::TrySendError;

use crate::error::{RelayError, RelayResult};

/// Opaque connection identity (ULID)
pub type ConnectionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Connecting = 0,
    Open = 1,
    Closed = 2,
}

impl From<u8> for ConnectionState {
    fn from(value: u8) -> Self {
        match value {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }
}

/// Handle to one client's outbound side
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    state: Arc<AtomicU8>,
    outbound: mpsc::Sender<Utf8Bytes>,
}

impl ConnectionHandle {
    /// Create a handle with a fresh id. The receiver is the connection's
    /// outbound queue and belongs to the task that writes to the socket.
    pub fn new(queue_capacity: usize) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        Self::with_id(ulid::Ulid::new().to_string(), queue_capacity)
    }

    pub fn with_id(
        id: impl Into<ConnectionId>,
        queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let handle = Self {
            id: id.into(),
            state: Arc::new(AtomicU8::new(ConnectionState::Connecting as u8)),
            outbound: tx,
        };
        (handle, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn set_state(&self, state: ConnectionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Enqueue a payload without waiting. A closed or full queue is a
    /// delivery failure for this member only.
    fn deliver(&self, payload: Utf8Bytes) -> RelayResult<()> {
        self.outbound.try_send(payload).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "outbound queue full",
                TrySendError::Closed(_) => "outbound queue closed",
            };
            RelayError::Delivery {
                id: self.id.clone(),
                reason: reason.to_string(),
            }
        })
    }
}

/// Outcome of one broadcast call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Members in the snapshot
    pub targeted: usize,
    pub delivered: usize,
    /// Members that were not OPEN when reached
    pub skipped: usize,
    pub failed: usize,
}

impl BroadcastReport {
    /// Delivery attempts made (one per OPEN member)
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Process-wide set of live connections
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    members: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handshaked connection. The handle is marked OPEN before it is
    /// inserted, so a broadcaster never sees it half-registered.
    pub async fn register(&self, handle: ConnectionHandle) {
        handle.set_state(ConnectionState::Open);
        let id = handle.id.clone();

        let mut members = self.members.write().await;
        if let Some(previous) = members.insert(id.clone(), handle) {
            tracing::warn!(connection_id = %id, "Replacing existing registry entry");
            previous.set_state(ConnectionState::Closed);
        }
        tracing::debug!(connection_id = %id, members = members.len(), "Connection registered");
    }

    /// Remove a connection and mark it CLOSED. Returns false if it was
    /// already absent.
    pub async fn deregister(&self, id: &str) -> bool {
        let removed = self.members.write().await.remove(id);
        match removed {
            Some(handle) => {
                handle.set_state(ConnectionState::Closed);
                tracing::debug!(connection_id = %id, "Connection deregistered");
                true
            }
            None => false,
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.members.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    pub async fn ids(&self) -> Vec<ConnectionId> {
        self.members.read().await.keys().cloned().collect()
    }

    /// Offer `payload` to every OPEN member of a membership snapshot.
    ///
    /// The read lock is held only while cloning the snapshot. Members that
    /// are not OPEN are skipped but left in place; removal belongs to the
    /// close path. A failed delivery is logged and the loop continues.
    pub async fn broadcast(&self, payload: impl Into<Utf8Bytes>) -> BroadcastReport {
        let payload: Utf8Bytes = payload.into();
        let snapshot: Vec<ConnectionHandle> =
            self.members.read().await.values().cloned().collect();

        let mut report = BroadcastReport {
            targeted: snapshot.len(),
            ..Default::default()
        };

        for member in &snapshot {
            if !member.is_open() {
                report.skipped += 1;
                continue;
            }
            match member.deliver(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    tracing::warn!("{}", e);
                    report.failed += 1;
                }
            }
        }

        tracing::debug!(
            targeted = report.targeted,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "Broadcast complete"
        );

        report
    }
}
