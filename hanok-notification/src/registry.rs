use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::models::PushEnvelope;

/// One message on a live stream: either a serialized alarm envelope or a
/// termination marker sent during shutdown.
#[derive(Debug, Clone)]
pub enum Frame {
    Alarm(Arc<str>),
    Close,
}

struct LiveStream {
    id: u64,
    tx: UnboundedSender<Frame>,
}

/// In-memory broker mapping user ids to their open SSE streams.
///
/// A user may hold any number of simultaneous streams (multiple tabs);
/// `send_to_user` broadcasts to all of them. The registry is purely a
/// delivery transport - losing every stream for a user loses no data,
/// the store remains the durable record.
pub struct ConnectionRegistry {
    streams: DashMap<i64, Vec<LiveStream>>,
    next_stream_id: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            streams: DashMap::new(),
            next_stream_id: AtomicU64::new(1),
        }
    }

    /// Create a channel pair and register the sending half for `user_id`.
    /// Returns the stream id (for later removal) and the receiving half
    /// the transport drains into the HTTP response.
    pub fn open(&self, user_id: i64) -> (u64, UnboundedReceiver<Frame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream_id = self.add_connection(user_id, tx);
        (stream_id, rx)
    }

    pub fn add_connection(&self, user_id: i64, tx: UnboundedSender<Frame>) -> u64 {
        let id = self.next_stream_id.fetch_add(1, Ordering::Relaxed);
        self.streams
            .entry(user_id)
            .or_default()
            .push(LiveStream { id, tx });

        tracing::info!(user_id = %user_id, stream_id = %id, "live stream registered");
        id
    }

    /// Deregister one stream. Quietly does nothing when the stream was
    /// already removed (send-time pruning races with guard drop).
    pub fn remove_connection(&self, user_id: i64, stream_id: u64) {
        let mut now_empty = false;
        if let Some(mut entry) = self.streams.get_mut(&user_id) {
            entry.retain(|s| s.id != stream_id);
            now_empty = entry.is_empty();
        }
        if now_empty {
            self.streams.remove_if(&user_id, |_, v| v.is_empty());
        }

        tracing::info!(user_id = %user_id, stream_id = %stream_id, "live stream removed");
    }

    /// Serialize the envelope once and write it to every stream the user
    /// currently has open. A user with no streams is a silent no-op. A
    /// failed write means the receiver is gone; that stream is pruned
    /// without affecting the user's other streams.
    pub fn send_to_user(&self, user_id: i64, envelope: &PushEnvelope<'_>) {
        let json: Arc<str> = match serde_json::to_string(envelope) {
            Ok(s) => s.into(),
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "failed to serialize push envelope");
                return;
            }
        };

        let mut drained = false;
        if let Some(mut entry) = self.streams.get_mut(&user_id) {
            entry.retain(|s| {
                let alive = s.tx.send(Frame::Alarm(json.clone())).is_ok();
                if !alive {
                    tracing::debug!(user_id = %user_id, stream_id = %s.id, "pruned dead stream");
                }
                alive
            });
            drained = entry.is_empty();
        }
        if drained {
            self.streams.remove_if(&user_id, |_, v| v.is_empty());
        }
    }

    /// Send a termination frame to every stream and clear the registry.
    /// Called once on graceful shutdown.
    pub fn close_all(&self) {
        let mut closed = 0usize;
        for entry in self.streams.iter() {
            for stream in entry.value() {
                let _ = stream.tx.send(Frame::Close);
                closed += 1;
            }
        }
        self.streams.clear();

        tracing::info!(streams = closed, "connection registry drained");
    }

    /// Number of open streams for a user.
    pub fn stream_count(&self, user_id: i64) -> usize {
        self.streams.get(&user_id).map(|v| v.len()).unwrap_or(0)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
