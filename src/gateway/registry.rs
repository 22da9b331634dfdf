//! Live connection registry
//!
//! Tracks every accepted WebSocket's write half, keyed by connection handle.
//! This is the in-process side of delivery; the cross-process side (user →
//! handle) lives in the presence directory.
//!
//! Delivery code holds sinks behind the `ConnectionSink` trait so it never
//! depends on a concrete socket type.

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use hyper_tungstenite::WebSocketStream;
use hyper_util::rt::TokioIo;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use crate::types::ConnectionHandle;

/// Type alias for an upgraded WebSocket stream
pub type WsStream = WebSocketStream<TokioIo<hyper::upgrade::Upgraded>>;

/// The write half of one live connection.
///
/// Any push error means the connection is dead or dying; callers treat it as
/// a missed delivery and move on.
#[async_trait]
pub trait ConnectionSink: Send + Sync {
    async fn push(&self, text: String) -> std::result::Result<(), ()>;
}

/// Write half of an upgraded WebSocket, shared between the connection's
/// lifecycle task and delivery code
pub struct SocketSink {
    write: Mutex<SplitSink<WsStream, Message>>,
}

impl SocketSink {
    pub fn new(write: SplitSink<WsStream, Message>) -> Self {
        Self {
            write: Mutex::new(write),
        }
    }

    /// Answer a ping from the peer
    pub async fn pong(&self, data: Vec<u8>) -> std::result::Result<(), ()> {
        let mut guard = self.write.lock().await;
        guard.send(Message::Pong(data)).await.map_err(|_| ())
    }

    /// Close the write half; errors are moot at this point
    pub async fn close(&self) {
        let _ = self.write.lock().await.close().await;
    }
}

#[async_trait]
impl ConnectionSink for SocketSink {
    async fn push(&self, text: String) -> std::result::Result<(), ()> {
        let mut guard = self.write.lock().await;
        guard.send(Message::Text(text)).await.map_err(|_| ())
    }
}

/// Thread-safe registry of active connections, indexed by handle
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionHandle, Arc<dyn ConnectionSink>>,
    count: AtomicUsize,
    max_connections: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            count: AtomicUsize::new(0),
            max_connections,
        }
    }

    pub fn is_at_capacity(&self) -> bool {
        self.count.load(Ordering::Relaxed) >= self.max_connections
    }

    pub fn connection_count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Insert a new connection. Handles are freshly minted per socket, so a
    /// collision would indicate a bug upstream; the newer sink wins.
    pub fn insert(&self, handle: ConnectionHandle, sink: Arc<dyn ConnectionSink>) {
        let was_present = self.connections.insert(handle.clone(), sink).is_some();
        if !was_present {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            handle = %handle,
            count = self.count.load(Ordering::Relaxed),
            "Connection registered"
        );
    }

    /// Remove a connection by handle; absent handles are a no-op
    pub fn remove(&self, handle: &ConnectionHandle) {
        if self.connections.remove(handle).is_some() {
            self.count.fetch_sub(1, Ordering::Relaxed);
            debug!(
                handle = %handle,
                count = self.count.load(Ordering::Relaxed),
                "Connection removed"
            );
        }
    }

    /// Get the sink for a handle
    pub fn get(&self, handle: &ConnectionHandle) -> Option<Arc<dyn ConnectionSink>> {
        self.connections.get(handle).map(|e| Arc::clone(e.value()))
    }

    pub fn contains(&self, handle: &ConnectionHandle) -> bool {
        self.connections.contains_key(handle)
    }

    /// Snapshot of every connection except `except`, for broadcasts
    pub fn sinks_except(
        &self,
        except: Option<&ConnectionHandle>,
    ) -> Vec<(ConnectionHandle, Arc<dyn ConnectionSink>)> {
        self.connections
            .iter()
            .filter(|e| except != Some(e.key()))
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect()
    }
}
