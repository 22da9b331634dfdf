//! Connection gateway
//!
//! Accepts inbound real-time WebSocket connections, authenticates them via
//! the identity resolver, and keeps the presence directory in step with the
//! connection lifecycle.
//!
//! Authentication flow on upgrade:
//! 1. Try token from query string (?token=...)
//! 2. Try token from Authorization header (Bearer)
//! 3. No/unresolvable token → anonymous connection
//!
//! Anonymous connections are accepted, not rejected: they receive broadcast
//! events but are never registered in presence and never targeted directly.
//! The credential captured at connect time is threaded explicitly through the
//! lifecycle task and re-resolved at disconnect; it is never re-read from
//! ambient connection state.

mod registry;

pub use registry::{ConnectionRegistry, ConnectionSink, SocketSink, WsStream};

use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::events::Event;
use crate::identity::IdentityResolver;
use crate::presence::PresenceDirectory;
use crate::types::{ConnectionHandle, Result, UserId};

/// Upper bound on any single push. A peer that stopped reading fills its TCP
/// buffer and would otherwise wedge `send` forever, stalling every broadcast
/// behind it.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Accepts connections, tracks them, and pushes events to them
pub struct ConnectionGateway {
    registry: ConnectionRegistry,
    presence: Arc<PresenceDirectory>,
    identity: Arc<IdentityResolver>,
}

impl ConnectionGateway {
    pub fn new(
        max_connections: usize,
        presence: Arc<PresenceDirectory>,
        identity: Arc<IdentityResolver>,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(max_connections),
            presence,
            identity,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Push an event to the user's current connection.
    ///
    /// Returns `false` when the user has no presence entry, when the entry
    /// points at a connection this node no longer holds, or when the push
    /// itself fails — all normal outcomes. The durable record is the source
    /// of truth; this push is purely a latency optimization.
    pub async fn send_to_user(&self, user: &UserId, event: &Event) -> Result<bool> {
        let handle = match self.presence.lookup(user).await? {
            Some(h) => h,
            None => return Ok(false),
        };

        let sink = match self.registry.get(&handle) {
            Some(s) => s,
            None => {
                debug!(user = %user, handle = %handle, "Presence entry has no live socket here");
                return Ok(false);
            }
        };

        Ok(send_event(&sink, event).await.is_ok())
    }

    /// Push an event to every connection except `except`.
    ///
    /// Individual send failures are ignored; a dying socket cleans itself up
    /// through its own lifecycle task.
    pub async fn broadcast_except(&self, except: Option<&ConnectionHandle>, event: &Event) {
        for (handle, sink) in self.registry.sinks_except(except) {
            if send_event(&sink, event).await.is_err() {
                debug!(handle = %handle, "Broadcast send failed, skipping connection");
            }
        }
    }
}

/// Handle WebSocket upgrade for the real-time endpoint
pub async fn handle_gateway_upgrade(
    gateway: Arc<ConnectionGateway>,
    req: Request<Incoming>,
    addr: SocketAddr,
) -> Response<Full<Bytes>> {
    if gateway.registry.is_at_capacity() {
        warn!("Gateway at capacity, rejecting {}", addr);
        return Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from(r#"{"error": "Server at capacity"}"#)))
            .unwrap();
    }

    // Capture the credential from the handshake before the request is consumed
    let token = extract_token_from_query(req.uri().query())
        .or_else(|| extract_bearer_token(req.headers()));

    let (response, websocket) = match hyper_tungstenite::upgrade(req, None) {
        Ok(upgrade) => upgrade,
        Err(e) => {
            warn!("WebSocket upgrade failed for {}: {}", addr, e);
            return Response::builder()
                .status(StatusCode::BAD_REQUEST)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(format!(
                    r#"{{"error": "WebSocket upgrade failed: {e}"}}"#
                ))))
                .unwrap();
        }
    };

    tokio::spawn(async move {
        match websocket.await {
            Ok(ws) => handle_connection(gateway, ws, token, addr).await,
            Err(e) => warn!("WebSocket connection failed: {}", e),
        }
    });

    response.map(|_| Full::new(Bytes::new()))
}

/// Run one connection's lifecycle: register, pump, deregister.
async fn handle_connection(
    gateway: Arc<ConnectionGateway>,
    ws: WsStream,
    token: Option<String>,
    addr: SocketAddr,
) {
    let handle = ConnectionHandle::generate();
    let (write, mut read) = ws.split();
    let sink = Arc::new(SocketSink::new(write));

    gateway
        .registry
        .insert(handle.clone(), Arc::clone(&sink) as Arc<dyn ConnectionSink>);

    // Resolve identity; failure leaves the connection anonymous, not closed
    let user = match token.as_deref() {
        Some(t) => gateway.identity.resolve(t).await,
        None => None,
    };

    match user {
        Some(ref user) => {
            if let Err(e) = gateway.presence.register(user, &handle).await {
                warn!(user = %user, "Presence registration failed, connection stays anonymous: {}", e);
            } else {
                info!(user = %user, handle = %handle, "Connected from {}", addr);
                gateway
                    .broadcast_except(
                        Some(&handle),
                        &Event::UserOnline {
                            user_id: user.clone(),
                        },
                    )
                    .await;
            }
        }
        None => {
            info!(handle = %handle, "Anonymous connection from {}", addr);
        }
    }

    // Inbound messages carry no application protocol; keep the socket alive
    // and watch for close.
    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Ping(data)) => {
                if sink.pong(data).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(handle = %handle, "Read error, closing: {}", e);
                break;
            }
        }
    }

    gateway.registry.remove(&handle);

    // Re-resolve the credential captured at connect time. If it was revoked
    // while connected there is no identity left to deregister.
    if let Some(t) = token.as_deref() {
        match gateway.identity.resolve(t).await {
            Some(user) => match gateway.presence.deregister(&user, &handle).await {
                Ok(true) => {
                    info!(user = %user, handle = %handle, "Disconnected");
                    gateway
                        .broadcast_except(None, &Event::UserOffline { user_id: user })
                        .await;
                }
                Ok(false) => {
                    // Superseded by a newer connection; the user is still online
                    debug!(user = %user, handle = %handle, "Disconnect of superseded handle");
                }
                Err(e) => warn!(user = %user, "Presence deregistration failed: {}", e),
            },
            None => debug!(handle = %handle, "Credential no longer resolvable at disconnect"),
        }
    }

    sink.close().await;
}

/// Serialize and push one event over a connection.
///
/// Bounded by `SEND_TIMEOUT`; an expired push counts as a failed delivery so
/// one wedged peer cannot stall the caller indefinitely.
async fn send_event(sink: &Arc<dyn ConnectionSink>, event: &Event) -> std::result::Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|_| ())?;
    match tokio::time::timeout(SEND_TIMEOUT, sink.push(text)).await {
        Ok(result) => result,
        Err(_) => Err(()),
    }
}

/// Extract token from query string
fn extract_token_from_query(query: Option<&str>) -> Option<String> {
    let query = query?;
    for param in query.split('&') {
        if let Some((key, value)) = param.split_once('=') {
            if key == "token" {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Extract token from an `Authorization: Bearer` header
fn extract_bearer_token(headers: &hyper::HeaderMap) -> Option<String> {
    let value = headers.get(hyper::header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|t| t.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::CredentialKind;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn gateway() -> (Arc<MemoryStore>, ConnectionGateway) {
        let store = Arc::new(MemoryStore::new());
        let presence = Arc::new(PresenceDirectory::new(store.clone()));
        let identity = Arc::new(IdentityResolver::new(
            store.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        ));
        (store.clone(), ConnectionGateway::new(64, presence, identity))
    }

    /// Sink that records every pushed payload
    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<String>>);

    #[async_trait]
    impl ConnectionSink for RecordingSink {
        async fn push(&self, text: String) -> std::result::Result<(), ()> {
            self.0.lock().unwrap().push(text);
            Ok(())
        }
    }

    /// Sink whose peer has stopped reading; push never completes
    struct WedgedSink;

    #[async_trait]
    impl ConnectionSink for WedgedSink {
        async fn push(&self, _text: String) -> std::result::Result<(), ()> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn send_to_unreachable_user_returns_false() {
        let (_, gateway) = gateway();
        let delivered = gateway
            .send_to_user(
                &UserId::new("u1"),
                &Event::ContactRequest {
                    sender_id: UserId::new("u2"),
                },
            )
            .await
            .unwrap();
        assert!(!delivered);
    }

    #[tokio::test]
    async fn stale_presence_entry_without_local_socket_returns_false() {
        let (_, gateway) = gateway();
        let user = UserId::new("u1");

        // Directory says the user is reachable, but no socket exists here
        gateway
            .presence
            .register(&user, &ConnectionHandle::from("conn_gone"))
            .await
            .unwrap();

        let delivered = gateway
            .send_to_user(
                &user,
                &Event::UserOnline {
                    user_id: user.clone(),
                },
            )
            .await
            .unwrap();
        assert!(!delivered);
    }

    #[tokio::test]
    async fn send_to_user_delivers_to_newest_registration_only() {
        let (_, gateway) = gateway();
        let user = UserId::new("u1");

        let first = ConnectionHandle::from("connA");
        let second = ConnectionHandle::from("connB");
        let sink_a = Arc::new(RecordingSink::default());
        let sink_b = Arc::new(RecordingSink::default());

        gateway
            .registry
            .insert(first.clone(), Arc::clone(&sink_a) as Arc<dyn ConnectionSink>);
        gateway
            .registry
            .insert(second.clone(), Arc::clone(&sink_b) as Arc<dyn ConnectionSink>);
        gateway.presence.register(&user, &first).await.unwrap();
        gateway.presence.register(&user, &second).await.unwrap();

        let event = Event::ContactRequest {
            sender_id: UserId::new("u2"),
        };
        let delivered = gateway.send_to_user(&user, &event).await.unwrap();
        assert!(delivered);

        let received = sink_b.0.lock().unwrap();
        assert_eq!(received.len(), 1);
        let parsed: Event = serde_json::from_str(&received[0]).unwrap();
        assert_eq!(parsed, event);

        // The superseded connection sees nothing
        assert!(sink_a.0.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_outlives_a_wedged_connection() {
        let (_, gateway) = gateway();

        gateway
            .registry
            .insert(ConnectionHandle::from("wedged"), Arc::new(WedgedSink));
        let healthy = Arc::new(RecordingSink::default());
        gateway.registry.insert(
            ConnectionHandle::from("healthy"),
            Arc::clone(&healthy) as Arc<dyn ConnectionSink>,
        );

        // Must terminate and still reach the healthy connection even though
        // the wedged sink's send never completes
        gateway
            .broadcast_except(
                None,
                &Event::UserOnline {
                    user_id: UserId::new("u1"),
                },
            )
            .await;

        assert_eq!(healthy.0.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn directed_send_to_wedged_connection_reports_false() {
        let (_, gateway) = gateway();
        let user = UserId::new("u1");
        let handle = ConnectionHandle::from("connA");

        gateway.registry.insert(handle.clone(), Arc::new(WedgedSink));
        gateway.presence.register(&user, &handle).await.unwrap();

        let delivered = gateway
            .send_to_user(
                &user,
                &Event::ContactRequest {
                    sender_id: UserId::new("u2"),
                },
            )
            .await
            .unwrap();
        assert!(!delivered);
    }

    #[tokio::test]
    async fn resolved_token_identifies_connection_owner() {
        let (_, gateway) = gateway();
        let user = UserId::new("u1");
        let token = gateway
            .identity
            .issue(&user, CredentialKind::Auth)
            .await
            .unwrap();

        assert_eq!(gateway.identity.resolve(&token).await, Some(user));
        assert_eq!(gateway.identity.resolve("bogus").await, None);
    }

    #[test]
    fn token_extraction_precedence_sources() {
        assert_eq!(
            extract_token_from_query(Some("token=abc&foo=bar")),
            Some("abc".to_string())
        );
        assert_eq!(extract_token_from_query(Some("foo=bar")), None);
        assert_eq!(extract_token_from_query(None), None);

        let mut headers = hyper::HeaderMap::new();
        headers.insert(
            hyper::header::AUTHORIZATION,
            "Bearer xyz".parse().unwrap(),
        );
        assert_eq!(extract_bearer_token(&headers), Some("xyz".to_string()));

        let empty = hyper::HeaderMap::new();
        assert_eq!(extract_bearer_token(&empty), None);
    }
}
