//! Real-time wire events and the event router
//!
//! Every event pushed over a live connection has a fixed, checkable shape:
//! a JSON object `{"event": <name>, "payload": {...}}`. The router owns the
//! mapping from write-side triggers to events and targets:
//!
//! | Trigger                 | Target                | Event            |
//! |-------------------------|-----------------------|------------------|
//! | message created         | message recipient     | `newMessage`     |
//! | contact request created | request recipient     | `contactRequest` |
//! | connection registered   | all other connections | `userOnline`     |
//! | connection deregistered | all other connections | `userOffline`    |
//!
//! Delivery is fire-and-forget: an unreachable target or a failed push is a
//! `false`, never an error, and is never retried or queued. The HTTP-level
//! operation that triggered the event has already succeeded on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::gateway::ConnectionGateway;
use crate::records::MessageRecord;
use crate::types::UserId;

/// Tagged wire event. Names and payload fields are the client contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum Event {
    #[serde(rename = "newMessage", rename_all = "camelCase")]
    NewMessage {
        sender_id: UserId,
        message: String,
        seen: bool,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "contactRequest", rename_all = "camelCase")]
    ContactRequest { sender_id: UserId },
    #[serde(rename = "userOnline", rename_all = "camelCase")]
    UserOnline { user_id: UserId },
    #[serde(rename = "userOffline", rename_all = "camelCase")]
    UserOffline { user_id: UserId },
}

/// Write-side trigger points.
///
/// Called by request-handling code after the corresponding durable write has
/// succeeded, never before. Every method swallows delivery and infrastructure
/// failure; the returned flag only reports whether the push landed.
pub struct EventRouter {
    gateway: Arc<ConnectionGateway>,
}

impl EventRouter {
    pub fn new(gateway: Arc<ConnectionGateway>) -> Self {
        Self { gateway }
    }

    /// A message was persisted; notify the recipient if reachable
    pub async fn message_created(&self, message: &MessageRecord) -> bool {
        let event = Event::NewMessage {
            sender_id: message.sender_id.clone(),
            message: message.body.clone(),
            seen: false,
            timestamp: message.timestamp,
        };
        self.deliver(&message.recipient_id, &event).await
    }

    /// A contact request was persisted; notify the recipient if reachable
    pub async fn contact_request_created(&self, sender: &UserId, recipient: &UserId) -> bool {
        let event = Event::ContactRequest {
            sender_id: sender.clone(),
        };
        self.deliver(recipient, &event).await
    }

    async fn deliver(&self, target: &UserId, event: &Event) -> bool {
        match self.gateway.send_to_user(target, event).await {
            Ok(delivered) => delivered,
            Err(e) => {
                // Push is best-effort; the durable write already succeeded
                warn!(target = %target, "Real-time delivery failed: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityResolver;
    use crate::presence::PresenceDirectory;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn new_message_wire_shape() {
        let timestamp: DateTime<Utc> = "2026-08-26T12:00:00Z".parse().unwrap();
        let event = Event::NewMessage {
            sender_id: UserId::new("u1"),
            message: "hello".into(),
            seen: false,
            timestamp,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "newMessage",
                "payload": {
                    "senderId": "u1",
                    "message": "hello",
                    "seen": false,
                    "timestamp": "2026-08-26T12:00:00Z"
                }
            })
        );
    }

    #[test]
    fn contact_request_wire_shape() {
        let event = Event::ContactRequest {
            sender_id: UserId::new("u9"),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "contactRequest",
                "payload": { "senderId": "u9" }
            })
        );
    }

    #[test]
    fn presence_event_wire_shapes() {
        let online = Event::UserOnline {
            user_id: UserId::new("u1"),
        };
        let offline = Event::UserOffline {
            user_id: UserId::new("u1"),
        };

        assert_eq!(
            serde_json::to_value(&online).unwrap(),
            json!({ "event": "userOnline", "payload": { "userId": "u1" } })
        );
        assert_eq!(
            serde_json::to_value(&offline).unwrap(),
            json!({ "event": "userOffline", "payload": { "userId": "u1" } })
        );
    }

    #[test]
    fn events_roundtrip() {
        let event = Event::UserOnline {
            user_id: UserId::new("u1"),
        };
        let text = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&text).unwrap();
        assert_eq!(event, back);
    }

    #[tokio::test]
    async fn triggers_report_false_for_unreachable_targets() {
        let store = Arc::new(MemoryStore::new());
        let presence = Arc::new(PresenceDirectory::new(store.clone()));
        let identity = Arc::new(IdentityResolver::new(
            store,
            Duration::from_secs(3600),
            Duration::from_secs(60),
        ));
        let gateway = Arc::new(ConnectionGateway::new(64, presence, identity));
        let router = EventRouter::new(gateway);

        let message = MessageRecord {
            id: "m1".into(),
            sender_id: UserId::new("u1"),
            recipient_id: UserId::new("offline-user"),
            body: "hi".into(),
            seen: false,
            contact_id: "c1".into(),
            timestamp: Utc::now(),
        };

        assert!(!router.message_created(&message).await);
        assert!(
            !router
                .contact_request_created(&UserId::new("u1"), &UserId::new("offline-user"))
                .await
        );
    }
}
