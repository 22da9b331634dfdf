//! Collaborator record schemas
//!
//! Switchboard does not persist any of these; they are the shapes the durable
//! store (owned by the HTTP/CRUD side) hands to the event router after a
//! write succeeds. Declared here so both sides agree on field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// A person, as stored by the durable store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// A mutual relationship between two users.
///
/// The pair is canonicalized (low ≤ high, lexicographic) so (A,B) and (B,A)
/// collide on the same record; the durable store enforces uniqueness on the
/// canonical pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: String,
    pub user_id_low: UserId,
    pub user_id_high: UserId,
}

impl ContactRecord {
    /// Build a record with the pair in canonical order
    pub fn new(id: impl Into<String>, a: UserId, b: UserId) -> Self {
        let (low, high) = canonical_pair(a, b);
        Self {
            id: id.into(),
            user_id_low: low,
            user_id_high: high,
        }
    }
}

/// Sort two user ids into canonical (low, high) order
pub fn canonical_pair(a: UserId, b: UserId) -> (UserId, UserId) {
    if a.0 <= b.0 {
        (a, b)
    } else {
        (b, a)
    }
}

/// One chat message. Append-only except for the seen flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: String,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub body: String,
    pub seen: bool,
    pub contact_id: String,
    pub timestamp: DateTime<Utc>,
}

impl MessageRecord {
    /// The only legal seen-flag transition is false → true
    pub fn mark_seen(&mut self) {
        self.seen = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_pair_collides_regardless_of_order() {
        let ab = ContactRecord::new("c1", UserId::new("alice"), UserId::new("bob"));
        let ba = ContactRecord::new("c1", UserId::new("bob"), UserId::new("alice"));
        assert_eq!(ab, ba);
        assert_eq!(ab.user_id_low, UserId::new("alice"));
        assert_eq!(ab.user_id_high, UserId::new("bob"));
    }

    #[test]
    fn mark_seen_is_one_way() {
        let mut msg = MessageRecord {
            id: "m1".into(),
            sender_id: UserId::new("u1"),
            recipient_id: UserId::new("u2"),
            body: "hi".into(),
            seen: false,
            contact_id: "c1".into(),
            timestamp: Utc::now(),
        };
        msg.mark_seen();
        assert!(msg.seen);
        msg.mark_seen();
        assert!(msg.seen);
    }
}
