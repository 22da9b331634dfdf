//! Presence directory
//!
//! Maps a user to their current live connection handle in the shared cache,
//! one entry per user. Registration is an unconditional upsert, so a user's
//! newest connection silently supersedes any earlier one for delivery
//! purposes; old handles are not proactively closed.
//!
//! Deregistration is compare-and-delete keyed by handle: a disconnecting
//! connection only removes the entry if the directory still points at *its*
//! handle. A superseded connection's late disconnect therefore leaves the
//! newer registration intact. The read-then-delete pair is two remote
//! operations; the directory is a best-effort, rebuildable cache and accepts
//! the remaining window.

use std::sync::Arc;
use tracing::debug;

use crate::store::KeyValueStore;
use crate::types::{ConnectionHandle, Result, SwitchboardError, UserId};

const PRESENCE_PREFIX: &str = "presence:";

/// The authoritative answer to "is this user currently reachable, and how"
pub struct PresenceDirectory {
    store: Arc<dyn KeyValueStore>,
}

impl PresenceDirectory {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Unconditional upsert: last registration wins for the user
    pub async fn register(&self, user: &UserId, handle: &ConnectionHandle) -> Result<()> {
        self.store
            .set(&presence_key(user), handle.as_str(), None)
            .await
            .map_err(|e| SwitchboardError::Cache(e.to_string()))?;
        debug!(user = %user, handle = %handle, "Presence registered");
        Ok(())
    }

    /// `None` means currently unreachable — a normal outcome, not an error
    pub async fn lookup(&self, user: &UserId) -> Result<Option<ConnectionHandle>> {
        let value = self
            .store
            .get(&presence_key(user))
            .await
            .map_err(|e| SwitchboardError::Cache(e.to_string()))?;
        Ok(value.map(ConnectionHandle))
    }

    /// Compare-and-delete: remove the entry only if it still holds `handle`.
    ///
    /// Returns whether the entry was removed. Absent entries and superseded
    /// handles are no-ops returning `false`.
    pub async fn deregister(&self, user: &UserId, handle: &ConnectionHandle) -> Result<bool> {
        let key = presence_key(user);
        let current = self
            .store
            .get(&key)
            .await
            .map_err(|e| SwitchboardError::Cache(e.to_string()))?;

        match current {
            Some(ref stored) if stored == handle.as_str() => {
                self.store
                    .delete(&key)
                    .await
                    .map_err(|e| SwitchboardError::Cache(e.to_string()))?;
                debug!(user = %user, handle = %handle, "Presence deregistered");
                Ok(true)
            }
            Some(_) => {
                debug!(user = %user, handle = %handle, "Stale handle, presence kept");
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

fn presence_key(user: &UserId) -> String {
    format!("{PRESENCE_PREFIX}{user}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn directory() -> PresenceDirectory {
        PresenceDirectory::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn never_registered_user_is_absent() {
        let dir = directory();
        assert_eq!(dir.lookup(&UserId::new("ghost")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let dir = directory();
        let u1 = UserId::new("u1");

        dir.register(&u1, &"connA".into()).await.unwrap();
        dir.register(&u1, &"connB".into()).await.unwrap();

        assert_eq!(
            dir.lookup(&u1).await.unwrap(),
            Some(ConnectionHandle::from("connB"))
        );
    }

    #[tokio::test]
    async fn deregister_makes_user_absent_again() {
        let dir = directory();
        let u1 = UserId::new("u1");
        let handle = ConnectionHandle::from("connA");

        dir.register(&u1, &handle).await.unwrap();
        assert!(dir.deregister(&u1, &handle).await.unwrap());
        assert_eq!(dir.lookup(&u1).await.unwrap(), None);

        // Deregistering an already-absent entry is a no-op
        assert!(!dir.deregister(&u1, &handle).await.unwrap());
    }

    #[tokio::test]
    async fn stale_handle_does_not_evict_newer_registration() {
        let dir = directory();
        let u1 = UserId::new("u1");

        dir.register(&u1, &"connA".into()).await.unwrap();
        dir.register(&u1, &"connB".into()).await.unwrap();

        // connA's late disconnect must not clobber connB
        assert!(!dir.deregister(&u1, &"connA".into()).await.unwrap());
        assert_eq!(
            dir.lookup(&u1).await.unwrap(),
            Some(ConnectionHandle::from("connB"))
        );
    }

    #[tokio::test]
    async fn users_are_independent() {
        let dir = directory();
        let u1 = UserId::new("u1");
        let u2 = UserId::new("u2");

        dir.register(&u1, &"conn1".into()).await.unwrap();
        dir.register(&u2, &"conn2".into()).await.unwrap();

        assert!(dir.deregister(&u1, &"conn1".into()).await.unwrap());
        assert_eq!(dir.lookup(&u1).await.unwrap(), None);
        assert_eq!(
            dir.lookup(&u2).await.unwrap(),
            Some(ConnectionHandle::from("conn2"))
        );
    }
}
