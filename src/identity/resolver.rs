//! Credential issue/resolve/revoke against the cache
//!
//! A credential is an unguessable token bound to a (user, kind) pair and
//! stored as `cred:{token}` → JSON `{"id": ..., "type": ...}` with a
//! store-level expiry. Several live credentials may exist for the same
//! (user, kind) — one per logged-in session.
//!
//! Resolution fails closed: if the cache is down, every token reads as
//! unknown and callers must re-authenticate. That is the intended degraded
//! mode; it must never surface as a fatal error on the request path.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::store::KeyValueStore;
use crate::types::{Result, SwitchboardError, UserId};

/// Key prefix for credential entries in the shared cache.
///
/// Scoped so the revoke-all scan never walks presence keys.
const CRED_PREFIX: &str = "cred:";

/// What a credential proves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialKind {
    /// Long-lived login session token
    #[serde(rename = "auth")]
    Auth,
    /// Short-lived email verification token
    #[serde(rename = "email-verification")]
    EmailVerification,
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKind::Auth => f.write_str("auth"),
            CredentialKind::EmailVerification => f.write_str("email-verification"),
        }
    }
}

/// Cached credential value: JSON `{id, type}`
#[derive(Debug, Serialize, Deserialize)]
struct CredentialRecord {
    id: UserId,
    #[serde(rename = "type")]
    kind: CredentialKind,
}

/// Maps bearer tokens to user identities via the cache
pub struct IdentityResolver {
    store: Arc<dyn KeyValueStore>,
    auth_ttl: Duration,
    verification_ttl: Duration,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn KeyValueStore>, auth_ttl: Duration, verification_ttl: Duration) -> Self {
        Self {
            store,
            auth_ttl,
            verification_ttl,
        }
    }

    /// Generate and store a credential bound to (user, kind).
    ///
    /// Returns the token; the cache owns expiry from here on.
    pub async fn issue(&self, user: &UserId, kind: CredentialKind) -> Result<String> {
        let token = generate_token();
        let record = CredentialRecord {
            id: user.clone(),
            kind,
        };
        let value = serde_json::to_string(&record)
            .map_err(|e| SwitchboardError::Cache(format!("credential encode failed: {e}")))?;

        let ttl = match kind {
            CredentialKind::Auth => self.auth_ttl,
            CredentialKind::EmailVerification => self.verification_ttl,
        };

        self.store
            .set(&credential_key(&token), &value, Some(ttl))
            .await
            .map_err(|e| SwitchboardError::Cache(e.to_string()))?;

        debug!(user = %user, kind = %kind, "Issued credential");
        Ok(token)
    }

    /// Resolve a token to its bound user.
    ///
    /// `None` covers unknown, expired, and malformed tokens — and cache
    /// unavailability, which is deliberately indistinguishable from a miss.
    pub async fn resolve(&self, token: &str) -> Option<UserId> {
        let value = match self.store.get(&credential_key(token)).await {
            Ok(v) => v?,
            Err(e) => {
                warn!("Credential cache unavailable, failing closed: {}", e);
                return None;
            }
        };

        match serde_json::from_str::<CredentialRecord>(&value) {
            Ok(record) => Some(record.id),
            Err(e) => {
                warn!("Malformed credential value in cache: {}", e);
                None
            }
        }
    }

    /// Delete one token. Idempotent; a missing key is not an error.
    pub async fn revoke(&self, token: &str) -> Result<()> {
        self.store
            .delete(&credential_key(token))
            .await
            .map_err(|e| SwitchboardError::Cache(e.to_string()))
    }

    /// Delete every credential bound to (user, kind), regardless of token value.
    ///
    /// Scans the whole credential key space — O(total active credentials),
    /// accepted at this scale. Malformed values are treated as stale and
    /// deleted; an individual delete failure is logged and the scan continues.
    /// Returns the number of matching credentials removed.
    pub async fn revoke_all(&self, user: &UserId, kind: CredentialKind) -> Result<usize> {
        let keys = self
            .store
            .keys(CRED_PREFIX)
            .await
            .map_err(|e| SwitchboardError::Cache(e.to_string()))?;

        let mut removed = 0usize;
        for key in keys {
            let value = match self.store.get(&key).await {
                Ok(Some(v)) => v,
                Ok(None) => continue, // expired between scan and read
                Err(e) => {
                    warn!(key = %key, "Skipping unreadable credential during revoke-all: {}", e);
                    continue;
                }
            };

            let matches = match serde_json::from_str::<CredentialRecord>(&value) {
                Ok(record) => record.id == *user && record.kind == kind,
                Err(_) => {
                    // Stale or partially written entry: remove rather than abort
                    if let Err(e) = self.store.delete(&key).await {
                        warn!(key = %key, "Failed to delete stale credential entry: {}", e);
                    }
                    continue;
                }
            };

            if matches {
                match self.store.delete(&key).await {
                    Ok(()) => removed += 1,
                    Err(e) => {
                        warn!(key = %key, "Failed to revoke credential, continuing scan: {}", e);
                    }
                }
            }
        }

        debug!(user = %user, kind = %kind, removed, "Revoked credentials by kind");
        Ok(removed)
    }
}

fn credential_key(token: &str) -> String {
    format!("{CRED_PREFIX}{token}")
}

/// 32 random bytes, hex-encoded
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
