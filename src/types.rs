//! Shared types for Switchboard
//!
//! Error taxonomy follows the delivery contract: "not found" is always an
//! `Option`, never an error. Errors here mean genuine infrastructure failure
//! (cache unreachable, socket bind failed, bad configuration).

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Switchboard error type
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Credential/presence cache failure (network, protocol, serialization)
    #[error("cache error: {0}")]
    Cache(String),

    /// Configuration error detected at startup
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O failure (listener bind, socket accept)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, SwitchboardError>;

/// Opaque stable identifier for a person.
///
/// Assigned by the durable store (out of scope here); Switchboard only ever
/// compares, hashes, and forwards it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque identifier for one live real-time connection.
///
/// Assigned by the gateway when it accepts the socket; owns exactly one
/// `UserId` between registration and deregistration, none outside that window.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionHandle(pub String);

impl ConnectionHandle {
    /// Mint a fresh handle for a newly accepted connection
    pub fn generate() -> Self {
        Self(format!("conn_{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConnectionHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_unique() {
        let a = ConnectionHandle::generate();
        let b = ConnectionHandle::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("conn_"));
    }

    #[test]
    fn user_id_serializes_transparently() {
        let id = UserId::new("u42");
        assert_eq!(serde_json::to_string(&id).unwrap(), r#""u42""#);
    }
}
