//! Identity resolution for Switchboard
//!
//! Provides:
//! - Opaque bearer credential issue/resolve/revoke over the cache
//! - Kind-scoped bulk revocation (logout-everywhere, invalidate verifications)
//! - Fail-closed resolution when the cache is unreachable

pub mod resolver;

pub use resolver::{CredentialKind, IdentityResolver};
