//! Switchboard - real-time presence and notification gateway
//!
//! Switchboard is the real-time subsystem of a chat platform: it resolves
//! bearer credentials against a shared cache, tracks which users are online,
//! owns the live WebSocket connections, and routes write-side events
//! (new messages, contact requests, presence changes) to the clients that
//! should see them.
//!
//! ## Services
//!
//! - **Identity**: credential issue/resolve/revoke over the cache
//! - **Presence**: user-to-connection directory with compare-and-delete eviction
//! - **Gateway**: WebSocket lifecycle, connection registry, send primitives
//! - **Events**: wire event shapes and write-side trigger points

pub mod config;
pub mod events;
pub mod gateway;
pub mod identity;
pub mod presence;
pub mod records;
pub mod routes;
pub mod server;
pub mod store;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, SwitchboardError};
