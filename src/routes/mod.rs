//! HTTP routes for Switchboard

pub mod health;

pub use health::{health_check, readiness_check, status_check, version_info};
