//! Configuration for Switchboard
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

/// Switchboard - real-time presence and notification gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "switchboard")]
#[command(about = "Presence and notification gateway for the chat backend")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Credential/presence cache URL (Redis)
    #[arg(long, env = "CACHE_URL", default_value = "redis://127.0.0.1:6379")]
    pub cache_url: String,

    /// Enable development mode (in-memory cache fallback when Redis is down)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// TTL for auth credentials in seconds (default 7 days)
    #[arg(long, env = "AUTH_TTL_SECONDS", default_value = "604800")]
    pub auth_ttl_seconds: u64,

    /// TTL for email-verification credentials in seconds (default 1 hour)
    #[arg(long, env = "VERIFICATION_TTL_SECONDS", default_value = "3600")]
    pub verification_ttl_seconds: u64,

    /// Maximum concurrent real-time connections
    #[arg(long, env = "MAX_CONNECTIONS", default_value = "16384")]
    pub max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// TTL applied to auth credentials at issue time
    pub fn auth_ttl(&self) -> Duration {
        Duration::from_secs(self.auth_ttl_seconds)
    }

    /// TTL applied to email-verification credentials at issue time
    pub fn verification_ttl(&self) -> Duration {
        Duration::from_secs(self.verification_ttl_seconds)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.auth_ttl_seconds == 0 {
            return Err("AUTH_TTL_SECONDS must be greater than zero".to_string());
        }
        if self.verification_ttl_seconds == 0 {
            return Err("VERIFICATION_TTL_SECONDS must be greater than zero".to_string());
        }
        if self.max_connections == 0 {
            return Err("MAX_CONNECTIONS must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let args = Args::parse_from(["switchboard"]);
        assert!(args.validate().is_ok());
        assert_eq!(args.verification_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn zero_ttl_rejected() {
        let args = Args::parse_from(["switchboard", "--auth-ttl-seconds", "0"]);
        assert!(args.validate().is_err());
    }
}
