//! Server settings read from the environment.

use anyhow::Context;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_GRACE_SECS: u64 = 60;

/// Runtime settings for the session host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// How long a dropped player keeps their seat before the AI takes over
    pub reconnect_grace: Duration,
}

impl ServerConfig {
    /// Read `SERVER_ADDR` and `RECONNECT_GRACE_SECS`, falling back to defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_values(
            std::env::var("SERVER_ADDR").ok(),
            std::env::var("RECONNECT_GRACE_SECS").ok(),
        )
    }

    fn from_values(addr: Option<String>, grace_secs: Option<String>) -> anyhow::Result<Self> {
        let addr = addr.unwrap_or_else(|| DEFAULT_ADDR.into());
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid SERVER_ADDR `{}`", addr))?;

        let grace_secs = match grace_secs {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid RECONNECT_GRACE_SECS `{}`", raw))?,
            None => DEFAULT_GRACE_SECS,
        };

        Ok(Self {
            addr,
            reconnect_grace: Duration::from_secs(grace_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_values(None, None).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.reconnect_grace, Duration::from_secs(60));
    }

    #[test]
    fn test_overrides() {
        let config =
            ServerConfig::from_values(Some("127.0.0.1:9000".into()), Some("5".into())).unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.reconnect_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(ServerConfig::from_values(Some("nowhere".into()), None).is_err());
        assert!(ServerConfig::from_values(None, Some("soon".into())).is_err());
    }
}
