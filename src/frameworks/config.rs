//! Runtime configuration: everything read from the environment at startup.
//! A malformed value is a fatal startup error rather than a silently
//! ignored default, since a wrong bind address or turn timer would produce
//! confusing behavior far from where the mistake was made.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::interface_adapters::crypto::{CryptoConfigError, FrameCipher};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_TURN_SECONDS: u64 = 30;
const DEFAULT_RECONNECT_SECONDS: u64 = 60;
const DEFAULT_LOBBY_LEAD_SECONDS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BATTLESHIP_BIND_ADDR {0:?} is not a valid socket address")]
    BadBindAddr(String),
    #[error("{0} must be a positive integer number of seconds, got {1:?}")]
    BadDuration(&'static str, String),
    #[error("BATTLESHIP_ENCRYPTION_KEY is invalid: {0}")]
    BadEncryptionKey(#[from] CryptoConfigError),
}

/// Process-lifetime configuration, loaded once at startup.
pub struct Config {
    pub bind_addr: SocketAddr,
    pub turn_timeout: Duration,
    pub reconnect_window: Duration,
    pub lobby_lead: Duration,
    pub cipher: Option<FrameCipher>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr_raw = parse_env_or("BATTLESHIP_BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr = bind_addr_raw
            .parse()
            .map_err(|_| ConfigError::BadBindAddr(bind_addr_raw.clone()))?;

        let turn_timeout = parse_duration_seconds("BATTLESHIP_TURN_SECONDS", DEFAULT_TURN_SECONDS)?;
        let reconnect_window =
            parse_duration_seconds("BATTLESHIP_RECONNECT_SECONDS", DEFAULT_RECONNECT_SECONDS)?;
        let lobby_lead =
            parse_duration_seconds("BATTLESHIP_LOBBY_LEAD_SECONDS", DEFAULT_LOBBY_LEAD_SECONDS)?;

        let cipher = match env::var("BATTLESHIP_ENCRYPTION_KEY") {
            Ok(hex) => Some(FrameCipher::from_hex(&hex)?),
            Err(_) => None,
        };

        Ok(Self {
            bind_addr,
            turn_timeout,
            reconnect_window,
            lobby_lead,
            cipher,
        })
    }
}

fn parse_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_duration_seconds(key: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Err(_) => Ok(Duration::from_secs(default)),
        Ok(raw) => match raw.parse::<u64>() {
            Ok(0) => Err(ConfigError::BadDuration(key, raw)),
            Ok(secs) => Ok(Duration::from_secs(secs)),
            Err(_) => Err(ConfigError::BadDuration(key, raw)),
        },
    }
}
