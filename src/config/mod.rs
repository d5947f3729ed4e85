//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::{RoomSettings, Tuning};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,

    /// Simulation steps per second
    pub tick_hz: u32,
    /// State broadcasts per second
    pub snap_hz: u32,
    /// How long a dropped human is kept before being pruned
    pub disconnect_grace_ms: u64,
    pub bot_count: usize,
    /// `false` turns on first-to-win-points matches
    pub endless_online: bool,
    /// Inbound WebSocket messages allowed per second per connection
    pub input_rate_limit: u32,

    /// Allowed client origins for CORS (comma-separated); `None` allows any
    pub client_origin: Option<String>,
    /// Fixed world seed for reproducible sessions
    pub world_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source; unset keys take their defaults
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match get("PORT") {
            Some(port) => format!("0.0.0.0:{}", port.trim()),
            None => get("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress(server_addr.clone()))?,

            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: get("LOG_FORMAT").is_some_and(|v| v.trim().eq_ignore_ascii_case("json")),

            tick_hz: parse_or(&get, "TICK_HZ", 60)?,
            snap_hz: parse_or(&get, "SNAP_HZ", 20)?,
            disconnect_grace_ms: parse_or(&get, "DISCONNECT_GRACE_MS", 30_000)?,
            bot_count: parse_or(&get, "BOT_COUNT", 14)?,
            endless_online: get("ENDLESS_ONLINE").map_or(true, |v| v.trim() != "0"),
            input_rate_limit: parse_or(&get, "INPUT_RATE_LIMIT", 60)?,

            client_origin: get("CLIENT_ORIGIN").filter(|s| !s.trim().is_empty()),
            world_seed: get("WORLD_SEED")
                .map(|raw| parse_value("WORLD_SEED", &raw))
                .transpose()?,
        };

        for (var, value) in [
            ("TICK_HZ", config.tick_hz),
            ("SNAP_HZ", config.snap_hz),
            ("INPUT_RATE_LIMIT", config.input_rate_limit),
        ] {
            if value == 0 {
                return Err(ConfigError::OutOfRange(var));
            }
        }

        Ok(config)
    }

    pub fn room_settings(&self) -> RoomSettings {
        RoomSettings {
            tick_hz: self.tick_hz,
            snap_hz: self.snap_hz,
            disconnect_grace_ms: self.disconnect_grace_ms,
        }
    }

    pub fn tuning(&self) -> Tuning {
        Tuning {
            bot_count: self.bot_count,
            endless: self.endless_online,
            ..Tuning::default()
        }
    }
}

fn parse_value<T: FromStr>(var: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        var,
        value: raw.to_string(),
    })
}

fn parse_or<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(var) {
        Some(raw) => parse_value(var, &raw),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format: {0}")]
    InvalidAddress(String),

    #[error("Invalid number for {var}: {value:?}")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    OutOfRange(&'static str),
}
