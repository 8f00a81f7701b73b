use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::transport::Pacing;

/// Settings holds runtime configuration that is not part of the switch
/// document. Command line flags override these after loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub config_file: PathBuf,
    pub transcript_dir: PathBuf,
    pub transcripts_enabled: bool,
    pub command_delay_ms: u64,
    pub handshake_delay_ms: u64,
    pub serial_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_file: PathBuf::from("config.json"),
            transcript_dir: PathBuf::from("transcripts"),
            transcripts_enabled: true,
            command_delay_ms: 2000,
            handshake_delay_ms: 3000,
            serial_timeout_secs: 5,
        }
    }
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let number = |key: &str, default: u64| match get(key) {
            Some(v) => v.trim().parse().unwrap_or_else(|_| {
                tracing::warn!("Ignoring {}={:?}: not a number, using {}", key, v, default);
                default
            }),
            None => default,
        };

        Self {
            config_file: get("CONFIG_FILE").map(PathBuf::from).unwrap_or(defaults.config_file),
            transcript_dir: get("TRANSCRIPT_DIR").map(PathBuf::from).unwrap_or(defaults.transcript_dir),
            transcripts_enabled: get("TRANSCRIPTS")
                .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"))
                .unwrap_or(defaults.transcripts_enabled),
            command_delay_ms: number("COMMAND_DELAY_MS", defaults.command_delay_ms),
            handshake_delay_ms: number("HANDSHAKE_DELAY_MS", defaults.handshake_delay_ms),
            serial_timeout_secs: number("SERIAL_TIMEOUT_SECS", defaults.serial_timeout_secs),
        }
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            handshake_delay: Duration::from_millis(self.handshake_delay_ms),
            command_delay: Duration::from_millis(self.command_delay_ms),
        }
    }

    pub fn serial_timeout(&self) -> Duration {
        Duration::from_secs(self.serial_timeout_secs)
    }
}
