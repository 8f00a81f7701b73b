use thiserror::Error;

use crate::models::VlanId;

/// Errors raised while loading the provisioning document.
///
/// These are fatal for the whole run and surface before any command is built
/// or transmitted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON, a wrong type, or a missing required key. `path` is the
    /// JSON path of the offending value (e.g. `switches[0].hostname`).
    #[error("invalid config at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("switch {hostname}: management VLAN {vlan} is not defined in its vlans")]
    MissingManagementVlan { hostname: String, vlan: VlanId },
}

/// Structural inconsistency in a single switch's configuration.
///
/// Fatal for that switch only; the run controller records it and moves on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidSwitchConfigError {
    #[error("{role} VLAN {vlan} is not defined in vlans")]
    UndefinedVlan { role: &'static str, vlan: VlanId },

    #[error("trunk port {port} is listed more than once")]
    DuplicateTrunkPort { port: String },

    #[error("command {command:?} would embed a line terminator")]
    EmbeddedTerminator { command: String },

    #[error(transparent)]
    ModeSequence(#[from] ModeError),
}

/// A command that the console CLI would reject in the mode it is issued from.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("command #{index} {command:?} is not valid in {mode} mode")]
pub struct ModeError {
    pub index: usize,
    pub command: String,
    pub mode: crate::commands::mode::CliMode,
}

/// Serial console failures. Reported per switch; they never touch the
/// loaded configuration.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to open console {endpoint}")]
    Open {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {command:?} to console")]
    Write {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read console output after {command:?}")]
    Read {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transcript write failed")]
    Transcript(#[source] std::io::Error),

    #[error("console task failed: {0}")]
    Task(String),
}

/// A delivery that stopped part way. `sent` counts console submissions that
/// were written before the failure.
#[derive(Debug, Error)]
#[error("console delivery stopped after {sent} command(s)")]
pub struct DeliveryError {
    pub sent: usize,
    #[source]
    pub source: TransportError,
}
