//! Console CLI mode tracking.
//!
//! The switch CLI is a mode-based interpreter: a command is only accepted in
//! the mode it belongs to, and `interface`/`vlan`/`line`/`exit` move between
//! modes. Replaying a built sequence through [`ModeTracker`] rejects sequences
//! the switch would refuse before anything reaches the wire.

use std::fmt;

use crate::error::ModeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    UserExec,
    PrivilegedExec,
    GlobalConfig,
    Interface,
    Vlan,
    Line,
}

impl CliMode {
    pub fn is_config(self) -> bool {
        !matches!(self, CliMode::UserExec | CliMode::PrivilegedExec)
    }

    fn is_submode(self) -> bool {
        matches!(self, CliMode::Interface | CliMode::Vlan | CliMode::Line)
    }
}

impl fmt::Display for CliMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CliMode::UserExec => "user exec",
            CliMode::PrivilegedExec => "privileged exec",
            CliMode::GlobalConfig => "global configuration",
            CliMode::Interface => "interface configuration",
            CliMode::Vlan => "VLAN configuration",
            CliMode::Line => "line configuration",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandKind {
    Blank,
    Enable,
    Configure,
    Enter(CliMode),
    Exit,
    End,
    /// Only valid inside the given sub-mode
    Scoped(CliMode),
    /// Global configuration command
    Config,
    /// Save running config
    Persist,
}

const INTERFACE_SCOPED: &[&str] = &[
    "switchport",
    "ip address",
    "no ip address",
    "shutdown",
    "no shutdown",
    "description",
    "spanning-tree",
];
const VLAN_SCOPED: &[&str] = &["name"];
const LINE_SCOPED: &[&str] = &["password", "login", "transport", "exec-timeout", "logging synchronous"];
const PERSIST: &[&str] = &["wr", "wr mem", "write", "write memory", "copy running-config startup-config"];

fn starts_with_word(command: &str, word: &str) -> bool {
    command == word
        || command
            .strip_prefix(word)
            .is_some_and(|rest| rest.starts_with(' '))
}

fn classify(command: &str) -> CommandKind {
    let command = command.trim();
    let scoped = |words: &[&str]| words.iter().any(|w| starts_with_word(command, w));

    match command {
        "" => CommandKind::Blank,
        "enable" => CommandKind::Enable,
        "configure terminal" | "conf t" => CommandKind::Configure,
        "exit" => CommandKind::Exit,
        "end" => CommandKind::End,
        c if PERSIST.contains(&c) => CommandKind::Persist,
        c if starts_with_word(c, "interface") => CommandKind::Enter(CliMode::Interface),
        c if starts_with_word(c, "vlan") => CommandKind::Enter(CliMode::Vlan),
        c if starts_with_word(c, "line") => CommandKind::Enter(CliMode::Line),
        _ if scoped(INTERFACE_SCOPED) => CommandKind::Scoped(CliMode::Interface),
        _ if scoped(VLAN_SCOPED) => CommandKind::Scoped(CliMode::Vlan),
        _ if scoped(LINE_SCOPED) => CommandKind::Scoped(CliMode::Line),
        _ => CommandKind::Config,
    }
}

/// ModeTracker follows the CLI mode across a stream of commands
#[derive(Debug, Clone)]
pub struct ModeTracker {
    mode: CliMode,
    index: usize,
}

impl Default for ModeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeTracker {
    /// A console session starts in user exec mode
    pub fn new() -> Self {
        Self {
            mode: CliMode::UserExec,
            index: 0,
        }
    }

    pub fn mode(&self) -> CliMode {
        self.mode
    }

    /// Apply one command, returning the mode the CLI is in afterwards
    pub fn apply(&mut self, command: &str) -> Result<CliMode, ModeError> {
        use CliMode::*;

        let next = match (classify(command), self.mode) {
            (CommandKind::Blank, mode) => Some(mode),
            (CommandKind::Enable, UserExec | PrivilegedExec) => Some(PrivilegedExec),
            (CommandKind::Configure, PrivilegedExec) => Some(GlobalConfig),
            // Entering a sub-mode from another sub-mode implicitly leaves the first.
            (CommandKind::Enter(target), mode) if mode.is_config() => Some(target),
            (CommandKind::Exit, mode) if mode.is_submode() => Some(GlobalConfig),
            (CommandKind::Exit, GlobalConfig) => Some(PrivilegedExec),
            (CommandKind::End, mode) if mode.is_config() => Some(PrivilegedExec),
            (CommandKind::Scoped(required), mode) if mode == required => Some(mode),
            (CommandKind::Config, mode) if mode.is_config() => Some(GlobalConfig),
            (CommandKind::Persist, mode @ (PrivilegedExec | GlobalConfig)) => Some(mode),
            _ => None,
        };

        let result = match next {
            Some(mode) => {
                self.mode = mode;
                Ok(mode)
            }
            None => Err(ModeError {
                index: self.index,
                command: command.to_string(),
                mode: self.mode,
            }),
        };
        self.index += 1;
        result
    }
}

/// Replay commands from a fresh console session, returning the final mode
pub fn validate<'a>(commands: impl IntoIterator<Item = &'a str>) -> Result<CliMode, ModeError> {
    let mut tracker = ModeTracker::new();
    for command in commands {
        tracker.apply(command)?;
    }
    Ok(tracker.mode())
}
