//! Command sequence generation.
//!
//! Maps one switch's configuration plus the global settings onto the ordered
//! list of CLI commands that puts the switch in the intended state. Pure: no
//! I/O, no logging, and identical inputs always produce identical output.

pub mod mode;

use crate::error::InvalidSwitchConfigError;
use crate::models::{GlobalConfig, SwitchConfig, VlanId};
use crate::utils::interfaces_match;

/// Priming submissions that clear a pending prompt and reach global
/// configuration mode. Sent before any configuration command.
pub const HANDSHAKE: [&str; 4] = ["", "", "enable", "configure terminal"];

const PORT_SECURITY_MAXIMUM: u32 = 2;
const PORT_SECURITY_AGING_MINUTES: u32 = 5;

/// CommandSequence is everything sent to one switch, in transmission order.
/// No entry carries a line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSequence {
    pub handshake: Vec<String>,
    pub commands: Vec<String>,
}

impl CommandSequence {
    /// Total number of console submissions, handshake included
    pub fn len(&self) -> usize {
        self.handshake.len() + self.commands.len()
    }

    /// Handshake followed by configuration commands
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.handshake
            .iter()
            .chain(self.commands.iter())
            .map(String::as_str)
    }
}

/// Build the full command sequence for one switch.
///
/// Fails without producing anything when the switch references a VLAN it
/// does not define, lists a trunk port twice, or would emit a command the
/// console would reject in its current mode.
pub fn build(switch: &SwitchConfig, global: &GlobalConfig) -> Result<CommandSequence, InvalidSwitchConfigError> {
    check_references(switch, global)?;

    let mut commands = Vec::new();
    push_identity(&mut commands, switch);
    push_vlans(&mut commands, switch);
    push_trunk_ports(&mut commands, switch);
    push_access_ports(&mut commands, switch, global);
    push_management_interface(&mut commands, switch, global);
    push_closing(&mut commands, global);

    let sequence = CommandSequence {
        handshake: HANDSHAKE.iter().map(|s| s.to_string()).collect(),
        commands,
    };

    if let Some(command) = sequence.iter().find(|c| c.contains(['\r', '\n'])) {
        return Err(InvalidSwitchConfigError::EmbeddedTerminator {
            command: command.to_string(),
        });
    }
    mode::validate(sequence.iter())?;

    Ok(sequence)
}

fn check_references(switch: &SwitchConfig, global: &GlobalConfig) -> Result<(), InvalidSwitchConfigError> {
    let referenced = [
        ("management", global.management_vlan),
        ("data", global.data_vlan),
        ("voice", global.voice_vlan),
    ];
    for (role, vlan) in referenced {
        if !switch.vlans.contains_key(&vlan) {
            return Err(InvalidSwitchConfigError::UndefinedVlan { role, vlan });
        }
    }

    for (idx, port) in switch.trunk_ports.iter().enumerate() {
        if switch.trunk_ports[..idx].iter().any(|earlier| interfaces_match(earlier, port)) {
            return Err(InvalidSwitchConfigError::DuplicateTrunkPort { port: port.clone() });
        }
    }
    Ok(())
}

fn push_identity(commands: &mut Vec<String>, switch: &SwitchConfig) {
    commands.push(format!("hostname {}", switch.hostname));
    commands.push("no ip domain-lookup".to_string());
}

fn push_vlans(commands: &mut Vec<String>, switch: &SwitchConfig) {
    for (id, vlan) in &switch.vlans {
        commands.push(format!("vlan {}", id));
        commands.push(format!("name {}", vlan.name));
    }
}

/// Comma-joined VLAN ids, in the same order VLANs are defined
fn allowed_vlan_list(switch: &SwitchConfig) -> String {
    switch
        .vlan_ids()
        .map(|id: VlanId| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn push_trunk_ports(commands: &mut Vec<String>, switch: &SwitchConfig) {
    let allowed = allowed_vlan_list(switch);
    for port in &switch.trunk_ports {
        commands.extend([
            format!("interface {}", port),
            "switchport mode trunk".to_string(),
            "switchport trunk encapsulation dot1q".to_string(),
            format!("switchport trunk allowed vlan {}", allowed),
            "exit".to_string(),
        ]);
    }
}

fn push_access_ports(commands: &mut Vec<String>, switch: &SwitchConfig, global: &GlobalConfig) {
    for n in 1..=global.total_ports {
        let port = global.port_name(n);
        if switch.trunk_ports.iter().any(|trunk| interfaces_match(trunk, &port)) {
            continue;
        }
        commands.extend([
            format!("interface {}", port),
            "switchport mode access".to_string(),
            format!("switchport access vlan {}", global.data_vlan),
            format!("switchport voice vlan {}", global.voice_vlan),
            "switchport port-security".to_string(),
            format!("switchport port-security maximum {}", PORT_SECURITY_MAXIMUM),
            "switchport port-security violation restrict".to_string(),
            format!("switchport port-security aging time {}", PORT_SECURITY_AGING_MINUTES),
            "switchport port-security aging type inactivity".to_string(),
            "exit".to_string(),
        ]);
    }
}

fn push_management_interface(commands: &mut Vec<String>, switch: &SwitchConfig, global: &GlobalConfig) {
    let Some((ip, subnet)) = switch
        .vlans
        .get(&global.management_vlan)
        .and_then(|vlan| vlan.management_address())
    else {
        return;
    };
    commands.extend([
        format!("interface vlan {}", global.management_vlan),
        format!("ip address {} {}", ip, subnet),
        "no shutdown".to_string(),
        "exit".to_string(),
    ]);
}

fn push_closing(commands: &mut Vec<String>, global: &GlobalConfig) {
    commands.extend([
        "line console 0".to_string(),
        format!("password {}", global.console_password),
        "login".to_string(),
        "exit".to_string(),
        "line vty 0 4".to_string(),
        format!("password {}", global.vty_password),
        "login".to_string(),
        "transport input ssh".to_string(),
        "exit".to_string(),
        format!("enable secret {}", global.enable_password),
        "service password-encryption".to_string(),
        format!("crypto key generate rsa modulus {}", global.ssh_modulus),
        "ip ssh version 2".to_string(),
        "wr mem".to_string(),
    ]);
}
