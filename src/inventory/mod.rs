use std::collections::HashSet;
use std::path::Path;

use crate::error::ConfigError;
use crate::models::{ConsoleEndpoint, GlobalConfig, Inventory, SwitchConfig};
use crate::utils::{has_control_chars, is_valid_hostname, is_valid_ipv4, MAX_HOSTNAME_LEN};

/// Load and validate the provisioning document from a file
pub fn load_file(path: &Path) -> Result<Inventory, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load(&content)
}

/// Parse and validate the provisioning document.
///
/// Fails on malformed JSON, missing required keys, out-of-range values, and
/// switches whose `vlans` do not define the global management VLAN. Nothing
/// is built or transmitted until this succeeds.
pub fn load(source: &str) -> Result<Inventory, ConfigError> {
    let mut de = serde_json::Deserializer::from_str(source);
    let inventory: Inventory = serde_path_to_error::deserialize(&mut de).map_err(|e| {
        let path = e.path().to_string();
        ConfigError::Parse {
            path,
            message: e.into_inner().to_string(),
        }
    })?;
    de.end().map_err(|e| ConfigError::Parse {
        path: ".".to_string(),
        message: e.to_string(),
    })?;

    validate(&inventory)?;

    tracing::debug!(
        "Loaded {} switch(es), {} ports each",
        inventory.switches.len(),
        inventory.global.total_ports
    );
    Ok(inventory)
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

fn require_text(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if has_control_chars(value) {
        return Err(invalid(field, "must not contain control characters"));
    }
    Ok(())
}

fn validate(inventory: &Inventory) -> Result<(), ConfigError> {
    validate_global(&inventory.global)?;

    if inventory.switches.is_empty() {
        tracing::warn!("Config defines no switches; nothing to provision");
    }

    let mut seen = HashSet::new();
    for (idx, switch) in inventory.switches.iter().enumerate() {
        validate_switch(idx, switch, &inventory.global)?;
        if !seen.insert(switch.hostname.to_lowercase()) {
            tracing::warn!("Hostname {} appears more than once", switch.hostname);
        }
    }
    Ok(())
}

fn validate_global(global: &GlobalConfig) -> Result<(), ConfigError> {
    require_text("global.console_password", &global.console_password)?;
    require_text("global.vty_password", &global.vty_password)?;
    require_text("global.enable_password", &global.enable_password)?;
    require_text("global.interface_prefix", &global.interface_prefix)?;

    if global.ssh_modulus == 0 {
        return Err(invalid("global.ssh_modulus", "must be a positive integer"));
    }
    if global.total_ports == 0 {
        return Err(invalid("global.total_ports", "must be a positive integer"));
    }
    validate_endpoint("global", &global.console())
}

fn validate_endpoint(scope: &str, endpoint: &ConsoleEndpoint) -> Result<(), ConfigError> {
    require_text(&format!("{}.serial_port", scope), &endpoint.serial_port)?;
    if endpoint.baud_rate == 0 {
        return Err(invalid(format!("{}.baud_rate", scope), "must be a positive integer"));
    }
    Ok(())
}

fn validate_switch(idx: usize, switch: &SwitchConfig, global: &GlobalConfig) -> Result<(), ConfigError> {
    let scope = format!("switches[{}]", idx);

    if switch.hostname.is_empty() {
        return Err(invalid(format!("{}.hostname", scope), "must not be empty"));
    }
    if switch.hostname.len() > MAX_HOSTNAME_LEN {
        return Err(invalid(
            format!("{}.hostname", scope),
            format!(
                "{:?} is {} characters long; at most {} are allowed",
                switch.hostname,
                switch.hostname.len(),
                MAX_HOSTNAME_LEN
            ),
        ));
    }
    if !is_valid_hostname(&switch.hostname) {
        return Err(invalid(
            format!("{}.hostname", scope),
            format!("{:?} may only contain letters, digits, '.', '-' and '_'", switch.hostname),
        ));
    }

    for (id, vlan) in &switch.vlans {
        let field = format!("{}.vlans.{}", scope, id);
        require_text(&format!("{}.name", field), &vlan.name)?;

        for (key, value) in [("ip", &vlan.ip), ("subnet", &vlan.subnet)] {
            if let Some(value) = value {
                if !is_valid_ipv4(value) {
                    return Err(invalid(
                        format!("{}.{}", field, key),
                        format!("{:?} is not a dotted-quad IPv4 address", value),
                    ));
                }
            }
        }

        if vlan.ip.is_some() != vlan.subnet.is_some() {
            tracing::warn!(
                "{}: VLAN {} has only one of ip/subnet set; it will not get a management interface",
                switch.hostname,
                id
            );
        }
    }

    for (port_idx, port) in switch.trunk_ports.iter().enumerate() {
        require_text(&format!("{}.trunk_ports[{}]", scope, port_idx), port)?;
    }

    if let Some(console) = &switch.console {
        validate_endpoint(&format!("{}.console", scope), console)?;
    }

    if !switch.vlans.contains_key(&global.management_vlan) {
        return Err(ConfigError::MissingManagementVlan {
            hostname: switch.hostname.clone(),
            vlan: global.management_vlan,
        });
    }

    Ok(())
}
