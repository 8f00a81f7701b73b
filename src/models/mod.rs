use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod outcome;

pub use outcome::{outcome_status, RunReport, SwitchOutcome};

/// Interface naming used when none is configured: access port `n` becomes
/// `GigabitEthernet0/n`.
pub const DEFAULT_INTERFACE_PREFIX: &str = "GigabitEthernet0/";

/// VlanId is an 802.1Q VLAN identifier in the configurable range 1..=4094.
///
/// Ordering is numeric, which is the order VLANs are emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VlanId(u16);

impl VlanId {
    pub const MIN: u16 = 1;
    pub const MAX: u16 = 4094;

    pub fn new(id: u16) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&id).then_some(Self(id))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VlanId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u16 = s
            .trim()
            .parse()
            .map_err(|_| format!("VLAN id {:?} is not a number", s))?;
        Self::new(id).ok_or_else(|| format!("VLAN id {} is outside {}..={}", id, Self::MIN, Self::MAX))
    }
}

impl Serialize for VlanId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.get())
    }
}

struct VlanIdVisitor;

impl<'de> Visitor<'de> for VlanIdVisitor {
    type Value = VlanId;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "a VLAN id between {} and {}, as a number or string", VlanId::MIN, VlanId::MAX)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<VlanId, E> {
        u16::try_from(v)
            .ok()
            .and_then(VlanId::new)
            .ok_or_else(|| E::custom(format!("VLAN id {} is outside {}..={}", v, VlanId::MIN, VlanId::MAX)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<VlanId, E> {
        u64::try_from(v)
            .map_err(|_| E::custom(format!("VLAN id {} is negative", v)))
            .and_then(|v| self.visit_u64(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<VlanId, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for VlanId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(VlanIdVisitor)
    }
}

struct VlanMapVisitor;

impl<'de> Visitor<'de> for VlanMapVisitor {
    type Value = BTreeMap<VlanId, VlanInfo>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of VLAN id to VLAN definition")
    }

    fn visit_map<A: de::MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut vlans = BTreeMap::new();
        while let Some((id, vlan)) = map.next_entry::<VlanId, VlanInfo>()? {
            if vlans.insert(id, vlan).is_some() {
                return Err(de::Error::custom(format!("VLAN {} is defined more than once", id)));
            }
        }
        Ok(vlans)
    }
}

/// `"10"` and `"010"` name the same VLAN; a second definition is an error
/// rather than silently replacing the first.
fn deserialize_vlans<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<VlanId, VlanInfo>, D::Error> {
    deserializer.deserialize_map(VlanMapVisitor)
}

/// VlanInfo describes one VLAN defined on a switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanInfo {
    pub name: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub subnet: Option<String>,
}

impl VlanInfo {
    #[cfg(test)]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ip: None,
            subnet: None,
        }
    }

    #[cfg(test)]
    pub fn with_address(name: &str, ip: &str, subnet: &str) -> Self {
        Self {
            name: name.to_string(),
            ip: Some(ip.to_string()),
            subnet: Some(subnet.to_string()),
        }
    }

    /// Returns `(ip, subnet)` when both are set. A VLAN is management-capable
    /// only in that case.
    pub fn management_address(&self) -> Option<(&str, &str)> {
        match (self.ip.as_deref(), self.subnet.as_deref()) {
            (Some(ip), Some(subnet)) => Some((ip, subnet)),
            _ => None,
        }
    }
}

/// Serial console a switch is reached through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleEndpoint {
    pub serial_port: String,
    pub baud_rate: u32,
}

impl fmt::Display for ConsoleEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.serial_port, self.baud_rate)
    }
}

/// GlobalConfig holds settings shared read-only by every switch in a run
#[derive(Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub data_vlan: VlanId,
    pub voice_vlan: VlanId,
    pub management_vlan: VlanId,
    pub console_password: String,
    pub vty_password: String,
    pub enable_password: String,
    pub ssh_modulus: u32,
    pub total_ports: u32,
    pub serial_port: String,
    pub baud_rate: u32,
    #[serde(default = "default_interface_prefix")]
    pub interface_prefix: String,
}

fn default_interface_prefix() -> String {
    DEFAULT_INTERFACE_PREFIX.to_string()
}

impl GlobalConfig {
    /// Default console endpoint for switches that do not override it
    pub fn console(&self) -> ConsoleEndpoint {
        ConsoleEndpoint {
            serial_port: self.serial_port.clone(),
            baud_rate: self.baud_rate,
        }
    }

    /// Physical interface name of access-capable port `n`
    pub fn port_name(&self, n: u32) -> String {
        format!("{}{}", self.interface_prefix, n)
    }
}

// Passwords stay out of logs.
impl fmt::Debug for GlobalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalConfig")
            .field("data_vlan", &self.data_vlan)
            .field("voice_vlan", &self.voice_vlan)
            .field("management_vlan", &self.management_vlan)
            .field("ssh_modulus", &self.ssh_modulus)
            .field("total_ports", &self.total_ports)
            .field("serial_port", &self.serial_port)
            .field("baud_rate", &self.baud_rate)
            .field("interface_prefix", &self.interface_prefix)
            .finish_non_exhaustive()
    }
}

/// SwitchConfig is the per-switch part of the provisioning document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchConfig {
    pub hostname: String,
    #[serde(deserialize_with = "deserialize_vlans")]
    pub vlans: BTreeMap<VlanId, VlanInfo>,
    pub trunk_ports: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console: Option<ConsoleEndpoint>,
}

impl SwitchConfig {
    /// Console this switch is reached through: its own override, or the global one
    pub fn endpoint(&self, global: &GlobalConfig) -> ConsoleEndpoint {
        self.console.clone().unwrap_or_else(|| global.console())
    }

    /// VLAN ids in emission order
    pub fn vlan_ids(&self) -> impl Iterator<Item = VlanId> + '_ {
        self.vlans.keys().copied()
    }
}

/// Inventory is the whole provisioning document: global settings plus the
/// switches to configure, in the order they will be processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub global: GlobalConfig,
    pub switches: Vec<SwitchConfig>,
}
