use regex_lite::Regex;
use std::sync::OnceLock;

/// Validate an IPv4 address or mask (e.g., "192.168.1.1", "255.255.255.0").
/// Returns true if the string is a valid dotted-decimal IPv4 address.
pub fn is_valid_ipv4(ip: &str) -> bool {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts
        .iter()
        .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()) && p.parse::<u8>().is_ok())
}

/// IOS truncates longer hostnames
pub const MAX_HOSTNAME_LEN: usize = 63;

/// Validate a switch hostname.
/// Allows alphanumeric, hyphens, dots, and underscores. No whitespace or shell metacharacters.
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > MAX_HOSTNAME_LEN {
        return false;
    }
    hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// True if the value carries a character that would break a single CLI line
pub fn has_control_chars(value: &str) -> bool {
    value.chars().any(|c| c.is_control())
}

fn interface_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z][A-Za-z-]*)\s*(\d+(?:/\d+)*)\s*$").expect("interface regex is valid")
    })
}

/// Split an interface name into its type word and slot/port suffix.
/// e.g., "GigabitEthernet0/12" -> ("GigabitEthernet", "0/12"), "Gi 1/0/3" -> ("Gi", "1/0/3")
pub fn split_interface(name: &str) -> Option<(&str, &str)> {
    let caps = interface_re().captures(name)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Whether two interface names refer to the same physical port.
///
/// The CLI accepts any unambiguous abbreviation of the type word, so "Gi0/1",
/// "gig0/1" and "GigabitEthernet0/1" are the same port. An abbreviation must be
/// at least two letters.
pub fn interfaces_match(a: &str, b: &str) -> bool {
    let (Some((type_a, port_a)), Some((type_b, port_b))) = (split_interface(a), split_interface(b)) else {
        return a.trim().eq_ignore_ascii_case(b.trim());
    };
    if port_a != port_b {
        return false;
    }
    let (short, long) = if type_a.len() <= type_b.len() {
        (type_a, type_b)
    } else {
        (type_b, type_a)
    };
    if short.len() < 2 && short.len() != long.len() {
        return false;
    }
    long.to_ascii_lowercase().starts_with(&short.to_ascii_lowercase())
}

/// Truncate output to a maximum number of lines
pub fn truncate_lines(s: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = s.lines().collect();
    if lines.len() <= max_lines {
        s.to_string()
    } else {
        let truncated: Vec<&str> = lines[..max_lines].to_vec();
        format!("{}\n... ({} more lines)", truncated.join("\n"), lines.len() - max_lines)
    }
}
