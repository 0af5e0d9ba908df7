//! file_sd document model and the pure parts of the update algorithm.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv6Addr};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DiscoveryError, DiscoveryResult};

/// One group of scrape targets. Fields other than `targets` (e.g. `labels`)
/// are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetGroup {
    pub targets: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parse a document. `None` means the bytes are not a list of groups and
/// the caller should start over from an empty document.
pub fn parse(bytes: &[u8]) -> Option<Vec<TargetGroup>> {
    serde_json::from_slice::<Vec<TargetGroup>>(bytes).ok()
}

/// Canonical `host:port` form of a target.
pub fn canonical_target(host: &str, port: u16) -> DiscoveryResult<String> {
    let host = host.trim();
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(match ip {
            IpAddr::V4(v4) => format!("{v4}:{port}"),
            IpAddr::V6(v6) => format!("[{v6}]:{port}"),
        });
    }
    // Already bracketed IPv6.
    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        if let Ok(v6) = inner.parse::<Ipv6Addr>() {
            return Ok(format!("[{v6}]:{port}"));
        }
    }
    let is_hostname = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if !is_hostname {
        return Err(DiscoveryError::InvalidAddress(host.to_string()));
    }
    Ok(format!("{host}:{port}"))
}

/// Insert `target` unless some group already lists it. Returns whether the
/// document changed.
pub fn insert_target(groups: &mut Vec<TargetGroup>, target: &str) -> bool {
    let existing: HashSet<&str> = groups
        .iter()
        .flat_map(|g| g.targets.iter().map(String::as_str))
        .collect();
    if existing.contains(target) {
        return false;
    }
    if groups.is_empty() {
        groups.push(TargetGroup::default());
    }
    groups[0].targets.push(target.to_string());
    true
}

/// Render with stable, line-per-target formatting.
pub fn render(groups: &[TargetGroup]) -> DiscoveryResult<Vec<u8>> {
    let mut bytes =
        serde_json::to_vec_pretty(groups).map_err(|e| DiscoveryError::Serialize(e.to_string()))?;
    bytes.push(b'\n');
    Ok(bytes)
}
