//! Service objects: TCP/UDP port ranges, ICMP types, raw IP protocols.

use serde::{Deserialize, Serialize};

/// An inclusive port range. `-1` means "unset"; unset bounds are only
/// coerced to `0`/`65535` when a computation or command emission needs
/// concrete numbers, never in the stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: i32,
    pub end: i32,
}

impl PortRange {
    /// The fully-unset range.
    pub const ANY: PortRange = PortRange { start: -1, end: -1 };

    pub fn new(start: i32, end: i32) -> Self {
        PortRange { start, end }
    }

    /// Bounds with unset values widened for interval math: start `-1` → 0,
    /// end `-1` → 65535.
    pub fn normalized(self) -> (i32, i32) {
        let start = if self.start < 0 { 0 } else { self.start };
        let end = if self.end < 0 { 65535 } else { self.end };
        (start, end)
    }
}

/// A service object as authored in the policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Service {
    Tcp { src: PortRange, dst: PortRange },
    Udp { src: PortRange, dst: PortRange },
    /// ICMP with an integer type; `-1` means any type.
    Icmp { icmp_type: i32 },
    /// Generic IP service carrying a raw protocol number; `0` matches any
    /// protocol.
    Ip { protocol: u8 },
}

impl Service {
    /// The match-anything service (protocol 0).
    pub const ANY: Service = Service::Ip { protocol: 0 };

    /// Short kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Service::Tcp { .. } => "tcp service",
            Service::Udp { .. } => "udp service",
            Service::Icmp { .. } => "icmp service",
            Service::Ip { .. } => "ip service",
        }
    }

    /// Protocol keyword as it appears in generated commands.
    pub fn protocol_name(&self) -> String {
        match self {
            Service::Tcp { .. } => "tcp".to_string(),
            Service::Udp { .. } => "udp".to_string(),
            Service::Icmp { .. } => "icmp".to_string(),
            Service::Ip { protocol } => match protocol {
                0 => "ip".to_string(),
                1 => "icmp".to_string(),
                6 => "tcp".to_string(),
                17 => "udp".to_string(),
                47 => "gre".to_string(),
                50 => "esp".to_string(),
                51 => "ah".to_string(),
                other => other.to_string(),
            },
        }
    }

    /// Source port range for TCP/UDP services.
    pub fn src_range(&self) -> Option<PortRange> {
        match self {
            Service::Tcp { src, .. } | Service::Udp { src, .. } => Some(*src),
            _ => None,
        }
    }

    /// Destination port range for TCP/UDP services.
    pub fn dst_range(&self) -> Option<PortRange> {
        match self {
            Service::Tcp { dst, .. } | Service::Udp { dst, .. } => Some(*dst),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_bounds_widen_to_full_range() {
        assert_eq!(PortRange::ANY.normalized(), (0, 65535));
        assert_eq!(PortRange::new(-1, 80).normalized(), (0, 80));
        assert_eq!(PortRange::new(1024, -1).normalized(), (1024, 65535));
    }

    #[test]
    fn protocol_names_cover_common_numbers() {
        assert_eq!(Service::ANY.protocol_name(), "ip");
        assert_eq!(Service::Ip { protocol: 47 }.protocol_name(), "gre");
        assert_eq!(Service::Ip { protocol: 89 }.protocol_name(), "89");
    }
}
