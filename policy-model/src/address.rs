//! Address objects and the numeric range math behind containment checks.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::{ipv4_mask_to_prefix, ipv6_mask_to_prefix};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::rule::ObjectId;

/// Concrete address family of a resolved object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    V4,
    V6,
}

/// A network address object as authored in the policy.
///
/// Every variant except `MultiAddress` resolves to a concrete set of
/// addresses in exactly one family; mixed families inside one rule are
/// rejected when the snapshot is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Address {
    /// A host object: one address, always treated as a /32 (or /128).
    Host { addr: IpAddr },
    /// A bare single-address object (IPv4 or IPv6 literal in the policy).
    Single { addr: IpAddr },
    /// A network with an explicit netmask.
    Network { addr: IpAddr, netmask: IpAddr },
    /// An inclusive address range; carries no netmask of its own.
    Range { start: IpAddr, end: IpAddr },
    /// A firewall interface, linked to its owning device. The label is the
    /// human-readable name used in generated commands.
    Interface {
        device: ObjectId,
        label: String,
        addr: IpAddr,
        netmask: IpAddr,
    },
    /// A placeholder whose member set is only known at device run time
    /// (address tables and the like). `run_time` marks the resolved
    /// counterpart swapped in by the pipeline.
    MultiAddress { run_time: bool },
}

impl Address {
    /// The "any" sentinel in command output: 0.0.0.0/0.0.0.0.
    pub const ANY4: Address = Address::Network {
        addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        netmask: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
    };

    /// Short kind name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Address::Host { .. } => "host",
            Address::Single { .. } => "address",
            Address::Network { .. } => "network",
            Address::Range { .. } => "address range",
            Address::Interface { .. } => "interface",
            Address::MultiAddress { .. } => "multi-address",
        }
    }

    /// Primary address of the object, if it has one.
    pub fn addr(&self) -> Option<IpAddr> {
        match self {
            Address::Host { addr }
            | Address::Single { addr }
            | Address::Network { addr, .. }
            | Address::Interface { addr, .. } => Some(*addr),
            Address::Range { start, .. } => Some(*start),
            Address::MultiAddress { .. } => None,
        }
    }

    /// Effective netmask after the PIX coercion quirk: host and
    /// single-address objects always pair with a full host mask, whatever
    /// mask the user stored (PIX rejects "address,mask doesn't pair").
    pub fn netmask(&self) -> Option<IpAddr> {
        match self {
            Address::Host { addr } | Address::Single { addr } => Some(host_mask(*addr)),
            Address::Network { netmask, .. } | Address::Interface { netmask, .. } => Some(*netmask),
            Address::Range { .. } | Address::MultiAddress { .. } => None,
        }
    }

    /// Address family, when one is defined.
    pub fn family(&self) -> Option<AddressFamily> {
        self.addr().map(|a| match a {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        })
    }

    /// True for the wildcard 0.0.0.0/0.0.0.0 object.
    pub fn is_any(&self) -> bool {
        matches!(
            self,
            Address::Network { addr, netmask }
                if addr == &IpAddr::V4(Ipv4Addr::UNSPECIFIED)
                    && netmask == &IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        )
    }

    /// Inclusive numeric span `[first, last]` of the matched address set.
    ///
    /// Fails for multi-address placeholders (no compile-time set) and for
    /// non-contiguous netmasks.
    pub fn span(&self) -> Result<(u128, u128), ModelError> {
        match self {
            Address::Host { addr } | Address::Single { addr } => {
                let n = ip_to_u128(*addr);
                Ok((n, n))
            }
            Address::Network { addr, netmask } | Address::Interface { addr, netmask, .. } => {
                network_span(*addr, *netmask)
            }
            Address::Range { start, end } => {
                let (s, e) = (ip_to_u128(*start), ip_to_u128(*end));
                Ok((s.min(e), s.max(e)))
            }
            Address::MultiAddress { .. } => Err(ModelError::UnresolvedMultiAddress),
        }
    }
}

/// Full host mask for the family of `addr`.
pub fn host_mask(addr: IpAddr) -> IpAddr {
    match addr {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::BROADCAST),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::from(u128::MAX)),
    }
}

/// Numeric value of an address within its family's bit width.
pub fn ip_to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(a) => u128::from(u32::from(a)),
        IpAddr::V6(a) => u128::from(a),
    }
}

fn network_span(addr: IpAddr, netmask: IpAddr) -> Result<(u128, u128), ModelError> {
    let (prefix, width) = match (addr, netmask) {
        (IpAddr::V4(_), IpAddr::V4(m)) => (ipv4_mask_to_prefix(m)?, 32u32),
        (IpAddr::V6(_), IpAddr::V6(m)) => (ipv6_mask_to_prefix(m)?, 128u32),
        _ => return Err(ModelError::MixedAddressFamily),
    };
    let host_bits = width - u32::from(prefix);
    let mask = if host_bits >= 128 {
        0
    } else {
        u128::MAX << host_bits
    };
    let mask = mask & width_mask(width);
    let base = ip_to_u128(addr) & mask;
    Ok((base, base | (!mask & width_mask(width))))
}

fn width_mask(width: u32) -> u128 {
    if width >= 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str) -> IpAddr {
        s.parse().expect("addr")
    }

    #[test]
    fn host_span_is_single_address() {
        let host = Address::Host { addr: v4("10.0.0.5") };
        let (s, e) = host.span().expect("span");
        assert_eq!(s, e);
    }

    #[test]
    fn network_span_covers_subnet() {
        let net = Address::Network {
            addr: v4("192.168.1.17"),
            netmask: v4("255.255.255.0"),
        };
        let (s, e) = net.span().expect("span");
        assert_eq!(e - s, 255);
        assert_eq!(s, ip_to_u128(v4("192.168.1.0")));
    }

    #[test]
    fn single_address_netmask_is_coerced_to_host_mask() {
        let a = Address::Single { addr: v4("10.0.0.1") };
        assert_eq!(a.netmask(), Some(v4("255.255.255.255")));
    }

    #[test]
    fn wildcard_network_is_any() {
        assert!(Address::ANY4.is_any());
        assert!(!Address::Host { addr: v4("0.0.0.0") }.is_any());
    }

    #[test]
    fn multi_address_has_no_span() {
        let m = Address::MultiAddress { run_time: false };
        assert!(m.span().is_err());
    }
}
