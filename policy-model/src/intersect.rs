//! Equality, shadowing, and intersection of policy objects and whole rules.
//!
//! These are the pure comparison algorithms a rule compiler uses to reason
//! about overlapping rules: redundancy detection, shadowing warnings, and
//! rule splitting. Nothing here mutates its inputs; rule intersection
//! always builds a new rule.
//!
//! Kind mismatches are a contract violation, not a normal-path condition:
//! asking for the intersection of an address and a service (or of anything
//! with an unexpanded group) returns `ModelError::IncompatibleObjects`.
//! Disjoint but comparable objects are the normal path and yield `None`.

use std::mem::discriminant;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::address::{Address, AddressFamily};
use crate::error::ModelError;
use crate::interval::Interval;
use crate::rule::{CompilerRule, PolicyRule, RuleElement, RuleRole};
use crate::service::{PortRange, Service};
use crate::snapshot::{ObjectSnapshot, PolicyObject};

/// Structural equality of two addresses: same concrete kind and the same
/// matched address set after netmask normalization.
pub fn addresses_equal(a: &Address, b: &Address) -> bool {
    if discriminant(a) != discriminant(b) {
        return false;
    }
    match (a, b) {
        (Address::MultiAddress { run_time: x }, Address::MultiAddress { run_time: y }) => x == y,
        _ => {
            a.family() == b.family()
                && matches!((a.span(), b.span()), (Ok(x), Ok(y)) if x == y)
        }
    }
}

/// True if `a`'s matched address set is a superset of `b`'s (a network
/// shadows every host inside it). Objects without a compile-time address
/// set never shadow and are never shadowed.
pub fn address_shadows(a: &Address, b: &Address) -> bool {
    if a.family() != b.family() {
        return false;
    }
    match (a.span(), b.span()) {
        (Ok((a_lo, a_hi)), Ok((b_lo, b_hi))) => a_lo <= b_lo && a_hi >= b_hi,
        _ => false,
    }
}

/// Intersection of two addresses.
///
/// Returns the narrower object when one contains the other, an address
/// range covering the overlap otherwise, and `None` when the sets are
/// disjoint. Multi-address placeholders and mixed address families are
/// contract violations.
pub fn address_intersection(a: &Address, b: &Address) -> Result<Option<Address>, ModelError> {
    if matches!(a, Address::MultiAddress { .. }) || matches!(b, Address::MultiAddress { .. }) {
        return Err(ModelError::UnresolvedMultiAddress);
    }
    let (fam_a, fam_b) = (a.family(), b.family());
    if fam_a != fam_b {
        return Err(ModelError::MixedAddressFamily);
    }
    let (a_lo, a_hi) = a.span()?;
    let (b_lo, b_hi) = b.span()?;
    let lo = a_lo.max(b_lo);
    let hi = a_hi.min(b_hi);
    if lo > hi {
        return Ok(None);
    }
    if (lo, hi) == (a_lo, a_hi) {
        return Ok(Some(a.clone()));
    }
    if (lo, hi) == (b_lo, b_hi) {
        return Ok(Some(b.clone()));
    }
    let family = fam_a.unwrap_or(AddressFamily::V4);
    Ok(Some(Address::Range {
        start: u128_to_ip(lo, family),
        end: u128_to_ip(hi, family),
    }))
}

fn u128_to_ip(value: u128, family: AddressFamily) -> IpAddr {
    match family {
        AddressFamily::V4 => IpAddr::V4(Ipv4Addr::from(value as u32)),
        AddressFamily::V6 => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

/// Structural equality of two services after port normalization.
pub fn services_equal(a: &Service, b: &Service) -> bool {
    match (a, b) {
        (Service::Tcp { src: s1, dst: d1 }, Service::Tcp { src: s2, dst: d2 })
        | (Service::Udp { src: s1, dst: d1 }, Service::Udp { src: s2, dst: d2 }) => {
            s1.normalized() == s2.normalized() && d1.normalized() == d2.normalized()
        }
        (Service::Icmp { icmp_type: t1 }, Service::Icmp { icmp_type: t2 }) => t1 == t2,
        (Service::Ip { protocol: p1 }, Service::Ip { protocol: p2 }) => p1 == p2,
        _ => false,
    }
}

fn protocol_number(s: &Service) -> u8 {
    match s {
        Service::Tcp { .. } => 6,
        Service::Udp { .. } => 17,
        Service::Icmp { .. } => 1,
        Service::Ip { protocol } => *protocol,
    }
}

fn range_contains(outer: PortRange, inner: PortRange) -> bool {
    let (o_lo, o_hi) = outer.normalized();
    let (i_lo, i_hi) = inner.normalized();
    o_lo <= i_lo && o_hi >= i_hi
}

/// True if `a`'s matched traffic set is a superset of `b`'s: the wildcard
/// IP service shadows everything, a bare protocol shadows any service of
/// that protocol, a port range shadows a narrower sub-range, an any-type
/// ICMP service shadows every ICMP type.
pub fn service_shadows(a: &Service, b: &Service) -> bool {
    match (a, b) {
        (Service::Ip { protocol: 0 }, _) => true,
        (Service::Ip { protocol }, other) => *protocol == protocol_number(other),
        (Service::Tcp { src: s1, dst: d1 }, Service::Tcp { src: s2, dst: d2 })
        | (Service::Udp { src: s1, dst: d1 }, Service::Udp { src: s2, dst: d2 }) => {
            range_contains(*s1, *s2) && range_contains(*d1, *d2)
        }
        (Service::Icmp { icmp_type: -1 }, Service::Icmp { .. }) => true,
        (Service::Icmp { icmp_type: t1 }, Service::Icmp { icmp_type: t2 }) => t1 == t2,
        _ => false,
    }
}

/// Intersection of two services. Different protocols are disjoint, not an
/// error; the wildcard IP service intersects to the other operand.
pub fn service_intersection(a: &Service, b: &Service) -> Option<Service> {
    match (a, b) {
        (Service::Ip { protocol: 0 }, other) | (other, Service::Ip { protocol: 0 }) => {
            Some(other.clone())
        }
        (Service::Tcp { src: s1, dst: d1 }, Service::Tcp { src: s2, dst: d2 }) => {
            let src = port_range_pair_intersection(*s1, *s2)?;
            let dst = port_range_pair_intersection(*d1, *d2)?;
            Some(Service::Tcp { src, dst })
        }
        (Service::Udp { src: s1, dst: d1 }, Service::Udp { src: s2, dst: d2 }) => {
            let src = port_range_pair_intersection(*s1, *s2)?;
            let dst = port_range_pair_intersection(*d1, *d2)?;
            Some(Service::Udp { src, dst })
        }
        (Service::Icmp { icmp_type: -1 }, other @ Service::Icmp { .. })
        | (other @ Service::Icmp { .. }, Service::Icmp { icmp_type: -1 }) => Some(other.clone()),
        (Service::Icmp { icmp_type: t1 }, Service::Icmp { icmp_type: t2 }) => {
            (t1 == t2).then(|| a.clone())
        }
        (Service::Ip { protocol: p }, other) | (other, Service::Ip { protocol: p }) => {
            (*p == protocol_number(other)).then(|| other.clone())
        }
        _ => None,
    }
}

fn port_range_pair_intersection(a: PortRange, b: PortRange) -> Option<PortRange> {
    let (start, end) = {
        let (a_lo, a_hi) = a.normalized();
        let (b_lo, b_hi) = b.normalized();
        (a_lo.max(b_lo), a_hi.min(b_hi))
    };
    (start <= end).then_some(PortRange { start, end })
}

/// Standard interval intersection on `[rs, re]` port ranges. `-1` bounds
/// are treated as unset and widened to `0`/`65535` before computing.
/// Returns `None` when the ranges do not overlap.
pub fn port_range_intersection(rs1: i32, re1: i32, rs2: i32, re2: i32) -> Option<(i32, i32)> {
    port_range_pair_intersection(PortRange::new(rs1, re1), PortRange::new(rs2, re2))
        .map(|r| (r.start, r.end))
}

/// Structural equality of two time intervals.
pub fn intervals_equal(a: &Interval, b: &Interval) -> bool {
    a == b
}

/// Intersection of two leaf policy objects. Kind mismatches (address vs
/// service, anything vs an unexpanded group) are contract violations.
pub fn object_intersection(
    a: &PolicyObject,
    b: &PolicyObject,
) -> Result<Option<PolicyObject>, ModelError> {
    match (a, b) {
        (PolicyObject::Address(x), PolicyObject::Address(y)) => {
            Ok(address_intersection(x, y)?.map(PolicyObject::Address))
        }
        (PolicyObject::Service(x), PolicyObject::Service(y)) => {
            Ok(service_intersection(x, y).map(PolicyObject::Service))
        }
        (PolicyObject::Interval(x), PolicyObject::Interval(y)) => {
            Ok(x.intersection(y).map(PolicyObject::Interval))
        }
        _ => Err(ModelError::IncompatibleObjects {
            left: a.kind_name(),
            right: b.kind_name(),
        }),
    }
}

const INTERSECT_ROLES: [RuleRole; 5] = [
    RuleRole::Itf,
    RuleRole::Src,
    RuleRole::Dst,
    RuleRole::Srv,
    RuleRole::When,
];

/// True iff every role of the two rules has a non-empty pairwise
/// intersection. Verifies existence only; use [`rule_intersection`] to
/// build the common rule. Symmetric in its rule arguments.
pub fn rules_intersect(
    snapshot: &ObjectSnapshot,
    r1: &PolicyRule,
    r2: &PolicyRule,
) -> Result<bool, ModelError> {
    for role in INTERSECT_ROLES {
        let (e1, e2) = (r1.element(role), r2.element(role));
        let (Some(e1), Some(e2)) = (e1, e2) else {
            continue;
        };
        if e1.is_any() || e2.is_any() {
            continue;
        }
        if common_refs(snapshot, e1, e2)?.is_empty() {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Build a new rule holding, per role, exactly the objects common to both
/// inputs. Returns `Ok(None)` — the empty-rule sentinel — when any role's
/// intersection is empty; that signals disjoint rules, not an error.
/// Identity, action, and options are taken from `r1`; neither input is
/// modified. Self-intersection returns the rule unchanged.
pub fn rule_intersection(
    snapshot: &ObjectSnapshot,
    r1: &PolicyRule,
    r2: &PolicyRule,
) -> Result<Option<PolicyRule>, ModelError> {
    let mut out = r1.clone();
    for role in INTERSECT_ROLES {
        let (Some(e1), Some(e2)) = (r1.element(role), r2.element(role)) else {
            continue;
        };
        let merged = if e1.is_any() && e2.is_any() {
            RuleElement::any()
        } else if e1.is_any() {
            e2.clone()
        } else if e2.is_any() {
            e1.clone()
        } else {
            let refs = common_refs(snapshot, e1, e2)?;
            if refs.is_empty() {
                return Ok(None);
            }
            RuleElement { refs, negated: e1.negated }
        };
        if let Some(slot) = out.element_mut(role) {
            *slot = merged;
        }
    }
    Ok(Some(out))
}

/// Ids from both elements whose objects overlap something on the other
/// side, first-occurrence order, `e1`'s ids first.
fn common_refs(
    snapshot: &ObjectSnapshot,
    e1: &RuleElement,
    e2: &RuleElement,
) -> Result<Vec<crate::rule::ObjectId>, ModelError> {
    let left = snapshot.resolve_refs(&e1.refs)?;
    let right = snapshot.resolve_refs(&e2.refs)?;

    let mut refs = Vec::new();
    for a in &left {
        for b in &right {
            if object_intersection(&a.object, &b.object)?.is_some() {
                if !refs.contains(&a.id) {
                    refs.push(a.id);
                }
                break;
            }
        }
    }
    for b in &right {
        if refs.contains(&b.id) {
            continue;
        }
        for a in &left {
            if object_intersection(&a.object, &b.object)?.is_some() {
                refs.push(b.id);
                break;
            }
        }
    }
    Ok(refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::rule::{ObjectId, RuleAction, RuleId};
    use crate::snapshot::{FirewallDef, ObjectDef};

    fn v4(s: &str) -> IpAddr {
        s.parse().expect("addr")
    }

    fn host(s: &str) -> Address {
        Address::Host { addr: v4(s) }
    }

    fn net(a: &str, m: &str) -> Address {
        Address::Network { addr: v4(a), netmask: v4(m) }
    }

    #[test]
    fn network_shadows_contained_host() {
        let lan = net("192.168.1.0", "255.255.255.0");
        let box1 = host("192.168.1.40");
        assert!(address_shadows(&lan, &box1));
        assert!(!address_shadows(&box1, &lan));
    }

    #[test]
    fn host_equality_requires_same_kind() {
        assert!(addresses_equal(&host("10.0.0.1"), &host("10.0.0.1")));
        assert!(!addresses_equal(
            &host("10.0.0.1"),
            &Address::Single { addr: v4("10.0.0.1") }
        ));
    }

    #[test]
    fn disjoint_networks_intersect_to_none() {
        let a = net("10.1.0.0", "255.255.0.0");
        let b = net("10.2.0.0", "255.255.0.0");
        assert_eq!(address_intersection(&a, &b).expect("compatible"), None);
    }

    #[test]
    fn contained_host_is_the_intersection() {
        let lan = net("192.168.1.0", "255.255.255.0");
        let box1 = host("192.168.1.40");
        let got = address_intersection(&lan, &box1).expect("compatible");
        assert_eq!(got, Some(box1));
    }

    #[test]
    fn partial_overlap_yields_range() {
        let a = Address::Range { start: v4("10.0.0.10"), end: v4("10.0.0.30") };
        let b = Address::Range { start: v4("10.0.0.20"), end: v4("10.0.0.40") };
        let got = address_intersection(&a, &b).expect("compatible").expect("overlap");
        assert_eq!(
            got,
            Address::Range { start: v4("10.0.0.20"), end: v4("10.0.0.30") }
        );
    }

    #[test]
    fn port_range_intersection_handles_unset_bounds() {
        assert_eq!(port_range_intersection(-1, -1, 80, 80), Some((80, 80)));
        assert_eq!(port_range_intersection(0, 1023, 1024, -1), None);
        assert_eq!(port_range_intersection(20, 8000, 1024, 65535), Some((1024, 8000)));
    }

    #[test]
    fn wildcard_ip_service_shadows_everything() {
        let any = Service::ANY;
        let http = Service::Tcp {
            src: PortRange::ANY,
            dst: PortRange::new(80, 80),
        };
        assert!(service_shadows(&any, &http));
        assert!(!service_shadows(&http, &any));
    }

    #[test]
    fn tcp_and_udp_are_disjoint_not_an_error() {
        let tcp = Service::Tcp { src: PortRange::ANY, dst: PortRange::new(53, 53) };
        let udp = Service::Udp { src: PortRange::ANY, dst: PortRange::new(53, 53) };
        assert_eq!(service_intersection(&tcp, &udp), None);
    }

    #[test]
    fn address_against_service_is_a_contract_violation() {
        let a = PolicyObject::Address(host("10.0.0.1"));
        let s = PolicyObject::Service(Service::ANY);
        assert!(matches!(
            object_intersection(&a, &s),
            Err(ModelError::IncompatibleObjects { .. })
        ));
    }

    fn test_snapshot() -> ObjectSnapshot {
        ObjectSnapshot::new(
            FirewallDef {
                id: ObjectId(1),
                name: "fw".to_string(),
                platform: "pix".to_string(),
                version: "6.3".to_string(),
                options: Options::default(),
                interfaces: Vec::new(),
            },
            vec![
                ObjectDef {
                    id: ObjectId(10),
                    name: "lan".to_string(),
                    object: PolicyObject::Address(net("192.168.1.0", "255.255.255.0")),
                },
                ObjectDef {
                    id: ObjectId(11),
                    name: "box".to_string(),
                    object: PolicyObject::Address(host("192.168.1.40")),
                },
                ObjectDef {
                    id: ObjectId(12),
                    name: "other".to_string(),
                    object: PolicyObject::Address(net("172.16.0.0", "255.255.0.0")),
                },
                ObjectDef {
                    id: ObjectId(20),
                    name: "http".to_string(),
                    object: PolicyObject::Service(Service::Tcp {
                        src: PortRange::ANY,
                        dst: PortRange::new(80, 80),
                    }),
                },
            ],
            Vec::new(),
            Vec::new(),
        )
        .expect("snapshot")
    }

    fn rule(id: u32, src: &[u32], dst: &[u32], srv: &[u32]) -> PolicyRule {
        let elem = |ids: &[u32]| RuleElement {
            refs: ids.iter().map(|i| ObjectId(*i)).collect(),
            negated: false,
        };
        PolicyRule {
            id: RuleId(id),
            position: id as usize,
            label: format!("Policy {id}"),
            comment: String::new(),
            action: RuleAction::Accept,
            src: elem(src),
            dst: elem(dst),
            srv: elem(srv),
            itf: RuleElement::any(),
            when: RuleElement::any(),
            options: Options::default(),
        }
    }

    #[test]
    fn rule_intersect_is_symmetric() {
        let snap = test_snapshot();
        let r1 = rule(1, &[10], &[12], &[20]);
        let r2 = rule(2, &[11], &[12], &[]);
        let ab = rules_intersect(&snap, &r1, &r2).expect("compatible");
        let ba = rules_intersect(&snap, &r2, &r1).expect("compatible");
        assert_eq!(ab, ba);
        assert!(ab);
    }

    #[test]
    fn self_intersection_returns_the_rule() {
        let snap = test_snapshot();
        let r = rule(1, &[10, 11], &[12], &[20]);
        let got = rule_intersection(&snap, &r, &r).expect("compatible").expect("non-empty");
        assert_eq!(got, r);
    }

    #[test]
    fn disjoint_rules_yield_the_empty_sentinel() {
        let snap = test_snapshot();
        let r1 = rule(1, &[10], &[12], &[]);
        let r2 = rule(2, &[12], &[10], &[]);
        // Sources 192.168.1.0/24 and 172.16.0.0/16 never meet.
        assert_eq!(rule_intersection(&snap, &r1, &r2).expect("compatible"), None);
        assert!(!rules_intersect(&snap, &r1, &r2).expect("compatible"));
    }
}
