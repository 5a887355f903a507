//! Text formatting shared by the NAT compiler and the policy printer.
//!
//! The port and address spellings here are a compatibility contract with
//! the device parser; tests pin each branch.

use policy_model::{Address, Service};

use crate::context::CompileContext;

/// Render an address for command output.
///
/// A host-mask or single-address object prints as `host <addr>` with no
/// mask suffix; the 0.0.0.0/0.0.0.0 wildcard prints as `any`; everything
/// else prints `<addr> <mask>` or bare `<addr>` depending on
/// `with_netmask`. Host and single-address objects always pair with a full
/// host mask whatever the stored mask says — PIX rejects the pair
/// otherwise.
pub fn address(a: &Address, with_netmask: bool) -> String {
    if a.is_any() {
        return "any".to_string();
    }
    let Some(addr) = a.addr() else {
        // Run-time multi-address sets keep their device-side name; the
        // pipeline swaps these before printing, so plain "any" is the
        // safe spelling for a placeholder that slipped through.
        return "any".to_string();
    };
    let mask = a.netmask();
    let host = matches!(a, Address::Host { .. } | Address::Single { .. })
        || mask.map_or(false, |m| m.to_string() == "255.255.255.255");
    if host {
        return format!("host {addr}");
    }
    match (with_netmask, mask) {
        (true, Some(mask)) => format!("{addr} {mask}"),
        _ => addr.to_string(),
    }
}

/// Port-range operator text for the source port of a TCP/UDP service.
pub fn src_service(srv: &Service) -> String {
    srv.src_range()
        .map(|r| port_operator(r.start, r.end))
        .unwrap_or_default()
}

/// Port-range operator text for the destination port; ICMP services with
/// a set type print the type number.
pub fn dst_service(srv: &Service) -> String {
    if let Service::Icmp { icmp_type } = srv {
        if *icmp_type != -1 {
            return icmp_type.to_string();
        }
        return String::new();
    }
    srv.dst_range()
        .map(|r| port_operator(r.start, r.end))
        .unwrap_or_default()
}

/// The four-way port encoding rule: `start == end` → `eq`, open start →
/// `lt`, range ending at 65535 → `gt`, anything else → `range`; a
/// zero-zero range prints nothing. Negative (unset) bounds are coerced
/// to zero first.
fn port_operator(start: i32, end: i32) -> String {
    let rs = start.max(0);
    let re = end.max(0);
    if rs == 0 && re == 0 {
        return String::new();
    }
    if rs == re {
        format!("eq {rs}")
    } else if rs == 0 {
        format!("lt {re}")
    } else if re == 65535 {
        format!("gt {rs}")
    } else {
        format!("range {rs} {re}")
    }
}

/// Bare destination-port number used inside `static` commands (followed by
/// a trailing space), empty when unset. Port ranges in static rules are
/// rejected during verification, so only the range start matters here.
pub fn static_port(srv: &Service) -> String {
    match srv.dst_range() {
        Some(r) if r.start > 0 => format!("{} ", r.start),
        _ => String::new(),
    }
}

/// Label for a rule that arrived without one, used by remark and comment
/// blocks: `<prefix> <num>`, with the interface name appended in
/// parentheses when the rule is bound to one.
pub fn rule_label(prefix: &str, iface: Option<&str>, rule_num: usize) -> String {
    match iface {
        Some(iface) => format!("{prefix} {rule_num} ({iface})"),
        None => format!("{prefix} {rule_num}"),
    }
}

/// Connection-limit options appended to `nat` and `static` commands:
/// maximum connections and embryonic-connection limit from the firewall
/// options, negative values coerced to 0. From 7.0 on the protocol
/// keyword precedes the two numbers (only tcp limits are supported).
pub fn conn_options(ctx: &CompileContext) -> String {
    let max_conns = ctx.fw_options.get_int("pix_max_conns").unwrap_or(0).max(0);
    let emb_limit = ctx.fw_options.get_int("pix_emb_limit").unwrap_or(0).max(0);
    if ctx.version.at_least("7.0") {
        format!("tcp {max_conns} {emb_limit}")
    } else {
        format!("{max_conns} {emb_limit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CompileContext;
    use crate::resources::Resources;
    use crate::test_support::SnapshotBuilder;
    use policy_model::{ObjectId, PortRange};
    use std::sync::Arc;

    fn tcp(start: i32, end: i32) -> Service {
        Service::Tcp { src: PortRange::ANY, dst: PortRange::new(start, end) }
    }

    #[test]
    fn port_operator_four_way_rule() {
        assert_eq!(dst_service(&tcp(80, 80)), "eq 80");
        assert_eq!(dst_service(&tcp(0, 1023)), "lt 1023");
        assert_eq!(dst_service(&tcp(1024, 65535)), "gt 1024");
        assert_eq!(dst_service(&tcp(20, 21)), "range 20 21");
        assert_eq!(dst_service(&tcp(0, 0)), "");
    }

    #[test]
    fn unset_bounds_print_nothing() {
        assert_eq!(dst_service(&tcp(-1, -1)), "");
        assert_eq!(src_service(&Service::Tcp {
            src: PortRange::new(-1, -1),
            dst: PortRange::new(80, 80),
        }), "");
    }

    #[test]
    fn icmp_type_prints_only_when_set() {
        assert_eq!(dst_service(&Service::Icmp { icmp_type: 8 }), "8");
        assert_eq!(dst_service(&Service::Icmp { icmp_type: -1 }), "");
    }

    #[test]
    fn host_and_wildcard_addresses() {
        let host = Address::Host { addr: "10.0.0.5".parse().expect("addr") };
        assert_eq!(address(&host, true), "host 10.0.0.5");
        assert_eq!(address(&host, false), "host 10.0.0.5");
        assert_eq!(address(&Address::ANY4, true), "any");
    }

    #[test]
    fn full_mask_network_prints_as_host() {
        let net = Address::Network {
            addr: "10.0.0.9".parse().expect("addr"),
            netmask: "255.255.255.255".parse().expect("mask"),
        };
        assert_eq!(address(&net, true), "host 10.0.0.9");
    }

    #[test]
    fn network_prints_mask_on_request() {
        let net = Address::Network {
            addr: "192.168.1.0".parse().expect("addr"),
            netmask: "255.255.255.0".parse().expect("mask"),
        };
        assert_eq!(address(&net, true), "192.168.1.0 255.255.255.0");
        assert_eq!(address(&net, false), "192.168.1.0");
    }

    #[test]
    fn interface_address_prints_like_a_network() {
        let itf = Address::Interface {
            device: ObjectId(1),
            label: "inside".to_string(),
            addr: "192.168.1.1".parse().expect("addr"),
            netmask: "255.255.255.0".parse().expect("mask"),
        };
        assert_eq!(address(&itf, false), "192.168.1.1");
    }

    fn ctx_at(version: &str) -> CompileContext {
        let snap = SnapshotBuilder::new("pix", version).build();
        CompileContext::new(Arc::new(snap), Resources::builtin()).expect("context")
    }

    #[test]
    fn rule_labels_append_the_interface_when_bound() {
        assert_eq!(rule_label("Policy", None, 3), "Policy 3");
        assert_eq!(rule_label("NAT", Some("outside"), 0), "NAT 0 (outside)");
    }

    #[test]
    fn conn_options_coerce_negatives_and_fork_at_7_0() {
        let mut ctx = ctx_at("6.3");
        ctx.fw_options.set_int("pix_max_conns", -1);
        ctx.fw_options.set_int("pix_emb_limit", 25);
        assert_eq!(conn_options(&ctx), "0 25");

        let mut ctx = ctx_at("7.0");
        ctx.fw_options.set_int("pix_max_conns", 100);
        assert_eq!(conn_options(&ctx), "tcp 100 0");
    }
}
