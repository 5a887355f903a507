//! Snapshot and rule fixtures shared by the unit tests.

use policy_model::{
    Address, FirewallDef, Group, NatRule, NatRuleType, ObjectDef, ObjectId, ObjectSnapshot,
    Options, PolicyObject, PolicyRule, PortRange, RuleAction, RuleElement, RuleId, Service,
};

/// Id of the firewall object in every test snapshot.
pub const FW_ID: u32 = 1;
/// Id of the first (outside) interface, 192.0.2.1/24.
pub const OUTSIDE_IF: u32 = 2;
/// Id of the second (inside) interface, 192.168.1.1/24.
pub const INSIDE_IF: u32 = 3;

/// A two-interface PIX 6.3 firewall with no rules or extra objects.
pub fn snapshot_builder() -> SnapshotBuilder {
    SnapshotBuilder::new("pix", "6.3")
}

/// Builds test snapshots around a fixed two-interface firewall.
pub struct SnapshotBuilder {
    firewall: FirewallDef,
    objects: Vec<ObjectDef>,
    policy: Vec<PolicyRule>,
    nat: Vec<NatRule>,
}

impl SnapshotBuilder {
    pub fn new(platform: &str, version: &str) -> Self {
        let outside = ObjectDef {
            id: ObjectId(OUTSIDE_IF),
            name: "fw:outside".to_string(),
            object: PolicyObject::Address(Address::Interface {
                device: ObjectId(FW_ID),
                label: "outside".to_string(),
                addr: "192.0.2.1".parse().expect("addr"),
                netmask: "255.255.255.0".parse().expect("mask"),
            }),
        };
        let inside = ObjectDef {
            id: ObjectId(INSIDE_IF),
            name: "fw:inside".to_string(),
            object: PolicyObject::Address(Address::Interface {
                device: ObjectId(FW_ID),
                label: "inside".to_string(),
                addr: "192.168.1.1".parse().expect("addr"),
                netmask: "255.255.255.0".parse().expect("mask"),
            }),
        };
        SnapshotBuilder {
            firewall: FirewallDef {
                id: ObjectId(FW_ID),
                name: "fw".to_string(),
                platform: platform.to_string(),
                version: version.to_string(),
                options: Options::default(),
                interfaces: vec![ObjectId(OUTSIDE_IF), ObjectId(INSIDE_IF)],
            },
            objects: vec![outside, inside],
            policy: Vec::new(),
            nat: Vec::new(),
        }
    }

    pub fn object(mut self, id: u32, name: &str, object: PolicyObject) -> Self {
        self.objects.push(ObjectDef {
            id: ObjectId(id),
            name: name.to_string(),
            object,
        });
        self
    }

    pub fn host(self, id: u32, name: &str, addr: &str) -> Self {
        let addr = addr.parse().expect("addr");
        self.object(id, name, PolicyObject::Address(Address::Host { addr }))
    }

    pub fn network(self, id: u32, name: &str, addr: &str, netmask: &str) -> Self {
        let addr = addr.parse().expect("addr");
        let netmask = netmask.parse().expect("mask");
        self.object(id, name, PolicyObject::Address(Address::Network { addr, netmask }))
    }

    pub fn range(self, id: u32, name: &str, start: &str, end: &str) -> Self {
        let start = start.parse().expect("addr");
        let end = end.parse().expect("addr");
        self.object(id, name, PolicyObject::Address(Address::Range { start, end }))
    }

    pub fn multi_address(self, id: u32, name: &str) -> Self {
        self.object(
            id,
            name,
            PolicyObject::Address(Address::MultiAddress { run_time: false }),
        )
    }

    pub fn tcp(self, id: u32, name: &str, start: i32, end: i32) -> Self {
        self.object(
            id,
            name,
            PolicyObject::Service(Service::Tcp {
                src: PortRange::ANY,
                dst: PortRange::new(start, end),
            }),
        )
    }

    pub fn udp(self, id: u32, name: &str, start: i32, end: i32) -> Self {
        self.object(
            id,
            name,
            PolicyObject::Service(Service::Udp {
                src: PortRange::ANY,
                dst: PortRange::new(start, end),
            }),
        )
    }

    pub fn group(self, id: u32, name: &str, members: &[u32]) -> Self {
        self.object(
            id,
            name,
            PolicyObject::Group(Group {
                members: members.iter().map(|m| ObjectId(*m)).collect(),
            }),
        )
    }

    pub fn fw_option_bool(mut self, key: &str, value: bool) -> Self {
        self.firewall.options.set_bool(key, value);
        self
    }

    pub fn policy(mut self, rule: PolicyRule) -> Self {
        self.policy.push(rule);
        self
    }

    pub fn nat(mut self, rule: NatRule) -> Self {
        self.nat.push(rule);
        self
    }

    pub fn build(self) -> ObjectSnapshot {
        ObjectSnapshot::new(self.firewall, self.objects, self.policy, self.nat)
            .expect("test snapshot")
    }
}

/// A rule element referencing the given object ids; empty means "any".
pub fn elem(ids: &[u32]) -> RuleElement {
    RuleElement {
        refs: ids.iter().map(|id| ObjectId(*id)).collect(),
        negated: false,
    }
}

/// An accept-everything policy rule labeled `Policy <id>`.
pub fn policy_rule(id: u32) -> PolicyRule {
    PolicyRule {
        id: RuleId(id),
        position: id as usize,
        label: format!("Policy {id}"),
        comment: String::new(),
        action: RuleAction::Accept,
        src: RuleElement::any(),
        dst: RuleElement::any(),
        srv: RuleElement::any(),
        itf: RuleElement::any(),
        when: RuleElement::any(),
        options: Options::default(),
    }
}

/// An all-any NAT rule of the given type labeled `NAT <id>`.
pub fn nat_rule(id: u32, rule_type: NatRuleType) -> NatRule {
    NatRule {
        id: RuleId(id),
        position: id as usize,
        label: format!("NAT {id}"),
        comment: String::new(),
        rule_type,
        nonat_kind: None,
        osrc: RuleElement::any(),
        odst: RuleElement::any(),
        osrv: RuleElement::any(),
        tsrc: RuleElement::any(),
        tdst: RuleElement::any(),
        tsrv: RuleElement::any(),
        options: Options::default(),
    }
}
