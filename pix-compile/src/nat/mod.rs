//! NAT command tables built during classification and consumed during
//! printing.
//!
//! A NAT ruleset compiles in two passes separated by a pipeline barrier.
//! The first pass groups rules by (source, translated target) and records
//! one command per distinct grouping here; duplicate groupings mark later
//! rules with the `ignore_*` flags instead of producing a second command.
//! The second pass reads these tables back and emits text.

mod classify;
mod print;

pub use classify::ClassifyNat;
pub use print::PrintNatRule;

use std::collections::BTreeMap;
use std::net::IpAddr;

use policy_model::{Address, ObjectId, RuleId, Service};

/// The address pool a `global` declaration hands out. Carrying the
/// resolved addresses in the variant keeps the 4-way pool dispatch
/// exhaustive with no partial lookups at print time.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalPool {
    /// Dynamic PAT through the egress interface address.
    Interface,
    Single(IpAddr),
    Network { addr: IpAddr, netmask: IpAddr },
    Range { start: IpAddr, end: IpAddr },
}

/// One source-translation command grouping.
#[derive(Debug, Clone)]
pub struct NatCmd {
    pub nat_id: u32,
    /// Label of the first rule that produced this grouping.
    pub rule_label: String,
    pub pool: GlobalPool,
    pub t_addr: Address,
    pub t_iface_label: String,
    pub o_iface_label: String,
    pub o_src: Address,
    pub o_dst: Address,
    pub o_srv: Service,
    pub acl_name: String,
    /// The pool with this nat id is already declared.
    pub ignore_global: bool,
    /// Full duplicate of an earlier grouping; print a comment only.
    pub ignore_nat: bool,
    /// Same binding as an earlier grouping; append to its access list but
    /// do not repeat the `nat` line.
    pub ignore_nat_and_print_acl: bool,
    /// Translation happens on the lower-security side.
    pub outside: bool,
    pub comment: String,
}

/// One destination-translation (`static`) command grouping.
#[derive(Debug, Clone)]
pub struct StaticCmd {
    pub acl_name: String,
    pub rule_label: String,
    pub osrc: Address,
    /// Original (outside) destination.
    pub oaddr: Address,
    /// Translated (inside) destination.
    pub iaddr: Address,
    pub osrv: Service,
    pub tsrv: Service,
    /// Same mapping as an earlier grouping; append to its access list but
    /// do not repeat the `static` line.
    pub ignore_scmd_and_print_acl: bool,
}

/// One translation-exemption entry.
#[derive(Debug, Clone)]
pub struct NoNatCmd {
    pub acl_name: String,
    pub iface: ObjectId,
    pub iface_label: String,
    pub src: Address,
    pub dst: Address,
}

/// Per-run NAT tables; reset with the context between runs.
#[derive(Debug, Default)]
pub struct NatState {
    pub nat_commands: Vec<NatCmd>,
    pub static_commands: Vec<StaticCmd>,
    /// Exemption entry per NAT0 rule.
    pub nonat: BTreeMap<RuleId, NoNatCmd>,
    /// First NAT0 rule seen per interface; that rule prints the one
    /// `nat (<if>) 0 access-list` binding for the interface.
    pub first_nonat_rule: BTreeMap<ObjectId, RuleId>,
    next_nat_id: u32,
}

impl NatState {
    /// Sequential nat-id allocation starting at 1.
    pub fn allocate_nat_id(&mut self) -> u32 {
        self.next_nat_id += 1;
        self.next_nat_id
    }
}
