//! Vendor-neutral firewall policy primitives used by platform compilers.
//!
//! The model mirrors what a policy editor produces: an immutable snapshot of
//! network objects (addresses, services, time intervals, groups) plus ordered
//! policy and NAT rulesets referencing those objects by id. On top of the
//! model sit the pure comparison algorithms a rule compiler needs — equality,
//! shadowing, and intersection of objects and of whole rules.

pub mod address;
pub mod error;
pub mod intersect;
pub mod interval;
pub mod options;
pub mod rule;
pub mod service;
pub mod snapshot;
pub mod version;

pub use address::{Address, AddressFamily};
pub use error::ModelError;
pub use intersect::{
    address_intersection, address_shadows, addresses_equal, intervals_equal, object_intersection,
    port_range_intersection, rule_intersection, rules_intersect, service_intersection,
    service_shadows, services_equal,
};
pub use interval::Interval;
pub use options::Options;
pub use rule::{
    CompilerRule, NatRule, NatRuleType, NoNatKind, ObjectId, PolicyRule, RuleAction, RuleElement,
    RuleId, RuleRole,
};
pub use service::{PortRange, Service};
pub use snapshot::{FirewallDef, Group, ObjectDef, ObjectSnapshot, PolicyObject};
pub use version::{Version, VersionError};
