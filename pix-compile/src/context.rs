//! Per-run compilation context.
//!
//! One `CompileContext` exists per firewall/ruleset compilation. It owns
//! every piece of mutable state a run needs — the interface cache built
//! once up front, the run-time object overlay, the ACL-clear flag table,
//! NAT command tables, warnings, diagnostics, and the accumulated output —
//! so independent compilations never share mutable state. The snapshot
//! itself stays immutable behind an `Arc` and may be shared freely.

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::Arc;

use policy_model::{
    Address, CompilerRule, ModelError, ObjectDef, ObjectId, ObjectSnapshot, Options, PolicyObject,
    RuleElement, RuleRole, Service, Version,
};

use crate::error::{CompileError, CompileWarning};
use crate::nat::NatState;
use crate::resources::Resources;

/// Cached view of one firewall interface.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceInfo {
    pub id: ObjectId,
    pub label: String,
    pub addr: IpAddr,
    pub netmask: IpAddr,
}

/// Mutable state of one compilation run.
#[derive(Debug)]
pub struct CompileContext {
    pub snapshot: Arc<ObjectSnapshot>,
    pub platform: String,
    pub version: Version,
    pub fw_options: Options,
    pub resources: Resources,
    /// Abort on per-rule structural errors (default) or drop the rule with
    /// a warning and continue.
    pub lenient: bool,
    /// ACL names already cleared in this run.
    pub acl_cleared: BTreeSet<String>,
    /// NAT command tables built by the classification pass.
    pub nat: NatState,
    pub warnings: Vec<CompileWarning>,
    /// Ordered reporting channel fed by the diagnostic pipeline taps.
    pub diagnostics: Vec<String>,
    /// The compiled command script.
    pub output: String,
    fw_interfaces: BTreeMap<ObjectId, InterfaceInfo>,
    iface_order: Vec<ObjectId>,
    /// Run-time objects swapped in by the pipeline, shadowing the snapshot.
    overlay: BTreeMap<ObjectId, ObjectDef>,
}

impl CompileContext {
    pub fn new(snapshot: Arc<ObjectSnapshot>, resources: Resources) -> Result<Self, CompileError> {
        let fw = &snapshot.firewall;
        let version: Version = fw.version.parse()?;
        let mut fw_interfaces = BTreeMap::new();
        let mut iface_order = Vec::new();
        for id in &fw.interfaces {
            let def = snapshot.require(*id).map_err(CompileError::Model)?;
            let PolicyObject::Address(Address::Interface { label, addr, netmask, .. }) =
                &def.object
            else {
                return Err(CompileError::WrongObjectKind {
                    rule: fw.name.clone(),
                    expected: "interface",
                    found: def.object.kind_name(),
                    name: def.name.clone(),
                });
            };
            fw_interfaces.insert(
                *id,
                InterfaceInfo {
                    id: *id,
                    label: label.clone(),
                    addr: *addr,
                    netmask: *netmask,
                },
            );
            iface_order.push(*id);
        }
        Ok(CompileContext {
            platform: fw.platform.clone(),
            version,
            fw_options: fw.options.clone(),
            snapshot,
            resources,
            lenient: false,
            acl_cleared: BTreeSet::new(),
            nat: NatState::default(),
            warnings: Vec::new(),
            diagnostics: Vec::new(),
            output: String::new(),
            fw_interfaces,
            iface_order,
            overlay: BTreeMap::new(),
        })
    }

    /// Look up an object, honoring the run-time overlay.
    pub fn object(&self, id: ObjectId) -> Option<&ObjectDef> {
        self.overlay.get(&id).or_else(|| self.snapshot.object(id))
    }

    /// Shadow a snapshot object with a run-time counterpart for the rest
    /// of this run.
    pub fn swap_object(&mut self, def: ObjectDef) {
        self.overlay.insert(def.id, def);
    }

    /// Expand a rule element into leaf objects (owned), flattening groups
    /// and honoring the overlay.
    pub fn resolve_element(
        &self,
        rule: &str,
        element: &RuleElement,
    ) -> Result<Vec<ObjectDef>, CompileError> {
        let mut out = Vec::new();
        for id in &element.refs {
            if let Some(def) = self.overlay.get(id) {
                out.push(def.clone());
                continue;
            }
            let leaves = self
                .snapshot
                .resolve_refs(std::slice::from_ref(id))
                .map_err(|e| CompileError::for_rule(rule, e))?;
            out.extend(leaves.into_iter().cloned());
        }
        Ok(out)
    }

    /// First address object of a rule element. An empty ("any") element
    /// yields the wildcard address; an element that resolves to no address
    /// object is a fatal precondition violation.
    pub fn first_address<R: CompilerRule>(
        &self,
        rule: &R,
        role: RuleRole,
    ) -> Result<Address, CompileError> {
        let element = rule.element(role).ok_or_else(|| CompileError::UnsupportedRole {
            rule: rule.label().to_string(),
            role,
        })?;
        if element.is_any() {
            return Ok(Address::ANY4);
        }
        let leaves = self.resolve_element(rule.label(), element)?;
        match leaves.into_iter().next() {
            Some(ObjectDef { object: PolicyObject::Address(a), .. }) => Ok(a),
            Some(def) => Err(CompileError::WrongObjectKind {
                rule: rule.label().to_string(),
                expected: "address",
                found: def.object.kind_name(),
                name: def.name,
            }),
            None => Err(CompileError::MissingRuleElement {
                rule: rule.label().to_string(),
                role,
            }),
        }
    }

    /// First service object of a rule element; "any" yields the wildcard
    /// IP service.
    pub fn first_service<R: CompilerRule>(
        &self,
        rule: &R,
        role: RuleRole,
    ) -> Result<Service, CompileError> {
        let element = rule.element(role).ok_or_else(|| CompileError::UnsupportedRole {
            rule: rule.label().to_string(),
            role,
        })?;
        if element.is_any() {
            return Ok(Service::ANY);
        }
        let leaves = self.resolve_element(rule.label(), element)?;
        match leaves.into_iter().next() {
            Some(ObjectDef { object: PolicyObject::Service(s), .. }) => Ok(s),
            Some(def) => Err(CompileError::WrongObjectKind {
                rule: rule.label().to_string(),
                expected: "service",
                found: def.object.kind_name(),
                name: def.name,
            }),
            None => Err(CompileError::MissingRuleElement {
                rule: rule.label().to_string(),
                role,
            }),
        }
    }

    /// Cached interface by id.
    pub fn interface(&self, id: ObjectId) -> Result<&InterfaceInfo, CompileError> {
        self.fw_interfaces
            .get(&id)
            .ok_or(CompileError::Model(ModelError::UnknownObject(id)))
    }

    /// Firewall interfaces in device order.
    pub fn interfaces(&self) -> impl Iterator<Item = &InterfaceInfo> {
        self.iface_order.iter().filter_map(|id| self.fw_interfaces.get(id))
    }

    /// The interface serving an address: the one whose directly attached
    /// subnet contains it. An interface object belonging to this firewall
    /// resolves to itself. Falls back to the firewall's first listed
    /// interface when no subnet matches (the snapshot carries no explicit
    /// network-zone data); fails only when the firewall has no interfaces.
    pub fn interface_for_address(&self, addr: &Address) -> Result<InterfaceInfo, CompileError> {
        if let Address::Interface { device, label, .. } = addr {
            if *device == self.snapshot.firewall.id {
                if let Some(info) =
                    self.interfaces().find(|i| &i.label == label).cloned()
                {
                    return Ok(info);
                }
            }
        }
        if let Ok((lo, hi)) = addr.span() {
            for info in self.interfaces() {
                let subnet = Address::Network { addr: info.addr, netmask: info.netmask };
                if let Ok((n_lo, n_hi)) = subnet.span() {
                    if n_lo <= lo && n_hi >= hi {
                        return Ok(info.clone());
                    }
                }
            }
        }
        self.interfaces().next().cloned().ok_or_else(|| CompileError::NoInterfaceForAddress {
            firewall: self.snapshot.firewall.name.clone(),
            object: addr.kind_name().to_string(),
        })
    }

    /// Once-per-run ACL clearing. Returns the clear command line the first
    /// time an ACL name is seen (when ACL substitution is enabled) and
    /// `None` on every later call — the same name is never cleared twice.
    pub fn clear_acl_guard(&mut self, acl_name: &str) -> Result<Option<String>, CompileError> {
        if !self.fw_options.get_bool("pix_acl_substitution") {
            return Ok(None);
        }
        if self.acl_cleared.contains(acl_name) {
            return Ok(None);
        }
        let cmd = self
            .resources
            .lookup(&self.platform, &self.version, "clear_acl")?
            .to_string();
        self.acl_cleared.insert(acl_name.to_string());
        Ok(Some(format!("{cmd} {acl_name}")))
    }

    /// FWSM batches ACL changes and applies them on an explicit commit.
    pub fn manual_commit(&self) -> bool {
        self.platform == "fwsm" && self.fw_options.get_bool("pix_use_manual_commit")
    }

    pub fn include_comments(&self) -> bool {
        self.fw_options.get_bool("pix_include_comments")
    }

    pub fn warn(&mut self, warning: CompileWarning) {
        self.warnings.push(warning);
    }

    pub fn diag(&mut self, message: impl Into<String>) {
        self.diagnostics.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{snapshot_builder, SnapshotBuilder};

    fn ctx() -> CompileContext {
        let snap = snapshot_builder().build();
        CompileContext::new(Arc::new(snap), Resources::builtin()).expect("context")
    }

    #[test]
    fn bad_version_string_fails_context_construction() {
        let snap = SnapshotBuilder::new("pix", "six.three").build();
        let err = CompileContext::new(Arc::new(snap), Resources::builtin()).unwrap_err();
        assert!(matches!(err, CompileError::Version(_)));
    }

    #[test]
    fn clear_acl_guard_is_idempotent_per_run() {
        let mut ctx = ctx();
        ctx.fw_options.set_bool("pix_acl_substitution", true);
        let first = ctx.clear_acl_guard("nat1.outside").expect("lookup");
        let second = ctx.clear_acl_guard("nat1.outside").expect("lookup");
        assert_eq!(first.as_deref(), Some("clear access-list nat1.outside"));
        assert_eq!(second, None);
    }

    #[test]
    fn clear_acl_guard_is_disabled_without_substitution() {
        let mut ctx = ctx();
        assert_eq!(ctx.clear_acl_guard("nat1.outside").expect("lookup"), None);
    }

    #[test]
    fn interface_lookup_prefers_subnet_match() {
        let ctx = ctx();
        let inside_host = Address::Host { addr: "192.168.1.40".parse().expect("addr") };
        let info = ctx.interface_for_address(&inside_host).expect("interface");
        assert_eq!(info.label, "inside");

        // Nothing serves this subnet; the first listed interface wins.
        let stray = Address::Host { addr: "203.0.113.9".parse().expect("addr") };
        let info = ctx.interface_for_address(&stray).expect("interface");
        assert_eq!(info.label, "outside");
    }
}
