//! Policy and NAT rules, rule elements, and the role-based access trait
//! the rule-processing pipeline is built on.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::options::Options;

/// Identity of a policy object inside one snapshot.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ObjectId(pub u32);

impl Display for ObjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a rule inside one ruleset.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RuleId(pub u32);

impl Display for RuleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One facet of a rule: an ordered, possibly negated collection of object
/// references. An empty collection is the "any" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleElement {
    #[serde(default)]
    pub refs: Vec<ObjectId>,
    #[serde(default)]
    pub negated: bool,
}

impl RuleElement {
    pub fn any() -> Self {
        RuleElement::default()
    }

    pub fn single(id: ObjectId) -> Self {
        RuleElement { refs: vec![id], negated: false }
    }

    pub fn is_any(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Which rule element a processor operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleRole {
    Src,
    Dst,
    Srv,
    Itf,
    When,
    OSrc,
    ODst,
    OSrv,
    TSrc,
    TDst,
    TSrv,
}

impl Display for RuleRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleRole::Src => "source",
            RuleRole::Dst => "destination",
            RuleRole::Srv => "service",
            RuleRole::Itf => "interface",
            RuleRole::When => "time",
            RuleRole::OSrc => "original source",
            RuleRole::ODst => "original destination",
            RuleRole::OSrv => "original service",
            RuleRole::TSrc => "translated source",
            RuleRole::TDst => "translated destination",
            RuleRole::TSrv => "translated service",
        };
        f.write_str(name)
    }
}

/// Action of a policy rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Accept,
    Deny,
    Reject,
}

/// An access policy rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: RuleId,
    pub position: usize,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub comment: String,
    pub action: RuleAction,
    #[serde(default)]
    pub src: RuleElement,
    #[serde(default)]
    pub dst: RuleElement,
    #[serde(default)]
    pub srv: RuleElement,
    #[serde(default)]
    pub itf: RuleElement,
    #[serde(default)]
    pub when: RuleElement,
    #[serde(default)]
    pub options: Options,
}

/// Kind of translation a NAT rule performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NatRuleType {
    NoNat,
    Snat,
    Sdnat,
    Dnat,
}

/// Sub-kind of a no-translation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoNatKind {
    Nat0,
    Static,
}

/// A NAT rule: original and translated halves, one element per role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NatRule {
    pub id: RuleId,
    pub position: usize,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub comment: String,
    pub rule_type: NatRuleType,
    #[serde(default)]
    pub nonat_kind: Option<NoNatKind>,
    #[serde(default)]
    pub osrc: RuleElement,
    #[serde(default)]
    pub odst: RuleElement,
    #[serde(default)]
    pub osrv: RuleElement,
    #[serde(default)]
    pub tsrc: RuleElement,
    #[serde(default)]
    pub tdst: RuleElement,
    #[serde(default)]
    pub tsrv: RuleElement,
    #[serde(default)]
    pub options: Options,
}

/// Role-based access shared by policy and NAT rules so one pipeline
/// implementation can process both. `element` returns `None` for a role
/// the rule kind does not carry; processors treat that as a configuration
/// error rather than panicking.
pub trait CompilerRule: Clone {
    fn id(&self) -> RuleId;
    fn label(&self) -> &str;
    fn comment(&self) -> &str;
    fn options(&self) -> &Options;
    fn options_mut(&mut self) -> &mut Options;
    /// Roles this rule kind carries, in canonical order.
    fn roles() -> &'static [RuleRole];
    fn element(&self, role: RuleRole) -> Option<&RuleElement>;
    fn element_mut(&mut self, role: RuleRole) -> Option<&mut RuleElement>;
}

impl CompilerRule for PolicyRule {
    fn id(&self) -> RuleId {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn comment(&self) -> &str {
        &self.comment
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn roles() -> &'static [RuleRole] {
        &[RuleRole::Src, RuleRole::Dst, RuleRole::Srv, RuleRole::Itf, RuleRole::When]
    }

    fn element(&self, role: RuleRole) -> Option<&RuleElement> {
        match role {
            RuleRole::Src => Some(&self.src),
            RuleRole::Dst => Some(&self.dst),
            RuleRole::Srv => Some(&self.srv),
            RuleRole::Itf => Some(&self.itf),
            RuleRole::When => Some(&self.when),
            _ => None,
        }
    }

    fn element_mut(&mut self, role: RuleRole) -> Option<&mut RuleElement> {
        match role {
            RuleRole::Src => Some(&mut self.src),
            RuleRole::Dst => Some(&mut self.dst),
            RuleRole::Srv => Some(&mut self.srv),
            RuleRole::Itf => Some(&mut self.itf),
            RuleRole::When => Some(&mut self.when),
            _ => None,
        }
    }
}

impl CompilerRule for NatRule {
    fn id(&self) -> RuleId {
        self.id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn comment(&self) -> &str {
        &self.comment
    }

    fn options(&self) -> &Options {
        &self.options
    }

    fn options_mut(&mut self) -> &mut Options {
        &mut self.options
    }

    fn roles() -> &'static [RuleRole] {
        &[
            RuleRole::OSrc,
            RuleRole::ODst,
            RuleRole::OSrv,
            RuleRole::TSrc,
            RuleRole::TDst,
            RuleRole::TSrv,
        ]
    }

    fn element(&self, role: RuleRole) -> Option<&RuleElement> {
        match role {
            RuleRole::OSrc => Some(&self.osrc),
            RuleRole::ODst => Some(&self.odst),
            RuleRole::OSrv => Some(&self.osrv),
            RuleRole::TSrc => Some(&self.tsrc),
            RuleRole::TDst => Some(&self.tdst),
            RuleRole::TSrv => Some(&self.tsrv),
            _ => None,
        }
    }

    fn element_mut(&mut self, role: RuleRole) -> Option<&mut RuleElement> {
        match role {
            RuleRole::OSrc => Some(&mut self.osrc),
            RuleRole::ODst => Some(&mut self.odst),
            RuleRole::OSrv => Some(&mut self.osrv),
            RuleRole::TSrc => Some(&mut self.tsrc),
            RuleRole::TDst => Some(&mut self.tdst),
            RuleRole::TSrv => Some(&mut self.tsrv),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_element_is_any() {
        assert!(RuleElement::any().is_any());
        assert!(!RuleElement::single(ObjectId(3)).is_any());
    }

    fn nat_rule() -> NatRule {
        NatRule {
            id: RuleId(1),
            position: 0,
            label: String::new(),
            comment: String::new(),
            rule_type: NatRuleType::Snat,
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

    fn policy_rule() -> PolicyRule {
        PolicyRule {
            id: RuleId(1),
            position: 0,
            label: String::new(),
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

    #[test]
    fn nat_rule_rejects_policy_roles() {
        let rule = nat_rule();
        assert!(rule.element(RuleRole::Src).is_none());
        assert!(rule.element(RuleRole::OSrc).is_some());
    }

    #[test]
    fn declared_roles_are_all_carried() {
        let mut policy = policy_rule();
        for role in PolicyRule::roles() {
            assert!(policy.element(*role).is_some(), "{role}");
            assert!(policy.element_mut(*role).is_some(), "{role}");
        }
        let mut nat = nat_rule();
        for role in NatRule::roles() {
            assert!(nat.element(*role).is_some(), "{role}");
            assert!(nat.element_mut(*role).is_some(), "{role}");
        }
    }
}
