//! Policy ruleset sanity checks.
//!
//! Uses the intersection engine to find rules that can never match
//! (shadowed by an earlier rule) and rules whose traffic overlaps an
//! earlier rule with the opposite action. Findings never change what the
//! compiler emits; the `check` command surfaces them before deployment.

use policy_model::{
    address_shadows, rules_intersect, service_shadows, Address, ModelError, ObjectSnapshot,
    PolicyObject, PolicyRule, RuleElement, Service,
};

use crate::error::CompileError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyFinding {
    pub severity: FindingSeverity,
    pub code: String,
    pub message: String,
}

/// Find shadowed and conflicting policy rules.
///
/// A later rule is shadowed when an earlier rule matches a superset of its
/// traffic; with differing actions that is an error (the later action can
/// never take effect), with equal actions a redundancy warning. Partial
/// overlaps with differing actions get an ordering warning.
pub fn policy_findings(snapshot: &ObjectSnapshot) -> Result<Vec<VerifyFinding>, CompileError> {
    let mut out = Vec::new();
    let rules = &snapshot.policy;
    for (later_pos, later) in rules.iter().enumerate() {
        for earlier in &rules[..later_pos] {
            if !comparable_interfaces(earlier, later) {
                continue;
            }
            if rule_shadows(snapshot, earlier, later)? {
                let conflicting = earlier.action != later.action;
                out.push(VerifyFinding {
                    severity: if conflicting {
                        FindingSeverity::Error
                    } else {
                        FindingSeverity::Warning
                    },
                    code: if conflicting {
                        "shadowed_rule".to_string()
                    } else {
                        "redundant_rule".to_string()
                    },
                    message: format!(
                        "rule {} never matches; rule {} covers all of its traffic",
                        later.label, earlier.label
                    ),
                });
                break;
            }
            if earlier.action != later.action
                && rules_intersect(snapshot, earlier, later).map_err(CompileError::Model)?
            {
                out.push(VerifyFinding {
                    severity: FindingSeverity::Warning,
                    code: "conflicting_overlap".to_string(),
                    message: format!(
                        "rules {} and {} overlap with opposite actions; order decides",
                        earlier.label, later.label
                    ),
                });
            }
        }
    }
    Ok(out)
}

/// Does `earlier` match a superset of the traffic `later` matches?
pub fn rule_shadows(
    snapshot: &ObjectSnapshot,
    earlier: &PolicyRule,
    later: &PolicyRule,
) -> Result<bool, CompileError> {
    let shadows = addresses_shadow(snapshot, &earlier.src, &later.src)?
        && addresses_shadow(snapshot, &earlier.dst, &later.dst)?
        && services_shadow(snapshot, &earlier.srv, &later.srv)?;
    Ok(shadows)
}

fn comparable_interfaces(a: &PolicyRule, b: &PolicyRule) -> bool {
    a.itf.is_any() || a.itf == b.itf
}

fn leaf_addresses(
    snapshot: &ObjectSnapshot,
    element: &RuleElement,
) -> Result<Vec<Address>, ModelError> {
    let mut out = Vec::new();
    for def in snapshot.resolve_refs(&element.refs)? {
        if let PolicyObject::Address(a) = &def.object {
            out.push(a.clone());
        }
    }
    Ok(out)
}

fn leaf_services(
    snapshot: &ObjectSnapshot,
    element: &RuleElement,
) -> Result<Vec<Service>, ModelError> {
    let mut out = Vec::new();
    for def in snapshot.resolve_refs(&element.refs)? {
        if let PolicyObject::Service(s) = &def.object {
            out.push(s.clone());
        }
    }
    Ok(out)
}

fn addresses_shadow(
    snapshot: &ObjectSnapshot,
    covering: &RuleElement,
    covered: &RuleElement,
) -> Result<bool, CompileError> {
    if covering.is_any() {
        return Ok(true);
    }
    if covered.is_any() {
        return Ok(false);
    }
    let covering = leaf_addresses(snapshot, covering).map_err(CompileError::Model)?;
    let covered = leaf_addresses(snapshot, covered).map_err(CompileError::Model)?;
    Ok(covered
        .iter()
        .all(|b| covering.iter().any(|a| address_shadows(a, b))))
}

fn services_shadow(
    snapshot: &ObjectSnapshot,
    covering: &RuleElement,
    covered: &RuleElement,
) -> Result<bool, CompileError> {
    if covering.is_any() {
        return Ok(true);
    }
    if covered.is_any() {
        return Ok(false);
    }
    let covering = leaf_services(snapshot, covering).map_err(CompileError::Model)?;
    let covered = leaf_services(snapshot, covered).map_err(CompileError::Model)?;
    Ok(covered
        .iter()
        .all(|b| covering.iter().any(|a| service_shadows(a, b))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{elem, policy_rule, snapshot_builder};
    use policy_model::RuleAction;

    #[test]
    fn wildcard_rule_shadows_every_later_rule() {
        let snap = snapshot_builder()
            .host(10, "a", "192.168.1.5")
            .policy(policy_rule(1))
            .policy({
                let mut r = policy_rule(2);
                r.action = RuleAction::Deny;
                r.src = elem(&[10]);
                r
            })
            .build();
        let findings = policy_findings(&snap).expect("verify");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, "shadowed_rule");
        assert_eq!(findings[0].severity, FindingSeverity::Error);
        assert!(findings[0].message.contains("Policy 2"));
    }

    #[test]
    fn equal_action_shadow_is_a_redundancy_warning() {
        let snap = snapshot_builder()
            .network(10, "lan", "192.168.1.0", "255.255.255.0")
            .host(11, "host-in-lan", "192.168.1.5")
            .policy({
                let mut r = policy_rule(1);
                r.src = elem(&[10]);
                r
            })
            .policy({
                let mut r = policy_rule(2);
                r.src = elem(&[11]);
                r
            })
            .build();
        let findings = policy_findings(&snap).expect("verify");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, "redundant_rule");
        assert_eq!(findings[0].severity, FindingSeverity::Warning);
    }

    #[test]
    fn partial_overlap_with_opposite_actions_warns_about_order() {
        let snap = snapshot_builder()
            .network(10, "lan", "192.168.1.0", "255.255.255.0")
            .tcp(30, "http", 80, 80)
            .tcp(31, "ports", 0, 1023)
            .policy({
                let mut r = policy_rule(1);
                r.src = elem(&[10]);
                r.srv = elem(&[30]);
                r
            })
            .policy({
                let mut r = policy_rule(2);
                r.action = RuleAction::Deny;
                r.src = elem(&[10]);
                r.srv = elem(&[31]);
                r
            })
            .build();
        let findings = policy_findings(&snap).expect("verify");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].code, "conflicting_overlap");
    }

    #[test]
    fn disjoint_rules_are_clean() {
        let snap = snapshot_builder()
            .host(10, "a", "192.168.1.5")
            .host(11, "b", "192.0.2.9")
            .policy({
                let mut r = policy_rule(1);
                r.src = elem(&[10]);
                r
            })
            .policy({
                let mut r = policy_rule(2);
                r.action = RuleAction::Deny;
                r.src = elem(&[11]);
                r
            })
            .build();
        assert!(policy_findings(&snap).expect("verify").is_empty());
    }

    #[test]
    fn different_interfaces_are_not_compared() {
        let snap = snapshot_builder()
            .policy({
                let mut r = policy_rule(1);
                r.itf = elem(&[2]);
                r
            })
            .policy({
                let mut r = policy_rule(2);
                r.action = RuleAction::Deny;
                r.itf = elem(&[3]);
                r
            })
            .build();
        assert!(policy_findings(&snap).expect("verify").is_empty());
    }
}
