//! The NAT classification pass.
//!
//! Walks the normalized NAT ruleset once and fills the per-run command
//! tables: one `NatCmd` per distinct (source, translated target) grouping,
//! one `StaticCmd` per distinct destination mapping, one exemption entry
//! per NAT0 rule. Later rules repeating an existing grouping reuse its nat
//! id and access-list name and carry `ignore_*` flags instead. Each rule
//! stores the index of its command record in its options so the printing
//! pass can find it after the barrier.

use policy_model::{Address, NatRule, NatRuleType, NoNatKind, RuleRole};

use crate::context::CompileContext;
use crate::error::CompileError;
use crate::nat::{GlobalPool, NatCmd, NoNatCmd, StaticCmd};
use crate::pipeline::{RuleBatch, RuleProcessor, Upstream};

pub struct ClassifyNat {
    upstream: Upstream<NatRule>,
}

impl ClassifyNat {
    pub fn new(prev: Box<dyn RuleProcessor<NatRule>>) -> Self {
        ClassifyNat { upstream: Upstream::new(prev) }
    }

    fn classify_nat0(ctx: &mut CompileContext, rule: &NatRule) -> Result<(), CompileError> {
        let src = ctx.first_address(rule, RuleRole::OSrc)?;
        let dst = ctx.first_address(rule, RuleRole::ODst)?;
        let iface = ctx.interface_for_address(&src)?;
        let acl_name = format!("nat0.{}", iface.label);
        ctx.nat.nonat.insert(
            rule.id,
            NoNatCmd {
                acl_name,
                iface: iface.id,
                iface_label: iface.label,
                src,
                dst,
            },
        );
        ctx.nat.first_nonat_rule.entry(iface.id).or_insert(rule.id);
        Ok(())
    }

    fn classify_snat(ctx: &mut CompileContext, rule: &mut NatRule) -> Result<(), CompileError> {
        let o_src = ctx.first_address(rule, RuleRole::OSrc)?;
        let o_dst = ctx.first_address(rule, RuleRole::ODst)?;
        let o_srv = ctx.first_service(rule, RuleRole::OSrv)?;
        let t_addr = ctx.first_address(rule, RuleRole::TSrc)?;
        let t_iface = ctx.interface_for_address(&t_addr)?;
        let o_iface = ctx.interface_for_address(&o_src)?;

        let pool = match &t_addr {
            Address::Interface { .. } => GlobalPool::Interface,
            Address::Host { addr } | Address::Single { addr } => GlobalPool::Single(*addr),
            Address::Network { addr, netmask } => {
                GlobalPool::Network { addr: *addr, netmask: *netmask }
            }
            Address::Range { start, end } => GlobalPool::Range { start: *start, end: *end },
            Address::MultiAddress { .. } => {
                return Err(CompileError::WrongObjectKind {
                    rule: rule.label.clone(),
                    expected: "address pool",
                    found: t_addr.kind_name(),
                    name: "translated source".to_string(),
                })
            }
        };

        // Reuse the nat id of an earlier grouping with the same pool; a
        // grouping repeating the source binding as well shares the access
        // list, and a full repeat degrades to a comment.
        let mut nat_id = None;
        let mut acl_name = None;
        let mut ignore_global = false;
        let mut ignore_nat = false;
        let mut ignore_nat_and_print_acl = false;
        let mut comment = String::new();
        for cmd in &ctx.nat.nat_commands {
            if cmd.t_addr == t_addr && cmd.t_iface_label == t_iface.label {
                nat_id = Some(cmd.nat_id);
                ignore_global = true;
                if cmd.o_src == o_src && cmd.o_iface_label == o_iface.label {
                    acl_name = Some(cmd.acl_name.clone());
                    if cmd.o_dst == o_dst && cmd.o_srv == o_srv {
                        ignore_nat = true;
                        comment = format!(
                            "nat command for rule {} is identical to rule {}",
                            rule.label, cmd.rule_label
                        );
                    } else {
                        ignore_nat_and_print_acl = true;
                    }
                }
                break;
            }
        }
        let nat_id = match nat_id {
            Some(id) => id,
            None => ctx.nat.allocate_nat_id(),
        };
        let acl_name =
            acl_name.unwrap_or_else(|| format!("nat{}.{}", nat_id, o_iface.label));

        ctx.nat.nat_commands.push(NatCmd {
            nat_id,
            rule_label: rule.label.clone(),
            pool,
            t_addr,
            t_iface_label: t_iface.label,
            o_iface_label: o_iface.label,
            o_src,
            o_dst,
            o_srv,
            acl_name,
            ignore_global,
            ignore_nat,
            ignore_nat_and_print_acl,
            outside: rule.options.get_bool("outside_nat"),
            comment,
        });
        let index = ctx.nat.nat_commands.len() - 1;
        rule.options.set_int("nat_cmd", index as i64);
        Ok(())
    }

    fn classify_dnat(ctx: &mut CompileContext, rule: &mut NatRule) -> Result<(), CompileError> {
        let osrc = ctx.first_address(rule, RuleRole::OSrc)?;
        let odst = ctx.first_address(rule, RuleRole::ODst)?;
        let osrv = ctx.first_service(rule, RuleRole::OSrv)?;
        let tdst = ctx.first_address(rule, RuleRole::TDst)?;
        let tsrv = ctx.first_service(rule, RuleRole::TSrv)?;
        let iface_orig = ctx.interface_for_address(&odst)?;
        let iface_trn = ctx.interface_for_address(&tdst)?;

        let mut acl_name = None;
        let mut ignore_scmd_and_print_acl = false;
        for cmd in &ctx.nat.static_commands {
            if cmd.oaddr == odst && cmd.iaddr == tdst && cmd.osrc == osrc && cmd.osrv == osrv
            {
                acl_name = Some(cmd.acl_name.clone());
                ignore_scmd_and_print_acl = true;
                break;
            }
        }
        let acl_name =
            acl_name.unwrap_or_else(|| format!("dnat{}.{}", rule.id, iface_orig.label));

        ctx.nat.static_commands.push(StaticCmd {
            acl_name,
            rule_label: rule.label.clone(),
            osrc,
            oaddr: odst,
            iaddr: tdst,
            osrv,
            tsrv,
            ignore_scmd_and_print_acl,
        });
        let index = ctx.nat.static_commands.len() - 1;
        rule.options.set_int("sc_cmd", index as i64);
        rule.options.set_int("nat_iface_orig", i64::from(iface_orig.id.0));
        rule.options.set_int("nat_iface_trn", i64::from(iface_trn.id.0));
        Ok(())
    }
}

impl RuleProcessor<NatRule> for ClassifyNat {
    fn next(
        &mut self,
        ctx: &mut CompileContext,
    ) -> Result<Option<RuleBatch<NatRule>>, CompileError> {
        let Some(mut rule) = self.upstream.pull(ctx)? else {
            return Ok(None);
        };
        match rule.rule_type {
            NatRuleType::NoNat => match rule.nonat_kind {
                Some(NoNatKind::Nat0) => Self::classify_nat0(ctx, &rule)?,
                // Static identity mappings resolve directly at print time.
                Some(NoNatKind::Static) => {}
                None => {
                    return Err(CompileError::NoNatKindMissing { rule: rule.label.clone() })
                }
            },
            NatRuleType::Snat => Self::classify_snat(ctx, &mut rule)?,
            // Unsupported; the printing pass reports it.
            NatRuleType::Sdnat => {}
            NatRuleType::Dnat => Self::classify_dnat(ctx, &mut rule)?,
        }
        Ok(Some(vec![rule]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Begin;
    use crate::resources::Resources;
    use crate::test_support::{elem, nat_rule, snapshot_builder, OUTSIDE_IF};
    use policy_model::{ObjectId, RuleId};
    use std::sync::Arc;

    fn ctx_with(snap: policy_model::ObjectSnapshot) -> CompileContext {
        CompileContext::new(Arc::new(snap), Resources::builtin()).expect("context")
    }

    fn classify(ctx: &mut CompileContext, rules: Vec<NatRule>) -> Vec<NatRule> {
        let mut chain = ClassifyNat::new(Box::new(Begin::new(rules)));
        let mut out = Vec::new();
        while let Some(batch) = chain.next(ctx).expect("classify") {
            out.extend(batch);
        }
        out
    }

    fn snat_rule(id: u32, osrc: u32, tsrc: u32) -> NatRule {
        let mut rule = nat_rule(id, NatRuleType::Snat);
        rule.osrc = elem(&[osrc]);
        rule.tsrc = elem(&[tsrc]);
        rule
    }

    #[test]
    fn distinct_pools_get_sequential_nat_ids() {
        let snap = snapshot_builder()
            .network(10, "lan", "192.168.1.0", "255.255.255.0")
            .host(20, "pool-a", "192.0.2.40")
            .host(21, "pool-b", "192.0.2.41")
            .build();
        let mut ctx = ctx_with(snap);

        let out = classify(&mut ctx, vec![snat_rule(1, 10, 20), snat_rule(2, 10, 21)]);
        let cmds = &ctx.nat.nat_commands;
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].nat_id, 1);
        assert_eq!(cmds[1].nat_id, 2);
        assert!(!cmds[0].ignore_global);
        assert!(!cmds[1].ignore_global);
        assert_eq!(cmds[0].acl_name, "nat1.inside");
        assert_eq!(out[0].options.get_int("nat_cmd"), Some(0));
        assert_eq!(out[1].options.get_int("nat_cmd"), Some(1));
    }

    #[test]
    fn repeated_pool_reuses_nat_id_and_skips_global() {
        let snap = snapshot_builder()
            .network(10, "lan", "192.168.1.0", "255.255.255.0")
            .network(11, "dmz", "192.168.2.0", "255.255.255.0")
            .host(20, "pool", "192.0.2.40")
            .build();
        let mut ctx = ctx_with(snap);

        classify(&mut ctx, vec![snat_rule(1, 10, 20), snat_rule(2, 11, 20)]);
        let cmds = &ctx.nat.nat_commands;
        assert_eq!(cmds[1].nat_id, cmds[0].nat_id);
        assert!(cmds[1].ignore_global);
        // Different source binding keeps its own nat line and acl.
        assert!(!cmds[1].ignore_nat);
        assert!(!cmds[1].ignore_nat_and_print_acl);
    }

    #[test]
    fn full_duplicate_degrades_to_a_comment() {
        let snap = snapshot_builder()
            .network(10, "lan", "192.168.1.0", "255.255.255.0")
            .host(20, "pool", "192.0.2.40")
            .build();
        let mut ctx = ctx_with(snap);

        classify(&mut ctx, vec![snat_rule(1, 10, 20), snat_rule(2, 10, 20)]);
        let second = &ctx.nat.nat_commands[1];
        assert!(second.ignore_global);
        assert!(second.ignore_nat);
        assert!(second.comment.contains("NAT 1"));
        assert_eq!(second.acl_name, ctx.nat.nat_commands[0].acl_name);
    }

    #[test]
    fn interface_pool_is_classified_as_interface_kind() {
        let snap = snapshot_builder()
            .network(10, "lan", "192.168.1.0", "255.255.255.0")
            .build();
        let mut ctx = ctx_with(snap);

        classify(&mut ctx, vec![snat_rule(1, 10, OUTSIDE_IF)]);
        assert_eq!(ctx.nat.nat_commands[0].pool, GlobalPool::Interface);
        assert_eq!(ctx.nat.nat_commands[0].t_iface_label, "outside");
    }

    #[test]
    fn nat0_registers_exemption_and_first_rule_per_interface() {
        let snap = snapshot_builder()
            .network(10, "lan", "192.168.1.0", "255.255.255.0")
            .host(11, "peer", "192.168.1.7")
            .build();
        let mut ctx = ctx_with(snap);

        let mut first = nat_rule(1, NatRuleType::NoNat);
        first.nonat_kind = Some(NoNatKind::Nat0);
        first.osrc = elem(&[10]);
        let mut second = nat_rule(2, NatRuleType::NoNat);
        second.nonat_kind = Some(NoNatKind::Nat0);
        second.osrc = elem(&[11]);
        classify(&mut ctx, vec![first, second]);

        let entry = ctx.nat.nonat.get(&RuleId(1)).expect("entry");
        assert_eq!(entry.acl_name, "nat0.inside");
        assert_eq!(entry.iface_label, "inside");
        // Both sources sit behind "inside"; only the first rule binds.
        let iface = entry.iface;
        assert_eq!(ctx.nat.first_nonat_rule.get(&iface), Some(&RuleId(1)));
    }

    #[test]
    fn dnat_records_interfaces_and_deduplicates_mappings() {
        let snap = snapshot_builder()
            .host(20, "public", "192.0.2.80")
            .host(21, "server", "192.168.1.80")
            .tcp(30, "http", 80, 80)
            .tcp(31, "alt-http", 8080, 8080)
            .build();
        let mut ctx = ctx_with(snap);

        let mut first = nat_rule(1, NatRuleType::Dnat);
        first.odst = elem(&[20]);
        first.tdst = elem(&[21]);
        first.osrv = elem(&[30]);
        first.tsrv = elem(&[30]);
        let mut second = first.clone();
        second.id = RuleId(2);
        second.label = "NAT 2".to_string();

        let out = classify(&mut ctx, vec![first, second]);
        let cmds = &ctx.nat.static_commands;
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0].acl_name, "dnat1.outside");
        assert!(!cmds[0].ignore_scmd_and_print_acl);
        assert!(cmds[1].ignore_scmd_and_print_acl);
        assert_eq!(cmds[1].acl_name, "dnat1.outside");
        assert_eq!(
            out[0].options.get_int("nat_iface_orig"),
            Some(i64::from(OUTSIDE_IF))
        );
    }

    #[test]
    fn nonat_without_kind_is_rejected() {
        let snap = snapshot_builder().build();
        let mut ctx = ctx_with(snap);
        let rule = nat_rule(1, NatRuleType::NoNat);
        let mut chain = ClassifyNat::new(Box::new(Begin::new(vec![rule])));
        let err = chain.next(&mut ctx).unwrap_err();
        assert!(matches!(err, CompileError::NoNatKindMissing { .. }));
    }

    #[test]
    fn multi_address_pool_is_a_contract_violation() {
        let snap = snapshot_builder()
            .network(10, "lan", "192.168.1.0", "255.255.255.0")
            .multi_address(20, "dyn")
            .build();
        let mut ctx = ctx_with(snap);
        // Swap to the run-time counterpart first, as the pipeline would.
        let def = ctx.object(ObjectId(20)).expect("object").clone();
        ctx.swap_object(def);

        let mut chain =
            ClassifyNat::new(Box::new(Begin::new(vec![snat_rule(1, 10, 20)])));
        let err = chain.next(&mut ctx).unwrap_err();
        assert!(matches!(err, CompileError::WrongObjectKind { .. }));
    }
}
