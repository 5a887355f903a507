//! The NAT printing pass.
//!
//! Terminal processor of the NAT chain: reads the command tables the
//! classification pass built and appends command text to the run output.
//! The spellings here, down to spacing around empty port fields, are a
//! compatibility contract with the device parser.

use policy_model::{Address, NatRule, NatRuleType, NoNatKind, RuleRole, Service};

use crate::context::CompileContext;
use crate::error::{CompileError, CompileWarning};
use crate::format;
use crate::nat::{GlobalPool, NatCmd, StaticCmd};
use crate::pipeline::{RuleBatch, RuleProcessor, Upstream};

pub struct PrintNatRule {
    upstream: Upstream<NatRule>,
    last_comment_label: String,
}

fn raw_addr(a: &Address) -> String {
    a.addr().map(|ip| ip.to_string()).unwrap_or_else(|| "0.0.0.0".to_string())
}

fn raw_mask(a: &Address) -> String {
    a.netmask().map(|m| m.to_string()).unwrap_or_else(|| "0.0.0.0".to_string())
}

fn proto_prefix(srv: &Service) -> &'static str {
    match srv {
        Service::Tcp { .. } => "tcp ",
        Service::Udp { .. } => "udp ",
        _ => "",
    }
}

impl PrintNatRule {
    pub fn new(prev: Box<dyn RuleProcessor<NatRule>>) -> Self {
        PrintNatRule { upstream: Upstream::new(prev), last_comment_label: String::new() }
    }

    /// Comment block ahead of a rule's commands; consecutive rules sharing
    /// a label produce it once.
    fn print_comment(&mut self, ctx: &mut CompileContext, rule: &NatRule) {
        if !ctx.include_comments() || self.last_comment_label == rule.label {
            return;
        }
        ctx.output.push_str("!\n");
        ctx.output.push_str(&format!("! Rule {}\n", rule.label));
        ctx.output.push_str("!\n");
        if !rule.comment.is_empty() {
            for line in rule.comment.split('\n') {
                ctx.output.push_str(&format!("! {line}\n"));
            }
        }
        self.last_comment_label = rule.label.clone();
    }

    fn print_nonat(ctx: &mut CompileContext, rule: &NatRule) -> Result<(), CompileError> {
        match rule.nonat_kind {
            Some(NoNatKind::Nat0) => Self::print_nat0(ctx, rule),
            Some(NoNatKind::Static) => Self::print_static_identity(ctx, rule),
            None => Err(CompileError::NoNatKindMissing { rule: rule.label.clone() }),
        }
    }

    fn print_nat0(ctx: &mut CompileContext, rule: &NatRule) -> Result<(), CompileError> {
        let cmd = ctx
            .nat
            .nonat
            .get(&rule.id)
            .cloned()
            .ok_or_else(|| CompileError::Unclassified { rule: rule.label.clone() })?;

        if rule.options.get_bool("use_nat_0_0") {
            ctx.output.push_str(&format!("nat ({}) 0 0 0\n", cmd.iface_label));
            return Ok(());
        }

        ctx.output.push('\n');
        if let Some(clear) = ctx.clear_acl_guard(&cmd.acl_name)? {
            ctx.output.push_str(&clear);
            ctx.output.push('\n');
        }
        ctx.output.push_str(&format!(
            "access-list {} permit ip {} {}\n",
            cmd.acl_name,
            format::address(&cmd.src, true),
            format::address(&cmd.dst, true),
        ));

        // One binding per interface, printed by the first exemption rule
        // referencing it.
        if ctx.nat.first_nonat_rule.get(&cmd.iface) == Some(&rule.id) {
            if ctx.manual_commit() {
                ctx.output.push_str("access-list commit\n\n");
            }
            ctx.output.push_str(&format!(
                "nat ({}) 0 access-list {}\n",
                cmd.iface_label, cmd.acl_name
            ));
        }
        Ok(())
    }

    fn print_static_identity(
        ctx: &mut CompileContext,
        rule: &NatRule,
    ) -> Result<(), CompileError> {
        let osrc = ctx.first_address(rule, RuleRole::OSrc)?;
        let odst = ctx.first_address(rule, RuleRole::ODst)?;
        let osrc_iface = ctx.interface_for_address(&osrc)?;
        let odst_iface = ctx.interface_for_address(&odst)?;
        let addr = raw_addr(&odst);
        let mask = match &odst {
            Address::Network { netmask, .. } => netmask.to_string(),
            _ => "255.255.255.255".to_string(),
        };
        ctx.output.push_str(&format!(
            "static ({},{}) {addr} {addr} netmask {mask}\n",
            odst_iface.label, osrc_iface.label
        ));
        Ok(())
    }

    fn print_snat(ctx: &mut CompileContext, rule: &NatRule) -> Result<(), CompileError> {
        let index = rule
            .options
            .get_int("nat_cmd")
            .ok_or_else(|| CompileError::Unclassified { rule: rule.label.clone() })?;
        let cmd: NatCmd = ctx
            .nat
            .nat_commands
            .get(index as usize)
            .cloned()
            .ok_or_else(|| CompileError::Unclassified { rule: rule.label.clone() })?;

        if !cmd.ignore_global {
            let pool = match &cmd.pool {
                GlobalPool::Interface => " interface".to_string(),
                GlobalPool::Single(addr) => format!(" {addr}"),
                GlobalPool::Network { addr, netmask } => {
                    format!(" {addr} netmask {netmask}")
                }
                GlobalPool::Range { start, end } => {
                    // A range pool borrows the egress interface's netmask.
                    let netmask = ctx
                        .interfaces()
                        .find(|i| i.label == cmd.t_iface_label)
                        .map(|i| i.netmask.to_string())
                        .unwrap_or_else(|| "255.255.255.255".to_string());
                    format!(" {start}-{end} netmask {netmask}")
                }
            };
            ctx.output.push_str(&format!(
                "global ({}) {}{pool}\n",
                cmd.t_iface_label, cmd.nat_id
            ));
        }

        if cmd.ignore_nat {
            ctx.output.push_str(&format!("! {}\n", cmd.comment));
            return Ok(());
        }

        let legacy =
            rule.options.get_bool("use_nat_0_0") || !ctx.version.at_least("6.3");
        if legacy {
            let suffix = if cmd.outside {
                " outside".to_string()
            } else {
                format!(" {}", format::conn_options(ctx))
            };
            ctx.output.push_str(&format!(
                "nat ({}) {} {} {}{suffix}\n",
                cmd.o_iface_label,
                cmd.nat_id,
                raw_addr(&cmd.o_src),
                raw_mask(&cmd.o_src),
            ));
            return Ok(());
        }

        if let Some(clear) = ctx.clear_acl_guard(&cmd.acl_name)? {
            ctx.output.push_str(&clear);
            ctx.output.push('\n');
        }
        ctx.output.push_str(&format!(
            "access-list {} permit {} {} {} {} {}\n",
            cmd.acl_name,
            cmd.o_srv.protocol_name(),
            format::address(&cmd.o_src, true),
            format::src_service(&cmd.o_srv),
            format::address(&cmd.o_dst, true),
            format::dst_service(&cmd.o_srv),
        ));

        if !cmd.ignore_nat_and_print_acl {
            if ctx.manual_commit() {
                ctx.output.push_str("access-list commit\n\n");
            }
            let suffix = if cmd.outside {
                " outside".to_string()
            } else {
                format!(" {}", format::conn_options(ctx))
            };
            ctx.output.push_str(&format!(
                "nat ({}) {} access-list {}{suffix}\n",
                cmd.o_iface_label, cmd.nat_id, cmd.acl_name
            ));
        }
        Ok(())
    }

    fn print_dnat(ctx: &mut CompileContext, rule: &NatRule) -> Result<(), CompileError> {
        let unclassified = || CompileError::Unclassified { rule: rule.label.clone() };
        let index = rule.options.get_int("sc_cmd").ok_or_else(unclassified)?;
        let cmd: StaticCmd = ctx
            .nat
            .static_commands
            .get(index as usize)
            .cloned()
            .ok_or_else(unclassified)?;
        let orig_id = rule.options.get_int("nat_iface_orig").ok_or_else(unclassified)?;
        let trn_id = rule.options.get_int("nat_iface_trn").ok_or_else(unclassified)?;
        let orig_label =
            ctx.interface(policy_model::ObjectId(orig_id as u32))?.label.clone();
        let trn_label =
            ctx.interface(policy_model::ObjectId(trn_id as u32))?.label.clone();

        let use_ports = matches!(cmd.osrv, Service::Tcp { .. } | Service::Udp { .. });
        let outside_is_interface = matches!(cmd.oaddr, Address::Interface { .. });

        if !ctx.version.at_least("6.3") {
            let mut line = format!("static ({trn_label},{orig_label}) ");
            line.push_str(proto_prefix(&cmd.osrv));
            if outside_is_interface {
                line.push_str("interface ");
                if use_ports {
                    line.push_str(&format::static_port(&cmd.osrv));
                }
                line.push_str(&raw_addr(&cmd.iaddr));
                line.push(' ');
                if use_ports {
                    line.push_str(&format::static_port(&cmd.tsrv));
                }
            } else {
                line.push_str(&raw_addr(&cmd.oaddr));
                line.push(' ');
                if use_ports {
                    line.push_str(&format::static_port(&cmd.osrv));
                }
                line.push_str(&raw_addr(&cmd.iaddr));
                line.push(' ');
                if use_ports {
                    line.push_str(&format::static_port(&cmd.tsrv));
                }
                line.push_str(&format!(" netmask {}", raw_mask(&cmd.oaddr)));
            }
            line.push_str(&format!(" {}\n", format::conn_options(ctx)));
            ctx.output.push_str(&line);
            return Ok(());
        }

        if let Some(clear) = ctx.clear_acl_guard(&cmd.acl_name)? {
            ctx.output.push_str(&clear);
            ctx.output.push('\n');
        }
        // Inverted on purpose: the list matches the translated (inside)
        // address against the original source, the form the static/acl
        // pairing expects.
        ctx.output.push_str(&format!(
            "access-list {} permit {} {} {} {} {}\n",
            cmd.acl_name,
            cmd.osrv.protocol_name(),
            format::address(&cmd.iaddr, true),
            format::dst_service(&cmd.tsrv),
            format::address(&cmd.osrc, true),
            format::src_service(&cmd.osrv),
        ));

        if !cmd.ignore_scmd_and_print_acl {
            if ctx.manual_commit() {
                ctx.output.push_str("access-list commit\n\n");
            }
            let mut line = format!("static ({trn_label},{orig_label}) ");
            line.push_str(proto_prefix(&cmd.osrv));
            if outside_is_interface {
                line.push_str("interface ");
            } else {
                line.push_str(&raw_addr(&cmd.oaddr));
                line.push(' ');
            }
            if use_ports {
                line.push_str(&format::static_port(&cmd.osrv));
            }
            line.push_str(&format!(
                "access-list {} {}\n",
                cmd.acl_name,
                format::conn_options(ctx)
            ));
            ctx.output.push_str(&line);
        }
        Ok(())
    }
}

impl RuleProcessor<NatRule> for PrintNatRule {
    fn next(
        &mut self,
        ctx: &mut CompileContext,
    ) -> Result<Option<RuleBatch<NatRule>>, CompileError> {
        let Some(rule) = self.upstream.pull(ctx)? else {
            return Ok(None);
        };
        self.print_comment(ctx, &rule);
        match rule.rule_type {
            NatRuleType::NoNat => Self::print_nonat(ctx, &rule)?,
            NatRuleType::Snat => Self::print_snat(ctx, &rule)?,
            NatRuleType::Sdnat => {
                ctx.warn(CompileWarning::for_rule(
                    &rule.label,
                    "source+destination translation is not supported, rule ignored",
                ));
            }
            NatRuleType::Dnat => Self::print_dnat(ctx, &rule)?,
        }
        Ok(Some(vec![rule]))
    }
}
