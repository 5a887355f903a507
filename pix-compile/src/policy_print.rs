//! The access-policy printing pass.
//!
//! Terminal processor of the policy chain. Each rule contributes one
//! permit/deny line per (source, destination, service) combination to the
//! access list of its interface; finished lists are flushed to the run
//! output in first-use order once the rule stream ends.

use policy_model::{
    Address, ObjectDef, PolicyObject, PolicyRule, RuleAction, RuleElement, RuleRole, Service,
};

use crate::acl::CiscoAcl;
use crate::context::CompileContext;
use crate::error::CompileError;
use crate::format;
use crate::pipeline::{RuleBatch, RuleProcessor, Upstream};

pub struct PrintPolicyRule {
    upstream: Upstream<PolicyRule>,
    /// Access lists in first-use order.
    acls: Vec<CiscoAcl>,
    flushed: bool,
}

impl PrintPolicyRule {
    pub fn new(prev: Box<dyn RuleProcessor<PolicyRule>>) -> Self {
        PrintPolicyRule { upstream: Upstream::new(prev), acls: Vec::new(), flushed: false }
    }

    fn acl_for(&mut self, ctx: &CompileContext, rule: &PolicyRule) -> usize {
        let label = rule.options.get_str("interface_label").unwrap_or("global");
        let name = format!("{label}_acl");
        if let Some(pos) = self.acls.iter().position(|acl| acl.name() == name) {
            return pos;
        }
        let quote = ctx.fw_options.get_bool("pix_quote_remarks");
        self.acls.push(CiscoAcl::new(name, false, quote));
        self.acls.len() - 1
    }

    fn addresses(
        ctx: &CompileContext,
        rule: &PolicyRule,
        role: RuleRole,
        element: &RuleElement,
    ) -> Result<Vec<Address>, CompileError> {
        if element.is_any() {
            return Ok(vec![Address::ANY4]);
        }
        let mut out = Vec::new();
        for def in ctx.resolve_element(&rule.label, element)? {
            match def {
                ObjectDef { object: PolicyObject::Address(a), .. } => out.push(a),
                ObjectDef { object, name, .. } => {
                    return Err(CompileError::WrongObjectKind {
                        rule: rule.label.clone(),
                        expected: "address",
                        found: object.kind_name(),
                        name,
                    })
                }
            }
        }
        if out.is_empty() {
            return Err(CompileError::MissingRuleElement { rule: rule.label.clone(), role });
        }
        Ok(out)
    }

    fn services(
        ctx: &CompileContext,
        rule: &PolicyRule,
    ) -> Result<Vec<Service>, CompileError> {
        if rule.srv.is_any() {
            return Ok(vec![Service::ANY]);
        }
        let mut out = Vec::new();
        for def in ctx.resolve_element(&rule.label, &rule.srv)? {
            match def {
                ObjectDef { object: PolicyObject::Service(s), .. } => out.push(s),
                ObjectDef { object, name, .. } => {
                    return Err(CompileError::WrongObjectKind {
                        rule: rule.label.clone(),
                        expected: "service",
                        found: object.kind_name(),
                        name,
                    })
                }
            }
        }
        if out.is_empty() {
            return Err(CompileError::MissingRuleElement {
                rule: rule.label.clone(),
                role: RuleRole::Srv,
            });
        }
        Ok(out)
    }

    fn rule_line(action: RuleAction, src: &Address, dst: &Address, srv: &Service) -> String {
        let verb = match action {
            RuleAction::Accept => "permit",
            RuleAction::Deny | RuleAction::Reject => "deny",
        };
        let segments = [
            verb.to_string(),
            srv.protocol_name().to_string(),
            format::address(src, true),
            format::src_service(srv),
            format::address(dst, true),
            format::dst_service(srv),
        ];
        segments
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn print_rule(
        &mut self,
        ctx: &mut CompileContext,
        rule: &PolicyRule,
    ) -> Result<(), CompileError> {
        let srcs = Self::addresses(ctx, rule, RuleRole::Src, &rule.src)?;
        let dsts = Self::addresses(ctx, rule, RuleRole::Dst, &rule.dst)?;
        let srvs = Self::services(ctx, rule)?;
        let include_comments = ctx.include_comments();
        let pos = self.acl_for(ctx, rule);
        let acl = &mut self.acls[pos];
        if include_comments {
            acl.add_remark(&rule.label, &rule.comment);
        }
        for src in &srcs {
            for dst in &dsts {
                for srv in &srvs {
                    acl.add_line(Self::rule_line(rule.action, src, dst, srv));
                }
            }
        }
        Ok(())
    }

    fn flush(&mut self, ctx: &mut CompileContext) -> Result<(), CompileError> {
        for acl in &self.acls {
            if let Some(clear) = ctx.clear_acl_guard(acl.name())? {
                ctx.output.push_str(&clear);
                ctx.output.push('\n');
            }
            ctx.output.push_str(&acl.print());
        }
        Ok(())
    }
}

impl RuleProcessor<PolicyRule> for PrintPolicyRule {
    fn next(
        &mut self,
        ctx: &mut CompileContext,
    ) -> Result<Option<RuleBatch<PolicyRule>>, CompileError> {
        match self.upstream.pull(ctx)? {
            Some(rule) => {
                self.print_rule(ctx, &rule)?;
                Ok(Some(vec![rule]))
            }
            None => {
                if !self.flushed {
                    self.flushed = true;
                    self.flush(ctx)?;
                }
                Ok(None)
            }
        }
    }
}
