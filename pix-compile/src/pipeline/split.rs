//! Splitting rules whose element mixes the firewall itself with other
//! objects.

use policy_model::{Address, CompilerRule, ObjectId, PolicyObject, RuleRole};

use crate::context::CompileContext;
use crate::error::CompileError;
use crate::pipeline::{RuleBatch, RuleProcessor, Upstream};

/// Separates references matching the firewall itself from the rest of a
/// rule element. Commands addressing the firewall's own interfaces differ
/// from transit-traffic commands, so a mixed element becomes two rules:
/// the firewall half first, then the remainder, both keeping the original
/// rule id. Elements that match entirely or not at all pass through
/// unchanged.
pub struct SplitIfMatchesFw<R: CompilerRule> {
    upstream: Upstream<R>,
    role: RuleRole,
}

impl<R: CompilerRule> SplitIfMatchesFw<R> {
    pub fn new(prev: Box<dyn RuleProcessor<R>>, role: RuleRole) -> Self {
        SplitIfMatchesFw { upstream: Upstream::new(prev), role }
    }

    fn matches_fw(&self, ctx: &CompileContext, id: ObjectId) -> bool {
        if id == ctx.snapshot.firewall.id {
            return true;
        }
        let Some(def) = ctx.object(id) else {
            return false;
        };
        match &def.object {
            PolicyObject::Address(Address::Interface { device, .. }) => {
                *device == ctx.snapshot.firewall.id
            }
            PolicyObject::Address(addr) => match addr.addr() {
                Some(ip) => ctx.interfaces().any(|info| info.addr == ip),
                None => false,
            },
            _ => false,
        }
    }
}

impl<R: CompilerRule> RuleProcessor<R> for SplitIfMatchesFw<R> {
    fn next(&mut self, ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError> {
        let Some(rule) = self.upstream.pull(ctx)? else {
            return Ok(None);
        };
        let element = rule.element(self.role).ok_or_else(|| CompileError::UnsupportedRole {
            rule: rule.label().to_string(),
            role: self.role,
        })?;
        if element.is_any() {
            return Ok(Some(vec![rule]));
        }
        let (fw_refs, rest): (Vec<ObjectId>, Vec<ObjectId>) = element
            .refs
            .iter()
            .partition(|id| self.matches_fw(ctx, **id));
        if fw_refs.is_empty() || rest.is_empty() {
            return Ok(Some(vec![rule]));
        }
        let mut fw_half = rule.clone();
        let mut rest_half = rule;
        if let Some(e) = fw_half.element_mut(self.role) {
            e.refs = fw_refs;
        }
        if let Some(e) = rest_half.element_mut(self.role) {
            e.refs = rest;
        }
        Ok(Some(vec![fw_half, rest_half]))
    }
}
