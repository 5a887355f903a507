//! Normalizing processors: duplicate elimination, run-time object
//! swapping, interface reference stringification.

use policy_model::{Address, CompilerRule, ObjectDef, ObjectId, PolicyObject, RuleRole};

use crate::context::CompileContext;
use crate::error::CompileError;
use crate::pipeline::{RuleBatch, RuleProcessor, Upstream};

/// Decides whether two object references count as duplicates. The default
/// compares object identity by id.
pub type ObjectComparator = Box<dyn Fn(&CompileContext, ObjectId, ObjectId) -> bool>;

/// Removes duplicate object references within one rule element. Surviving
/// references keep first-occurrence order.
pub struct EliminateDuplicates<R: CompilerRule> {
    upstream: Upstream<R>,
    role: RuleRole,
    comparator: ObjectComparator,
}

impl<R: CompilerRule> EliminateDuplicates<R> {
    pub fn new(prev: Box<dyn RuleProcessor<R>>, role: RuleRole) -> Self {
        EliminateDuplicates {
            upstream: Upstream::new(prev),
            role,
            comparator: Box::new(|_, a, b| a == b),
        }
    }

    /// Replace the identity comparator, e.g. to treat structurally equal
    /// addresses with different ids as duplicates.
    pub fn with_comparator(mut self, comparator: ObjectComparator) -> Self {
        self.comparator = comparator;
        self
    }
}

impl<R: CompilerRule> RuleProcessor<R> for EliminateDuplicates<R> {
    fn next(&mut self, ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError> {
        let Some(mut rule) = self.upstream.pull(ctx)? else {
            return Ok(None);
        };
        let label = rule.label().to_string();
        let element = rule.element_mut(self.role).ok_or(CompileError::UnsupportedRole {
            rule: label,
            role: self.role,
        })?;
        let mut kept: Vec<ObjectId> = Vec::with_capacity(element.refs.len());
        for id in &element.refs {
            if !kept.iter().any(|seen| (self.comparator)(ctx, *seen, *id)) {
                kept.push(*id);
            }
        }
        element.refs = kept;
        Ok(Some(vec![rule]))
    }
}

/// Replaces compile-time multi-address placeholders with their
/// run-time-resolving counterparts. A 1:1, order-preserving rewrite: the
/// reference stays, the object behind it is shadowed for this run.
pub struct SwapMultiAddress<R: CompilerRule> {
    upstream: Upstream<R>,
    role: RuleRole,
}

impl<R: CompilerRule> SwapMultiAddress<R> {
    pub fn new(prev: Box<dyn RuleProcessor<R>>, role: RuleRole) -> Self {
        SwapMultiAddress { upstream: Upstream::new(prev), role }
    }
}

impl<R: CompilerRule> RuleProcessor<R> for SwapMultiAddress<R> {
    fn next(&mut self, ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError> {
        let Some(rule) = self.upstream.pull(ctx)? else {
            return Ok(None);
        };
        let element = rule.element(self.role).ok_or(CompileError::UnsupportedRole {
            rule: rule.label().to_string(),
            role: self.role,
        })?;
        let swaps: Vec<ObjectDef> = element
            .refs
            .iter()
            .filter_map(|id| ctx.object(*id))
            .filter(|def| {
                matches!(
                    def.object,
                    PolicyObject::Address(Address::MultiAddress { run_time: false })
                )
            })
            .map(|def| ObjectDef {
                id: def.id,
                name: def.name.clone(),
                object: PolicyObject::Address(Address::MultiAddress { run_time: true }),
            })
            .collect();
        for def in swaps {
            ctx.swap_object(def);
        }
        Ok(Some(vec![rule]))
    }
}

/// Resolves a rule's interface references to their canonical label string
/// for later text emission, stored in the rule options under
/// `interface_label`. An "any" interface element stores nothing.
pub struct ConvertInterfaceIdToStr<R: CompilerRule> {
    upstream: Upstream<R>,
    role: RuleRole,
}

impl<R: CompilerRule> ConvertInterfaceIdToStr<R> {
    pub fn new(prev: Box<dyn RuleProcessor<R>>, role: RuleRole) -> Self {
        ConvertInterfaceIdToStr { upstream: Upstream::new(prev), role }
    }
}

impl<R: CompilerRule> RuleProcessor<R> for ConvertInterfaceIdToStr<R> {
    fn next(&mut self, ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError> {
        let Some(mut rule) = self.upstream.pull(ctx)? else {
            return Ok(None);
        };
        let label = rule.label().to_string();
        let element = rule.element(self.role).ok_or(CompileError::UnsupportedRole {
            rule: label.clone(),
            role: self.role,
        })?;
        if element.is_any() {
            return Ok(Some(vec![rule]));
        }
        let first = element.refs[0];
        let def = ctx
            .object(first)
            .ok_or(CompileError::MissingObject { rule: label.clone(), id: first })?;
        let PolicyObject::Address(Address::Interface { label: itf_label, .. }) = &def.object
        else {
            return Err(CompileError::WrongObjectKind {
                rule: label,
                expected: "interface",
                found: def.object.kind_name(),
                name: def.name.clone(),
            });
        };
        let itf_label = itf_label.clone();
        rule.options_mut().set_str("interface_label", itf_label);
        Ok(Some(vec![rule]))
    }
}
