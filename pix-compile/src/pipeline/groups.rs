//! Group sanity processors: recursion detection and empty-group handling.

use policy_model::{CompilerRule, ModelError, ObjectId};

use crate::context::CompileContext;
use crate::error::{CompileError, CompileWarning};
use crate::pipeline::{RuleBatch, RuleProcessor, Upstream};

fn group_name(ctx: &CompileContext, id: ObjectId) -> String {
    ctx.object(id).map(|def| def.name.clone()).unwrap_or_else(|| id.to_string())
}

/// Rejects rules whose elements reference a group that (transitively)
/// contains itself. Fatal by default; lenient mode drops the rule with a
/// warning and keeps compiling.
pub struct RecursiveGroups<R: CompilerRule> {
    upstream: Upstream<R>,
}

impl<R: CompilerRule> RecursiveGroups<R> {
    pub fn new(prev: Box<dyn RuleProcessor<R>>) -> Self {
        RecursiveGroups { upstream: Upstream::new(prev) }
    }
}

impl<R: CompilerRule> RuleProcessor<R> for RecursiveGroups<R> {
    fn next(&mut self, ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError> {
        let Some(rule) = self.upstream.pull(ctx)? else {
            return Ok(None);
        };
        for role in R::roles() {
            let element = rule.element(*role).ok_or_else(|| CompileError::UnsupportedRole {
                rule: rule.label().to_string(),
                role: *role,
            })?;
            if let Err(ModelError::RecursiveGroup(id)) =
                ctx.snapshot.resolve_refs(&element.refs)
            {
                let group = group_name(ctx, id);
                if ctx.lenient {
                    ctx.warn(CompileWarning::for_rule(
                        rule.label(),
                        format!("recursive group '{group}', rule dropped"),
                    ));
                    return Ok(Some(Vec::new()));
                }
                return Err(CompileError::RecursiveGroup {
                    rule: rule.label().to_string(),
                    group,
                });
            }
        }
        Ok(Some(vec![rule]))
    }
}

/// Handles references to groups that resolve to zero leaf objects. Fatal
/// unless the firewall option `ignore_empty_groups` is set, in which case
/// the empty reference is removed with a warning; an element emptied this
/// way matches anything.
pub struct EmptyGroups<R: CompilerRule> {
    upstream: Upstream<R>,
}

impl<R: CompilerRule> EmptyGroups<R> {
    pub fn new(prev: Box<dyn RuleProcessor<R>>) -> Self {
        EmptyGroups { upstream: Upstream::new(prev) }
    }
}

impl<R: CompilerRule> RuleProcessor<R> for EmptyGroups<R> {
    fn next(&mut self, ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError> {
        let Some(mut rule) = self.upstream.pull(ctx)? else {
            return Ok(None);
        };
        let label = rule.label().to_string();
        let ignore = ctx.fw_options.get_bool("ignore_empty_groups");
        for role in R::roles() {
            let element = rule.element_mut(*role).ok_or_else(|| {
                CompileError::UnsupportedRole { rule: label.clone(), role: *role }
            })?;
            let mut kept = Vec::with_capacity(element.refs.len());
            let mut dropped = Vec::new();
            for id in &element.refs {
                // A leaf always counts one; only group references can
                // expand to nothing.
                let count = ctx
                    .snapshot
                    .leaf_count(*id)
                    .map_err(|e| CompileError::for_rule(&label, e))?;
                if count == 0 {
                    dropped.push(*id);
                } else {
                    kept.push(*id);
                }
            }
            if dropped.is_empty() {
                continue;
            }
            if !ignore {
                return Err(CompileError::EmptyGroup {
                    rule: label,
                    group: group_name(ctx, dropped[0]),
                });
            }
            element.refs = kept;
            for id in dropped {
                let group = group_name(ctx, id);
                ctx.warn(CompileWarning::for_rule(
                    &label,
                    format!("empty group '{group}' removed from {role} element"),
                ));
            }
        }
        Ok(Some(vec![rule]))
    }
}
