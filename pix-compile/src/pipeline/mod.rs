//! The rule-processing pipeline.
//!
//! A compiler run is an ordered chain of processors. Each processor owns
//! its predecessor and pulls rules from it one batch at a time, emitting
//! zero, one, or many rules downstream — composable, lazy, and pull-based.
//! The final processor's output is the compiled script.
//!
//! All processors preserve the relative order of the rules they emit
//! unless they explicitly split one; a split keeps the original rule id on
//! both halves so downstream diagnostics can trace provenance.

mod groups;
mod normalize;
mod split;

pub use groups::{EmptyGroups, RecursiveGroups};
pub use normalize::{ConvertInterfaceIdToStr, EliminateDuplicates, SwapMultiAddress};
pub use split::SplitIfMatchesFw;

use std::collections::VecDeque;

use policy_model::CompilerRule;

use crate::context::CompileContext;
use crate::error::CompileError;

/// Rules a processor emits in one pull. Usually one; splits emit several.
pub type RuleBatch<R> = Vec<R>;

/// One stage of the pipeline.
pub trait RuleProcessor<R: CompilerRule> {
    /// Produce the next batch of rules, or `None` when the stream is
    /// exhausted. Implementations may pull from their predecessor any
    /// number of times (including zero, when replaying a buffer).
    fn next(&mut self, ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError>;
}

/// A boxed predecessor plus a flattening buffer, for processors that work
/// one rule at a time regardless of upstream batch sizes.
pub struct Upstream<R: CompilerRule> {
    prev: Box<dyn RuleProcessor<R>>,
    pending: VecDeque<R>,
}

impl<R: CompilerRule> Upstream<R> {
    pub fn new(prev: Box<dyn RuleProcessor<R>>) -> Self {
        Upstream { prev, pending: VecDeque::new() }
    }

    /// Pull a single rule, refilling from the predecessor as needed.
    pub fn pull(&mut self, ctx: &mut CompileContext) -> Result<Option<R>, CompileError> {
        loop {
            if let Some(rule) = self.pending.pop_front() {
                return Ok(Some(rule));
            }
            match self.prev.next(ctx)? {
                Some(batch) => self.pending.extend(batch),
                None => return Ok(None),
            }
        }
    }
}

/// The source of the chain: yields each rule of the input ruleset in
/// original order, exactly once.
pub struct Begin<R> {
    queue: VecDeque<R>,
}

impl<R> Begin<R> {
    pub fn new(rules: Vec<R>) -> Self {
        Begin { queue: rules.into() }
    }
}

impl<R: CompilerRule> RuleProcessor<R> for Begin<R> {
    fn next(&mut self, _ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError> {
        Ok(self.queue.pop_front().map(|rule| vec![rule]))
    }
}

/// A pipeline barrier: drains its predecessor completely before yielding
/// anything, so every later processor observes the full rule set from its
/// beginning. This is how multi-pass algorithms (classify NAT commands,
/// then print them) are composed from single-pass processors.
pub struct CompilerPass<R: CompilerRule> {
    upstream: Upstream<R>,
    pass_name: String,
    buffer: VecDeque<R>,
    drained: bool,
}

impl<R: CompilerRule> CompilerPass<R> {
    pub fn new(prev: Box<dyn RuleProcessor<R>>, pass_name: impl Into<String>) -> Self {
        CompilerPass {
            upstream: Upstream::new(prev),
            pass_name: pass_name.into(),
            buffer: VecDeque::new(),
            drained: false,
        }
    }
}

impl<R: CompilerRule> RuleProcessor<R> for CompilerPass<R> {
    fn next(&mut self, ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError> {
        if !self.drained {
            while let Some(rule) = self.upstream.pull(ctx)? {
                self.buffer.push_back(rule);
            }
            self.drained = true;
            ctx.diag(format!("pass: {}", self.pass_name));
        }
        Ok(self.buffer.pop_front().map(|rule| vec![rule]))
    }
}

/// Diagnostic tap printing each rule's label; never alters the stream.
pub struct DebugTap<R: CompilerRule> {
    upstream: Upstream<R>,
    stage: String,
}

impl<R: CompilerRule> DebugTap<R> {
    pub fn new(prev: Box<dyn RuleProcessor<R>>, stage: impl Into<String>) -> Self {
        DebugTap { upstream: Upstream::new(prev), stage: stage.into() }
    }
}

impl<R: CompilerRule> RuleProcessor<R> for DebugTap<R> {
    fn next(&mut self, ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError> {
        let Some(rule) = self.upstream.pull(ctx)? else {
            return Ok(None);
        };
        ctx.diag(format!("{}: rule {} ({})", self.stage, rule.id(), rule.label()));
        Ok(Some(vec![rule]))
    }
}

/// Trivial progress indicator; reports each rule position as it passes.
pub struct PrintProgress<R: CompilerRule> {
    upstream: Upstream<R>,
    seen: usize,
}

impl<R: CompilerRule> PrintProgress<R> {
    pub fn new(prev: Box<dyn RuleProcessor<R>>) -> Self {
        PrintProgress { upstream: Upstream::new(prev), seen: 0 }
    }
}

impl<R: CompilerRule> RuleProcessor<R> for PrintProgress<R> {
    fn next(&mut self, ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError> {
        let Some(rule) = self.upstream.pull(ctx)? else {
            return Ok(None);
        };
        self.seen += 1;
        ctx.diag(format!("rule {}", self.seen));
        Ok(Some(vec![rule]))
    }
}

/// Reports the total number of rules that flowed through once the stream
/// ends; pass-through otherwise.
pub struct CountRules<R: CompilerRule> {
    upstream: Upstream<R>,
    what: String,
    count: usize,
    reported: bool,
}

impl<R: CompilerRule> CountRules<R> {
    pub fn new(prev: Box<dyn RuleProcessor<R>>, what: impl Into<String>) -> Self {
        CountRules {
            upstream: Upstream::new(prev),
            what: what.into(),
            count: 0,
            reported: false,
        }
    }
}

impl<R: CompilerRule> RuleProcessor<R> for CountRules<R> {
    fn next(&mut self, ctx: &mut CompileContext) -> Result<Option<RuleBatch<R>>, CompileError> {
        match self.upstream.pull(ctx)? {
            Some(rule) => {
                self.count += 1;
                Ok(Some(vec![rule]))
            }
            None => {
                if !self.reported {
                    self.reported = true;
                    ctx.diag(format!("{}: {} rules", self.what, self.count));
                }
                Ok(None)
            }
        }
    }
}
