//! Chain assembly and the top-level compile entry point.
//!
//! `PixCompiler` wires the rule processors into the two fixed chains —
//! NAT first, access policy second — and drains them into one output
//! script. The snapshot stays shared and immutable; every run gets a fresh
//! `CompileContext`.

use std::sync::Arc;

use policy_model::{NatRule, ObjectSnapshot, PolicyRule, RuleRole};

use crate::context::CompileContext;
use crate::error::{CompileError, CompileWarning};
use crate::format;
use crate::nat::{ClassifyNat, PrintNatRule};
use crate::pipeline::{
    Begin, CompilerPass, ConvertInterfaceIdToStr, CountRules, EliminateDuplicates, EmptyGroups,
    RecursiveGroups, RuleProcessor, SplitIfMatchesFw, SwapMultiAddress,
};
use crate::policy_print::PrintPolicyRule;
use crate::resources::Resources;

/// Result of one compilation run.
#[derive(Debug)]
pub struct CompileOutput {
    /// The command script, newline-terminated lines.
    pub script: String,
    pub warnings: Vec<CompileWarning>,
    pub diagnostics: Vec<String>,
}

/// Which rulesets a run compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sections {
    pub nat: bool,
    pub policy: bool,
}

impl Default for Sections {
    fn default() -> Self {
        Sections { nat: true, policy: true }
    }
}

pub struct PixCompiler {
    snapshot: Arc<ObjectSnapshot>,
    resources: Resources,
    lenient: bool,
}

impl PixCompiler {
    pub fn new(snapshot: Arc<ObjectSnapshot>) -> Self {
        PixCompiler { snapshot, resources: Resources::builtin(), lenient: false }
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    /// Drop rules with structural problems instead of aborting the run.
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn compile(&self) -> Result<CompileOutput, CompileError> {
        self.compile_sections(Sections::default())
    }

    pub fn compile_sections(&self, sections: Sections) -> Result<CompileOutput, CompileError> {
        let mut ctx = CompileContext::new(self.snapshot.clone(), self.resources.clone())?;
        ctx.lenient = self.lenient;
        if sections.nat {
            let mut rules = self.snapshot.nat.clone();
            for rule in &mut rules {
                if rule.label.is_empty() {
                    rule.label = format::rule_label("NAT", None, rule.position);
                }
            }
            let mut chain = self.nat_chain(rules);
            while chain.next(&mut ctx)?.is_some() {}
        }
        if sections.policy {
            let mut rules = self.snapshot.policy.clone();
            for rule in &mut rules {
                if rule.label.is_empty() {
                    rule.label = format::rule_label("Policy", None, rule.position);
                }
            }
            let mut chain = self.policy_chain(rules);
            while chain.next(&mut ctx)?.is_some() {}
        }
        Ok(CompileOutput {
            script: ctx.output,
            warnings: ctx.warnings,
            diagnostics: ctx.diagnostics,
        })
    }

    /// NAT chain: validate and normalize, classify into the command
    /// tables, then print behind a barrier so the printing pass sees the
    /// complete tables.
    fn nat_chain(&self, rules: Vec<NatRule>) -> Box<dyn RuleProcessor<NatRule>> {
        let mut chain: Box<dyn RuleProcessor<NatRule>> = Box::new(Begin::new(rules));
        chain = Box::new(CountRules::new(chain, "nat"));
        chain = Box::new(RecursiveGroups::new(chain));
        chain = Box::new(EmptyGroups::new(chain));
        for role in [RuleRole::OSrc, RuleRole::ODst, RuleRole::OSrv] {
            chain = Box::new(EliminateDuplicates::new(chain, role));
        }
        for role in [RuleRole::OSrc, RuleRole::ODst, RuleRole::TSrc] {
            chain = Box::new(SwapMultiAddress::new(chain, role));
        }
        chain = Box::new(ClassifyNat::new(chain));
        chain = Box::new(CompilerPass::new(chain, "nat print"));
        Box::new(PrintNatRule::new(chain))
    }

    /// Policy chain: validate and normalize, split destinations matching
    /// the firewall, resolve interface labels, then print.
    fn policy_chain(&self, rules: Vec<PolicyRule>) -> Box<dyn RuleProcessor<PolicyRule>> {
        let mut chain: Box<dyn RuleProcessor<PolicyRule>> = Box::new(Begin::new(rules));
        chain = Box::new(CountRules::new(chain, "policy"));
        chain = Box::new(RecursiveGroups::new(chain));
        chain = Box::new(EmptyGroups::new(chain));
        for role in [RuleRole::Src, RuleRole::Dst, RuleRole::Srv] {
            chain = Box::new(EliminateDuplicates::new(chain, role));
        }
        for role in [RuleRole::Src, RuleRole::Dst] {
            chain = Box::new(SwapMultiAddress::new(chain, role));
        }
        chain = Box::new(SplitIfMatchesFw::new(chain, RuleRole::Dst));
        chain = Box::new(ConvertInterfaceIdToStr::new(chain, RuleRole::Itf));
        Box::new(PrintPolicyRule::new(chain))
    }
}
