//! Compiler error and warning types.
//!
//! Errors carry the originating rule's identity wherever one exists so a
//! failed run always names the offending rule. Warnings never abort a run
//! and never change what the compiler emits.

use std::fmt::{self, Display, Formatter};

use policy_model::{ModelError, ObjectId, RuleRole, VersionError};
use thiserror::Error;

/// Fatal conditions for a compilation run or a single rule.
#[derive(Debug, Error)]
pub enum CompileError {
    /// A group referenced itself; fatal for the rule (lenient mode drops
    /// the rule with a warning instead).
    #[error("rule {rule}: recursive group '{group}'")]
    RecursiveGroup { rule: String, group: String },
    /// A group resolved to zero objects and auto-dropping is disabled.
    #[error("rule {rule}: group '{group}' is empty")]
    EmptyGroup { rule: String, group: String },
    /// A required rule element resolved to nothing; precondition violation,
    /// the compiler must not proceed with the rule.
    #[error("rule {rule}: no object resolves the {role} element")]
    MissingRuleElement { rule: String, role: RuleRole },
    /// A processor was configured with a role the rule kind does not carry.
    #[error("rule {rule}: rule kind has no {role} element")]
    UnsupportedRole { rule: String, role: RuleRole },
    /// A rule referenced an object the snapshot does not contain.
    #[error("rule {rule}: unknown object id {id}")]
    MissingObject { rule: String, id: ObjectId },
    /// An object of the wrong kind sat where an address/service/interface
    /// was required.
    #[error("rule {rule}: expected {expected}, found {found} '{name}'")]
    WrongObjectKind {
        rule: String,
        expected: &'static str,
        found: &'static str,
        name: String,
    },
    /// A no-translation rule arrived without its exemption/static sub-kind.
    #[error("rule {rule}: no-translation rule carries no sub-kind")]
    NoNatKindMissing { rule: String },
    /// A NAT rule reached the printing pass without a classification
    /// record; the pass ordering contract was violated.
    #[error("rule {rule}: rule was not classified before printing")]
    Unclassified { rule: String },
    /// No firewall interface serves the given address and the firewall
    /// defines no interfaces to fall back to.
    #[error("no interface of firewall '{firewall}' serves address object '{object}'")]
    NoInterfaceForAddress { firewall: String, object: String },
    /// The firewall's version string failed semantic parsing.
    #[error(transparent)]
    Version(#[from] VersionError),
    /// A command template key has no value for this platform/version.
    #[error("no resource '{key}' for platform '{platform}' version {version}")]
    MissingResource {
        platform: String,
        version: String,
        key: String,
    },
    /// Failure inside the object model or intersection engine.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Malformed resource override file.
    #[error("failed to load resource overrides: {0}")]
    ResourceOverrides(String),
}

impl CompileError {
    /// Attach rule identity to a bare model error.
    pub fn for_rule(rule: impl Into<String>, err: ModelError) -> Self {
        match err {
            ModelError::UnknownObject(id) => CompileError::MissingObject { rule: rule.into(), id },
            other => CompileError::Model(other),
        }
    }
}

/// A non-fatal finding surfaced to the caller alongside the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileWarning {
    /// Label of the rule the warning concerns, when there is one.
    pub rule: Option<String>,
    pub message: String,
}

impl CompileWarning {
    pub fn for_rule(rule: impl Into<String>, message: impl Into<String>) -> Self {
        CompileWarning { rule: Some(rule.into()), message: message.into() }
    }

    pub fn general(message: impl Into<String>) -> Self {
        CompileWarning { rule: None, message: message.into() }
    }
}

impl Display for CompileWarning {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.rule {
            Some(rule) => write!(f, "rule {}: {}", rule, self.message),
            None => f.write_str(&self.message),
        }
    }
}
