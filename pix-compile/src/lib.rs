//! Compiles vendor-neutral firewall policy into Cisco PIX/FWSM commands.
//!
//! Input is an object snapshot from the policy editor (see
//! [`policy_model`]): resolved network objects plus ordered policy and NAT
//! rulesets for one firewall. Output is the literal command script the
//! device parses — access lists, `nat`/`global` pairs, `static`
//! translations — with the version-sensitive spelling the target release
//! expects.
//!
//! # Architecture
//!
//! A compilation run is a chain of pull-based rule processors:
//!
//! - [`pipeline`] — the processor trait, chain plumbing, and the
//!   normalization/validation/splitting stages
//! - [`nat`] — NAT rule classification and command printing
//! - [`policy_print`] — access-policy printing into per-interface lists
//! - [`acl`] — ordered access-list line accumulation and rendering
//! - [`format`] — address/port/option text spellings shared by the printers
//! - [`context`] — per-run mutable state (interface cache, ACL-clear table,
//!   NAT command tables, warnings, output)
//! - [`resources`] — version-keyed command fragments with TOML overrides
//! - [`compiler`] — chain assembly and the top-level entry point
//! - [`verify`] — shadowed/conflicting rule detection for pre-deployment
//!   checks
//!
//! Version forks (6.3 for ACL-based NAT syntax, 7.0 for connection-option
//! spelling) run through [`policy_model::Version`] comparison; an
//! unparseable firewall version fails the run rather than guessing a
//! branch.

pub mod acl;
pub mod compiler;
pub mod context;
pub mod error;
pub mod format;
pub mod nat;
pub mod pipeline;
pub mod policy_print;
pub mod resources;
pub mod verify;

#[cfg(test)]
pub mod test_support;

pub use compiler::{CompileOutput, PixCompiler, Sections};
pub use context::{CompileContext, InterfaceInfo};
pub use error::{CompileError, CompileWarning};
pub use resources::Resources;
