//! The immutable object snapshot a compiler run reads from.
//!
//! A snapshot is what the policy editor hands to a compiler: every object
//! already resolved to concrete data, one firewall, and the ordered policy
//! and NAT rulesets. The snapshot is built once, indexed once, and read-only
//! afterwards; concurrent compiler instances share it behind an `Arc`.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::ModelError;
use crate::interval::Interval;
use crate::options::Options;
use crate::rule::{NatRule, ObjectId, PolicyRule};
use crate::service::Service;

/// A named group of object references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub members: Vec<ObjectId>,
}

/// Any object a rule element can reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", content = "spec", rename_all = "lowercase")]
pub enum PolicyObject {
    Address(Address),
    Service(Service),
    Interval(Interval),
    Group(Group),
}

impl PolicyObject {
    pub fn kind_name(&self) -> &'static str {
        match self {
            PolicyObject::Address(a) => a.kind_name(),
            PolicyObject::Service(s) => s.kind_name(),
            PolicyObject::Interval(_) => "interval",
            PolicyObject::Group(_) => "group",
        }
    }
}

/// An object definition: identity plus payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDef {
    pub id: ObjectId,
    pub name: String,
    pub object: PolicyObject,
}

/// The firewall a snapshot compiles for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirewallDef {
    pub id: ObjectId,
    pub name: String,
    pub platform: String,
    pub version: String,
    #[serde(default)]
    pub options: Options,
    /// Interface object ids in the order the device lists them.
    #[serde(default)]
    pub interfaces: Vec<ObjectId>,
}

/// One firewall's compilation input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectSnapshot {
    pub firewall: FirewallDef,
    pub objects: Vec<ObjectDef>,
    #[serde(default)]
    pub policy: Vec<PolicyRule>,
    #[serde(default)]
    pub nat: Vec<NatRule>,
    #[serde(skip)]
    index: BTreeMap<ObjectId, usize>,
}

impl ObjectSnapshot {
    /// Build a snapshot, indexing objects by id and rejecting duplicates
    /// and interface references that do not name interface objects.
    pub fn new(
        firewall: FirewallDef,
        objects: Vec<ObjectDef>,
        policy: Vec<PolicyRule>,
        nat: Vec<NatRule>,
    ) -> Result<Self, ModelError> {
        let mut snapshot = ObjectSnapshot {
            firewall,
            objects,
            policy,
            nat,
            index: BTreeMap::new(),
        };
        snapshot.build_index()?;
        Ok(snapshot)
    }

    /// Deserialize a snapshot from JSON and index it.
    pub fn from_json(json: &str) -> Result<Self, SnapshotLoadError> {
        let mut snapshot: ObjectSnapshot = serde_json::from_str(json)?;
        snapshot.build_index()?;
        Ok(snapshot)
    }

    fn build_index(&mut self) -> Result<(), ModelError> {
        let mut index = BTreeMap::new();
        for (pos, def) in self.objects.iter().enumerate() {
            if index.insert(def.id, pos).is_some() {
                return Err(ModelError::DuplicateObject(def.id));
            }
        }
        self.index = index;
        for id in &self.firewall.interfaces {
            match self.index.get(id).map(|pos| &self.objects[*pos].object) {
                Some(PolicyObject::Address(Address::Interface { .. })) => {}
                Some(_) | None => return Err(ModelError::UnknownObject(*id)),
            }
        }
        Ok(())
    }

    /// Look up an object by id.
    pub fn object(&self, id: ObjectId) -> Option<&ObjectDef> {
        self.index.get(&id).map(|pos| &self.objects[*pos])
    }

    /// Look up an object, failing with `UnknownObject` when absent.
    pub fn require(&self, id: ObjectId) -> Result<&ObjectDef, ModelError> {
        self.object(id).ok_or(ModelError::UnknownObject(id))
    }

    /// Expand an ordered list of references into leaf objects, flattening
    /// groups depth-first. A group that (transitively) contains itself
    /// fails with `RecursiveGroup`.
    pub fn resolve_refs(&self, refs: &[ObjectId]) -> Result<Vec<&ObjectDef>, ModelError> {
        let mut out = Vec::new();
        let mut trail = BTreeSet::new();
        for id in refs {
            self.resolve_one(*id, &mut trail, &mut out)?;
        }
        Ok(out)
    }

    fn resolve_one<'a>(
        &'a self,
        id: ObjectId,
        trail: &mut BTreeSet<ObjectId>,
        out: &mut Vec<&'a ObjectDef>,
    ) -> Result<(), ModelError> {
        let def = self.require(id)?;
        match &def.object {
            PolicyObject::Group(group) => {
                if !trail.insert(id) {
                    return Err(ModelError::RecursiveGroup(id));
                }
                for member in &group.members {
                    self.resolve_one(*member, trail, out)?;
                }
                trail.remove(&id);
            }
            _ => out.push(def),
        }
        Ok(())
    }

    /// Count the leaf objects a single reference expands to. Used by the
    /// empty-group check.
    pub fn leaf_count(&self, id: ObjectId) -> Result<usize, ModelError> {
        let mut trail = BTreeSet::new();
        let mut out = Vec::new();
        self.resolve_one(id, &mut trail, &mut out)?;
        Ok(out.len())
    }
}

/// Errors raised while loading a snapshot from JSON.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotLoadError {
    #[error("failed to parse snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Model(#[from] ModelError),
}
