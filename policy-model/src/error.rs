use thiserror::Error;

use crate::rule::ObjectId;

/// Errors raised by the object model and the intersection algorithms.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Two objects of structurally incomparable kinds were intersected
    /// (e.g. an address against a service). This is a programming-contract
    /// violation in the caller, not a normal-path condition.
    #[error("cannot intersect {left} with {right}")]
    IncompatibleObjects { left: &'static str, right: &'static str },
    /// A run-time multi-address object has no concrete address set to
    /// compare against.
    #[error("multi-address object cannot be resolved at compile time")]
    UnresolvedMultiAddress,
    /// A netmask did not describe a contiguous prefix.
    #[error("invalid netmask: {0}")]
    InvalidNetmask(#[from] ipnetwork::IpNetworkError),
    /// Address objects of different families were combined.
    #[error("mixed IPv4/IPv6 address objects in one comparison")]
    MixedAddressFamily,
    /// A rule element referenced an object id missing from the snapshot.
    #[error("unknown object id {0}")]
    UnknownObject(ObjectId),
    /// Two snapshot objects share one id.
    #[error("duplicate object id {0}")]
    DuplicateObject(ObjectId),
    /// A group (transitively) contains itself.
    #[error("group {0} references itself")]
    RecursiveGroup(ObjectId),
}
