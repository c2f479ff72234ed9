//! When to involve the upstream mutator.

use crate::domain::entities::RootChange;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardDecision {
    /// Answer from stored content only
    Skip,
    /// Send only the sub-documents the device is missing
    Differential,
    /// Send the whole stored document
    Full,
}

/// Decides whether and what to forward upstream. Only consulted when an
/// upstream mutator is configured.
pub trait ForwardingPolicy: Send + Sync {
    fn decide(&self, change: RootChange, has_differences: bool) -> ForwardDecision;
}

/// Metadata changes and unknown devices get a full round trip, version-only
/// changes a differential one, and an unchanged device goes upstream only when
/// it is missing content.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultForwardingPolicy;

impl ForwardingPolicy for DefaultForwardingPolicy {
    fn decide(&self, change: RootChange, has_differences: bool) -> ForwardDecision {
        match change {
            RootChange::MetaChanged | RootChange::Missing => ForwardDecision::Full,
            RootChange::VersionOnlyChanged => ForwardDecision::Differential,
            RootChange::Equals if has_differences => ForwardDecision::Differential,
            RootChange::Equals => ForwardDecision::Skip,
        }
    }
}
