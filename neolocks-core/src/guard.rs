//! Access guard for chest interactions.
//!
//! Runs inline on the host's interaction path, before the host commits the
//! interaction, and only reads the in-memory lock index.

use std::sync::Arc;

use tracing::{debug, info};

use crate::aggregate::{AggregateResolver, WorldView};
use crate::registry::ChestLockRegistry;
use crate::types::{Aggregate, Capability, LockRecord, PlayerId, PositionKey};

/// The host's permission lookup.
pub trait Permissions {
    /// Whether `player` holds `capability`.
    fn has_capability(&self, player: PlayerId, capability: Capability) -> bool;
}

/// Why an interaction was allowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowReason {
    /// Target is not a tracked structure.
    Untracked,
    /// Structure is not locked.
    Unlocked,
    /// Requester owns the lock.
    Owner,
    /// Requester is not the owner but holds the bypass capability.
    Bypass(LockRecord),
}

/// Outcome of [`AccessGuard::check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Let the interaction proceed.
    Allow(AllowReason),
    /// Cancel the interaction; `record` names the current owner.
    Deny {
        /// Lock held by someone else.
        record: LockRecord,
        /// The structure the requester tried to use.
        aggregate: Aggregate,
    },
}

impl AccessDecision {
    /// Whether the interaction may proceed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }
}

/// Synchronous ownership check for chest interactions.
#[derive(Debug, Clone)]
pub struct AccessGuard {
    resolver: Arc<AggregateResolver>,
    locks: Arc<ChestLockRegistry>,
}

impl AccessGuard {
    /// Guard reading from `locks`.
    #[must_use]
    pub fn new(resolver: Arc<AggregateResolver>, locks: Arc<ChestLockRegistry>) -> Self {
        Self { resolver, locks }
    }

    /// Decide whether `requester` may use the structure at `target`.
    #[must_use]
    pub fn check(
        &self,
        world: &dyn WorldView,
        permissions: &dyn Permissions,
        target: &PositionKey,
        requester: PlayerId,
    ) -> AccessDecision {
        let aggregate = self.resolver.resolve(world, target);
        if aggregate.is_empty() {
            return AccessDecision::Allow(AllowReason::Untracked);
        }

        let Some(record) = self.locks.find_lock(&aggregate) else {
            return AccessDecision::Allow(AllowReason::Unlocked);
        };

        if record.is_owned_by(requester) {
            debug!(%target, %requester, "Owner opened locked chest");
            return AccessDecision::Allow(AllowReason::Owner);
        }

        if permissions.has_capability(requester, Capability::BypassLock) {
            info!(
                %target,
                %requester,
                owner = %record.owner_id,
                owner_name = %record.owner_name,
                "Lock bypassed"
            );
            return AccessDecision::Allow(AllowReason::Bypass(record));
        }

        debug!(%target, %requester, owner = %record.owner_id, "Access denied");
        AccessDecision::Deny { record, aggregate }
    }
}
