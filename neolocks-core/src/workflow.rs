//! Lock / unlock workflow.
//!
//! ```text
//! Idle ─► CheckExisting ─┬─► Unlocking            (owner placed trigger)
//!                        ├─► Denied               (someone else owns it)
//!                        └─► ProposeLock ─┬─► Commit     (confirm)
//!                                         └─► Cancelled  (cancel / dismiss)
//! ```
//!
//! [`LockWorkflow::begin`] runs on the placement decision path and covers
//! everything up to opening the prompt. The prompt is a [`LockPrompt`]
//! value the host keeps until the player answers, then hands back to
//! [`LockWorkflow::complete`]. Owner identity is captured when the prompt
//! opens and stored as-is on commit, even if the player renamed meanwhile.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::aggregate::{AggregateResolver, WorldView};
use crate::error::NeoLocksError;
use crate::guard::Permissions;
use crate::registry::{ChestLockRegistry, ClaimOutcome};
use crate::types::{Aggregate, Capability, Identity, LockRecord, PositionKey};

/// A pending "lock this chest?" confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockPrompt {
    requester: Identity,
    aggregate: Aggregate,
    anchor: PositionKey,
    opened_at: DateTime<Utc>,
}

impl LockPrompt {
    /// Identity captured when the prompt opened.
    #[must_use]
    pub fn requester(&self) -> &Identity {
        &self.requester
    }

    /// Positions that will be locked on confirm.
    #[must_use]
    pub fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    /// The block the trigger was placed against.
    #[must_use]
    pub fn anchor(&self) -> &PositionKey {
        &self.anchor
    }

    /// When the prompt opened.
    #[must_use]
    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }
}

/// The player's single answer to a [`LockPrompt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    /// Confirm button.
    Confirm,
    /// Cancel button.
    Cancel,
    /// Page closed without an answer (or superseded).
    Dismiss,
}

/// Result of [`LockWorkflow::begin`].
#[derive(Debug)]
pub enum WorkflowStart {
    /// Target is not a tracked structure; the placement proceeds untouched.
    NotApplicable,
    /// Requester lacks the create-lock capability.
    Forbidden,
    /// Requester owned the lock and it has been removed.
    Unlocked {
        /// Positions unlocked.
        aggregate: Aggregate,
    },
    /// Someone else owns the structure.
    Denied {
        /// Current lock.
        record: LockRecord,
    },
    /// Nothing is locked; ask the requester to confirm.
    Propose(LockPrompt),
    /// Storage failed while unlocking.
    Failed(NeoLocksError),
}

impl WorkflowStart {
    /// Whether the triggering placement must be cancelled.
    ///
    /// Once the workflow engages, the trigger item is never actually placed.
    #[must_use]
    pub fn cancels_trigger(&self) -> bool {
        !matches!(self, Self::NotApplicable)
    }
}

/// Result of [`LockWorkflow::complete`].
#[derive(Debug)]
pub enum WorkflowEnd {
    /// The structure is now locked by the prompt's requester.
    Committed {
        /// Positions locked.
        aggregate: Aggregate,
    },
    /// Cancelled or dismissed; nothing changed.
    Cancelled,
    /// Another owner locked the structure while the prompt was open.
    Denied {
        /// The lock that won.
        record: LockRecord,
    },
    /// Storage failed while locking; nothing changed.
    Failed(NeoLocksError),
}

/// Drives lock creation and removal.
#[derive(Debug, Clone)]
pub struct LockWorkflow {
    resolver: Arc<AggregateResolver>,
    locks: Arc<ChestLockRegistry>,
}

impl LockWorkflow {
    /// Workflow writing to `locks`.
    #[must_use]
    pub fn new(resolver: Arc<AggregateResolver>, locks: Arc<ChestLockRegistry>) -> Self {
        Self { resolver, locks }
    }

    /// Handle a trigger placed against `target` by `requester`.
    pub fn begin(
        &self,
        world: &dyn WorldView,
        permissions: &dyn Permissions,
        target: &PositionKey,
        requester: &Identity,
    ) -> WorkflowStart {
        let aggregate = self.resolver.resolve(world, target);
        if aggregate.is_empty() {
            return WorkflowStart::NotApplicable;
        }

        if !permissions.has_capability(requester.id, Capability::CreateLock) {
            debug!(%target, requester = %requester.id, "Lock attempt without permission");
            return WorkflowStart::Forbidden;
        }

        if let Some(record) = self.locks.find_lock(&aggregate) {
            if !record.is_owned_by(requester.id) {
                debug!(%target, requester = %requester.id, owner = %record.owner_id, "Lock attempt on foreign chest");
                return WorkflowStart::Denied { record };
            }
            return match self.locks.unlock_aggregate(&aggregate) {
                Ok(_) => WorkflowStart::Unlocked { aggregate },
                Err(e) => {
                    error!(%target, error = %e, "Failed to unlock chest");
                    WorkflowStart::Failed(e)
                }
            };
        }

        debug!(%target, requester = %requester.id, blocks = aggregate.len(), "Proposing lock");
        WorkflowStart::Propose(LockPrompt {
            requester: requester.clone(),
            aggregate,
            anchor: target.clone(),
            opened_at: Utc::now(),
        })
    }

    /// Resolve `prompt` with the player's answer.
    pub fn complete(&self, prompt: LockPrompt, outcome: PromptOutcome) -> WorkflowEnd {
        match outcome {
            PromptOutcome::Cancel | PromptOutcome::Dismiss => {
                debug!(anchor = %prompt.anchor, ?outcome, "Lock prompt closed without locking");
                WorkflowEnd::Cancelled
            }
            PromptOutcome::Confirm => {
                let LockPrompt {
                    requester,
                    aggregate,
                    anchor,
                    ..
                } = prompt;
                match self
                    .locks
                    .claim_aggregate(requester.id, &requester.display_name, &aggregate)
                {
                    Ok(ClaimOutcome::Locked) => {
                        info!(%anchor, owner = %requester.id, owner_name = %requester.display_name, "Lock committed");
                        WorkflowEnd::Committed { aggregate }
                    }
                    Ok(ClaimOutcome::HeldByOther(record)) => WorkflowEnd::Denied { record },
                    Err(e) => {
                        error!(%anchor, error = %e, "Failed to commit lock");
                        WorkflowEnd::Failed(e)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlockMatcher;
    use crate::storage::Storage;
    use crate::types::PlayerId;
    use std::collections::HashMap;

    struct Grid(HashMap<PositionKey, String>);

    impl WorldView for Grid {
        fn block_id(&self, position: &PositionKey) -> Option<String> {
            self.0.get(position).cloned()
        }
    }

    struct AllowAll(bool);

    impl Permissions for AllowAll {
        fn has_capability(&self, _player: PlayerId, capability: Capability) -> bool {
            capability == Capability::CreateLock && self.0
        }
    }

    fn setup() -> (LockWorkflow, Arc<ChestLockRegistry>, Grid) {
        let storage = Arc::new(Storage::open_in_memory().expect("open"));
        let locks = Arc::new(ChestLockRegistry::open(storage).expect("registry"));
        let resolver = Arc::new(AggregateResolver::new(BlockMatcher::new(&["chest"], &[])));
        let grid = Grid(HashMap::from([(PositionKey::new("w", 1, 2, 3), "chest".to_string())]));
        (LockWorkflow::new(resolver, Arc::clone(&locks)), locks, grid)
    }

    fn chest() -> PositionKey {
        PositionKey::new("w", 1, 2, 3)
    }

    #[test]
    fn untracked_target_does_not_engage() {
        let (wf, _, grid) = setup();
        let start = wf.begin(&grid, &AllowAll(true), &PositionKey::new("w", 9, 9, 9), &Identity::new(PlayerId::new(), "U1"));
        assert!(matches!(start, WorkflowStart::NotApplicable));
        assert!(!start.cancels_trigger());
    }

    #[test]
    fn missing_permission_is_forbidden() {
        let (wf, locks, grid) = setup();
        let start = wf.begin(&grid, &AllowAll(false), &chest(), &Identity::new(PlayerId::new(), "U1"));
        assert!(matches!(start, WorkflowStart::Forbidden));
        assert!(start.cancels_trigger());
        assert!(locks.is_empty());
    }

    #[test]
    fn propose_confirm_commits_captured_identity() {
        let (wf, locks, grid) = setup();
        let u1 = Identity::new(PlayerId::new(), "U1");

        let WorkflowStart::Propose(prompt) = wf.begin(&grid, &AllowAll(true), &chest(), &u1) else {
            panic!("expected a prompt");
        };
        assert_eq!(prompt.requester(), &u1);
        assert!(!locks.is_locked(&chest()), "nothing locked before confirm");

        assert!(matches!(
            wf.complete(prompt, PromptOutcome::Confirm),
            WorkflowEnd::Committed { .. }
        ));
        let record = locks.get_lock(&chest()).expect("locked");
        assert_eq!(record.owner_id, u1.id);
        assert_eq!(record.owner_name, "U1");
    }

    #[test]
    fn cancel_and_dismiss_leave_no_lock() {
        let (wf, locks, grid) = setup();
        let u1 = Identity::new(PlayerId::new(), "U1");
        for outcome in [PromptOutcome::Cancel, PromptOutcome::Dismiss] {
            let WorkflowStart::Propose(prompt) = wf.begin(&grid, &AllowAll(true), &chest(), &u1) else {
                panic!("expected a prompt");
            };
            assert!(matches!(wf.complete(prompt, outcome), WorkflowEnd::Cancelled));
        }
        assert!(locks.is_empty());
    }

    #[test]
    fn owner_trigger_unlocks_other_trigger_denied() {
        let (wf, locks, grid) = setup();
        let (u1, u2) = (Identity::new(PlayerId::new(), "U1"), Identity::new(PlayerId::new(), "U2"));
        locks
            .lock_aggregate(u1.id, &u1.display_name, &Aggregate::single(chest()))
            .expect("lock");

        match wf.begin(&grid, &AllowAll(true), &chest(), &u2) {
            WorkflowStart::Denied { record } => assert_eq!(record.owner_name, "U1"),
            other => panic!("expected denial, got {other:?}"),
        }
        assert!(locks.is_locked(&chest()));

        assert!(matches!(
            wf.begin(&grid, &AllowAll(true), &chest(), &u1),
            WorkflowStart::Unlocked { .. }
        ));
        assert!(!locks.is_locked(&chest()));
    }

    #[test]
    fn stale_display_name_is_stored() {
        let (wf, locks, grid) = setup();
        let id = PlayerId::new();
        let WorkflowStart::Propose(prompt) =
            wf.begin(&grid, &AllowAll(true), &chest(), &Identity::new(id, "OldName"))
        else {
            panic!("expected a prompt");
        };
        // the player renames before confirming; the prompt keeps the old name
        let _renamed = Identity::new(id, "NewName");
        wf.complete(prompt, PromptOutcome::Confirm);
        assert_eq!(locks.get_lock(&chest()).expect("locked").owner_name, "OldName");
    }

    #[test]
    fn racing_prompts_first_confirm_wins() {
        let (wf, locks, grid) = setup();
        let (u1, u2) = (Identity::new(PlayerId::new(), "U1"), Identity::new(PlayerId::new(), "U2"));
        let WorkflowStart::Propose(p1) = wf.begin(&grid, &AllowAll(true), &chest(), &u1) else {
            panic!("expected a prompt");
        };
        let WorkflowStart::Propose(p2) = wf.begin(&grid, &AllowAll(true), &chest(), &u2) else {
            panic!("expected a prompt");
        };

        assert!(matches!(wf.complete(p1, PromptOutcome::Confirm), WorkflowEnd::Committed { .. }));
        match wf.complete(p2, PromptOutcome::Confirm) {
            WorkflowEnd::Denied { record } => assert_eq!(record.owner_id, u1.id),
            other => panic!("expected denial, got {other:?}"),
        }
        assert_eq!(locks.get_lock(&chest()).expect("locked").owner_id, u1.id);
    }
}
