//! Event handlers wiring host events into the core.
//!
//! Handlers never fail outward: storage errors are logged by the core and
//! reported to the player in chat, and the host's pipeline carries on.

use tracing::debug;

use neolocks_core::guard::{AccessDecision, AllowReason};
use neolocks_core::WorkflowStart;

use crate::events::{BreakEvent, InteractionEvent, InteractionKind, PlacementEvent};
use crate::host::Host;
use crate::pages::{Message, Page};
use crate::runtime::{NeoLocks, Pending};

/// What [`NeoLocks::on_placement`] did with a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementOutcome {
    /// Not ours; the placement proceeds.
    Ignored,
    /// Trigger against a chest without the create-lock capability.
    Forbidden,
    /// The owner removed their lock.
    Unlocked,
    /// The chest belongs to someone else.
    Denied,
    /// The lock confirmation page was opened.
    LockPrompted,
    /// Storage failed while unlocking.
    Failed,
    /// The sign label form was opened; the placement proceeds.
    LabelPrompted,
}

impl NeoLocks {
    /// Guard a block interaction. Cancels it when the chest is locked by
    /// someone else and shows them who owns it.
    pub fn on_interaction(&self, host: &Host<'_>, event: &InteractionEvent) -> AccessDecision {
        let untouched = AccessDecision::Allow(AllowReason::Untracked);
        if !self.config.general.enabled {
            return untouched;
        }
        if self.config.locks.guard_use_only && event.kind != InteractionKind::Use {
            return untouched;
        }
        if !self.config.locks.chest_blocks.matches(&event.block_id) {
            return untouched;
        }

        let player = event.requester.id;
        let decision = self
            .guard
            .check(host.world, host.permissions, &event.target, player);

        if let AccessDecision::Deny { record, .. } = &decision {
            event.cancel();
            let owner_name = Some(record.owner_name.clone()).filter(|name| !name.is_empty());
            let page = Page::LockedChest {
                owner_name,
                position: event.target.clone(),
            };
            self.replace_pending(player, Pending::Notice);
            host.players.open_page(player, &page);
        }
        decision
    }

    /// Handle a block placement: a trigger item against a chest runs the
    /// lock workflow, a sign opens the label form.
    pub fn on_placement(&self, host: &Host<'_>, event: &PlacementEvent) -> PlacementOutcome {
        if !self.config.general.enabled {
            return PlacementOutcome::Ignored;
        }
        let player = event.placer.id;

        if self.config.locks.trigger_items.matches(&event.item_key) {
            let start = self
                .workflow
                .begin(host.world, host.permissions, &event.target, &event.placer);
            if start.cancels_trigger() {
                event.cancel();
            }

            let outcome = match start {
                WorkflowStart::NotApplicable => None,
                WorkflowStart::Forbidden => {
                    host.players.send_message(player, &Message::no_permission());
                    Some(PlacementOutcome::Forbidden)
                }
                WorkflowStart::Unlocked { .. } => {
                    host.players.send_message(player, &Message::unlocked());
                    Some(PlacementOutcome::Unlocked)
                }
                WorkflowStart::Denied { .. } => {
                    host.players.send_message(player, &Message::locked_by_other());
                    Some(PlacementOutcome::Denied)
                }
                WorkflowStart::Failed(_) => {
                    host.players.send_message(player, &Message::storage_failed());
                    Some(PlacementOutcome::Failed)
                }
                WorkflowStart::Propose(prompt) => {
                    let page = Page::LockConfirm {
                        position: prompt.anchor().clone(),
                        blocks: prompt.aggregate().len(),
                    };
                    self.replace_pending(player, Pending::Lock(prompt));
                    host.players.open_page(player, &page);
                    Some(PlacementOutcome::LockPrompted)
                }
            };
            if let Some(outcome) = outcome {
                return outcome;
            }
        }

        if self.config.holograms.sign_blocks.matches(&event.item_key) {
            let page = Page::SignText {
                position: event.placed_at.clone(),
                lines: self.config.holograms.max_lines,
                max_line_length: self.config.holograms.max_line_length,
            };
            self.replace_pending(
                player,
                Pending::Label {
                    anchor: event.placed_at.clone(),
                    viewer: event.placer_position,
                },
            );
            host.players.open_page(player, &page);
            debug!(%player, anchor = %event.placed_at, "Opened sign label form");
            return PlacementOutcome::LabelPrompted;
        }

        PlacementOutcome::Ignored
    }

    /// Clean up after a removed block. Returns whether hologram cleanup was
    /// scheduled.
    ///
    /// Runs even when the plugin is disabled, so labels created earlier are
    /// never stranded. Locks are not touched: breaking one half of a locked
    /// double chest leaves both records in place.
    pub fn on_break(&self, event: &BreakEvent) -> bool {
        let forms = self.forget_label_forms(&event.target);
        if forms > 0 {
            debug!(position = %event.target, forms, "Dropped label forms for removed block");
        }

        let scheduled = self.coordinator.on_structure_removed(&event.target);
        if scheduled {
            debug!(
                position = %event.target,
                block = %event.block_id,
                breaker = ?event.breaker.as_ref().map(|b| b.id),
                "Block with label removed"
            );
        }
        scheduled
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
