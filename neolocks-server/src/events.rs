//! Host events the plugin listens to.
//!
//! The host adapter builds one of these per gameplay event, hands it to the
//! matching [`NeoLocks`](crate::NeoLocks) handler, then checks
//! [`is_cancelled`](CancelFlag::is_cancelled) before letting the event
//! continue through its own pipeline.

use std::sync::atomic::{AtomicBool, Ordering};

use neolocks_core::hologram::Viewer;
use neolocks_core::types::{Identity, PositionKey};

/// One-shot cancellation flag carried by cancellable events.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    /// Cancel. Returns `true` only for the call that actually flipped it.
    pub fn cancel(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }

    /// Whether the event has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// How a player interacted with a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    /// Opening / using the block.
    Use,
    /// Primary action (hit).
    Primary,
    /// Secondary action other than use.
    Secondary,
    /// Anything else the host reports.
    Other,
}

/// A player interacting with a block.
#[derive(Debug)]
pub struct InteractionEvent {
    /// Block interacted with.
    pub target: PositionKey,
    /// Player interacting.
    pub requester: Identity,
    /// Host block id at `target`.
    pub block_id: String,
    /// Kind of interaction.
    pub kind: InteractionKind,
    cancel: CancelFlag,
}

impl InteractionEvent {
    /// New, not yet cancelled event.
    #[must_use]
    pub fn new(
        target: PositionKey,
        requester: Identity,
        block_id: impl Into<String>,
        kind: InteractionKind,
    ) -> Self {
        Self {
            target,
            requester,
            block_id: block_id.into(),
            kind,
            cancel: CancelFlag::default(),
        }
    }

    /// Stop the interaction from happening.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    /// Whether a handler cancelled the interaction.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A player placing an item as a block.
#[derive(Debug)]
pub struct PlacementEvent {
    /// Block the item was placed against.
    pub target: PositionKey,
    /// Where the new block would appear.
    pub placed_at: PositionKey,
    /// Key of the item being placed.
    pub item_key: String,
    /// Player placing it.
    pub placer: Identity,
    /// Placer's horizontal position, when the host knows it.
    pub placer_position: Option<Viewer>,
    cancel: CancelFlag,
}

impl PlacementEvent {
    /// New, not yet cancelled event.
    #[must_use]
    pub fn new(
        target: PositionKey,
        placed_at: PositionKey,
        item_key: impl Into<String>,
        placer: Identity,
    ) -> Self {
        Self {
            target,
            placed_at,
            item_key: item_key.into(),
            placer,
            placer_position: None,
            cancel: CancelFlag::default(),
        }
    }

    /// Attach the placer's position.
    #[must_use]
    pub fn with_placer_position(mut self, x: f64, z: f64) -> Self {
        self.placer_position = Some(Viewer { x, z });
        self
    }

    /// Stop the block from being placed.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    /// Whether a handler cancelled the placement.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// A block being removed from the world.
#[derive(Debug, Clone)]
pub struct BreakEvent {
    /// Position of the removed block.
    pub target: PositionKey,
    /// Player who broke it, if any.
    pub breaker: Option<Identity>,
    /// Host block id that was removed.
    pub block_id: String,
}

impl BreakEvent {
    /// Removal of `block_id` at `target`.
    #[must_use]
    pub fn new(target: PositionKey, block_id: impl Into<String>) -> Self {
        Self {
            target,
            breaker: None,
            block_id: block_id.into(),
        }
    }

    /// Attach the player responsible.
    #[must_use]
    pub fn by(mut self, breaker: Identity) -> Self {
        self.breaker = Some(breaker);
        self
    }
}
