//! Sign holograms: floating text lines anchored to a block.
//!
//! - [`layout`]: turn raw form fields into display lines and stack offsets.
//! - [`coordinator`]: replace and clean up the host entities behind a label.
//!
//! The host owns the entities; this module talks to them only through
//! [`EntityStore`], and only from the world's executor queue.

pub mod coordinator;
pub mod layout;

pub use coordinator::{HologramCoordinator, LabelCommit, Viewer};

use crate::error::Result;
use crate::types::EntityRef;

/// Everything the host needs to spawn one hologram line.
#[derive(Debug, Clone, PartialEq)]
pub struct HologramSpawn {
    /// World to spawn in.
    pub world: String,
    /// World-space X.
    pub x: f64,
    /// World-space Y.
    pub y: f64,
    /// World-space Z.
    pub z: f64,
    /// Facing in radians around the vertical axis (0 = +Z).
    pub yaw: f32,
    /// Line text, already normalized.
    pub text: String,
}

/// The host's live entity store for one world.
///
/// Only ever called from that world's executor queue.
pub trait EntityStore {
    /// Spawn a text entity and return its reference.
    ///
    /// # Errors
    /// Returns [`NeoLocksError::SpawnFailed`](crate::NeoLocksError::SpawnFailed)
    /// (or any host error) if the entity could not be created.
    fn spawn_text(&mut self, spawn: &HologramSpawn) -> Result<EntityRef>;

    /// Remove an entity.
    ///
    /// # Errors
    /// Returns [`NeoLocksError::StaleEntity`](crate::NeoLocksError::StaleEntity)
    /// if the entity no longer exists.
    fn remove(&mut self, entity: EntityRef) -> Result<()>;
}
