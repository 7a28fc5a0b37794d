//! Sign hologram registry.
//!
//! Maps a sign's position to the entity references of its text lines. The
//! entities themselves live in the host's entity store; whoever drains a
//! position is responsible for destroying what it got back.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::storage::Storage;
use crate::types::{EntityRef, PositionKey};

/// Durable multimap from position to hologram entity references.
#[derive(Debug, Clone)]
pub struct SignHologramRegistry {
    storage: Arc<Storage>,
}

impl SignHologramRegistry {
    /// Registry backed by `storage`.
    #[must_use]
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Add `entity` to the set at `position`. Re-registering is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub fn register(&self, position: &PositionKey, entity: EntityRef) -> Result<()> {
        let inserted = self.storage.insert_hologram(position, entity)?;
        debug!(%position, %entity, inserted, "Registered hologram line");
        Ok(())
    }

    /// Atomically return and clear every reference at `position`.
    ///
    /// Returns an empty list when nothing was registered.
    ///
    /// # Errors
    ///
    /// Returns a database error; nothing is cleared in that case.
    pub fn drain(&self, position: &PositionKey) -> Result<Vec<EntityRef>> {
        let refs = self.storage.take_holograms(position)?;
        if !refs.is_empty() {
            debug!(%position, count = refs.len(), "Drained hologram lines");
        }
        Ok(refs)
    }

    /// References at `position` without clearing them.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub fn entries(&self, position: &PositionKey) -> Result<Vec<EntityRef>> {
        self.storage.hologram_refs(position)
    }

    /// Total references stored across all positions.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub fn len(&self) -> Result<usize> {
        self.storage.hologram_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SignHologramRegistry {
        SignHologramRegistry::new(Arc::new(Storage::open_in_memory().expect("open")))
    }

    #[test]
    fn drain_on_empty_position_is_empty() {
        let reg = registry();
        assert!(reg.drain(&PositionKey::new("w", 0, 0, 0)).expect("drain").is_empty());
    }

    #[test]
    fn replace_then_drain_returns_only_new_refs_once() {
        let reg = registry();
        let p = PositionKey::new("w", 4, 65, -2);
        let (e1, e2, e3) = (EntityRef::new(), EntityRef::new(), EntityRef::new());

        reg.register(&p, e1).expect("register");
        reg.register(&p, e2).expect("register");

        let old = reg.drain(&p).expect("drain");
        assert_eq!(old, vec![e1, e2]);
        reg.register(&p, e3).expect("register");

        assert_eq!(reg.drain(&p).expect("drain"), vec![e3]);
        assert!(reg.drain(&p).expect("drain again").is_empty());
    }

    #[test]
    fn positions_are_independent() {
        let reg = registry();
        let a = PositionKey::new("w", 0, 0, 0);
        let b = PositionKey::new("other", 0, 0, 0);
        reg.register(&a, EntityRef::new()).expect("register");
        reg.register(&b, EntityRef::new()).expect("register");

        assert_eq!(reg.drain(&a).expect("drain").len(), 1);
        assert_eq!(reg.entries(&b).expect("entries").len(), 1);
        assert_eq!(reg.len().expect("len"), 1);
    }
}
