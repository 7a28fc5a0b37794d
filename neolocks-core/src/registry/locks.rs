//! Chest lock registry.
//!
//! Reads are served from an in-memory index guarded by a `RwLock`. Writers
//! hold the exclusive guard across the SQLite transaction and the index
//! update, so a reader sees either none or all of an aggregate mutation.
//! If the transaction fails the index is not touched.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::Result;
use crate::storage::Storage;
use crate::types::{Aggregate, LockRecord, PlayerId, PositionKey};

/// Result of [`ChestLockRegistry::claim_aggregate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The aggregate is now locked by the claimant.
    Locked,
    /// Another owner already holds part of the aggregate; nothing changed.
    HeldByOther(LockRecord),
}

/// Durable map from block position to lock ownership.
#[derive(Debug)]
pub struct ChestLockRegistry {
    storage: Arc<Storage>,
    index: RwLock<HashMap<PositionKey, LockRecord>>,
}

impl ChestLockRegistry {
    /// Build the registry, loading every stored lock into the index.
    ///
    /// # Errors
    ///
    /// Returns a database error if the initial load fails.
    pub fn open(storage: Arc<Storage>) -> Result<Self> {
        let index: HashMap<_, _> = storage
            .load_locks()?
            .into_iter()
            .map(|record| (record.position.clone(), record))
            .collect();

        info!(locks = index.len(), "Chest lock registry loaded");
        Ok(Self {
            storage,
            index: RwLock::new(index),
        })
    }

    /// Lock every position of `positions` for one owner, overwriting any
    /// existing records. All-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns a database error; the registry is unchanged in that case.
    pub fn lock_aggregate(
        &self,
        owner_id: PlayerId,
        owner_name: &str,
        positions: &Aggregate,
    ) -> Result<()> {
        let mut index = self.index.write();
        self.write_locks(&mut index, owner_id, owner_name, positions)
    }

    /// Lock `positions` unless a different owner holds any of them.
    ///
    /// Positions already held by `owner_id` are simply refreshed.
    ///
    /// # Errors
    ///
    /// Returns a database error; the registry is unchanged in that case.
    pub fn claim_aggregate(
        &self,
        owner_id: PlayerId,
        owner_name: &str,
        positions: &Aggregate,
    ) -> Result<ClaimOutcome> {
        let mut index = self.index.write();
        let conflict = positions
            .iter()
            .filter_map(|p| index.get(p))
            .find(|record| !record.is_owned_by(owner_id))
            .cloned();
        if let Some(existing) = conflict {
            debug!(
                position = %existing.position,
                owner = %existing.owner_id,
                claimant = %owner_id,
                "Claim rejected, aggregate held by another owner"
            );
            return Ok(ClaimOutcome::HeldByOther(existing));
        }
        self.write_locks(&mut index, owner_id, owner_name, positions)?;
        Ok(ClaimOutcome::Locked)
    }

    /// Remove the locks at every position of `positions`.
    ///
    /// Absent records are ignored, so this is idempotent. Returns the number
    /// of records removed.
    ///
    /// # Errors
    ///
    /// Returns a database error; the registry is unchanged in that case.
    pub fn unlock_aggregate(&self, positions: &Aggregate) -> Result<usize> {
        let mut index = self.index.write();
        let removed = self.storage.delete_locks(positions)?;
        for p in positions {
            index.remove(p);
        }
        info!(positions = positions.len(), removed, "Chest unlocked");
        Ok(removed)
    }

    /// Whether `position` is locked.
    #[must_use]
    pub fn is_locked(&self, position: &PositionKey) -> bool {
        self.index.read().contains_key(position)
    }

    /// Lock record at `position`, if any.
    #[must_use]
    pub fn get_lock(&self, position: &PositionKey) -> Option<LockRecord> {
        self.index.read().get(position).cloned()
    }

    /// First lock record found among `positions`, read under one guard.
    ///
    /// Aggregates are locked as a unit, so any match carries the owner of
    /// the whole structure.
    #[must_use]
    pub fn find_lock(&self, positions: &Aggregate) -> Option<LockRecord> {
        let index = self.index.read();
        positions.iter().find_map(|p| index.get(p)).cloned()
    }

    /// Every record owned by `owner`.
    #[must_use]
    pub fn locks_owned_by(&self, owner: PlayerId) -> Vec<LockRecord> {
        let mut owned: Vec<_> = self
            .index
            .read()
            .values()
            .filter(|record| record.is_owned_by(owner))
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.position.cmp(&b.position));
        owned
    }

    /// Number of locked positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    /// Whether nothing is locked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    fn write_locks(
        &self,
        index: &mut HashMap<PositionKey, LockRecord>,
        owner_id: PlayerId,
        owner_name: &str,
        positions: &Aggregate,
    ) -> Result<()> {
        let records: Vec<LockRecord> = positions
            .iter()
            .map(|p| LockRecord::new(owner_id, owner_name, p.clone()))
            .collect();
        self.storage.put_locks(&records)?;
        for record in records {
            index.insert(record.position.clone(), record);
        }
        info!(
            owner = %owner_id,
            owner_name,
            positions = positions.len(),
            "Chest locked"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ChestLockRegistry {
        let storage = Arc::new(Storage::open_in_memory().expect("open"));
        ChestLockRegistry::open(storage).expect("registry")
    }

    fn double() -> Aggregate {
        Aggregate::pair(PositionKey::new("w", 1, 2, 3), PositionKey::new("w", 2, 2, 3))
    }

    #[test]
    fn never_locked_positions_read_false() {
        let reg = registry();
        let p = PositionKey::new("w", 0, 0, 0);
        assert!(!reg.is_locked(&p));
        assert!(reg.get_lock(&p).is_none());
        assert!(reg.find_lock(&Aggregate::single(p)).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn aggregate_locks_both_halves_with_same_owner() {
        let reg = registry();
        let owner = PlayerId::new();
        let agg = double();
        reg.lock_aggregate(owner, "Alice", &agg).expect("lock");

        let records: Vec<_> = agg.iter().map(|p| reg.get_lock(p).expect("locked")).collect();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.owner_id == owner && r.owner_name == "Alice"));
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn relock_after_unlock_leaves_no_residue() {
        let reg = registry();
        let agg = double();
        let (first, second) = (PlayerId::new(), PlayerId::new());

        reg.lock_aggregate(first, "Alice", &agg).expect("lock");
        reg.unlock_aggregate(&agg).expect("unlock");
        reg.lock_aggregate(second, "Bob", &agg).expect("relock");

        for p in &agg {
            let record = reg.get_lock(p).expect("locked");
            assert_eq!(record.owner_id, second);
            assert_eq!(record.owner_name, "Bob");
        }
        assert!(reg.locks_owned_by(first).is_empty());
    }

    #[test]
    fn unlock_is_idempotent_and_tolerates_partial_state() {
        let reg = registry();
        let agg = double();
        assert_eq!(reg.unlock_aggregate(&agg).expect("noop"), 0);

        let half = Aggregate::single(PositionKey::new("w", 1, 2, 3));
        reg.lock_aggregate(PlayerId::new(), "Alice", &half).expect("lock half");
        assert_eq!(reg.unlock_aggregate(&agg).expect("unlock"), 1);
        assert!(agg.iter().all(|p| !reg.is_locked(p)));
    }

    #[test]
    fn claim_refuses_foreign_owner() {
        let reg = registry();
        let agg = double();
        let (alice, bob) = (PlayerId::new(), PlayerId::new());
        reg.lock_aggregate(alice, "Alice", &agg).expect("lock");

        match reg.claim_aggregate(bob, "Bob", &agg).expect("claim") {
            ClaimOutcome::HeldByOther(record) => assert_eq!(record.owner_id, alice),
            ClaimOutcome::Locked => panic!("claim should have been refused"),
        }
        assert!(agg.iter().all(|p| reg.get_lock(p).expect("locked").owner_id == alice));

        assert_eq!(
            reg.claim_aggregate(alice, "Alice", &agg).expect("reclaim"),
            ClaimOutcome::Locked
        );
    }

    #[test]
    fn locks_survive_reopen() {
        let storage = Arc::new(Storage::open_in_memory().expect("open"));
        let owner = PlayerId::new();
        {
            let reg = ChestLockRegistry::open(Arc::clone(&storage)).expect("registry");
            reg.lock_aggregate(owner, "Alice", &double()).expect("lock");
        }
        let reopened = ChestLockRegistry::open(storage).expect("reopen");
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.locks_owned_by(owner).len(), 2);
    }

    #[test]
    fn concurrent_readers_never_see_half_an_aggregate() {
        let reg = Arc::new(registry());
        let agg = double();
        let owner = PlayerId::new();

        let reader = {
            let reg = Arc::clone(&reg);
            let agg = agg.clone();
            std::thread::spawn(move || {
                for _ in 0..2_000 {
                    let index = reg.index.read();
                    let locked = agg.iter().filter(|p| index.contains_key(*p)).count();
                    assert!(locked == 0 || locked == agg.len(), "saw {locked} of {}", agg.len());
                }
            })
        };

        for _ in 0..200 {
            reg.lock_aggregate(owner, "Alice", &agg).expect("lock");
            reg.unlock_aggregate(&agg).expect("unlock");
        }
        reader.join().expect("reader thread");
    }
}
