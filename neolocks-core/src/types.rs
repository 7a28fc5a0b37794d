//! Core type definitions for NeoLocks.
//!
//! Everything here is a plain value: cheap to clone, serializable, and free of
//! references into host state.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier of a player (or any acting principal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Create a new random player ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to an auxiliary entity owned by the host (one hologram line).
///
/// Registries only hold these references; the host entity store owns the
/// entity itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef(pub Uuid);

impl EntityRef {
    /// Create a new random entity reference.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityRef {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The acting principal of an event: unique ID plus the display name the
/// host reported at that moment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Stable unique ID.
    pub id: PlayerId,
    /// Display name at resolution time.
    pub display_name: String,
}

impl Identity {
    /// Build an identity from its parts.
    #[must_use]
    pub fn new(id: PlayerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

/// Named capabilities checked through the host's permission lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Open chests locked by someone else.
    BypassLock,
    /// Start the lock workflow.
    CreateLock,
}

impl Capability {
    /// Capability name as exposed to the host.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::BypassLock => "bypass-lock",
            Self::CreateLock => "create-lock",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// A block position inside a named world. `y` is vertical.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    /// World name.
    pub world: String,
    /// X coordinate.
    pub x: i32,
    /// Y coordinate (up).
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl PositionKey {
    /// Create a position key.
    #[must_use]
    pub fn new(world: impl Into<String>, x: i32, y: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }

    /// The position shifted by the given deltas, in the same world.
    ///
    /// Coordinates saturate at the `i32` bounds; use
    /// [`checked_offset`](Self::checked_offset) when leaving the grid matters.
    #[must_use]
    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            world: self.world.clone(),
            x: self.x.saturating_add(dx),
            y: self.y.saturating_add(dy),
            z: self.z.saturating_add(dz),
        }
    }

    /// The shifted position, or `None` if any coordinate leaves `i32`.
    #[must_use]
    pub fn checked_offset(&self, dx: i32, dy: i32, dz: i32) -> Option<Self> {
        Some(Self {
            world: self.world.clone(),
            x: self.x.checked_add(dx)?,
            y: self.y.checked_add(dy)?,
            z: self.z.checked_add(dz)?,
        })
    }

    /// The horizontal neighbors in a fixed order: +x, -x, +z, -z.
    ///
    /// Neighbors outside the coordinate range are skipped, so a block on the
    /// edge of the grid has fewer than four.
    #[must_use]
    pub fn horizontal_neighbors(&self) -> Vec<Self> {
        [(1, 0), (-1, 0), (0, 1), (0, -1)]
            .into_iter()
            .filter_map(|(dx, dz)| self.checked_offset(dx, 0, dz))
            .collect()
    }

    /// Whether `other` shares a horizontal face with this position.
    #[must_use]
    pub fn is_horizontally_adjacent(&self, other: &Self) -> bool {
        let dx = (i64::from(self.x) - i64::from(other.x)).abs();
        let dz = (i64::from(self.z) - i64::from(other.z)).abs();
        self.world == other.world && self.y == other.y && dx + dz == 1
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}:{}", self.world, self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// The positions forming one logical structure (a single or double chest).
///
/// Empty means the origin was not a tracked structure. Treat it as a set:
/// iteration order carries no meaning for callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate(BTreeSet<PositionKey>);

impl Aggregate {
    /// The empty aggregate ("feature does not apply").
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A single-block structure.
    #[must_use]
    pub fn single(origin: PositionKey) -> Self {
        Self(BTreeSet::from([origin]))
    }

    /// A two-block structure.
    #[must_use]
    pub fn pair(origin: PositionKey, companion: PositionKey) -> Self {
        Self(BTreeSet::from([origin, companion]))
    }

    /// Whether the origin was not a tracked structure.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of blocks in the structure.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether this is a double structure.
    #[must_use]
    pub fn is_double(&self) -> bool {
        self.0.len() > 1
    }

    /// Whether `position` is part of the structure.
    #[must_use]
    pub fn contains(&self, position: &PositionKey) -> bool {
        self.0.contains(position)
    }

    /// Iterate the positions.
    pub fn iter(&self) -> impl Iterator<Item = &PositionKey> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a Aggregate {
    type Item = &'a PositionKey;
    type IntoIter = std::collections::btree_set::Iter<'a, PositionKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl FromIterator<PositionKey> for Aggregate {
    fn from_iter<I: IntoIterator<Item = PositionKey>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Lock Records
// ---------------------------------------------------------------------------

/// Ownership of one locked block.
///
/// The owner's display name is captured once at lock time and never
/// re-resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Owner's unique ID.
    pub owner_id: PlayerId,
    /// Owner's display name when the lock was created.
    pub owner_name: String,
    /// Locked block.
    pub position: PositionKey,
    /// When the lock was committed.
    pub locked_at: DateTime<Utc>,
}

impl LockRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(owner_id: PlayerId, owner_name: impl Into<String>, position: PositionKey) -> Self {
        Self {
            owner_id,
            owner_name: owner_name.into(),
            position,
            locked_at: Utc::now(),
        }
    }

    /// Whether `player` owns this lock.
    #[must_use]
    pub fn is_owned_by(&self, player: PlayerId) -> bool {
        self.owner_id == player
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_equality_is_by_value() {
        let a = PositionKey::new("overworld", 1, 2, 3);
        let b = PositionKey::new(String::from("overworld"), 1, 2, 3);
        assert_eq!(a, b);
        assert_ne!(a, PositionKey::new("nether", 1, 2, 3));
    }

    #[test]
    fn neighbors_stop_at_the_coordinate_edge() {
        let corner = PositionKey::new("w", i32::MAX, 0, i32::MIN);
        let neighbors = corner.horizontal_neighbors();
        assert_eq!(
            neighbors,
            vec![
                PositionKey::new("w", i32::MAX - 1, 0, i32::MIN),
                PositionKey::new("w", i32::MAX, 0, i32::MIN + 1),
            ]
        );
        assert!(corner.checked_offset(1, 0, 0).is_none());
        assert_eq!(corner.offset(1, 0, -1), corner);
    }

    #[test]
    fn adjacency_across_the_full_range_does_not_overflow() {
        let low = PositionKey::new("w", i32::MIN, 0, 0);
        let high = PositionKey::new("w", i32::MAX, 0, 0);
        assert!(!low.is_horizontally_adjacent(&high));
        assert!(!high.is_horizontally_adjacent(&low));
        assert!(high.is_horizontally_adjacent(&PositionKey::new("w", i32::MAX - 1, 0, 0)));
    }

    #[test]
    fn horizontal_neighbors_skip_vertical() {
        let origin = PositionKey::new("w", 0, 64, 0);
        for n in origin.horizontal_neighbors() {
            assert_eq!(n.y, 64);
            assert!(origin.is_horizontally_adjacent(&n));
        }
        assert!(!origin.is_horizontally_adjacent(&origin.offset(0, 1, 0)));
        assert!(!origin.is_horizontally_adjacent(&origin.offset(1, 0, 1)));
    }

    #[test]
    fn aggregate_is_a_set() {
        let a = PositionKey::new("w", 1, 2, 3);
        let b = PositionKey::new("w", 2, 2, 3);
        assert_eq!(Aggregate::pair(a.clone(), b.clone()), Aggregate::pair(b, a.clone()));
        assert_eq!(Aggregate::pair(a.clone(), a.clone()).len(), 1);
        assert!(Aggregate::empty().is_empty());
        assert!(!Aggregate::single(a).is_double());
    }

    #[test]
    fn capability_names() {
        assert_eq!(Capability::BypassLock.name(), "bypass-lock");
        assert_eq!(Capability::CreateLock.to_string(), "create-lock");
    }
}
