//! Multi-block structure resolution.
//!
//! A double chest is two horizontally adjacent chest blocks that share one
//! lock. [`AggregateResolver`] turns any one of those blocks into the full
//! set of positions.

use tracing::debug;

use crate::config::BlockMatcher;
use crate::types::{Aggregate, PositionKey};

/// Read-only view of the host's block grid.
pub trait WorldView {
    /// Block id at `position`, or `None` for air / unloaded chunks.
    fn block_id(&self, position: &PositionKey) -> Option<String>;

    /// The block the host itself considers connected to `position`, when
    /// it tracks that (e.g. a chest's "paired" state).
    fn companion_hint(&self, _position: &PositionKey) -> Option<PositionKey> {
        None
    }
}

/// Finds the positions forming one logical structure.
#[derive(Debug, Clone)]
pub struct AggregateResolver {
    tracked: BlockMatcher,
}

impl AggregateResolver {
    /// Resolver for blocks accepted by `tracked`.
    #[must_use]
    pub fn new(tracked: BlockMatcher) -> Self {
        Self { tracked }
    }

    /// Whether `block_id` is a tracked structure type.
    #[must_use]
    pub fn is_tracked(&self, block_id: &str) -> bool {
        self.tracked.matches(block_id)
    }

    /// Resolve the structure at `origin`.
    ///
    /// Returns `{origin}` plus at most one horizontally adjacent block with
    /// the same id, or the empty aggregate when `origin` is not tracked.
    ///
    /// A companion is only accepted when it picks `origin` back, so every
    /// block of a pair resolves to the same pair and a block that is nobody's
    /// chosen partner stays single.
    #[must_use]
    pub fn resolve(&self, world: &dyn WorldView, origin: &PositionKey) -> Aggregate {
        let Some(origin_id) = world.block_id(origin) else {
            return Aggregate::empty();
        };
        if !self.is_tracked(&origin_id) {
            return Aggregate::empty();
        }

        let companion = partner(world, origin, &origin_id)
            .filter(|c| partner(world, c, &origin_id).as_ref() == Some(origin));

        match companion {
            Some(companion) => {
                debug!(%origin, %companion, block = %origin_id, "Resolved double structure");
                Aggregate::pair(origin.clone(), companion)
            }
            None => Aggregate::single(origin.clone()),
        }
    }
}

/// The block `position` would pair with: the host's hint when it names an
/// adjacent block of kind `id`, else the first such neighbor in scan order.
fn partner(world: &dyn WorldView, position: &PositionKey, id: &str) -> Option<PositionKey> {
    let same_kind = |p: &PositionKey| world.block_id(p).as_deref() == Some(id);

    world
        .companion_hint(position)
        .filter(|hint| position.is_horizontally_adjacent(hint) && same_kind(hint))
        .or_else(|| {
            position
                .horizontal_neighbors()
                .into_iter()
                .find(|n| same_kind(n))
        })
}
