//! Hologram lifecycle coordination.
//!
//! Label commits and sign breaks arrive on the decision path. Both are
//! pushed onto the world's [`WorldExecutor`] queue and drain the registry
//! from there, so a break always lands after any label commit that came
//! before it.
//!
//! Every commit drains before it creates, so a late destroy followed by a
//! create converges on "exactly the newest label is visible".

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::config::HologramConfig;
use crate::error::NeoLocksError;
use crate::executor::WorldExecutor;
use crate::hologram::layout::{line_offset, materialize_lines};
use crate::hologram::{EntityStore, HologramSpawn};
use crate::registry::SignHologramRegistry;
use crate::types::{EntityRef, PositionKey};

/// Horizontal position of the player who authored a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewer {
    /// World-space X.
    pub x: f64,
    /// World-space Z.
    pub z: f64,
}

/// What [`HologramCoordinator::commit_label`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelCommit {
    /// Every field was empty; nothing scheduled.
    Empty,
    /// A replace task for these lines was queued on the world.
    Scheduled {
        /// Lines that will be shown, top to bottom.
        lines: Vec<String>,
    },
}

/// Creates, replaces and destroys the entities behind sign labels.
#[derive(Debug, Clone)]
pub struct HologramCoordinator {
    holograms: Arc<SignHologramRegistry>,
    executor: Arc<WorldExecutor>,
    config: HologramConfig,
    /// Anchors with a queued label commit that has not finished yet.
    in_flight: Arc<Mutex<HashMap<PositionKey, usize>>>,
}

impl HologramCoordinator {
    /// Coordinator writing to `holograms` and scheduling on `executor`.
    #[must_use]
    pub fn new(
        holograms: Arc<SignHologramRegistry>,
        executor: Arc<WorldExecutor>,
        config: HologramConfig,
    ) -> Self {
        Self {
            holograms,
            executor,
            config,
            in_flight: Arc::default(),
        }
    }

    /// Apply a submitted label form at `anchor`.
    ///
    /// Fields beyond `max_lines` are ignored. When at least one line
    /// materializes, a task is queued that destroys the old lines and
    /// spawns the new ones.
    pub fn commit_label(
        &self,
        anchor: &PositionKey,
        fields: &[Option<String>],
        viewer: Option<Viewer>,
    ) -> LabelCommit {
        let fields = &fields[..fields.len().min(self.config.max_lines)];
        let lines = materialize_lines(fields, self.config.max_line_length);
        if lines.is_empty() {
            debug!(%anchor, "Label submitted with no text");
            return LabelCommit::Empty;
        }

        let spawns = self.spawns_for(anchor, &lines, viewer);
        let holograms = Arc::clone(&self.holograms);
        let in_flight = Arc::clone(&self.in_flight);
        let task_anchor = anchor.clone();
        *self.in_flight.lock().entry(anchor.clone()).or_insert(0) += 1;
        self.executor.submit(&anchor.world, move |store| {
            replace_lines(&holograms, store, &task_anchor, spawns);
            let mut in_flight = in_flight.lock();
            if let Some(count) = in_flight.get_mut(&task_anchor) {
                *count -= 1;
                if *count == 0 {
                    in_flight.remove(&task_anchor);
                }
            }
        });

        debug!(%anchor, lines = lines.len(), "Label replace scheduled");
        LabelCommit::Scheduled { lines }
    }

    /// React to the block at `position` being removed.
    ///
    /// When `position` has registered lines or a label commit still queued,
    /// a cleanup task is queued behind it that drains the registry and
    /// destroys what it finds. Returns whether cleanup was scheduled; `false`
    /// is the common case and not an error.
    pub fn on_structure_removed(&self, position: &PositionKey) -> bool {
        let queued = self.in_flight.lock().contains_key(position);
        let registered = match self.holograms.entries(position) {
            Ok(refs) => !refs.is_empty(),
            Err(e) => {
                error!(%position, error = %e, "Failed to read holograms for removed block");
                true
            }
        };
        if !queued && !registered {
            return false;
        }

        let holograms = Arc::clone(&self.holograms);
        let task_position = position.clone();
        self.executor.submit(&position.world, move |store| {
            match holograms.drain(&task_position) {
                Ok(refs) => destroy_all(store, &task_position, &refs),
                Err(e) => {
                    error!(position = %task_position, error = %e, "Failed to drain holograms for removed block");
                }
            }
        });
        debug!(%position, queued, "Hologram cleanup scheduled");
        true
    }

    fn spawns_for(
        &self,
        anchor: &PositionKey,
        lines: &[String],
        viewer: Option<Viewer>,
    ) -> Vec<HologramSpawn> {
        let cx = f64::from(anchor.x) + 0.5;
        let cz = f64::from(anchor.z) + 0.5;
        let base_y = f64::from(anchor.y) + self.config.anchor_height;
        #[allow(clippy::cast_possible_truncation)]
        let yaw = viewer.map_or(0.0, |v| (v.x - cx).atan2(v.z - cz) as f32);

        lines
            .iter()
            .enumerate()
            .map(|(i, text)| HologramSpawn {
                world: anchor.world.clone(),
                x: cx,
                y: base_y + line_offset(i, lines.len(), self.config.line_spacing),
                z: cz,
                yaw,
                text: text.clone(),
            })
            .collect()
    }
}

/// Drain `anchor`, destroy what was there, spawn and register `spawns`.
fn replace_lines(
    holograms: &SignHologramRegistry,
    store: &mut dyn EntityStore,
    anchor: &PositionKey,
    spawns: Vec<HologramSpawn>,
) {
    match holograms.drain(anchor) {
        Ok(old) => destroy_all(store, anchor, &old),
        Err(e) => error!(%anchor, error = %e, "Failed to drain previous label"),
    }

    for (i, spawn) in spawns.iter().enumerate() {
        let entity = match store.spawn_text(spawn) {
            Ok(entity) => entity,
            Err(e) => {
                error!(%anchor, line = i + 1, error = %e, "Failed to spawn hologram line");
                continue;
            }
        };
        if let Err(e) = holograms.register(anchor, entity) {
            error!(%anchor, %entity, error = %e, "Hologram spawned but not persisted");
        }
    }
}

/// Remove every entity in `refs`, tolerating ones that are already gone.
fn destroy_all(store: &mut dyn EntityStore, anchor: &PositionKey, refs: &[EntityRef]) {
    for &entity in refs {
        match store.remove(entity) {
            Ok(()) => debug!(%anchor, %entity, "Removed hologram line"),
            Err(NeoLocksError::StaleEntity(_)) => {
                warn!(%anchor, %entity, "Hologram already gone, skipping");
            }
            Err(e) => warn!(%anchor, %entity, error = %e, "Failed to remove hologram line"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::storage::Storage;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Entities {
        live: HashMap<EntityRef, HologramSpawn>,
    }

    impl EntityStore for Entities {
        fn spawn_text(&mut self, spawn: &HologramSpawn) -> Result<EntityRef> {
            let entity = EntityRef::new();
            self.live.insert(entity, spawn.clone());
            Ok(entity)
        }

        fn remove(&mut self, entity: EntityRef) -> Result<()> {
            self.live
                .remove(&entity)
                .map(|_| ())
                .ok_or(NeoLocksError::StaleEntity(entity))
        }
    }

    impl Entities {
        fn texts_top_down(&self) -> Vec<String> {
            let mut spawns: Vec<_> = self.live.values().collect();
            spawns.sort_by(|a, b| b.y.total_cmp(&a.y));
            spawns.into_iter().map(|s| s.text.clone()).collect()
        }
    }

    fn setup() -> (HologramCoordinator, Arc<SignHologramRegistry>, Arc<WorldExecutor>) {
        let storage = Arc::new(Storage::open_in_memory().expect("open"));
        let holograms = Arc::new(SignHologramRegistry::new(storage));
        let executor = Arc::new(WorldExecutor::new());
        let coordinator = HologramCoordinator::new(
            Arc::clone(&holograms),
            Arc::clone(&executor),
            HologramConfig::default(),
        );
        (coordinator, holograms, executor)
    }

    fn fields(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some((*v).to_string())).collect()
    }

    fn sign() -> PositionKey {
        PositionKey::new("w", 10, 64, -3)
    }

    #[test]
    fn empty_form_schedules_nothing() {
        let (coord, _, exec) = setup();
        assert_eq!(coord.commit_label(&sign(), &fields(&["", " ", ""]), None), LabelCommit::Empty);
        assert_eq!(exec.stats("w").submitted, 0);
    }

    #[test]
    fn commit_is_deferred_until_world_runs() {
        let (coord, holograms, exec) = setup();
        let mut world = Entities::default();

        let commit = coord.commit_label(&sign(), &fields(&["Shop", "Open"]), None);
        assert_eq!(
            commit,
            LabelCommit::Scheduled { lines: vec!["Shop".to_string(), "Open".to_string()] }
        );
        assert!(world.live.is_empty());
        assert!(holograms.entries(&sign()).expect("entries").is_empty());

        exec.run_pending("w", &mut world);
        assert_eq!(world.texts_top_down(), vec!["Shop", "Open"]);
        assert_eq!(holograms.entries(&sign()).expect("entries").len(), 2);
    }

    #[test]
    fn relabel_replaces_previous_lines() {
        let (coord, holograms, exec) = setup();
        let mut world = Entities::default();

        coord.commit_label(&sign(), &fields(&["One", "Two", "Three"]), None);
        exec.run_pending("w", &mut world);
        coord.commit_label(&sign(), &fields(&["Fresh"]), None);
        exec.run_pending("w", &mut world);

        assert_eq!(world.texts_top_down(), vec!["Fresh"]);
        let refs = holograms.entries(&sign()).expect("entries");
        assert_eq!(refs.len(), 1);
        assert!(world.live.contains_key(&refs[0]));
    }

    #[test]
    fn lines_are_centered_on_the_anchor() {
        let (coord, _, exec) = setup();
        let mut world = Entities::default();
        coord.commit_label(&sign(), &fields(&["a", "b", "c"]), None);
        exec.run_pending("w", &mut world);

        let mut ys: Vec<f64> = world.live.values().map(|s| s.y).collect();
        ys.sort_by(f64::total_cmp);
        let base = 64.5;
        assert!((ys[0] - (base - 0.25)).abs() < 1e-9);
        assert!((ys[1] - base).abs() < 1e-9);
        assert!((ys[2] - (base + 0.25)).abs() < 1e-9);
        assert!(world.live.values().all(|s| (s.x - 10.5).abs() < 1e-9 && (s.z + 2.5).abs() < 1e-9));
    }

    #[test]
    fn lines_face_the_author() {
        let (coord, _, exec) = setup();
        let mut world = Entities::default();
        let viewer = Viewer { x: 10.5, z: 5.0 };
        coord.commit_label(&sign(), &fields(&["hi"]), Some(viewer));
        exec.run_pending("w", &mut world);
        let spawn = world.live.values().next().expect("spawned");
        assert!(spawn.yaw.abs() < 1e-6, "viewer straight down +Z gives yaw 0");
    }

    #[test]
    fn break_removes_entities_and_tolerates_stale_ones() {
        let (coord, holograms, exec) = setup();
        let mut world = Entities::default();
        coord.commit_label(&sign(), &fields(&["a", "b"]), None);
        exec.run_pending("w", &mut world);

        // one line was removed by some other path already
        let gone = *world.live.keys().next().expect("a line");
        world.live.remove(&gone);

        assert!(coord.on_structure_removed(&sign()));
        exec.run_pending("w", &mut world);
        assert!(world.live.is_empty());
        assert!(holograms.entries(&sign()).expect("entries").is_empty());
    }

    #[test]
    fn break_without_label_is_silent() {
        let (coord, _, exec) = setup();
        assert!(!coord.on_structure_removed(&sign()));
        assert_eq!(exec.stats("w").submitted, 0);
    }

    #[test]
    fn extra_fields_are_ignored() {
        let (coord, _, _) = setup();
        let commit = coord.commit_label(&sign(), &fields(&["1", "2", "3", "4"]), None);
        assert_eq!(
            commit,
            LabelCommit::Scheduled { lines: vec!["1".into(), "2".into(), "3".into()] }
        );
    }

    #[test]
    fn break_before_the_commit_runs_still_removes_the_label() {
        let (coord, holograms, exec) = setup();
        let mut world = Entities::default();

        coord.commit_label(&sign(), &fields(&["Shop", "Open"]), None);
        assert!(coord.on_structure_removed(&sign()));
        assert_eq!(exec.run_pending("w", &mut world), 2);

        assert!(world.live.is_empty());
        assert!(holograms.entries(&sign()).expect("entries").is_empty());
        assert!(!coord.on_structure_removed(&sign()));
    }
}
