//! The plugin runtime: shared state plus page and tick handling.
//!
//! One [`NeoLocks`] is built at plugin start and shared by every listener.
//! Event handlers live in [`crate::listeners`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use neolocks_core::config::NeoLocksConfig;
use neolocks_core::error::Result;
use neolocks_core::hologram::{LabelCommit, Viewer};
use neolocks_core::{
    AccessGuard, AggregateResolver, ChestLockRegistry, EntityStore, HologramCoordinator,
    LockPrompt, LockWorkflow, PlayerId, PositionKey, PromptOutcome, SignHologramRegistry, Storage,
    WorkflowEnd, WorldExecutor,
};

use crate::host::PlayerSurface;
use crate::pages::{ButtonAction, Message, PageEvent};

/// The page a player currently has open, as far as the plugin knows.
#[derive(Debug)]
pub(crate) enum Pending {
    /// Lock confirmation.
    Lock(LockPrompt),
    /// Sign label form.
    Label {
        anchor: PositionKey,
        viewer: Option<Viewer>,
    },
    /// Informational page with only an OK button.
    Notice,
}

/// Chest locks and sign holograms for one server.
pub struct NeoLocks {
    pub(crate) config: NeoLocksConfig,
    storage: Arc<Storage>,
    locks: Arc<ChestLockRegistry>,
    holograms: Arc<SignHologramRegistry>,
    executor: Arc<WorldExecutor>,
    pub(crate) guard: AccessGuard,
    pub(crate) workflow: LockWorkflow,
    pub(crate) coordinator: HologramCoordinator,
    pending: Mutex<HashMap<PlayerId, Pending>>,
}

impl std::fmt::Debug for NeoLocks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeoLocks")
            .field("storage", &self.storage)
            .field("locks", &self.locks.len())
            .field("pending_pages", &self.pending.lock().len())
            .finish_non_exhaustive()
    }
}

impl NeoLocks {
    /// Validate `config`, open its database and load every lock.
    ///
    /// # Errors
    ///
    /// Returns a configuration error or a database error.
    pub fn open(config: NeoLocksConfig) -> Result<Self> {
        config.validate()?;
        let storage = Arc::new(Storage::open(&config.persistence)?);
        Self::with_storage(config, storage)
    }

    /// Build on an already opened `storage`.
    ///
    /// # Errors
    ///
    /// Returns a database error if loading locks fails.
    pub fn with_storage(config: NeoLocksConfig, storage: Arc<Storage>) -> Result<Self> {
        let locks = Arc::new(ChestLockRegistry::open(Arc::clone(&storage))?);
        let holograms = Arc::new(SignHologramRegistry::new(Arc::clone(&storage)));
        let executor = Arc::new(WorldExecutor::new());
        let resolver = Arc::new(AggregateResolver::new(config.locks.chest_blocks.clone()));

        let guard = AccessGuard::new(Arc::clone(&resolver), Arc::clone(&locks));
        let workflow = LockWorkflow::new(resolver, Arc::clone(&locks));
        let coordinator = HologramCoordinator::new(
            Arc::clone(&holograms),
            Arc::clone(&executor),
            config.holograms.clone(),
        );

        info!(
            db = %storage.db_path().display(),
            locks = locks.len(),
            enabled = config.general.enabled,
            "NeoLocks started"
        );

        Ok(Self {
            config,
            storage,
            locks,
            holograms,
            executor,
            guard,
            workflow,
            coordinator,
            pending: Mutex::new(HashMap::new()),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &NeoLocksConfig {
        &self.config
    }

    /// Chest lock registry.
    #[must_use]
    pub fn locks(&self) -> &Arc<ChestLockRegistry> {
        &self.locks
    }

    /// Sign hologram registry.
    #[must_use]
    pub fn holograms(&self) -> &Arc<SignHologramRegistry> {
        &self.holograms
    }

    /// Per-world task queues.
    #[must_use]
    pub fn executor(&self) -> &Arc<WorldExecutor> {
        &self.executor
    }

    /// Copy the database to `dest` while running.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub fn backup(&self, dest: &Path) -> Result<()> {
        self.storage.backup(dest)
    }

    /// Whether the plugin is waiting on an answer from `player`.
    #[must_use]
    pub fn has_pending_page(&self, player: PlayerId) -> bool {
        self.pending.lock().contains_key(&player)
    }

    // -----------------------------------------------------------------------
    // World tick
    // -----------------------------------------------------------------------

    /// Run queued hologram work for `world`. Call from that world's tick.
    pub fn tick_world(&self, world: &str, store: &mut dyn EntityStore) -> usize {
        self.executor.run_pending(world, store)
    }

    // -----------------------------------------------------------------------
    // Pages
    // -----------------------------------------------------------------------

    /// Track `next` as `player`'s open page. Whatever was open before is
    /// dismissed.
    pub(crate) fn replace_pending(&self, player: PlayerId, next: Pending) {
        let previous = self.pending.lock().insert(player, next);
        if let Some(previous) = previous {
            debug!(%player, "Superseding open page");
            self.dismiss(previous);
        }
    }

    fn dismiss(&self, pending: Pending) {
        if let Pending::Lock(prompt) = pending {
            self.workflow.complete(prompt, PromptOutcome::Dismiss);
        }
    }

    /// Drop every open label form for `anchor`; their later answers find
    /// nothing pending and commit nothing. Returns how many were dropped.
    pub(crate) fn forget_label_forms(&self, anchor: &PositionKey) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|_, page| !matches!(page, Pending::Label { anchor: a, .. } if *a == *anchor));
        before - pending.len()
    }

    /// The player closed their page without pressing a button (or left).
    pub fn on_page_closed(&self, player: PlayerId) {
        let pending = self.pending.lock().remove(&player);
        if let Some(pending) = pending {
            self.dismiss(pending);
        }
    }

    /// A button was pressed on one of the plugin's pages.
    ///
    /// `raw` is the page's JSON payload. Malformed payloads are logged and
    /// ignored; the page stays open.
    pub fn on_page_event(&self, players: &dyn PlayerSurface, player: PlayerId, raw: &str) {
        let event = match PageEvent::decode(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(%player, error = %e, "Ignoring malformed page event");
                return;
            }
        };

        let pending = self.pending.lock().remove(&player);
        let Some(pending) = pending else {
            debug!(%player, action = ?event.action, "Page event with nothing pending");
            players.close_page(player);
            return;
        };

        match (pending, event.action) {
            (Pending::Lock(prompt), ButtonAction::Confirm) => {
                match self.workflow.complete(prompt, PromptOutcome::Confirm) {
                    WorkflowEnd::Committed { .. } => {
                        players.send_message(player, &Message::locked());
                    }
                    WorkflowEnd::Denied { .. } => {
                        players.send_message(player, &Message::locked_by_other());
                    }
                    WorkflowEnd::Failed(_) => {
                        players.send_message(player, &Message::storage_failed());
                    }
                    WorkflowEnd::Cancelled => {}
                }
            }
            (Pending::Lock(prompt), _) => {
                self.workflow.complete(prompt, PromptOutcome::Cancel);
            }
            (Pending::Label { anchor, viewer }, ButtonAction::Confirm) => {
                if let LabelCommit::Empty =
                    self.coordinator.commit_label(&anchor, &event.lines(), viewer)
                {
                    debug!(%player, %anchor, "Empty label, nothing to show");
                }
            }
            (Pending::Label { anchor, .. }, _) => {
                debug!(%player, %anchor, "Label form cancelled");
            }
            (Pending::Notice, _) => {}
        }
        players.close_page(player);
    }
}
