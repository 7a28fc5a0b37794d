//! Per-world serialized task execution.
//!
//! Anything that touches live host entities (spawning or removing hologram
//! lines) must run on the world's own execution context, one task at a
//! time. The decision path only enqueues; the world consumes.
//!
//! Each world gets an unbounded tokio mpsc channel. The receiver sits behind
//! an async mutex so at most one consumer drains a world at a time, either
//! - [`WorldExecutor::run_pending`] from the host's world tick, or
//! - [`WorldExecutor::drive`] for hosts that run each world as a tokio task.
//!
//! Tasks run in FIFO order per world. Queued tasks cannot be cancelled.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::{debug, trace, warn};

use crate::hologram::EntityStore;

/// A unit of deferred work against a world's entity store.
pub type WorldTask = Box<dyn FnOnce(&mut dyn EntityStore) + Send + 'static>;

type Consumer = (Arc<AsyncMutex<mpsc::UnboundedReceiver<WorldTask>>>, Arc<AtomicU64>);

struct WorldQueue {
    tx: mpsc::UnboundedSender<WorldTask>,
    rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<WorldTask>>>,
    submitted: AtomicU64,
    completed: Arc<AtomicU64>,
}

impl WorldQueue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(AsyncMutex::new(rx)),
            submitted: AtomicU64::new(0),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Statistics for one world's queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks submitted since the queue was created.
    pub submitted: u64,
    /// Tasks that have finished running.
    pub completed: u64,
}

impl QueueStats {
    /// Tasks queued or running.
    #[must_use]
    pub fn pending(&self) -> u64 {
        self.submitted.saturating_sub(self.completed)
    }
}

/// Routes tasks to per-world single-consumer queues.
#[derive(Default)]
pub struct WorldExecutor {
    queues: RwLock<HashMap<String, WorldQueue>>,
}

impl std::fmt::Debug for WorldExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldExecutor")
            .field("worlds", &self.queues.read().len())
            .finish()
    }
}

impl WorldExecutor {
    /// Executor with no worlds yet; queues are created on first use.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `task` for `world`. Never blocks.
    pub fn submit<F>(&self, world: &str, task: F)
    where
        F: FnOnce(&mut dyn EntityStore) + Send + 'static,
    {
        self.submit_boxed(world, Box::new(task));
    }

    /// Enqueue an already boxed task.
    pub fn submit_boxed(&self, world: &str, task: WorldTask) {
        {
            let queues = self.queues.read();
            if let Some(queue) = queues.get(world) {
                Self::push(world, queue, task);
                return;
            }
        }
        let mut queues = self.queues.write();
        let queue = queues.entry(world.to_string()).or_insert_with(WorldQueue::new);
        Self::push(world, queue, task);
    }

    fn push(world: &str, queue: &WorldQueue, task: WorldTask) {
        // The receiver lives in the same WorldQueue, so the send cannot fail.
        if queue.tx.send(task).is_ok() {
            let n = queue.submitted.fetch_add(1, Ordering::Relaxed) + 1;
            trace!(world, submitted = n, "World task queued");
        }
    }

    /// Run every task currently queued for `world` against `store`.
    ///
    /// Returns the number of tasks run. Returns 0 without waiting if another
    /// consumer is draining this world right now.
    pub fn run_pending(&self, world: &str, store: &mut dyn EntityStore) -> usize {
        let Some((rx, completed)) = self.consumer(world) else {
            return 0;
        };
        let Ok(mut rx) = rx.try_lock() else {
            debug!(world, "World queue busy, skipping tick drain");
            return 0;
        };

        let mut ran = 0;
        while let Ok(task) = rx.try_recv() {
            task(&mut *store);
            completed.fetch_add(1, Ordering::Relaxed);
            ran += 1;
        }
        if ran > 0 {
            trace!(world, ran, "Drained world tasks");
        }
        ran
    }

    /// Consume `world`'s queue until [`close_world`](Self::close_world) is
    /// called, running each task against `store` as it arrives.
    pub async fn drive<S>(&self, world: &str, store: &mut S)
    where
        S: EntityStore + Send,
    {
        let (rx, completed) = self.consumer_or_create(world);
        let mut rx = rx.lock().await;
        debug!(world, "World driver started");
        while let Some(task) = rx.recv().await {
            task(&mut *store as &mut dyn EntityStore);
            completed.fetch_add(1, Ordering::Relaxed);
        }
        debug!(world, "World driver stopped");
    }

    /// Drop `world`'s queue. A running [`drive`](Self::drive) loop runs
    /// whatever is still queued and then returns; without one, queued tasks
    /// are dropped and their count is logged. Call
    /// [`run_pending`](Self::run_pending) first on tick-driven worlds.
    pub fn close_world(&self, world: &str) -> bool {
        let Some(queue) = self.queues.write().remove(world) else {
            return false;
        };
        let pending = queue
            .submitted
            .load(Ordering::Relaxed)
            .saturating_sub(queue.completed.load(Ordering::Relaxed));
        if pending > 0 && queue.rx.try_lock().is_ok() {
            warn!(world, dropped = pending, "World closed with queued tasks; they will not run");
        }
        true
    }

    /// Queue statistics for `world` (zeros if it has no queue).
    #[must_use]
    pub fn stats(&self, world: &str) -> QueueStats {
        self.queues
            .read()
            .get(world)
            .map(|q| QueueStats {
                submitted: q.submitted.load(Ordering::Relaxed),
                completed: q.completed.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    /// Worlds that currently have a queue.
    #[must_use]
    pub fn worlds(&self) -> Vec<String> {
        let mut worlds: Vec<_> = self.queues.read().keys().cloned().collect();
        worlds.sort();
        worlds
    }

    fn consumer(&self, world: &str) -> Option<Consumer> {
        self.queues
            .read()
            .get(world)
            .map(|q| (Arc::clone(&q.rx), Arc::clone(&q.completed)))
    }

    fn consumer_or_create(&self, world: &str) -> Consumer {
        let mut queues = self.queues.write();
        let queue = queues.entry(world.to_string()).or_insert_with(WorldQueue::new);
        (Arc::clone(&queue.rx), Arc::clone(&queue.completed))
    }
}
