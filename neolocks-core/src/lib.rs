//! # NeoLocks Core Library
//!
//! Host-agnostic chest locking and sign holograms for voxel game servers.
//!
//! - **Aggregates**: a chest and its horizontal twin are one lockable unit
//!   ([`AggregateResolver`]).
//! - **Locks**: durable ownership records with an in-memory index
//!   ([`ChestLockRegistry`]), consulted by [`AccessGuard`] on every open.
//! - **Workflow**: placing a trigger item on a chest unlocks it for the
//!   owner or proposes a lock ([`LockWorkflow`]).
//! - **Holograms**: floating text lines above signs, replaced and cleaned up
//!   on the world's own queue ([`HologramCoordinator`], [`WorldExecutor`]).
//!
//! The host server is reached only through small traits: [`WorldView`] for
//! block lookups, [`Permissions`] for capability checks and [`EntityStore`]
//! for spawning and removing entities.
//!
//! ## Performance Contract
//!
//! The access check and aggregate resolution run on the interaction path:
//! - [`AccessGuard::check`]: in-memory only, no I/O
//! - Registry writes: one SQLite transaction per aggregate

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod hologram;
pub mod registry;
pub mod storage;
pub mod types;
pub mod workflow;

pub use aggregate::{AggregateResolver, WorldView};
pub use config::NeoLocksConfig;
pub use error::{NeoLocksError, Result};
pub use executor::WorldExecutor;
pub use guard::{AccessDecision, AccessGuard, AllowReason, Permissions};
pub use hologram::{EntityStore, HologramCoordinator, HologramSpawn};
pub use registry::{ChestLockRegistry, ClaimOutcome, SignHologramRegistry};
pub use storage::Storage;
pub use types::*;
pub use workflow::{LockPrompt, LockWorkflow, PromptOutcome, WorkflowEnd, WorkflowStart};
