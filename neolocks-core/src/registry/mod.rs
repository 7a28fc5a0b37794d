//! Durable position-keyed registries.
//!
//! - [`ChestLockRegistry`]: PositionKey → [`LockRecord`](crate::types::LockRecord),
//!   with atomic aggregate lock/unlock and O(1) reads from an in-memory index.
//! - [`SignHologramRegistry`]: PositionKey → set of
//!   [`EntityRef`](crate::types::EntityRef), drained on read.
//!
//! Both write through to [`Storage`](crate::storage::Storage) and are shared
//! between listeners as `Arc`s built once at startup.

pub mod holograms;
pub mod locks;

pub use holograms::SignHologramRegistry;
pub use locks::{ChestLockRegistry, ClaimOutcome};
