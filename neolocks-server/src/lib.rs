//! # neolocks-server: Host Integration for NeoLocks
//!
//! This crate connects the game-agnostic `neolocks-core` library to a
//! running game server.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │               Host server                  │
//! │  events ──► ┌──────────────────────────┐  │
//! │             │     neolocks-server      │  │
//! │  pages  ◄── │  listeners ─► NeoLocks   │  │
//! │             └────────────┬─────────────┘  │
//! │                          ▼                │
//! │             ┌──────────────────────────┐  │
//! │  tick   ──► │      neolocks-core       │  │
//! │             └──────────────────────────┘  │
//! └───────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `events`: interaction, placement and break events with one-shot cancel
//! - `host`: traits the host implements (player chat and pages)
//! - `pages`: page descriptions, chat messages, typed page payloads
//! - `listeners`: event handlers on [`NeoLocks`]
//! - `runtime`: [`NeoLocks`] itself: shared state, pages, world ticks
//! - `telemetry`: `tracing` subscriber setup

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod events;
pub mod host;
pub mod listeners;
pub mod pages;
pub mod runtime;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use events::{BreakEvent, InteractionEvent, InteractionKind, PlacementEvent};
pub use host::{Host, PlayerSurface};
pub use listeners::PlacementOutcome;
pub use pages::{ButtonAction, Color, Message, Page, PageEvent};
pub use runtime::NeoLocks;
