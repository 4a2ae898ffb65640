//! Patchbay Barrier - Event-barrier coordination
//!
//! This crate implements the barrier coordinator:
//! - Barrier registry and per-event dispatch map
//! - Shared fired-set and latest-wins argument store
//! - Serialized evaluation with re-entrancy-safe deferral
//! - Barrier lifecycle (register, remove, reset)
//! - Process-wide default board

pub mod barrier;
pub mod global;
pub mod switchboard;

pub use barrier::*;
pub use global::*;
pub use switchboard::*;
