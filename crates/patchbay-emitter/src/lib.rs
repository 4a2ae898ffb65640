//! Patchbay Emitter - Publish/subscribe primitive
//!
//! This crate provides:
//! - The [`EventSource`] trait, the subscribe/unsubscribe surface the
//!   barrier coordinator consumes
//! - [`LocalEmitter`], an in-process implementation with an `emit` trigger

pub mod emitter;

pub use emitter::*;
