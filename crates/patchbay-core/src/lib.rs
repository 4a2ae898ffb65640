//! Patchbay Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout patchbay:
//! - Barrier identifiers (BarrierKey)
//! - Opaque argument values (Value)
//! - Captured argument entries and bundles (CapturedArgs, ArgBundle)
//! - Error taxonomy

pub mod args;
pub mod error;
pub mod key;

pub use args::*;
pub use error::*;
pub use key::*;
