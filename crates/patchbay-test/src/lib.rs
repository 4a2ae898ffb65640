//! Patchbay Test Harness - Randomized coordinator validation
//!
//! This crate provides:
//! - Seeded random operation scripts (emit, reset, remove, register)
//! - An oracle model of fired-flags and live barriers
//! - Fire-count verification after every step

pub mod board_fuzzer;

pub use board_fuzzer::*;
