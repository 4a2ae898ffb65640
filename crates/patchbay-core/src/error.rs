//! Error types for patchbay

use thiserror::Error;

use crate::BarrierKey;

/// Core patchbay errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchbayError {
    // Registration errors
    #[error("Barrier registered with an empty event set")]
    EmptyEventSet,

    // Removal errors
    #[error("Unknown barrier: {0:?}")]
    UnknownBarrier(BarrierKey),
}

/// Result type for patchbay operations
pub type PatchbayResult<T> = Result<T, PatchbayError>;
