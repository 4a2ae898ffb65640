//! Barrier registry entries

use std::sync::Arc;

use patchbay_core::ArgBundle;

/// Callback invoked with the completed argument bundle of a satisfied barrier
pub type BarrierCallback = Arc<dyn Fn(ArgBundle) + Send + Sync>;

/// A registered waiting set: the event names a callback is gated on
pub struct Barrier {
    /// Distinct event names, in registration order
    pub events: Vec<String>,
    /// Invoked once every event in `events` has fired
    pub callback: BarrierCallback,
    /// Self-destructs after first satisfaction
    pub once: bool,
}

impl std::fmt::Debug for Barrier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Barrier")
            .field("events", &self.events)
            .field("once", &self.once)
            .finish_non_exhaustive()
    }
}

/// Outcome of a best-effort bulk removal
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RemovalReport {
    /// Barriers actually removed
    pub removed: u32,
    /// Keys that were not in the registry
    pub unknown: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_debug_omits_callback() {
        let barrier = Barrier {
            events: vec!["a".to_string()],
            callback: Arc::new(|_| {}),
            once: true,
        };
        let rendered = format!("{:?}", barrier);
        assert!(rendered.contains("once: true"));
        assert!(rendered.contains(".."));
    }
}
