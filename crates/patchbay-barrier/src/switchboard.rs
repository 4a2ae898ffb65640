//! The barrier coordinator
//!
//! A [`Switchboard`] subscribes to an external event source and runs a
//! barrier's callback once every event in the barrier's set has fired at
//! least once since the last reset. Each event name gets at most one
//! underlying subscription; fan-out to interested barriers happens here.
//!
//! Evaluation passes are serialized through a deferral queue: an event
//! occurrence that arrives while a pass is running (a callback emitting
//! synchronously, or another thread delivering) is queued and consumed by
//! the running pass in FIFO order. Occurrences are never dropped. A
//! callback that re-emits its own trigger unboundedly will grow that queue
//! forever; that is a caller bug the coordinator only surfaces (by
//! periodic warnings), not one it can solve.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use patchbay_core::{
    ArgBundle, BarrierKey, CapturedArgs, KeyGenerator, PatchbayError, PatchbayResult, Value,
};
use patchbay_emitter::{EventSource, Handler, HandlerId};

use crate::barrier::{Barrier, BarrierCallback, RemovalReport};

/// Coordinator tuning knobs
#[derive(Clone, Debug)]
pub struct SwitchboardConfig {
    /// Pending-queue depth at which (and at each multiple of which) a
    /// warning is logged; a steadily growing queue means some callback is
    /// re-emitting its own triggers without ever settling.
    pub pending_warn_depth: usize,
}

impl Default for SwitchboardConfig {
    fn default() -> Self {
        SwitchboardConfig {
            pending_warn_depth: 1024,
        }
    }
}

/// Coordinator counters
#[derive(Clone, Debug, Default)]
pub struct SwitchboardStats {
    /// Event occurrences delivered to the coordinator
    pub occurrences: u64,
    /// Occurrences that arrived mid-pass and were deferred
    pub deferred: u64,
    /// Barrier callbacks invoked
    pub barriers_fired: u64,
    /// Callbacks that panicked
    pub callback_panics: u64,
    /// Barriers removed (explicitly or by one-shot cleanup)
    pub barriers_removed: u64,
    /// High-water mark of the deferral queue
    pub max_pending_depth: u64,
}

/// Caller-supplied sink for callback panics, keyed by the offending barrier
pub type PanicHook = Arc<dyn Fn(BarrierKey, &str) + Send + Sync>;

/// One event occurrence awaiting evaluation
struct Occurrence {
    event: String,
    args: Vec<Value>,
}

#[derive(Default)]
struct Pending {
    queue: VecDeque<Occurrence>,
    in_flight: bool,
}

/// Mutable coordinator state, single writer at a time
#[derive(Default)]
struct BoardState {
    /// Barrier registry
    entries: HashMap<BarrierKey, Barrier>,
    /// Event name -> keys of barriers depending on it. Keys are issued
    /// monotonically, so ordered iteration is registration order.
    dispatch: HashMap<String, BTreeSet<BarrierKey>>,
    /// Events observed since the last reset, shared across all barriers
    fired: HashSet<String>,
    /// Most recent captured arguments per event name
    captured: HashMap<String, CapturedArgs>,
    /// Registered parameter names per event name
    arg_names: HashMap<String, Vec<String>>,
    /// The single underlying subscription per event name
    subscriptions: HashMap<String, HandlerId>,
}

/// Event-barrier coordinator
pub struct Switchboard {
    source: Arc<dyn EventSource>,
    config: SwitchboardConfig,
    keys: KeyGenerator,
    state: Mutex<BoardState>,
    pending: Mutex<Pending>,
    stats: Mutex<SwitchboardStats>,
    panic_hook: Mutex<Option<PanicHook>>,
}

impl Switchboard {
    /// Create a coordinator wired to `source`
    pub fn new(source: Arc<dyn EventSource>) -> Arc<Self> {
        Self::with_config(source, SwitchboardConfig::default())
    }

    pub fn with_config(source: Arc<dyn EventSource>, config: SwitchboardConfig) -> Arc<Self> {
        Arc::new(Switchboard {
            source,
            config,
            keys: KeyGenerator::new(),
            state: Mutex::new(BoardState::default()),
            pending: Mutex::new(Pending::default()),
            stats: Mutex::new(SwitchboardStats::default()),
            panic_hook: Mutex::new(None),
        })
    }

    /// Register parameter names for events, for by-name argument access.
    ///
    /// Purely additive metadata; re-registering an event overwrites its
    /// list and applies to captures from then on.
    pub fn register_event_arguments<E, N, I>(&self, mapping: I)
    where
        I: IntoIterator<Item = (E, Vec<N>)>,
        E: Into<String>,
        N: Into<String>,
    {
        let mut state = self.state.lock();
        for (event, names) in mapping {
            state.arg_names.insert(
                event.into(),
                names.into_iter().map(Into::into).collect(),
            );
        }
    }

    /// Register a callback to run every time all `events` have fired since
    /// the last reset. Returns the barrier's key, the sole removal handle.
    pub fn on_several<I, S, F>(self: &Arc<Self>, events: I, callback: F) -> PatchbayResult<BarrierKey>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(ArgBundle) + Send + Sync + 'static,
    {
        self.register(events, Arc::new(callback), false)
    }

    /// Like [`Switchboard::on_several`], but the barrier self-destructs
    /// after its first satisfaction.
    pub fn once_several<I, S, F>(
        self: &Arc<Self>,
        events: I,
        callback: F,
    ) -> PatchbayResult<BarrierKey>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(ArgBundle) + Send + Sync + 'static,
    {
        self.register(events, Arc::new(callback), true)
    }

    fn register<I, S>(
        self: &Arc<Self>,
        events: I,
        callback: BarrierCallback,
        once: bool,
    ) -> PatchbayResult<BarrierKey>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        // Duplicate names collapse to one dependency.
        let mut deduped: Vec<String> = Vec::new();
        for event in events {
            let event = event.into();
            if !deduped.contains(&event) {
                deduped.push(event);
            }
        }
        if deduped.is_empty() {
            return Err(PatchbayError::EmptyEventSet);
        }

        let key = self.keys.issue();
        let mut state = self.state.lock();
        for event in &deduped {
            if !state.subscriptions.contains_key(event) {
                let id = self.source.subscribe(event, self.make_handler(event));
                state.subscriptions.insert(event.clone(), id);
            }
            state.dispatch.entry(event.clone()).or_default().insert(key);
        }
        state.entries.insert(
            key,
            Barrier {
                events: deduped,
                callback,
                once,
            },
        );
        Ok(key)
    }

    /// The one handler shared by every barrier depending on `event`
    fn make_handler(self: &Arc<Self>, event: &str) -> Handler {
        let weak = Arc::downgrade(self);
        let event = event.to_string();
        Arc::new(move |args| {
            if let Some(board) = weak.upgrade() {
                board.deliver(&event, args.to_vec());
            }
        })
    }

    /// Remove the given barriers. Unknown keys are counted and otherwise
    /// ignored; remaining state is never disturbed by them.
    pub fn van_gogh<I>(&self, keys: I) -> RemovalReport
    where
        I: IntoIterator<Item = BarrierKey>,
    {
        let keys: Vec<BarrierKey> = keys.into_iter().collect();
        self.remove_keys(&keys)
    }

    /// Remove every registered barrier
    pub fn van_gogh_all(&self) -> RemovalReport {
        let keys: Vec<BarrierKey> = self.state.lock().entries.keys().copied().collect();
        self.remove_keys(&keys)
    }

    /// Strict single-key removal, for callers who want the miss reported
    pub fn remove(&self, key: BarrierKey) -> PatchbayResult<()> {
        if self.remove_keys(&[key]).removed == 1 {
            Ok(())
        } else {
            Err(PatchbayError::UnknownBarrier(key))
        }
    }

    fn remove_keys(&self, keys: &[BarrierKey]) -> RemovalReport {
        let mut report = RemovalReport::default();
        let mut released: Vec<(String, HandlerId)> = Vec::new();
        {
            let mut state = self.state.lock();
            for &key in keys {
                let Some(barrier) = state.entries.remove(&key) else {
                    tracing::debug!(%key, "removal of unknown barrier ignored");
                    report.unknown += 1;
                    continue;
                };
                for event in &barrier.events {
                    let emptied = match state.dispatch.get_mut(event) {
                        Some(set) => {
                            set.remove(&key);
                            set.is_empty()
                        }
                        None => false,
                    };
                    if emptied {
                        state.dispatch.remove(event);
                        // Last dependent gone: release the underlying
                        // subscription so it cannot leak.
                        if let Some(id) = state.subscriptions.remove(event) {
                            released.push((event.clone(), id));
                        }
                    }
                }
                report.removed += 1;
            }
        }
        // Outside the state lock; the source has its own locking.
        for (event, id) in released {
            self.source.unsubscribe(&event, id);
        }
        if report.removed > 0 {
            self.stats.lock().barriers_removed += u64::from(report.removed);
        }
        report
    }

    /// Clear the fired-flag for the given event names. Stored arguments
    /// and registered barriers are untouched.
    pub fn reset_events<I, S>(&self, events: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.lock();
        for event in events {
            state.fired.remove(event.as_ref());
        }
    }

    /// Clear every fired-flag
    pub fn reset_all_events(&self) {
        self.state.lock().fired.clear();
    }

    /// Route callback panics somewhere other than the log
    pub fn set_panic_hook(&self, hook: PanicHook) {
        *self.panic_hook.lock() = Some(hook);
    }

    pub fn barrier_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn contains(&self, key: BarrierKey) -> bool {
        self.state.lock().entries.contains_key(&key)
    }

    /// Number of barriers currently depending on `event`
    pub fn dependent_count(&self, event: &str) -> usize {
        self.state
            .lock()
            .dispatch
            .get(event)
            .map_or(0, |set| set.len())
    }

    /// Whether `event` has fired since the last reset
    pub fn has_fired(&self, event: &str) -> bool {
        self.state.lock().fired.contains(event)
    }

    /// The most recent captured arguments for `event`, if it ever fired
    pub fn captured_args(&self, event: &str) -> Option<CapturedArgs> {
        self.state.lock().captured.get(event).cloned()
    }

    pub fn stats(&self) -> SwitchboardStats {
        self.stats.lock().clone()
    }

    pub fn config(&self) -> &SwitchboardConfig {
        &self.config
    }

    /// Accept one event occurrence. Runs the evaluation pass inline when
    /// none is in flight; defers (never drops) otherwise.
    fn deliver(&self, event: &str, args: Vec<Value>) {
        let deferred;
        let depth;
        {
            let mut pending = self.pending.lock();
            pending.queue.push_back(Occurrence {
                event: event.to_string(),
                args,
            });
            depth = pending.queue.len();
            deferred = pending.in_flight;
            if !deferred {
                pending.in_flight = true;
            }
        }

        {
            let mut stats = self.stats.lock();
            stats.occurrences += 1;
            if deferred {
                stats.deferred += 1;
            }
            stats.max_pending_depth = stats.max_pending_depth.max(depth as u64);
        }
        if deferred {
            let warn_depth = self.config.pending_warn_depth.max(1);
            if depth % warn_depth == 0 {
                tracing::warn!(
                    event,
                    depth,
                    "deferral queue keeps growing; a barrier callback may be re-emitting unboundedly"
                );
            }
            return;
        }

        // Drain to exhaustion. Clearing in_flight and observing emptiness
        // happen under one lock so no occurrence can slip between them.
        loop {
            let occurrence = {
                let mut pending = self.pending.lock();
                match pending.queue.pop_front() {
                    Some(occurrence) => occurrence,
                    None => {
                        pending.in_flight = false;
                        return;
                    }
                }
            };
            self.evaluate(occurrence);
        }
    }

    /// One evaluation pass for one occurrence
    fn evaluate(&self, occurrence: Occurrence) {
        let Occurrence { event, args } = occurrence;

        // Mark fired, capture arguments, snapshot the dispatch set. The
        // snapshot keeps the pass stable while callbacks mutate barriers.
        let snapshot: Vec<BarrierKey> = {
            let mut state = self.state.lock();
            state.fired.insert(event.clone());
            let entry = match state.arg_names.get(&event) {
                Some(names) => CapturedArgs::named(args, names),
                None => CapturedArgs::positional(args),
            };
            state.captured.insert(event.clone(), entry);
            state
                .dispatch
                .get(&event)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default()
        };

        for key in snapshot {
            // Re-check under the lock: an earlier callback in this pass may
            // have removed or reset this barrier's world.
            let (callback, bundle, once) = {
                let state = self.state.lock();
                let Some(barrier) = state.entries.get(&key) else {
                    continue;
                };
                if !barrier.events.iter().all(|e| state.fired.contains(e)) {
                    continue;
                }
                let entries = barrier
                    .events
                    .iter()
                    .map(|e| {
                        (
                            e.clone(),
                            state.captured.get(e).cloned().unwrap_or_default(),
                        )
                    })
                    .collect();
                (barrier.callback.clone(), ArgBundle::new(entries), barrier.once)
            };

            // No lock is held here: the callback may re-enter registration,
            // removal, reset, or emission (which defers).
            let outcome = catch_unwind(AssertUnwindSafe(|| (*callback)(bundle)));

            {
                let mut stats = self.stats.lock();
                stats.barriers_fired += 1;
                if outcome.is_err() {
                    stats.callback_panics += 1;
                }
            }
            if let Err(payload) = outcome {
                let message = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("opaque panic payload");
                let hook = self.panic_hook.lock().clone();
                match hook {
                    Some(hook) => (*hook)(key, message),
                    None => tracing::error!(%key, message, "barrier callback panicked"),
                }
            }

            // One-shot cleanup runs even when the callback panicked.
            if once {
                self.remove_keys(&[key]);
            }
        }
    }
}

impl std::fmt::Debug for Switchboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Switchboard")
            .field("barriers", &self.barrier_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
