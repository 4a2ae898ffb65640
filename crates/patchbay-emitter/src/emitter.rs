//! Named-event delivery with positional arguments
//!
//! Handlers are invoked synchronously, in subscription order. The handler
//! table lock is released before any handler runs, so handlers are free to
//! subscribe, unsubscribe, or emit again from inside their own invocation.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use patchbay_core::Value;

/// Event handler invoked with the occurrence's positional arguments
pub type Handler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Subscription handle, unique per emitter
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

impl fmt::Debug for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({})", self.0)
    }
}

/// The surface the barrier coordinator consumes from an event source.
///
/// Emission is driven externally and deliberately absent here; the
/// coordinator only ever registers and releases handlers.
pub trait EventSource: Send + Sync {
    /// Register a handler for a named event, returning its handle
    fn subscribe(&self, event: &str, handler: Handler) -> HandlerId;

    /// Remove a previously registered handler. Returns false if the
    /// handle is not registered for that event.
    fn unsubscribe(&self, event: &str, id: HandlerId) -> bool;
}

#[derive(Default)]
struct EmitterState {
    handlers: HashMap<String, Vec<(HandlerId, Handler)>>,
    next_id: u64,
}

/// In-process event emitter
#[derive(Default)]
pub struct LocalEmitter {
    state: Mutex<EmitterState>,
}

impl LocalEmitter {
    pub fn new() -> Self {
        LocalEmitter::default()
    }

    /// Fire a named event, invoking every subscribed handler with `args`.
    /// Returns the number of handlers invoked.
    pub fn emit(&self, event: &str, args: Vec<Value>) -> usize {
        // Snapshot under the lock, invoke outside it. A handler may mutate
        // the table (or emit) without deadlocking or skewing this pass.
        let snapshot: Vec<Handler> = {
            let state = self.state.lock();
            match state.handlers.get(event) {
                Some(list) => list.iter().map(|(_, h)| h.clone()).collect(),
                None => return 0,
            }
        };

        for handler in &snapshot {
            (**handler)(&args);
        }
        snapshot.len()
    }

    /// Number of handlers currently subscribed to `event`
    pub fn handler_count(&self, event: &str) -> usize {
        self.state
            .lock()
            .handlers
            .get(event)
            .map_or(0, |list| list.len())
    }
}

impl EventSource for LocalEmitter {
    fn subscribe(&self, event: &str, handler: Handler) -> HandlerId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = HandlerId(state.next_id);
        state
            .handlers
            .entry(event.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    fn unsubscribe(&self, event: &str, id: HandlerId) -> bool {
        let mut state = self.state.lock();
        let Some(list) = state.handlers.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(hid, _)| *hid != id);
        let removed = list.len() < before;
        if list.is_empty() {
            state.handlers.remove(event);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proptest::prelude::*;

    fn counting_handler(counter: Arc<AtomicUsize>) -> Handler {
        Arc::new(move |_args| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_emit_reaches_all_handlers() {
        let emitter = LocalEmitter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        emitter.subscribe("tick", counting_handler(hits.clone()));
        emitter.subscribe("tick", counting_handler(hits.clone()));

        let invoked = emitter.emit("tick", vec![]);
        assert_eq!(invoked, 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_emit_unknown_event_is_noop() {
        let emitter = LocalEmitter::new();
        assert_eq!(emitter.emit("nothing", vec![Value::new(1)]), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let emitter = LocalEmitter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let id = emitter.subscribe("tick", counting_handler(hits.clone()));

        assert!(emitter.unsubscribe("tick", id));
        assert!(!emitter.unsubscribe("tick", id));
        assert_eq!(emitter.emit("tick", vec![]), 0);
        assert_eq!(emitter.handler_count("tick"), 0);
    }

    #[test]
    fn test_handler_receives_args() {
        let emitter = LocalEmitter::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen2 = seen.clone();
        emitter.subscribe(
            "data",
            Arc::new(move |args| {
                let v = args[0].downcast_ref::<usize>().copied().unwrap_or(0);
                seen2.store(v, Ordering::SeqCst);
            }),
        );

        emitter.emit("data", vec![Value::new(7usize)]);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_reentrant_unsubscribe_during_emit() {
        let emitter = Arc::new(LocalEmitter::new());
        let hits = Arc::new(AtomicUsize::new(0));

        let em = emitter.clone();
        let hits2 = hits.clone();
        // Handler removes itself on first delivery; already-snapshotted
        // passes still complete.
        let id_slot: Arc<Mutex<Option<HandlerId>>> = Arc::new(Mutex::new(None));
        let slot = id_slot.clone();
        let id = emitter.subscribe(
            "once",
            Arc::new(move |_args| {
                hits2.fetch_add(1, Ordering::SeqCst);
                if let Some(id) = *slot.lock() {
                    em.unsubscribe("once", id);
                }
            }),
        );
        *id_slot.lock() = Some(id);

        emitter.emit("once", vec![]);
        emitter.emit("once", vec![]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    proptest! {
        // Whatever mix of subscribes and unsubscribes precedes an emit,
        // the surviving handlers run in subscription order.
        #[test]
        fn prop_invocation_order_is_subscription_order(
            ops in proptest::collection::vec((any::<bool>(), 0usize..16), 1..24),
        ) {
            let emitter = LocalEmitter::new();
            let log: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
            let mut live: Vec<(usize, HandlerId)> = Vec::new();
            let mut label = 0usize;

            for (subscribe, pick) in ops {
                if subscribe || live.is_empty() {
                    let tag = label;
                    label += 1;
                    let sink = log.clone();
                    let id = emitter.subscribe(
                        "seq",
                        Arc::new(move |_args| sink.lock().push(tag)),
                    );
                    live.push((tag, id));
                } else {
                    let (_, id) = live.remove(pick % live.len());
                    prop_assert!(emitter.unsubscribe("seq", id));
                }
            }

            let invoked = emitter.emit("seq", vec![]);
            prop_assert_eq!(invoked, live.len());
            let order: Vec<usize> = live.iter().map(|(tag, _)| *tag).collect();
            prop_assert_eq!(log.lock().clone(), order);
        }
    }
}
