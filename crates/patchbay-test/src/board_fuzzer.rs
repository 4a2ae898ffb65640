//! Board Fuzzer - Randomized operation scripts against a Switchboard
//!
//! Drives a seeded random mix of emits, resets, removals, and
//! registrations against a live coordinator while an oracle model tracks
//! which fired-flags are set and which barriers are alive. After every
//! emit, the observed fire count of every barrier (live or retired) must
//! match the oracle's prediction.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use patchbay_barrier::Switchboard;
use patchbay_core::{BarrierKey, Value};
use patchbay_emitter::LocalEmitter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzConfig {
    /// Size of the event-name pool
    pub events: usize,
    /// Barriers registered up front
    pub barriers: usize,
    /// Operations to apply
    pub ops: usize,
    /// Probability a registered barrier is one-shot
    pub once_prob: f64,
    /// Probability an op is a reset
    pub reset_prob: f64,
    /// Probability an op is a removal
    pub remove_prob: f64,
    /// Probability an op registers a fresh barrier
    pub register_prob: f64,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzConfig {
    fn default() -> Self {
        FuzzConfig {
            events: 8,
            barriers: 12,
            ops: 500,
            once_prob: 0.3,
            reset_prob: 0.1,
            remove_prob: 0.05,
            register_prob: 0.1,
            seed: 42,
        }
    }
}

impl FuzzConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzConfig {
            events: 4,
            barriers: 5,
            ops: 100,
            ..FuzzConfig::default()
        }
    }

    /// Heavy fuzzing for thorough testing
    pub fn heavy() -> Self {
        FuzzConfig {
            events: 16,
            barriers: 40,
            ops: 10_000,
            ..FuzzConfig::default()
        }
    }
}

/// Oracle entry for one barrier
struct ModelBarrier {
    events: Vec<String>,
    once: bool,
    /// Fires the oracle predicts
    expected: u64,
    /// Fires the live callback observed
    observed: Arc<AtomicU64>,
}

/// What the fuzzer did
#[derive(Clone, Debug, Default)]
pub struct FuzzReport {
    pub emits: u64,
    pub resets: u64,
    pub removals: u64,
    pub unknown_removals: u64,
    pub registrations: u64,
    pub expected_fires: u64,
}

/// Randomized script driver
pub struct BoardFuzzer {
    config: FuzzConfig,
    rng: StdRng,
    emitter: Arc<LocalEmitter>,
    board: Arc<Switchboard>,
    fired: HashSet<String>,
    /// Live barriers, in key (= registration) order
    model: BTreeMap<BarrierKey, ModelBarrier>,
    /// Barriers removed or spent; their counts must never move again
    retired: Vec<ModelBarrier>,
    report: FuzzReport,
}

impl BoardFuzzer {
    pub fn new(config: FuzzConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        let emitter = Arc::new(LocalEmitter::new());
        let board = Switchboard::new(emitter.clone());

        let mut fuzzer = BoardFuzzer {
            config,
            rng,
            emitter,
            board,
            fired: HashSet::new(),
            model: BTreeMap::new(),
            retired: Vec::new(),
            report: FuzzReport::default(),
        };
        for _ in 0..fuzzer.config.barriers {
            fuzzer.register_random();
        }
        fuzzer
    }

    /// Apply the configured number of random operations, verifying after
    /// every emit. Panics (assert) on the first oracle divergence.
    pub fn run(mut self) -> FuzzReport {
        for _ in 0..self.config.ops {
            let roll: f64 = self.rng.gen();
            if roll < self.config.remove_prob {
                self.remove_random();
            } else if roll < self.config.remove_prob + self.config.reset_prob {
                self.reset_random();
            } else if roll
                < self.config.remove_prob + self.config.reset_prob + self.config.register_prob
            {
                self.register_random();
            } else {
                self.emit_random();
                self.verify();
            }
        }
        self.verify();
        self.report
    }

    fn event_name(&mut self) -> String {
        let idx = self.rng.gen_range(0..self.config.events);
        format!("evt{}", idx)
    }

    fn register_random(&mut self) {
        let want = self.rng.gen_range(1..=3.min(self.config.events));
        let mut events: Vec<String> = Vec::new();
        while events.len() < want {
            let name = self.event_name();
            if !events.contains(&name) {
                events.push(name);
            }
        }
        let once = self.rng.gen_bool(self.config.once_prob);

        let observed = Arc::new(AtomicU64::new(0));
        let counter = observed.clone();
        let callback = move |_bundle| {
            counter.fetch_add(1, Ordering::SeqCst);
        };
        let key = if once {
            self.board.once_several(events.clone(), callback)
        } else {
            self.board.on_several(events.clone(), callback)
        }
        .expect("event set is non-empty");

        self.model.insert(
            key,
            ModelBarrier {
                events,
                once,
                expected: 0,
                observed,
            },
        );
        self.report.registrations += 1;
    }

    fn emit_random(&mut self) {
        let event = self.event_name();
        let payload = self.rng.gen::<u64>();
        self.emitter.emit(&event, vec![Value::new(payload)]);
        self.report.emits += 1;

        // Oracle: mark fired, then fire every live barrier that depends on
        // this event and has its whole set satisfied, in key order.
        self.fired.insert(event.clone());
        let mut spent: Vec<BarrierKey> = Vec::new();
        for (key, barrier) in self.model.iter_mut() {
            if !barrier.events.iter().any(|e| *e == event) {
                continue;
            }
            if !barrier.events.iter().all(|e| self.fired.contains(e)) {
                continue;
            }
            barrier.expected += 1;
            self.report.expected_fires += 1;
            if barrier.once {
                spent.push(*key);
            }
        }
        for key in spent {
            if let Some(barrier) = self.model.remove(&key) {
                self.retired.push(barrier);
            }
        }
    }

    fn reset_random(&mut self) {
        if self.rng.gen_bool(0.5) {
            self.board.reset_all_events();
            self.fired.clear();
        } else {
            let event = self.event_name();
            self.board.reset_events([event.as_str()]);
            self.fired.remove(&event);
        }
        self.report.resets += 1;
    }

    fn remove_random(&mut self) {
        // Occasionally aim at a key that was never issued, to exercise
        // unknown-key tolerance.
        if self.model.is_empty() || self.rng.gen_bool(0.2) {
            let bogus = BarrierKey::new(u64::MAX - self.rng.gen_range(0..1000));
            let report = self.board.van_gogh([bogus]);
            assert_eq!(report.removed, 0);
            self.report.unknown_removals += 1;
            return;
        }
        let pick = self.rng.gen_range(0..self.model.len());
        let key = *self.model.keys().nth(pick).expect("index in range");
        let report = self.board.van_gogh([key]);
        assert_eq!(report.removed, 1);
        if let Some(barrier) = self.model.remove(&key) {
            self.retired.push(barrier);
        }
        self.report.removals += 1;
    }

    /// Every barrier, live or retired, fired exactly as often as predicted
    fn verify(&self) {
        for (key, barrier) in &self.model {
            assert_eq!(
                barrier.observed.load(Ordering::SeqCst),
                barrier.expected,
                "live barrier {key} diverged from oracle"
            );
        }
        for barrier in &self.retired {
            assert_eq!(
                barrier.observed.load(Ordering::SeqCst),
                barrier.expected,
                "retired barrier kept firing"
            );
        }
    }
}

/// Run a full fuzz session with the given configuration
pub fn fuzz(config: FuzzConfig) -> FuzzReport {
    BoardFuzzer::new(config).run()
}
