//! Patchbay Demo Application
//!
//! Walks through the coordinator's lifecycle:
//! - A repeating barrier over two events with named arguments
//! - A one-shot barrier
//! - Reset and re-fire

use std::sync::Arc;

use patchbay_barrier::Switchboard;
use patchbay_core::Value;
use patchbay_emitter::LocalEmitter;

fn main() {
    let emitter = Arc::new(LocalEmitter::new());
    let board = Switchboard::new(emitter.clone());

    board.register_event_arguments([
        ("db:ready", vec!["pool_size"]),
        ("cache:ready", vec!["entries"]),
    ]);

    let serving = board
        .on_several(["db:ready", "cache:ready"], |bundle| {
            let pool = bundle
                .get("db:ready")
                .and_then(|args| args.by_name("pool_size"))
                .and_then(|v| v.downcast_ref::<u32>().copied())
                .unwrap_or(0);
            let entries = bundle
                .get("cache:ready")
                .and_then(|args| args.by_name("entries"))
                .and_then(|v| v.downcast_ref::<u32>().copied())
                .unwrap_or(0);
            println!("serving: db pool = {pool}, cache entries = {entries}");
        })
        .expect("non-empty event set");

    board
        .once_several(["db:ready", "cache:ready"], |_| {
            println!("first-readiness hook (runs exactly once)");
        })
        .expect("non-empty event set");

    println!("-- firing db:ready, then cache:ready");
    emitter.emit("db:ready", vec![Value::new(16u32)]);
    emitter.emit("cache:ready", vec![Value::new(1024u32)]);

    println!("-- cache refreshes; latest arguments win");
    emitter.emit("cache:ready", vec![Value::new(2048u32)]);

    println!("-- resetting db:ready; cache alone is not enough");
    board.reset_events(["db:ready"]);
    emitter.emit("cache:ready", vec![Value::new(4096u32)]);
    emitter.emit("db:ready", vec![Value::new(32u32)]);

    board.van_gogh([serving]);
    println!("-- barrier removed; further events are ignored");
    emitter.emit("db:ready", vec![Value::new(64u32)]);

    let stats = board.stats();
    println!(
        "stats: {} occurrences, {} barrier fires, {} removed",
        stats.occurrences, stats.barriers_fired, stats.barriers_removed
    );
}
