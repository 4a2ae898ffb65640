//! Process-wide default board
//!
//! Convenience for callers who want one shared coordinator without
//! threading an instance around. The board is backed by its own
//! [`LocalEmitter`]; libraries that already have an event source should
//! construct their own [`Switchboard`] instead.

use std::sync::{Arc, OnceLock};

use patchbay_core::Value;
use patchbay_emitter::LocalEmitter;

use crate::switchboard::Switchboard;

/// A [`LocalEmitter`] and the [`Switchboard`] wired to it
pub struct GlobalBoard {
    emitter: Arc<LocalEmitter>,
    board: Arc<Switchboard>,
}

impl GlobalBoard {
    fn init() -> Self {
        let emitter = Arc::new(LocalEmitter::new());
        let board = Switchboard::new(emitter.clone());
        GlobalBoard { emitter, board }
    }

    pub fn emitter(&self) -> &Arc<LocalEmitter> {
        &self.emitter
    }

    pub fn board(&self) -> &Arc<Switchboard> {
        &self.board
    }

    /// Fire an event on the backing emitter
    pub fn emit(&self, event: &str, args: Vec<Value>) -> usize {
        self.emitter.emit(event, args)
    }
}

/// The process-wide default board, created on first use
pub fn global() -> &'static GlobalBoard {
    static GLOBAL: OnceLock<GlobalBoard> = OnceLock::new();
    GLOBAL.get_or_init(GlobalBoard::init)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_global_board_round_trip() {
        let board = global();
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        // Namespaced events: the global board is shared process-wide.
        let key = board
            .board()
            .on_several(["global-test:a", "global-test:b"], move |_| {
                inner.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        board.emit("global-test:a", vec![Value::new(1u8)]);
        board.emit("global-test:b", vec![]);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        board.board().van_gogh([key]);
        assert_eq!(board.emitter().handler_count("global-test:a"), 0);
    }
}
