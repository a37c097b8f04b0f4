//! Single-writer consumption loop (feature `runtime`).
//!
//! The upstream gateway/sequencer owns ordering and cross-thread
//! handoff; this side is one consumer thread per instrument draining
//! an SPSC ring of updates into the book, busy-waiting between bursts.

#[cfg(feature = "runtime")]
use crate::book::MarketOrderBook;
#[cfg(feature = "runtime")]
use crate::event::MarketUpdate;

/// Pin the current thread to the last available CPU core.
///
/// The last core is typically isolated from OS interrupts.
pub fn pin_to_last_core() {
    if let Some(core_ids) = core_affinity::get_core_ids() {
        if let Some(last_core) = core_ids.last() {
            core_affinity::set_for_current(*last_core);
        }
    }
}

/// Drain `input` into `book` forever.
///
/// # Note
/// This function runs until the program terminates. Dropped events
/// (protocol violations) are already logged by the book and do not
/// stop the loop.
#[cfg(feature = "runtime")]
pub fn run(book: &mut MarketOrderBook, input: &mut rtrb::Consumer<MarketUpdate>, pin_to_core: bool) {
    if pin_to_core {
        pin_to_last_core();
    }

    book.warm_up();

    loop {
        while let Ok(update) = input.pop() {
            let _ = book.apply_update(&update);
        }
        std::hint::spin_loop();
    }
}
