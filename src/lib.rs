//! # mbo-lob
//!
//! A pooled-memory market-by-order book engine for low-latency feed
//! consumption.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one thread owns each instrument's book (no locks)
//! - **O(1) Updates**: add, modify, cancel all splice in constant time
//! - **Pooled Memory**: fixed-capacity pools, no heap traffic in steady state
//! - **Narrow Seam**: one mutation entry point in, two callbacks out
//!
//! ## Architecture
//!
//! ```text
//! [Gateway/Sequencer] --> [ordered MarketUpdate stream] --> [MarketOrderBook]
//!                                                                 |
//!                                                  [BookListener callbacks]
//! ```

pub mod book;
pub mod error;
pub mod event;
pub mod feed;
pub mod index;
pub mod ladder;
pub mod notify;
pub mod pool;
pub mod runtime;

// Re-exports for convenience
pub use book::{Bbo, BookConfig, MarketOrderBook, RestingOrder};
pub use error::BookError;
pub use event::{InstrumentId, MarketUpdate, OrderId, Price, Priority, Qty, Side, UpdateKind};
pub use ladder::LevelQuote;
pub use notify::BookListener;
pub use pool::{Pool, PoolIndex, NULL_INDEX};
