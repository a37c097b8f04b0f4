//! Market order book - per-instrument event state machine.
//!
//! Applies the ordered market-update stream to the pooled ladder
//! structures, maintains the BBO, and notifies the matching
//! collaborator after every applied event. Single-writer by design:
//! one logical thread applies events for one instrument, which is what
//! keeps pool traffic and ladder splicing lock-free.

use std::cell::RefCell;
use std::fmt;
use std::fmt::Write as _;
use std::rc::{Rc, Weak};

use arrayvec::ArrayVec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::error::BookError;
use crate::event::{InstrumentId, MarketUpdate, OrderId, Price, Priority, Qty, Side, UpdateKind};
use crate::index::OrderIndex;
use crate::ladder::{quote_of, Ladder, LevelPool, LevelQuote, OrderNode, OrderPool};
use crate::notify::BookListener;
use crate::pool::{Pool, PoolIndex, NULL_INDEX};

/// Capacity contract for one instrument's book.
///
/// Both limits bound pre-allocated structures (the two pools and the
/// direct order index) and exceeding either is fatal; sizing them is
/// the embedding application's job, not a runtime condition.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct BookConfig {
    /// Bound of the order-id space; also the order pool capacity.
    pub max_order_ids: u32,
    /// Maximum distinct live price levels across both sides.
    pub max_price_levels: u32,
}

impl Default for BookConfig {
    fn default() -> Self {
        Self {
            max_order_ids: 1 << 20,
            max_price_levels: 256,
        }
    }
}

/// Cached best bid/offer.
///
/// Refreshed only for sides the applied event touched; the derived
/// accessors [`MarketOrderBook::best_bid`] / [`MarketOrderBook::best_ask`]
/// read the ladder heads directly and are always current.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bbo {
    pub bid: Option<LevelQuote>,
    pub ask: Option<LevelQuote>,
}

impl fmt::Display for Bbo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bid {
            Some(q) => write!(f, "{}@{}", q.qty, q.price)?,
            None => write!(f, "-")?,
        }
        write!(f, " x ")?;
        match self.ask {
            Some(q) => write!(f, "{}@{}", q.price, q.qty),
            None => write!(f, "-"),
        }
    }
}

/// Read-only view of one resting order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RestingOrder {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub priority: Priority,
}

/// Per-instrument order book over pooled, handle-linked nodes.
///
/// Owns every order and price-level record it allocates; holds only a
/// non-owning back-reference to the matching collaborator, detached at
/// teardown before the owned structures are released.
pub struct MarketOrderBook {
    instrument_id: InstrumentId,
    config: BookConfig,
    orders: OrderPool,
    levels: LevelPool,
    index: OrderIndex,
    bids: Ladder,
    asks: Ladder,
    bbo: Bbo,
    listener: Option<Weak<RefCell<dyn BookListener>>>,
}

impl MarketOrderBook {
    pub fn new(instrument_id: InstrumentId, config: BookConfig) -> Self {
        Self {
            instrument_id,
            config,
            orders: Pool::new("order", config.max_order_ids),
            levels: Pool::new("price-level", config.max_price_levels),
            index: OrderIndex::new(config.max_order_ids),
            bids: Ladder::new(Side::Bid),
            asks: Ladder::new(Side::Ask),
            bbo: Bbo::default(),
            listener: None,
        }
    }

    /// Pre-fault both pools so steady state never page-faults.
    pub fn warm_up(&mut self) {
        self.orders.warm_up();
        self.levels.warm_up();
    }

    /// Attach the matching collaborator. The book keeps a non-owning
    /// handle; ownership stays with the caller, and a dropped listener
    /// simply stops receiving notifications.
    pub fn attach_listener(&mut self, listener: &Rc<RefCell<dyn BookListener>>) {
        self.listener = Some(Rc::downgrade(listener));
    }

    /// Drop the collaborator handle; no notification fires afterwards.
    pub fn detach_listener(&mut self) {
        self.listener = None;
    }

    // ========================================================================
    // Event dispatch
    // ========================================================================

    /// Apply one event from the ordered stream. The sole mutation
    /// entry point; events must arrive in generation order (an
    /// upstream invariant, not re-checked here).
    ///
    /// Protocol violations - unknown references, duplicate or
    /// out-of-range ids, a side-less ADD - are logged, dropped and
    /// reported; a dropped event leaves the book untouched. Pool
    /// exhaustion panics: by contract it is a sizing defect, never
    /// handled here.
    pub fn apply_update(&mut self, update: &MarketUpdate) -> Result<(), BookError> {
        // Captured before any mutation; which cache side gets
        // refreshed afterwards depends on the pre-update best levels.
        let bid_touched = self.touches_best(&self.bids, update, Side::Bid);
        let ask_touched = self.touches_best(&self.asks, update, Side::Ask);

        match update.kind {
            UpdateKind::Add => self.apply_add(update)?,
            UpdateKind::Modify => self.apply_modify(update)?,
            UpdateKind::Cancel => self.apply_cancel(update)?,
            UpdateKind::Trade => {
                // Informational for this engine: forward and skip the
                // structural epilogue entirely.
                self.forward_trade(update);
                return Ok(());
            }
            UpdateKind::Clear => self.apply_clear(),
            UpdateKind::Invalid | UpdateKind::SnapshotStart | UpdateKind::SnapshotEnd => {}
        }

        self.update_bbo(bid_touched, ask_touched);

        trace!(
            instrument = self.instrument_id,
            kind = ?update.kind,
            order_id = update.order_id,
            price = update.price,
            side = ?update.side,
            bbo = %self.bbo,
            "applied"
        );

        self.notify_book_update(update);
        Ok(())
    }

    /// Whether `update` lands at or inside the current best level of
    /// `side`. Evaluated against the pre-mutation head by design (so
    /// an empty side is never "touched"); see `update_bbo`.
    fn touches_best(&self, ladder: &Ladder, update: &MarketUpdate, side: Side) -> bool {
        if ladder.is_empty() || update.side != Some(side) {
            return false;
        }
        let best = self.levels.get(ladder.head()).price;
        update.price == best || side.better(update.price, best)
    }

    fn apply_add(&mut self, update: &MarketUpdate) -> Result<(), BookError> {
        let Some(side) = update.side else {
            warn!(order_id = update.order_id, "ADD without a side; dropped");
            return Err(BookError::MissingSide {
                kind: UpdateKind::Add,
                order_id: update.order_id,
            });
        };
        self.check_id(update.order_id, UpdateKind::Add)?;
        if self.index.contains(update.order_id) {
            warn!(order_id = update.order_id, "duplicate ADD; dropped");
            return Err(BookError::DuplicateOrder {
                order_id: update.order_id,
            });
        }

        let order_idx = self.orders.alloc();
        *self.orders.get_mut(order_idx) = OrderNode {
            order_id: update.order_id,
            side,
            price: update.price,
            qty: update.qty,
            priority: update.priority,
            level: NULL_INDEX,
            prev: NULL_INDEX,
            next: NULL_INDEX,
        };

        match side {
            Side::Bid => self
                .bids
                .insert_order(&mut self.orders, &mut self.levels, order_idx),
            Side::Ask => self
                .asks
                .insert_order(&mut self.orders, &mut self.levels, order_idx),
        }

        let inserted = self.index.insert(update.order_id, order_idx);
        debug_assert!(inserted);
        Ok(())
    }

    fn apply_modify(&mut self, update: &MarketUpdate) -> Result<(), BookError> {
        let order_idx = self.lookup(update.order_id, UpdateKind::Modify)?;
        // Price and side of a resting order never change; a reprice
        // arrives from upstream as CANCEL + ADD.
        self.orders.get_mut(order_idx).qty = update.qty;
        Ok(())
    }

    fn apply_cancel(&mut self, update: &MarketUpdate) -> Result<(), BookError> {
        let order_idx = self.lookup(update.order_id, UpdateKind::Cancel)?;
        let side = self.orders.get(order_idx).side;
        match side {
            Side::Bid => self
                .bids
                .remove_order(&mut self.orders, &mut self.levels, order_idx),
            Side::Ask => self
                .asks
                .remove_order(&mut self.orders, &mut self.levels, order_idx),
        }
        self.index.remove(update.order_id);
        Ok(())
    }

    fn apply_clear(&mut self) {
        debug!(instrument = self.instrument_id, "clearing book");
        self.bids.clear(&mut self.orders, &mut self.levels);
        self.asks.clear(&mut self.orders, &mut self.levels);
        self.index.reset();
    }

    fn check_id(&self, order_id: OrderId, kind: UpdateKind) -> Result<(), BookError> {
        if self.index.in_bounds(order_id) {
            Ok(())
        } else {
            warn!(order_id, ?kind, "order id outside configured space; dropped");
            Err(BookError::IdOutOfRange {
                order_id,
                max_order_ids: self.index.capacity(),
            })
        }
    }

    fn lookup(&self, order_id: OrderId, kind: UpdateKind) -> Result<PoolIndex, BookError> {
        self.check_id(order_id, kind)?;
        self.index.lookup(order_id).ok_or_else(|| {
            warn!(order_id, ?kind, "unknown order reference; dropped");
            BookError::UnknownOrder { kind, order_id }
        })
    }

    /// Refresh the cached BBO for the touched side(s) only; deep-book
    /// changes leave the cache alone. The touched flags were computed
    /// against the pre-mutation heads, so an ADD opening a previously
    /// empty side and a side-less CLEAR refresh nothing here - the
    /// cache catches up on the next event that lands at the best.
    fn update_bbo(&mut self, bid_touched: bool, ask_touched: bool) {
        if bid_touched {
            self.bbo.bid = self.bids.best_quote(&self.orders, &self.levels);
        }
        if ask_touched {
            self.bbo.ask = self.asks.best_quote(&self.orders, &self.levels);
        }
    }

    fn forward_trade(&self, update: &MarketUpdate) {
        trace!(
            instrument = self.instrument_id,
            price = update.price,
            qty = update.qty,
            "trade forwarded"
        );
        if let Some(listener) = self.listener.as_ref().and_then(Weak::upgrade) {
            listener.borrow_mut().on_trade_forward(update);
        }
    }

    fn notify_book_update(&self, update: &MarketUpdate) {
        if let Some(listener) = self.listener.as_ref().and_then(Weak::upgrade) {
            listener
                .borrow_mut()
                .on_book_update(self.instrument_id, update.price, update.side, self);
        }
    }

    // ========================================================================
    // Read-only views
    // ========================================================================

    #[inline]
    pub const fn instrument_id(&self) -> InstrumentId {
        self.instrument_id
    }

    #[inline]
    pub const fn config(&self) -> BookConfig {
        self.config
    }

    /// Cached BBO as maintained by the touched-side rule.
    #[inline]
    pub const fn bbo(&self) -> Bbo {
        self.bbo
    }

    /// Best bid derived from the ladder head (always current).
    #[inline]
    pub fn best_bid(&self) -> Option<LevelQuote> {
        self.bids.best_quote(&self.orders, &self.levels)
    }

    /// Best ask derived from the ladder head (always current).
    #[inline]
    pub fn best_ask(&self) -> Option<LevelQuote> {
        self.asks.best_quote(&self.orders, &self.levels)
    }

    /// Spread between derived best ask and best bid.
    pub fn spread(&self) -> Option<u64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) if ask.price > bid.price => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Number of resting orders.
    #[inline]
    pub fn order_count(&self) -> u32 {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn bid_level_count(&self) -> u32 {
        self.bids.level_count(&self.levels)
    }

    pub fn ask_level_count(&self) -> u32 {
        self.asks.level_count(&self.levels)
    }

    /// Order-pool occupancy; equals `order_count` unless slots leak.
    pub fn orders_live(&self) -> u32 {
        self.orders.in_use()
    }

    /// Level-pool occupancy across both sides.
    pub fn levels_live(&self) -> u32 {
        self.levels.in_use()
    }

    /// The resting order behind `order_id`, if any.
    pub fn resting(&self, order_id: OrderId) -> Option<RestingOrder> {
        let idx = self.index.lookup(order_id)?;
        let node = self.orders.get(idx);
        Some(RestingOrder {
            order_id: node.order_id,
            side: node.side,
            price: node.price,
            qty: node.qty,
            priority: node.priority,
        })
    }

    /// FIFO walk of one price level, oldest first. Diagnostic path;
    /// allocates.
    pub fn orders_at(&self, side: Side, price: Price) -> Option<Vec<RestingOrder>> {
        let ladder = self.ladder(side);
        let level_idx = ladder.find_level(&self.levels, price)?;
        let first = self.levels.get(level_idx).first_order;

        let mut out = Vec::new();
        let mut at = first;
        loop {
            let node = self.orders.get(at);
            out.push(RestingOrder {
                order_id: node.order_id,
                side: node.side,
                price: node.price,
                qty: node.qty,
                priority: node.priority,
            });
            at = node.next;
            if at == first {
                break;
            }
        }
        Some(out)
    }

    /// Top `N` levels of `side`, best first, without heap allocation.
    pub fn depth<const N: usize>(&self, side: Side) -> ArrayVec<LevelQuote, N> {
        let mut out = ArrayVec::new();
        let ladder = self.ladder(side);
        ladder.for_each_level(&self.levels, |idx, _| {
            if out.is_full() {
                return false;
            }
            out.push(quote_of(&self.orders, &self.levels, idx));
            true
        });
        out
    }

    /// Human-readable two-sided snapshot for the teardown log and
    /// diagnostics.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "book[{}] {} orders, {} bid / {} ask levels",
            self.instrument_id,
            self.order_count(),
            self.bid_level_count(),
            self.ask_level_count(),
        );
        for (label, side) in [("asks", Side::Ask), ("bids", Side::Bid)] {
            let _ = writeln!(out, "  {label}:");
            self.ladder(side).for_each_level(&self.levels, |idx, _| {
                let q = quote_of(&self.orders, &self.levels, idx);
                let _ = writeln!(out, "    {} x {} ({} orders)", q.price, q.qty, q.orders);
                true
            });
        }
        out
    }

    #[inline]
    fn ladder(&self, side: Side) -> &Ladder {
        match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        }
    }
}

impl Drop for MarketOrderBook {
    /// Teardown order matters: log the final state, detach the
    /// collaborator so no notification can fire, then release the
    /// owned structures and reset the index.
    fn drop(&mut self) {
        info!(
            instrument = self.instrument_id,
            book = %self.render(),
            "order book teardown"
        );
        self.listener = None;
        self.bids.clear(&mut self.orders, &mut self.levels);
        self.asks.clear(&mut self.orders, &mut self.levels);
        self.index.reset();
        self.bbo = Bbo::default();
    }
}

impl fmt::Debug for MarketOrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarketOrderBook")
            .field("instrument_id", &self.instrument_id)
            .field("order_count", &self.order_count())
            .field("bid_levels", &self.bid_level_count())
            .field("ask_levels", &self.ask_level_count())
            .field("bbo", &self.bbo)
            .finish()
    }
}
