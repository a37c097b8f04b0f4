//! Behavior tests for the book's event state machine: price/time
//! priority, BBO maintenance, clear/teardown accounting, and the
//! listener contract.

use std::cell::RefCell;
use std::rc::Rc;

use mbo_lob::notify::BookListener;
use mbo_lob::{
    Bbo, BookConfig, BookError, InstrumentId, MarketOrderBook, MarketUpdate, Price, Side,
    UpdateKind,
};

fn small_book() -> MarketOrderBook {
    MarketOrderBook::new(
        1,
        BookConfig {
            max_order_ids: 256,
            max_price_levels: 32,
        },
    )
}

/// Records every callback so tests can assert on the notification
/// stream.
#[derive(Default)]
struct Recording {
    trades: Vec<MarketUpdate>,
    updates: Vec<(InstrumentId, Price, Option<Side>)>,
    last_bbo: Option<Bbo>,
    last_best_bid_qty: Option<u64>,
}

impl BookListener for Recording {
    fn on_trade_forward(&mut self, update: &MarketUpdate) {
        self.trades.push(*update);
    }

    fn on_book_update(
        &mut self,
        instrument_id: InstrumentId,
        price: Price,
        side: Option<Side>,
        book: &MarketOrderBook,
    ) {
        self.updates.push((instrument_id, price, side));
        self.last_bbo = Some(book.bbo());
        self.last_best_bid_qty = book.best_bid().map(|q| q.qty);
    }
}

fn attached(book: &mut MarketOrderBook) -> Rc<RefCell<Recording>> {
    let recording = Rc::new(RefCell::new(Recording::default()));
    let as_listener: Rc<RefCell<dyn BookListener>> = recording.clone();
    book.attach_listener(&as_listener);
    // Dropping the coerced handle is fine: the weak reference tracks
    // the shared allocation, which `recording` keeps alive.
    recording
}

// ============================================================================
// Price/time priority
// ============================================================================

#[test]
fn add_on_empty_book_sets_best_bid() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 100, 10, 1))
        .unwrap();

    let best = book.best_bid().unwrap();
    assert_eq!((best.price, best.qty), (100, 10));
    assert_eq!(book.bid_level_count(), 1);
}

#[test]
fn same_price_adds_accumulate_fifo() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 100, 10, 1))
        .unwrap();
    book.apply_update(&MarketUpdate::add(1, 2, Side::Bid, 100, 5, 2))
        .unwrap();

    let best = book.best_bid().unwrap();
    assert_eq!((best.price, best.qty, best.orders), (100, 15, 2));

    let fifo = book.orders_at(Side::Bid, 100).unwrap();
    assert_eq!(fifo.len(), 2);
    assert_eq!(fifo[0].order_id, 1);
    assert_eq!(fifo[1].order_id, 2);
    assert!(fifo[0].priority < fifo[1].priority);
}

#[test]
fn cancel_keeps_level_while_others_rest() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 100, 10, 1))
        .unwrap();
    book.apply_update(&MarketUpdate::add(1, 2, Side::Bid, 100, 5, 2))
        .unwrap();
    book.apply_update(&MarketUpdate::cancel(1, 1, Some(Side::Bid), 100))
        .unwrap();

    let best = book.best_bid().unwrap();
    assert_eq!((best.price, best.qty, best.orders), (100, 5, 1));
    let fifo = book.orders_at(Side::Bid, 100).unwrap();
    assert_eq!(fifo[0].order_id, 2);
}

#[test]
fn cancel_of_last_order_removes_the_level() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 100, 10, 1))
        .unwrap();
    book.apply_update(&MarketUpdate::add(1, 2, Side::Bid, 100, 5, 2))
        .unwrap();
    book.apply_update(&MarketUpdate::cancel(1, 1, Some(Side::Bid), 100))
        .unwrap();
    book.apply_update(&MarketUpdate::cancel(1, 2, Some(Side::Bid), 100))
        .unwrap();

    assert_eq!(book.best_bid(), None);
    assert_eq!(book.bid_level_count(), 0);
    assert_eq!(book.levels_live(), 0);
    assert_eq!(book.orders_live(), 0);
}

#[test]
fn bids_serve_highest_first_asks_lowest_first() {
    let mut book = small_book();
    for (id, side, price) in [
        (1, Side::Bid, 99),
        (2, Side::Bid, 101),
        (3, Side::Bid, 100),
        (4, Side::Ask, 103),
        (5, Side::Ask, 102),
        (6, Side::Ask, 104),
    ] {
        book.apply_update(&MarketUpdate::add(1, id, side, price, 10, id))
            .unwrap();
    }

    let bid_prices: Vec<_> = book.depth::<8>(Side::Bid).iter().map(|q| q.price).collect();
    let ask_prices: Vec<_> = book.depth::<8>(Side::Ask).iter().map(|q| q.price).collect();
    assert_eq!(bid_prices, vec![101, 100, 99]);
    assert_eq!(ask_prices, vec![102, 103, 104]);
    assert_eq!(book.spread(), Some(1));
}

#[test]
fn add_cancel_round_trip_restores_structure() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 100, 10, 1))
        .unwrap();
    book.apply_update(&MarketUpdate::add(1, 2, Side::Bid, 99, 5, 2))
        .unwrap();

    let depth_before: Vec<_> = book.depth::<8>(Side::Bid).to_vec();
    let levels_before = book.levels_live();

    // Lone order at a fresh price: level appears and disappears
    book.apply_update(&MarketUpdate::add(1, 3, Side::Bid, 101, 7, 3))
        .unwrap();
    book.apply_update(&MarketUpdate::cancel(1, 3, Some(Side::Bid), 101))
        .unwrap();

    assert_eq!(book.depth::<8>(Side::Bid).to_vec(), depth_before);
    assert_eq!(book.levels_live(), levels_before);

    // Shared price: the level stays intact for the other resident
    book.apply_update(&MarketUpdate::add(1, 4, Side::Bid, 100, 3, 4))
        .unwrap();
    book.apply_update(&MarketUpdate::cancel(1, 4, Some(Side::Bid), 100))
        .unwrap();

    assert_eq!(book.depth::<8>(Side::Bid).to_vec(), depth_before);
}

// ============================================================================
// Modify
// ============================================================================

#[test]
fn modify_overwrites_quantity_only() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 1, Side::Ask, 102, 10, 1))
        .unwrap();
    book.apply_update(&MarketUpdate::modify(1, 1, Some(Side::Ask), 102, 25))
        .unwrap();

    let order = book.resting(1).unwrap();
    assert_eq!(order.qty, 25);
    assert_eq!(order.price, 102);
    assert_eq!(order.side, Side::Ask);
    assert_eq!(book.best_ask().unwrap().qty, 25);
    assert_eq!(book.ask_level_count(), 1);
}

// ============================================================================
// Clear
// ============================================================================

fn populated_book() -> MarketOrderBook {
    let mut book = small_book();
    for (id, side, price) in [
        (1, Side::Bid, 100),
        (2, Side::Bid, 100),
        (3, Side::Bid, 99),
        (4, Side::Ask, 102),
        (5, Side::Ask, 103),
        (6, Side::Ask, 103),
    ] {
        book.apply_update(&MarketUpdate::add(1, id, side, price, 10, id))
            .unwrap();
    }
    book
}

#[test]
fn clear_empties_ladders_index_and_pools() {
    let mut book = populated_book();
    assert_eq!(book.order_count(), 6);
    assert_eq!(book.levels_live(), 4);

    book.apply_update(&MarketUpdate::clear(1)).unwrap();

    assert!(book.is_empty());
    assert_eq!(book.bid_level_count(), 0);
    assert_eq!(book.ask_level_count(), 0);
    assert_eq!(book.orders_live(), 0);
    assert_eq!(book.levels_live(), 0);
    assert_eq!(book.best_bid(), None);
    assert_eq!(book.best_ask(), None);
}

#[test]
fn clear_twice_is_idempotent() {
    let mut book = populated_book();
    book.apply_update(&MarketUpdate::clear(1)).unwrap();
    book.apply_update(&MarketUpdate::clear(1)).unwrap();

    assert!(book.is_empty());
    assert_eq!(book.orders_live(), 0);
    assert_eq!(book.levels_live(), 0);
}

#[test]
fn book_is_usable_after_clear() {
    let mut book = populated_book();
    book.apply_update(&MarketUpdate::clear(1)).unwrap();

    // Ids from before the clear are free again
    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 98, 4, 10))
        .unwrap();
    let best = book.best_bid().unwrap();
    assert_eq!((best.price, best.qty), (98, 4));
}

// ============================================================================
// Trade forwarding
// ============================================================================

#[test]
fn trade_forwards_without_touching_the_book() {
    let mut book = populated_book();
    let recording = attached(&mut book);

    let depth_before: Vec<_> = book.depth::<8>(Side::Bid).to_vec();
    book.apply_update(&MarketUpdate::trade(1, Some(Side::Bid), 100, 10))
        .unwrap();

    // Structure untouched
    assert_eq!(book.depth::<8>(Side::Bid).to_vec(), depth_before);
    assert_eq!(book.order_count(), 6);

    // Only the trade-forward fired; no generic book-update
    let rec = recording.borrow();
    assert_eq!(rec.trades.len(), 1);
    assert_eq!(rec.trades[0].kind, UpdateKind::Trade);
    assert_eq!(rec.trades[0].price, 100);
    assert!(rec.updates.is_empty());
}

#[test]
fn structural_events_notify_with_book_access() {
    let mut book = small_book();
    let recording = attached(&mut book);

    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 100, 10, 1))
        .unwrap();
    book.apply_update(&MarketUpdate::add(1, 2, Side::Bid, 100, 5, 2))
        .unwrap();

    let rec = recording.borrow();
    assert_eq!(
        rec.updates,
        vec![(1, 100, Some(Side::Bid)), (1, 100, Some(Side::Bid))]
    );
    // The listener read live state through the book borrow
    assert_eq!(rec.last_best_bid_qty, Some(15));
    assert!(rec.last_bbo.is_some());
}

#[test]
fn dropped_events_do_not_notify() {
    let mut book = small_book();
    let recording = attached(&mut book);

    let err = book.apply_update(&MarketUpdate::cancel(1, 42, Some(Side::Bid), 100));
    assert_eq!(
        err,
        Err(BookError::UnknownOrder {
            kind: UpdateKind::Cancel,
            order_id: 42
        })
    );
    assert!(recording.borrow().updates.is_empty());
}

#[test]
fn detached_listener_is_skipped() {
    let mut book = small_book();
    let recording = attached(&mut book);
    book.detach_listener();

    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 100, 10, 1))
        .unwrap();
    book.apply_update(&MarketUpdate::trade(1, Some(Side::Bid), 100, 1))
        .unwrap();

    let rec = recording.borrow();
    assert!(rec.updates.is_empty());
    assert!(rec.trades.is_empty());
}

#[test]
fn dead_listener_is_skipped() {
    let mut book = small_book();
    {
        let listener: Rc<RefCell<dyn BookListener>> =
            Rc::new(RefCell::new(Recording::default()));
        book.attach_listener(&listener);
        // `listener` dropped here; the book holds only a Weak
    }
    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 100, 10, 1))
        .unwrap();
    assert_eq!(book.order_count(), 1);
}

// ============================================================================
// BBO cache evaluation order
// ============================================================================

#[test]
fn bbo_cache_skips_the_first_add_on_an_empty_side() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 100, 10, 1))
        .unwrap();

    // No pre-mutation best existed to compare against, so the cache
    // was not refreshed; the derived accessor is current regardless.
    assert_eq!(book.bbo().bid, None);
    assert_eq!(book.best_bid().unwrap().price, 100);

    // The next event at the best catches the cache up
    book.apply_update(&MarketUpdate::add(1, 2, Side::Bid, 100, 5, 2))
        .unwrap();
    let cached = book.bbo().bid.unwrap();
    assert_eq!((cached.price, cached.qty, cached.orders), (100, 15, 2));
}

#[test]
fn bbo_cache_refreshes_on_a_best_improving_add() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 100, 10, 1))
        .unwrap();
    book.apply_update(&MarketUpdate::add(1, 2, Side::Bid, 101, 5, 2))
        .unwrap();

    // 101 beat the pre-mutation best of 100, so the bid side refreshed
    let cached = book.bbo().bid.unwrap();
    assert_eq!((cached.price, cached.qty), (101, 5));
}

#[test]
fn bbo_cache_ignores_deep_book_changes() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 1, Side::Ask, 102, 10, 1))
        .unwrap();
    book.apply_update(&MarketUpdate::add(1, 2, Side::Ask, 102, 3, 2))
        .unwrap();
    let cached_before = book.bbo().ask;

    // Worse-priced add must not recompute the ask cache
    book.apply_update(&MarketUpdate::add(1, 3, Side::Ask, 110, 50, 3))
        .unwrap();
    assert_eq!(book.bbo().ask, cached_before);
}

#[test]
fn bbo_cache_tracks_cancel_at_the_best() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 1, Side::Ask, 102, 10, 1))
        .unwrap();
    book.apply_update(&MarketUpdate::add(1, 2, Side::Ask, 103, 7, 2))
        .unwrap();
    book.apply_update(&MarketUpdate::add(1, 3, Side::Ask, 102, 5, 3))
        .unwrap();

    book.apply_update(&MarketUpdate::cancel(1, 1, Some(Side::Ask), 102))
        .unwrap();
    let cached = book.bbo().ask.unwrap();
    assert_eq!((cached.price, cached.qty), (102, 5));

    // Canceling the whole best level promotes the next one
    book.apply_update(&MarketUpdate::cancel(1, 3, Some(Side::Ask), 102))
        .unwrap();
    let cached = book.bbo().ask.unwrap();
    assert_eq!((cached.price, cached.qty), (103, 7));
}

#[test]
fn clear_leaves_the_cache_for_the_next_touch() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 1, Side::Bid, 100, 10, 1))
        .unwrap();
    book.apply_update(&MarketUpdate::add(1, 2, Side::Bid, 100, 5, 2))
        .unwrap();
    assert!(book.bbo().bid.is_some());

    // CLEAR carries no side, so neither cache side is refreshed; the
    // derived view empties immediately.
    book.apply_update(&MarketUpdate::clear(1)).unwrap();
    assert!(book.bbo().bid.is_some());
    assert_eq!(book.best_bid(), None);
}

// ============================================================================
// Markers and protocol violations
// ============================================================================

#[test]
fn snapshot_markers_are_structural_noops() {
    let mut book = populated_book();
    let recording = attached(&mut book);
    let depth_before: Vec<_> = book.depth::<8>(Side::Ask).to_vec();

    book.apply_update(&MarketUpdate::snapshot_start(1)).unwrap();
    book.apply_update(&MarketUpdate::snapshot_end(1)).unwrap();
    book.apply_update(&MarketUpdate::invalid(1)).unwrap();

    assert_eq!(book.depth::<8>(Side::Ask).to_vec(), depth_before);
    assert_eq!(book.order_count(), 6);
    // Markers still flow through to the collaborator
    assert_eq!(recording.borrow().updates.len(), 3);
}

#[test]
fn duplicate_add_leaves_the_original_resting() {
    let mut book = small_book();
    book.apply_update(&MarketUpdate::add(1, 7, Side::Bid, 100, 10, 1))
        .unwrap();
    let err = book.apply_update(&MarketUpdate::add(1, 7, Side::Ask, 102, 5, 2));

    assert_eq!(err, Err(BookError::DuplicateOrder { order_id: 7 }));
    let original = book.resting(7).unwrap();
    assert_eq!((original.side, original.price, original.qty), (Side::Bid, 100, 10));
    assert_eq!(book.orders_live(), 1);
    assert_eq!(book.ask_level_count(), 0);
}

#[test]
fn out_of_range_id_is_rejected_for_every_kind() {
    let mut book = small_book();
    let id = 256; // == max_order_ids

    assert!(matches!(
        book.apply_update(&MarketUpdate::add(1, id, Side::Bid, 100, 10, 1)),
        Err(BookError::IdOutOfRange { .. })
    ));
    assert!(matches!(
        book.apply_update(&MarketUpdate::modify(1, id, Some(Side::Bid), 100, 5)),
        Err(BookError::IdOutOfRange { .. })
    ));
    assert!(matches!(
        book.apply_update(&MarketUpdate::cancel(1, id, Some(Side::Bid), 100)),
        Err(BookError::IdOutOfRange { .. })
    ));
    assert!(book.is_empty());
}
