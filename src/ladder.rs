//! Price ladder - circular price-level chain with per-level order FIFOs.
//!
//! One ladder per side. Levels form a circular doubly linked list in
//! best-first price order (descending for bids, ascending for asks);
//! the orders at one price form a circular FIFO in arrival-priority
//! order, so "next of tail" wraps back to the head. All links are pool
//! handles resolved through the pools, keeping splice and unsplice O(1)
//! with no ownership ambiguity.

use crate::event::{OrderId, Price, Priority, Qty, Side};
use crate::pool::{Pool, PoolIndex, NULL_INDEX};

pub type OrderPool = Pool<OrderNode>;
pub type LevelPool = Pool<LevelNode>;

/// A resting order, linked into exactly one level's FIFO.
#[derive(Clone, Copy, Debug)]
pub struct OrderNode {
    pub order_id: OrderId,
    pub side: Side,
    pub price: Price,
    pub qty: Qty,
    pub priority: Priority,
    /// Owning level, kept so cancel never re-walks the ladder.
    pub level: PoolIndex,
    /// Previous order at the same price (circular)
    pub prev: PoolIndex,
    /// Next order at the same price (circular)
    pub next: PoolIndex,
}

impl Default for OrderNode {
    fn default() -> Self {
        Self {
            order_id: 0,
            side: Side::Bid,
            price: 0,
            qty: 0,
            priority: 0,
            level: NULL_INDEX,
            prev: NULL_INDEX,
            next: NULL_INDEX,
        }
    }
}

/// Aggregation node for all orders sharing one price on one side.
/// Exists only while at least one order rests at its price.
#[derive(Clone, Copy, Debug)]
pub struct LevelNode {
    pub side: Side,
    pub price: Price,
    /// Oldest order at this price (FIFO head)
    pub first_order: PoolIndex,
    /// Previous level on this side (circular; head's prev is the worst)
    pub prev: PoolIndex,
    /// Next (worse-priced) level on this side (circular)
    pub next: PoolIndex,
}

impl Default for LevelNode {
    fn default() -> Self {
        Self {
            side: Side::Bid,
            price: 0,
            first_order: NULL_INDEX,
            prev: NULL_INDEX,
            next: NULL_INDEX,
        }
    }
}

/// Aggregate quote of one price level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LevelQuote {
    pub price: Price,
    pub qty: u64,
    pub orders: u32,
}

/// Price, aggregate quantity and order count of one level, summed over
/// its FIFO.
pub fn quote_of(orders: &OrderPool, levels: &LevelPool, level_idx: PoolIndex) -> LevelQuote {
    let level = levels.get(level_idx);
    let first = level.first_order;
    let mut qty = 0u64;
    let mut count = 0u32;
    let mut at = first;
    loop {
        let node = orders.get(at);
        qty += node.qty as u64;
        count += 1;
        at = node.next;
        if at == first {
            break;
        }
    }
    LevelQuote {
        price: level.price,
        qty,
        orders: count,
    }
}

/// One side's price-ordered circular chain of levels, best first.
pub struct Ladder {
    side: Side,
    head: PoolIndex,
}

impl Ladder {
    pub const fn new(side: Side) -> Self {
        Self {
            side,
            head: NULL_INDEX,
        }
    }

    #[inline]
    pub const fn side(&self) -> Side {
        self.side
    }

    /// Best level of this side, or `NULL_INDEX`.
    #[inline]
    pub const fn head(&self) -> PoolIndex {
        self.head
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.head == NULL_INDEX
    }

    /// Link a freshly allocated order into the ladder.
    ///
    /// Walks from the best level toward worse prices to find the
    /// order's level. Exchange price grids are sparse and the touched
    /// level is almost always near the top, so the walk is short; a
    /// price worse than everything resting wraps around and splices in
    /// front of the head positionally, i.e. at the tail.
    ///
    /// # Complexity
    /// O(distance from best) to locate, O(1) to splice
    pub fn insert_order(
        &mut self,
        orders: &mut OrderPool,
        levels: &mut LevelPool,
        order_idx: PoolIndex,
    ) {
        let price = orders.get(order_idx).price;
        debug_assert_eq!(orders.get(order_idx).side, self.side);
        debug_assert_eq!(orders.get(order_idx).level, NULL_INDEX, "order already linked");

        if self.head == NULL_INDEX {
            let level_idx = new_level(levels, self.side, price, order_idx);
            let level = levels.get_mut(level_idx);
            level.prev = level_idx;
            level.next = level_idx;
            self.head = level_idx;
            link_only_order(orders, order_idx, level_idx);
            return;
        }

        // Find the level owning `price`, or the first worse level to
        // splice in front of.
        let mut at = self.head;
        let mut wrapped = false;
        loop {
            let level = levels.get(at);
            if level.price == price {
                append_order(orders, levels, at, order_idx);
                return;
            }
            if self.side.better(price, level.price) {
                break;
            }
            at = level.next;
            if at == self.head {
                wrapped = true;
                break;
            }
        }

        let level_idx = new_level(levels, self.side, price, order_idx);
        splice_level_before(levels, at, level_idx);
        if at == self.head && !wrapped {
            // Better than the old best
            self.head = level_idx;
        }
        link_only_order(orders, order_idx, level_idx);
    }

    /// Unlink an order and release it; when its level empties, the
    /// level is unspliced and released too.
    ///
    /// # Complexity
    /// O(1)
    pub fn remove_order(
        &mut self,
        orders: &mut OrderPool,
        levels: &mut LevelPool,
        order_idx: PoolIndex,
    ) {
        let node = *orders.get(order_idx);
        debug_assert_eq!(node.side, self.side);
        debug_assert!(node.level != NULL_INDEX, "order not linked");

        if node.next == order_idx {
            // Last order at its price: the level goes with it
            debug_assert_eq!(node.prev, order_idx);
            debug_assert_eq!(levels.get(node.level).first_order, order_idx);
            self.remove_level(levels, node.level);
        } else {
            orders.get_mut(node.prev).next = node.next;
            orders.get_mut(node.next).prev = node.prev;
            let level = levels.get_mut(node.level);
            if level.first_order == order_idx {
                level.first_order = node.next;
            }
        }

        orders.release(order_idx);
    }

    fn remove_level(&mut self, levels: &mut LevelPool, level_idx: PoolIndex) {
        let level = *levels.get(level_idx);
        if level.next == level_idx {
            debug_assert_eq!(self.head, level_idx);
            self.head = NULL_INDEX;
        } else {
            levels.get_mut(level.prev).next = level.next;
            levels.get_mut(level.next).prev = level.prev;
            if self.head == level_idx {
                self.head = level.next;
            }
        }
        levels.release(level_idx);
    }

    /// Release every level and transitively every order in one
    /// circular pass from head back to head; the head is reset to null.
    pub fn clear(&mut self, orders: &mut OrderPool, levels: &mut LevelPool) {
        if self.head == NULL_INDEX {
            return;
        }
        let mut at = self.head;
        loop {
            let level = *levels.get(at);

            let first = level.first_order;
            let mut o = first;
            loop {
                let next = orders.get(o).next;
                orders.release(o);
                if next == first {
                    break;
                }
                o = next;
            }

            levels.release(at);
            if level.next == self.head {
                break;
            }
            at = level.next;
        }
        self.head = NULL_INDEX;
    }

    /// Quote of the best level, or `None` for an empty side.
    pub fn best_quote(&self, orders: &OrderPool, levels: &LevelPool) -> Option<LevelQuote> {
        (self.head != NULL_INDEX).then(|| quote_of(orders, levels, self.head))
    }

    /// Walk levels best-first, calling `f` per level until it returns
    /// false or the walk wraps.
    pub fn for_each_level(
        &self,
        levels: &LevelPool,
        mut f: impl FnMut(PoolIndex, &LevelNode) -> bool,
    ) {
        if self.head == NULL_INDEX {
            return;
        }
        let mut at = self.head;
        loop {
            let level = levels.get(at);
            if !f(at, level) {
                return;
            }
            at = level.next;
            if at == self.head {
                return;
            }
        }
    }

    /// Level holding `price`, if one exists.
    pub fn find_level(&self, levels: &LevelPool, price: Price) -> Option<PoolIndex> {
        let mut found = None;
        self.for_each_level(levels, |idx, level| {
            if level.price == price {
                found = Some(idx);
                false
            } else {
                true
            }
        });
        found
    }

    /// Number of live levels on this side.
    pub fn level_count(&self, levels: &LevelPool) -> u32 {
        let mut count = 0;
        self.for_each_level(levels, |_, _| {
            count += 1;
            true
        });
        count
    }
}

fn new_level(
    levels: &mut LevelPool,
    side: Side,
    price: Price,
    first_order: PoolIndex,
) -> PoolIndex {
    let idx = levels.alloc();
    *levels.get_mut(idx) = LevelNode {
        side,
        price,
        first_order,
        prev: NULL_INDEX,
        next: NULL_INDEX,
    };
    idx
}

/// Make `order_idx` the sole, self-linked member of `level_idx`.
fn link_only_order(orders: &mut OrderPool, order_idx: PoolIndex, level_idx: PoolIndex) {
    let order = orders.get_mut(order_idx);
    order.level = level_idx;
    order.prev = order_idx;
    order.next = order_idx;
}

/// Append to the FIFO tail of an existing level (the head's prev),
/// preserving arrival priority.
fn append_order(
    orders: &mut OrderPool,
    levels: &mut LevelPool,
    level_idx: PoolIndex,
    order_idx: PoolIndex,
) {
    let first = levels.get(level_idx).first_order;
    let tail = orders.get(first).prev;
    debug_assert!(
        orders.get(order_idx).priority > orders.get(tail).priority,
        "arrival priority must be monotonic within a level"
    );

    orders.get_mut(tail).next = order_idx;
    orders.get_mut(first).prev = order_idx;
    let order = orders.get_mut(order_idx);
    order.level = level_idx;
    order.prev = tail;
    order.next = first;
}

/// Splice `new_idx` immediately in front of `at` in the circular chain.
fn splice_level_before(levels: &mut LevelPool, at: PoolIndex, new_idx: PoolIndex) {
    let prev = levels.get(at).prev;
    {
        let new = levels.get_mut(new_idx);
        new.prev = prev;
        new.next = at;
    }
    levels.get_mut(prev).next = new_idx;
    levels.get_mut(at).prev = new_idx;
}
