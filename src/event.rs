//! Market update vocabulary shared by the book and its collaborators.
//!
//! Updates arrive from the upstream sequencer as a single ordered
//! stream per instrument; the kinds that do not mutate book structure
//! (trade prints, snapshot markers) still travel through the same
//! record so ordering is preserved end to end.

/// Order identifier, unique within the active book. Bounded by
/// configuration so the order index can be a direct array.
pub type OrderId = u64;

/// Tradable instrument identifier.
pub type InstrumentId = u32;

/// Fixed-point price (e.g., $100.50 -> 10050 with 2 decimal places)
pub type Price = u64;

/// Order quantity.
pub type Qty = u32;

/// Monotonically increasing arrival rank; establishes FIFO order among
/// orders at the same price.
pub type Priority = u64;

/// Order side (bid = buy, ask = sell)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    /// Buy side (bids)
    Bid = 0,
    /// Sell side (asks)
    Ask = 1,
}

impl Side {
    /// Returns the opposite side
    #[inline]
    pub const fn opposite(self) -> Self {
        match self {
            Side::Bid => Side::Ask,
            Side::Ask => Side::Bid,
        }
    }

    /// `true` when `lhs` is a strictly better price than `rhs` on this
    /// side: higher for bids, lower for asks.
    #[inline]
    pub const fn better(self, lhs: Price, rhs: Price) -> bool {
        match self {
            Side::Bid => lhs > rhs,
            Side::Ask => lhs < rhs,
        }
    }
}

/// Discriminant of a market update.
///
/// Every kind has an explicit arm in the book's dispatch. `Invalid`
/// and the snapshot markers are structural no-ops reserved for the
/// external snapshot/recovery protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum UpdateKind {
    Invalid = 0,
    /// Full book reset (session reset), not per-trade.
    Clear,
    Add,
    Modify,
    Cancel,
    /// Informational print; the structural effect arrives separately
    /// as MODIFY/CANCEL.
    Trade,
    SnapshotStart,
    SnapshotEnd,
}

/// A single entry of the ordered per-instrument event stream.
///
/// Fields not meaningful for a kind are zeroed (`side` is `None`); the
/// record is a flat POD so it moves through ring buffers by copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarketUpdate {
    pub kind: UpdateKind,
    pub order_id: OrderId,
    pub instrument_id: InstrumentId,
    pub side: Option<Side>,
    pub price: Price,
    pub qty: Qty,
    pub priority: Priority,
}

impl MarketUpdate {
    pub const fn add(
        instrument_id: InstrumentId,
        order_id: OrderId,
        side: Side,
        price: Price,
        qty: Qty,
        priority: Priority,
    ) -> Self {
        Self {
            kind: UpdateKind::Add,
            order_id,
            instrument_id,
            side: Some(side),
            price,
            qty,
            priority,
        }
    }

    pub const fn modify(
        instrument_id: InstrumentId,
        order_id: OrderId,
        side: Option<Side>,
        price: Price,
        qty: Qty,
    ) -> Self {
        Self {
            kind: UpdateKind::Modify,
            order_id,
            instrument_id,
            side,
            price,
            qty,
            priority: 0,
        }
    }

    pub const fn cancel(
        instrument_id: InstrumentId,
        order_id: OrderId,
        side: Option<Side>,
        price: Price,
    ) -> Self {
        Self {
            kind: UpdateKind::Cancel,
            order_id,
            instrument_id,
            side,
            price,
            qty: 0,
            priority: 0,
        }
    }

    pub const fn trade(
        instrument_id: InstrumentId,
        side: Option<Side>,
        price: Price,
        qty: Qty,
    ) -> Self {
        Self {
            kind: UpdateKind::Trade,
            order_id: 0,
            instrument_id,
            side,
            price,
            qty,
            priority: 0,
        }
    }

    pub const fn clear(instrument_id: InstrumentId) -> Self {
        Self::marker(UpdateKind::Clear, instrument_id)
    }

    pub const fn snapshot_start(instrument_id: InstrumentId) -> Self {
        Self::marker(UpdateKind::SnapshotStart, instrument_id)
    }

    pub const fn snapshot_end(instrument_id: InstrumentId) -> Self {
        Self::marker(UpdateKind::SnapshotEnd, instrument_id)
    }

    pub const fn invalid(instrument_id: InstrumentId) -> Self {
        Self::marker(UpdateKind::Invalid, instrument_id)
    }

    const fn marker(kind: UpdateKind, instrument_id: InstrumentId) -> Self {
        Self {
            kind,
            order_id: 0,
            instrument_id,
            side: None,
            price: 0,
            qty: 0,
            priority: 0,
        }
    }
}
