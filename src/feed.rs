//! Coinbase L3 tape translation (Tardis CSV export) into market updates.
//!
//! Replay-side tooling. Raw exchange rows carry UUID order ids and
//! decimal prices; the translator scales prices to fixed point, remaps
//! ids into the bounded space the direct order index requires, and
//! stamps arrival priorities. Translated updates must be applied in
//! row order: a freed id can be handed to the very next `open` row.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use tracing::warn;

use crate::event::{InstrumentId, MarketUpdate, OrderId, Price, Priority, Qty, Side};

/// Quantities are scaled to 8 decimal places (satoshi-style sizes).
const QTY_SCALE: u64 = 100_000_000;

/// One row of a Tardis-format L3 export.
#[derive(Debug, Deserialize)]
pub struct TardisL3Row {
    pub r#type: String,
    pub side: Option<String>,
    pub price: Option<Decimal>,
    pub amount: Option<Decimal>,
    pub order_id: Option<String>,
    pub trade_id: Option<u64>,
    pub timestamp: Option<DateTime<Utc>>,
    pub local_timestamp: Option<u64>,
}

/// Stateful row translator for one instrument's tape.
///
/// `open` binds a raw id to a dense one, `done` releases it for reuse;
/// rows referencing ids never opened (partial tapes start mid-session)
/// are skipped.
pub struct FeedTranslator {
    instrument_id: InstrumentId,
    price_mult: u64,
    next_priority: Priority,
    ids: FxHashMap<String, OrderId>,
    free_ids: Vec<OrderId>,
    next_id: OrderId,
    max_order_ids: u32,
}

impl FeedTranslator {
    /// `price_mult` is the fixed-point multiplier (100 = cents).
    pub fn new(instrument_id: InstrumentId, price_mult: u64, max_order_ids: u32) -> Self {
        Self {
            instrument_id,
            price_mult,
            next_priority: 0,
            ids: FxHashMap::default(),
            free_ids: Vec::new(),
            next_id: 0,
            max_order_ids,
        }
    }

    /// Convert one raw row into a typed update, or `None` for rows the
    /// book has no use for (acks, unknown references, malformed rows).
    pub fn translate(&mut self, row: &TardisL3Row) -> Option<MarketUpdate> {
        let side = match row.side.as_deref() {
            Some("buy") | Some("bid") => Some(Side::Bid),
            Some("sell") | Some("ask") => Some(Side::Ask),
            _ => None,
        };
        let price = scale_price(row.price, self.price_mult);
        let qty = scale_qty(row.amount);

        match row.r#type.as_str() {
            "open" => {
                // Validate before binding so a malformed row cannot
                // leak a dense id with no resting order behind it.
                let (side, price, qty) = (side?, price?, qty?);
                let id = self.bind(row.order_id.as_deref()?)?;
                Some(MarketUpdate::add(
                    self.instrument_id,
                    id,
                    side,
                    price,
                    qty,
                    self.next_priority(),
                ))
            }
            "change" => {
                let id = self.lookup(row.order_id.as_deref()?)?;
                Some(MarketUpdate::modify(
                    self.instrument_id,
                    id,
                    side,
                    price.unwrap_or(0),
                    qty?,
                ))
            }
            "done" => {
                let id = self.unbind(row.order_id.as_deref()?)?;
                // Market orders finish with no price on the row
                Some(MarketUpdate::cancel(
                    self.instrument_id,
                    id,
                    side,
                    price.unwrap_or(0),
                ))
            }
            "match" => Some(MarketUpdate::trade(
                self.instrument_id,
                side,
                price?,
                qty?,
            )),
            // "received" is a gateway ack; the order is not on the book
            // until "open".
            _ => None,
        }
    }

    /// Arrival rank of the next resting order.
    fn next_priority(&mut self) -> Priority {
        self.next_priority += 1;
        self.next_priority
    }

    fn bind(&mut self, raw: &str) -> Option<OrderId> {
        if self.ids.contains_key(raw) {
            warn!(raw, "open for an id already live; row skipped");
            return None;
        }
        let id = match self.free_ids.pop() {
            Some(id) => id,
            None => {
                if self.next_id >= self.max_order_ids as u64 {
                    warn!(raw, "dense id space exhausted; row skipped");
                    return None;
                }
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        };
        self.ids.insert(raw.to_owned(), id);
        Some(id)
    }

    fn lookup(&self, raw: &str) -> Option<OrderId> {
        self.ids.get(raw).copied()
    }

    fn unbind(&mut self, raw: &str) -> Option<OrderId> {
        let id = self.ids.remove(raw)?;
        self.free_ids.push(id);
        Some(id)
    }

    /// Number of raw ids currently bound.
    pub fn live_ids(&self) -> usize {
        self.ids.len()
    }
}

fn scale_price(value: Option<Decimal>, mult: u64) -> Option<Price> {
    value.and_then(|d| (d * Decimal::from(mult)).to_u64())
}

fn scale_qty(value: Option<Decimal>) -> Option<Qty> {
    value.and_then(|d| (d * Decimal::from(QTY_SCALE)).to_u32())
}
