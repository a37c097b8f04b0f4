//! Listener seam between the book and the matching collaborator.

use crate::book::MarketOrderBook;
use crate::event::{InstrumentId, MarketUpdate, Price, Side};

/// Downstream half of the book's contract.
///
/// The book holds a non-owning handle to its listener (see
/// [`MarketOrderBook::attach_listener`]): trade prints are forwarded
/// verbatim, and every structural mutation is followed by a callback
/// carrying a borrow of the book so the collaborator can read the
/// resulting BBO and depth. The borrow is read-only; the listener gets
/// no mutation rights into the book.
pub trait BookListener {
    /// A TRADE event passed through untouched. The book applied no
    /// structural change for it; the structural effect arrives as
    /// separate MODIFY/CANCEL events.
    fn on_trade_forward(&mut self, update: &MarketUpdate);

    /// The book just applied an event at `price`/`side`.
    fn on_book_update(
        &mut self,
        instrument_id: InstrumentId,
        price: Price,
        side: Option<Side>,
        book: &MarketOrderBook,
    );
}
