//! Drop-reasons for events the book refuses to apply.

use thiserror::Error;

use crate::event::{OrderId, UpdateKind};

/// Upstream protocol violations the book detects and drops instead of
/// dereferencing stale state.
///
/// Capacity exhaustion is deliberately absent: an exhausted pool is a
/// sizing defect and fatal (see [`crate::pool::Pool::alloc`]), never a
/// droppable event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BookError {
    /// MODIFY or CANCEL referenced an identifier the index does not
    /// hold. Can arise from upstream replay bugs; must not take the
    /// book down.
    #[error("{kind:?} references unknown order {order_id}")]
    UnknownOrder { kind: UpdateKind, order_id: OrderId },

    /// ADD carried an identifier that is already resting.
    #[error("duplicate ADD for resting order {order_id}")]
    DuplicateOrder { order_id: OrderId },

    /// The identifier does not fit the configured bounded id space.
    #[error("order id {order_id} outside configured id space of {max_order_ids}")]
    IdOutOfRange { order_id: OrderId, max_order_ids: u32 },

    /// ADD arrived without a side; it cannot be placed in a ladder.
    #[error("{kind:?} for order {order_id} is missing a side")]
    MissingSide { kind: UpdateKind, order_id: OrderId },
}
