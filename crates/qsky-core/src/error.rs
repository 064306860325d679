//! Errors raised while processing a branch event.
//!
//! None of these reach the branch server: the event API is one-way, so the
//! processor logs them and rolls the unit of work back. They are public so
//! that tests and replay tools can assert on them through
//! [`CustomerEvents::process_status_change`].
//!
//! [`CustomerEvents::process_status_change`]: crate::processor::CustomerEvents::process_status_change

use qsky_db::DbError;
use qsky_types::{BranchId, CustomerId, CustomerKey, StepId, UnknownState};

/// Errors that abort one unit of work.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    /// The status code is not in the lifecycle table.
    #[error(transparent)]
    UnknownStatus(#[from] UnknownState),

    /// The event refers to a customer that was never registered.
    #[error("customer {key} not found")]
    CustomerNotFound {
        /// Key of the missing customer.
        key: CustomerKey,
    },

    /// The customer has no step chain to work on.
    #[error("customer {key} has no steps")]
    EmptyChain {
        /// Key of the customer.
        key: CustomerKey,
    },

    /// The stored step chain does not form a single linked list.
    #[error("step chain of customer {key} is broken: {reason}")]
    BrokenChain {
        /// Key of the customer.
        key: CustomerKey,
        /// What was found.
        reason: String,
    },

    /// A working stage is being closed but was never started.
    #[error("step {step} of customer {key} has no start time")]
    MissingStartTime {
        /// Key of the customer.
        key: CustomerKey,
        /// The step being closed.
        step: StepId,
    },

    /// A splice names the customer as its own neighbor.
    #[error("customer {key} cannot be spliced: {reason}")]
    InvalidSplice {
        /// Key of the customer.
        key: CustomerKey,
        /// Why the splice is invalid.
        reason: &'static str,
    },

    /// A splice between two customers that are not next to each other.
    #[error("customers {before} and {after} are not adjacent; cannot place {key} between them")]
    NotAdjacent {
        /// Key of the customer being placed.
        key: CustomerKey,
        /// Requested predecessor.
        before: CustomerId,
        /// Requested successor.
        after: CustomerId,
    },

    /// The branch ordering contains a dangling or cyclic link.
    #[error("queue of branch {branch_id} is broken at customer {customer_id}")]
    BrokenQueue {
        /// Branch of the ordering.
        branch_id: BranchId,
        /// First customer where the walk failed.
        customer_id: CustomerId,
    },

    /// The store failed; the unit of work was not applied.
    #[error("store error: {0}")]
    Store(#[from] DbError),
}
