//! Persisted records.
//!
//! Customers and steps both form doubly-linked lists. The links are stored
//! as identifiers rather than references: a customer points at its queue
//! neighbors by [`CustomerId`] (neighbors always share the branch), and a
//! step points at its chain neighbors by [`StepId`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::CustomerState;
use crate::ids::{BranchId, CustomerId, CustomerKey, EmployeeId, ServiceId, StepId};

/// One active visit record, keyed by `(branch_id, customer_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Branch the customer is visiting.
    pub branch_id: BranchId,
    /// Branch-assigned customer identifier.
    pub customer_id: CustomerId,
    /// Service queue the customer currently belongs to.
    pub service_id: Option<ServiceId>,
    /// Ticket number printed for the customer.
    pub number: Option<i32>,
    /// Ticket prefix printed before the number.
    pub prefix: Option<String>,
    /// Current lifecycle state; `None` until the first status event.
    pub state: Option<CustomerState>,
    /// Operator currently or most recently assigned.
    pub employee_id: Option<EmployeeId>,
    /// Previous customer in the branch ordering.
    pub before: Option<CustomerId>,
    /// Next customer in the branch ordering.
    pub after: Option<CustomerId>,
    /// Head of this customer's step chain.
    pub first_step: Option<StepId>,
    /// Running average of waiting durations, in milliseconds.
    pub waiting_avg: i64,
    /// Running average of working durations, in milliseconds.
    pub working_avg: i64,
}

impl Customer {
    /// Create an empty record for a customer seen for the first time.
    pub const fn new(key: CustomerKey) -> Self {
        Self {
            branch_id: key.branch_id,
            customer_id: key.customer_id,
            service_id: None,
            number: None,
            prefix: None,
            state: None,
            employee_id: None,
            before: None,
            after: None,
            first_step: None,
            waiting_avg: 0,
            working_avg: 0,
        }
    }

    /// The composite key of this record.
    pub const fn key(&self) -> CustomerKey {
        CustomerKey::new(self.branch_id, self.customer_id)
    }

    /// Whether the customer has a neighbor on either side.
    pub const fn is_linked(&self) -> bool {
        self.before.is_some() || self.after.is_some()
    }

    /// Human-readable ticket label, e.g. `A42`.
    pub fn ticket(&self) -> String {
        let prefix = self.prefix.as_deref().unwrap_or("");
        self.number
            .map_or_else(|| prefix.to_owned(), |n| format!("{prefix}{n}"))
    }
}

/// One stage of a customer's visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Unique step identifier.
    pub id: StepId,
    /// Branch of the owning customer.
    pub branch_id: BranchId,
    /// Owning customer.
    pub customer_id: CustomerId,
    /// Service queue this stage belongs to.
    pub service_id: Option<ServiceId>,
    /// Operator who worked or closed this stage.
    pub employee_id: Option<EmployeeId>,
    /// When the customer entered this stage.
    pub stand_time: DateTime<Utc>,
    /// When active work on this stage began.
    pub start_time: Option<DateTime<Utc>>,
    /// When this stage ended.
    pub finish_time: Option<DateTime<Utc>>,
    /// Status that opened this stage.
    pub start_state: CustomerState,
    /// Status that closed this stage.
    pub finish_state: Option<CustomerState>,
    /// Measured waiting duration in milliseconds.
    pub waiting: Option<i64>,
    /// Measured working duration in milliseconds.
    pub working: Option<i64>,
    /// Previous step in the chain.
    pub before: Option<StepId>,
    /// Next step in the chain; `None` on the tail.
    pub after: Option<StepId>,
}

impl Step {
    /// Open a fresh, unlinked stage for a customer.
    pub fn open(
        key: CustomerKey,
        service_id: Option<ServiceId>,
        start_state: CustomerState,
        stand_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: StepId::new(),
            branch_id: key.branch_id,
            customer_id: key.customer_id,
            service_id,
            employee_id: None,
            stand_time,
            start_time: None,
            finish_time: None,
            start_state,
            finish_state: None,
            waiting: None,
            working: None,
            before: None,
            after: None,
        }
    }

    /// Key of the owning customer.
    pub const fn customer_key(&self) -> CustomerKey {
        CustomerKey::new(self.branch_id, self.customer_id)
    }

    /// Whether the stage has been closed.
    pub const fn is_closed(&self) -> bool {
        self.finish_time.is_some()
    }
}

/// Display name of a service queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceName {
    /// Branch the service belongs to.
    pub branch_id: BranchId,
    /// Service identifier.
    pub service_id: ServiceId,
    /// Display name.
    pub name: String,
}

/// Display name of an operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployeeName {
    /// Branch the operator works at.
    pub branch_id: BranchId,
    /// Operator identifier.
    pub employee_id: EmployeeId,
    /// Display name.
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> CustomerKey {
        CustomerKey::new(BranchId(1), CustomerId(555))
    }

    #[test]
    fn new_customer_is_blank() {
        let customer = Customer::new(key());
        assert_eq!(customer.key(), key());
        assert!(!customer.is_linked());
        assert_eq!(customer.first_step, None);
        assert_eq!(customer.waiting_avg, 0);
        assert_eq!(customer.working_avg, 0);
    }

    #[test]
    fn ticket_joins_prefix_and_number() {
        let mut customer = Customer::new(key());
        customer.prefix = Some("A".to_owned());
        customer.number = Some(42);
        assert_eq!(customer.ticket(), "A42");
        customer.prefix = None;
        assert_eq!(customer.ticket(), "42");
    }

    #[test]
    fn opened_step_is_unlinked_and_open() {
        let now = Utc::now();
        let step = Step::open(key(), Some(ServiceId(10)), CustomerState::Wait, now);
        assert_eq!(step.customer_key(), key());
        assert_eq!(step.stand_time, now);
        assert!(!step.is_closed());
        assert_eq!(step.before, None);
        assert_eq!(step.after, None);
    }
}
