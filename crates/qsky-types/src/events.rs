//! Inbound one-way event payloads.
//!
//! These mirror the calls branch servers make. None of them returns a
//! failure to the caller except [`PingReply`], which is a capability answer.

use serde::{Deserialize, Serialize};

use crate::ids::{BranchId, CustomerId, EmployeeId, ServiceId};

/// A customer changed state at a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Branch the event comes from.
    pub branch_id: BranchId,
    /// Service queue the event refers to, if any.
    pub service_id: Option<ServiceId>,
    /// Operator who caused the change, if any.
    pub employee_id: Option<EmployeeId>,
    /// Customer whose state changed.
    pub customer_id: CustomerId,
    /// Raw wire code of the new state.
    pub status: i32,
    /// Ticket number, sent with queueing events.
    pub number: Option<i32>,
    /// Ticket prefix, sent with queueing events.
    pub prefix: Option<String>,
}

/// Splice a customer into the branch ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertCustomer {
    /// Branch of the ordering.
    pub branch_id: BranchId,
    /// Service assigned when the customer is created here.
    pub service_id: Option<ServiceId>,
    /// Customer being placed.
    pub customer_id: CustomerId,
    /// Customer that should precede it, if any.
    pub before: Option<CustomerId>,
    /// Customer that should follow it, if any.
    pub after: Option<CustomerId>,
}

/// Detach a customer from the branch ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveCustomer {
    /// Branch of the ordering.
    pub branch_id: BranchId,
    /// Service the customer was queued for (informational).
    pub service_id: Option<ServiceId>,
    /// Customer being removed.
    pub customer_id: CustomerId,
}

/// Answer to a client version handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingReply {
    /// Whether the client version lies in the supported range.
    pub supported: bool,
}

impl PingReply {
    /// Legacy numeric code: `1` when supported, `-1` otherwise.
    pub const fn code(self) -> i32 {
        if self.supported { 1 } else { -1 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_change_decodes_from_json() {
        let json = r#"{"branch_id":1,"service_id":10,"employee_id":null,"customer_id":555,"status":1,"number":42,"prefix":"A"}"#;
        let event: Result<StatusChange, _> = serde_json::from_str(json);
        let event = event.ok();
        assert_eq!(event.as_ref().map(|e| e.customer_id), Some(CustomerId(555)));
        assert_eq!(event.as_ref().and_then(|e| e.employee_id), None);
        assert_eq!(event.and_then(|e| e.prefix), Some("A".to_owned()));
    }

    #[test]
    fn ping_reply_codes() {
        assert_eq!(PingReply { supported: true }.code(), 1);
        assert_eq!(PingReply { supported: false }.code(), -1);
    }
}
