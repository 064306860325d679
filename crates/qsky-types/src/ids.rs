//! Type-safe identifier wrappers.
//!
//! Branch, service, employee and customer identifiers arrive from the branch
//! servers as 64-bit integers and are wrapped so they cannot be mixed up at
//! compile time. Steps are created on this side and use UUID v7
//! (time-ordered) identifiers, which keeps the chain table index-friendly.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around an `i64` key assigned by a branch.
macro_rules! define_key {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Return the inner integer value.
            pub const fn into_inner(self) -> i64 {
                self.0
            }

            /// Whether the key is a real (strictly positive) identifier.
            ///
            /// Branch servers send `0` or negative values for "not set".
            pub const fn is_assigned(self) -> bool {
                self.0 > 0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_key! {
    /// Identifier of a physical service location.
    BranchId
}

define_key! {
    /// Identifier of a queue category within a branch.
    ServiceId
}

define_key! {
    /// Identifier of an operator working a counter.
    EmployeeId
}

define_key! {
    /// Identifier of a customer visit, unique within a branch.
    CustomerId
}

/// Unique identifier of a step record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub Uuid);

impl StepId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Return the inner [`Uuid`] value.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for StepId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for StepId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for StepId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Composite key of a customer record: customers are unique per branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomerKey {
    /// Branch the customer is visiting.
    pub branch_id: BranchId,
    /// Branch-assigned customer identifier.
    pub customer_id: CustomerId,
}

impl CustomerKey {
    /// Build a key from its two parts.
    pub const fn new(branch_id: BranchId, customer_id: CustomerId) -> Self {
        Self {
            branch_id,
            customer_id,
        }
    }
}

impl core::fmt::Display for CustomerKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.branch_id, self.customer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_serialize_as_bare_integers() {
        let json = serde_json::to_string(&CustomerId(555)).ok();
        assert_eq!(json.as_deref(), Some("555"));
    }

    #[test]
    fn unassigned_keys_are_detected() {
        assert!(!ServiceId(0).is_assigned());
        assert!(!ServiceId(-1).is_assigned());
        assert!(ServiceId(10).is_assigned());
    }

    #[test]
    fn step_ids_are_distinct() {
        let first = StepId::new();
        let second = StepId::new();
        assert_ne!(first, second);
    }

    #[test]
    fn customer_key_display() {
        let key = CustomerKey::new(BranchId(1), CustomerId(555));
        assert_eq!(key.to_string(), "1/555");
    }
}
