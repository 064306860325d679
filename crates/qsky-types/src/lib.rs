//! Shared type definitions for the QSky customer event processor.
//!
//! Branch kiosks and operator counters emit state-change events for every
//! waiting customer. This crate holds the vocabulary shared by the store and
//! the processor: identifiers, the customer lifecycle states, the persisted
//! records, and the inbound event payloads.
//!
//! # Modules
//!
//! - [`ids`] -- Strongly-typed identifiers for branches, services, employees,
//!   customers and steps
//! - [`enums`] -- The 12-value [`CustomerState`] lifecycle enumeration
//! - [`structs`] -- Persisted records ([`Customer`], [`Step`], dimension names)
//! - [`events`] -- Inbound one-way event payloads

pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{CustomerState, UnknownState};
pub use events::{InsertCustomer, PingReply, RemoveCustomer, StatusChange};
pub use ids::{BranchId, CustomerId, CustomerKey, EmployeeId, ServiceId, StepId};
pub use structs::{Customer, EmployeeName, ServiceName, Step};
