//! Customer lifecycle state machine for the QSky event processor.
//!
//! Branch servers report every change of a waiting customer's state. This
//! crate turns those one-way notifications into durable bookkeeping: which
//! queue a customer stands in, where in the branch ordering, the chain of
//! visit stages, and running averages of waiting and working time.
//!
//! # Flow
//!
//! ```text
//! StatusChange
//!     |
//!     +-- CustomerState::from_code ----> unknown code: warn, drop
//!     +-- LockTable (per branch, FIFO)
//!     +-- Transition::for_state -------> one of 12 handlers
//!     |       |-- UnitOfWork reads (Store)
//!     |       |-- StepChain walk / append
//!     |       +-- running averages
//!     +-- UnitOfWork::commit ----------> one ChangeSet, all-or-nothing
//! ```
//!
//! # Modules
//!
//! - [`processor`] -- [`CustomerEvents`], the one-way event API.
//! - [`transition`] -- The 12 transition kinds and their handlers.
//! - [`registry`] -- Doubly-linked branch ordering of customers.
//! - [`chain`] -- Append-only step chain of one customer.
//! - [`aggregate`] -- Running averages of waiting and working durations.
//! - [`session`] -- Unit of work staging writes for one commit.
//! - [`locks`] -- Striped per-branch lock table.
//! - [`version`] -- Client version negotiation.
//! - [`clock`] -- Injectable time source.
//! - [`config`] -- Configuration loading from YAML plus environment.
//! - [`error`] -- Processing errors.
//!
//! [`CustomerEvents`]: processor::CustomerEvents

pub mod aggregate;
pub mod chain;
pub mod clock;
pub mod config;
pub mod error;
pub mod locks;
pub mod processor;
pub mod registry;
pub mod session;
pub mod transition;
pub mod version;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, QskyConfig};
pub use error::ProcessError;
pub use processor::CustomerEvents;
pub use transition::Transition;
