//! The customer lifecycle enumeration.
//!
//! Branch servers send the state as a bare integer index. The numbering is
//! part of the wire contract and must never be reordered.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a customer visit.
///
/// The discriminant is the wire code sent by the branch servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CustomerState {
    /// Dismissed for not showing up when called.
    Dead = 0,
    /// Standing in a queue, first time.
    Wait = 1,
    /// Back in the queue after sitting out a postponement.
    WaitAfterPostponed = 2,
    /// Queued again for the next part of a multi-stage service.
    WaitComplexService = 3,
    /// Called to a counter.
    Invited = 4,
    /// Called again within an ongoing processing chain.
    InvitedSecondary = 5,
    /// Sent on to another queue ("upward" redirect).
    Redirect = 6,
    /// An operator started working with the customer.
    Work = 7,
    /// Work restarted within an ongoing processing chain.
    WorkSecondary = 8,
    /// Returned to a previously visited queue after a redirect.
    Back = 9,
    /// Served and gone home.
    Finish = 10,
    /// Served for now and parked until recalled.
    Postponed = 11,
}

/// A status code outside the lifecycle table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown customer state code {0}")]
pub struct UnknownState(pub i32);

impl CustomerState {
    /// Every state in wire-code order.
    pub const ALL: [Self; 12] = [
        Self::Dead,
        Self::Wait,
        Self::WaitAfterPostponed,
        Self::WaitComplexService,
        Self::Invited,
        Self::InvitedSecondary,
        Self::Redirect,
        Self::Work,
        Self::WorkSecondary,
        Self::Back,
        Self::Finish,
        Self::Postponed,
    ];

    /// Decode a wire code.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownState`] when the code is negative or past the end of
    /// the table.
    pub fn from_code(code: i32) -> Result<Self, UnknownState> {
        usize::try_from(code)
            .ok()
            .and_then(|idx| Self::ALL.get(idx).copied())
            .ok_or(UnknownState(code))
    }

    /// The wire code of this state.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// States after which the customer no longer takes part in the queue.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Dead | Self::Finish)
    }
}

impl TryFrom<i32> for CustomerState {
    type Error = UnknownState;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl core::fmt::Display for CustomerState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Dead => "STATE_DEAD",
            Self::Wait => "STATE_WAIT",
            Self::WaitAfterPostponed => "STATE_WAIT_AFTER_POSTPONED",
            Self::WaitComplexService => "STATE_WAIT_COMPLEX_SERVICE",
            Self::Invited => "STATE_INVITED",
            Self::InvitedSecondary => "STATE_INVITED_SECONDARY",
            Self::Redirect => "STATE_REDIRECT",
            Self::Work => "STATE_WORK",
            Self::WorkSecondary => "STATE_WORK_SECONDARY",
            Self::Back => "STATE_BACK",
            Self::Finish => "STATE_FINISH",
            Self::Postponed => "STATE_POSTPONED",
        };
        f.write_str(name)
    }
}
