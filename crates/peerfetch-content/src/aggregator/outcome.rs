//! Race outcome.

use peerfetch_core::{Content, TransferError, TransferResult, TransferState};

/// The published result of a race.
///
/// Starts as `Pending` and changes exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RaceOutcome {
    /// No winner yet.
    #[default]
    Pending,
    /// A transfer completed and its content was retrieved.
    Completed {
        /// Roster index of the winning transfer.
        winner: usize,
        /// The retrieved content.
        content: Content,
    },
    /// The race ended without content.
    Failed(TransferError),
    /// The caller cancelled the race.
    Cancelled,
}

impl RaceOutcome {
    /// Whether the race is still undecided.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// The aggregate transfer state this outcome corresponds to.
    ///
    /// `None` while pending, since the state then follows the selected
    /// transfer.
    #[must_use]
    pub const fn transfer_state(&self) -> Option<TransferState> {
        match self {
            Self::Pending => None,
            Self::Completed { .. } => Some(TransferState::Completed),
            Self::Failed(_) => Some(TransferState::Failed),
            Self::Cancelled => Some(TransferState::Cancelled),
        }
    }

    /// Convert a decided outcome into the content or the error that ended it.
    pub fn into_content(self) -> TransferResult<Content> {
        match self {
            Self::Pending => Err(TransferError::not_completed(TransferState::Pending)),
            Self::Completed { content, .. } => Ok(content),
            Self::Failed(err) => Err(err),
            Self::Cancelled => Err(TransferError::Cancelled),
        }
    }
}
