//! Source location and transfer states.
//!
//! Both enums are reported by transfers. The aggregator never invents these
//! values, it only reacts to them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress of a transfer's search for remote sources.
///
/// A transfer on which source location has not been started reports
/// `NotLocating`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLocationState {
    /// Not searching, no usable sources known.
    #[default]
    NotLocating,
    /// Searching, not enough sources found yet.
    Locating,
    /// Searching, enough sources found to start the transfer.
    LocatingHasEnough,
    /// Searching, more than enough sources found.
    LocatingHasMany,
    /// Search stopped with enough sources.
    NotLocatingHasEnough,
    /// Search stopped with more than enough sources.
    NotLocatingHasMany,
}

impl SourceLocationState {
    /// Whether the transfer is still actively looking for sources.
    #[must_use]
    pub const fn is_locating(&self) -> bool {
        matches!(
            self,
            Self::Locating | Self::LocatingHasEnough | Self::LocatingHasMany
        )
    }

    /// Whether enough sources are known to make progress.
    ///
    /// Every "has many" state also has enough.
    #[must_use]
    pub const fn has_enough(&self) -> bool {
        matches!(
            self,
            Self::LocatingHasEnough
                | Self::LocatingHasMany
                | Self::NotLocatingHasEnough
                | Self::NotLocatingHasMany
        )
    }

    /// Whether more sources are known than are useful.
    #[must_use]
    pub const fn has_many(&self) -> bool {
        matches!(self, Self::LocatingHasMany | Self::NotLocatingHasMany)
    }

    /// The state a transfer settles in once its search is stopped.
    #[must_use]
    pub const fn stopped(self) -> Self {
        match self {
            Self::NotLocating | Self::Locating => Self::NotLocating,
            Self::LocatingHasEnough | Self::NotLocatingHasEnough => Self::NotLocatingHasEnough,
            Self::LocatingHasMany | Self::NotLocatingHasMany => Self::NotLocatingHasMany,
        }
    }

    /// String representation used in logs and reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotLocating => "not_locating",
            Self::Locating => "locating",
            Self::LocatingHasEnough => "locating_has_enough",
            Self::LocatingHasMany => "locating_has_many",
            Self::NotLocatingHasEnough => "not_locating_has_enough",
            Self::NotLocatingHasMany => "not_locating_has_many",
        }
    }
}

impl fmt::Display for SourceLocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single transfer.
///
/// Once `Completed`, `Failed` or `Cancelled`, a transfer never changes state
/// again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    /// Created but not moving data yet.
    #[default]
    Pending,
    /// Actively receiving data.
    Retrieving,
    /// Temporarily unable to make progress.
    Stalled,
    /// Recovering from an error.
    Retrying,
    /// All data received; content is available.
    Completed,
    /// Gave up.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl TransferState {
    /// Whether this is a terminal state.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the transfer finished with content available.
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Whether the transfer is still trying to move data.
    #[must_use]
    pub const fn is_retrieving(&self) -> bool {
        matches!(self, Self::Retrieving | Self::Stalled | Self::Retrying)
    }

    /// String representation used in logs and reports.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retrieving => "retrieving",
            Self::Stalled => "stalled",
            Self::Retrying => "retrying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
