//! Transfer and aggregator events.

use std::fmt;

use crate::ports::TransferHandle;

use super::state::{SourceLocationState, TransferState};

/// An event published by a single transfer.
///
/// Every field besides the originating transfer is optional: providers only
/// fill in what they know at the time the event is created.
#[derive(Clone)]
pub struct TransferEvent {
    /// The transfer which produced this event.
    pub transfer: TransferHandle,
    /// Number of remote sources located so far, if known.
    pub location_count: Option<u32>,
    /// Source location state at the time of the event, if known.
    pub location_state: Option<SourceLocationState>,
    /// Transfer state at the time of the event, if known.
    pub transfer_state: Option<TransferState>,
    /// Bytes received so far, if known.
    pub bytes_received: Option<u64>,
    /// Total bytes to receive, if known.
    pub bytes_total: Option<u64>,
}

impl TransferEvent {
    /// Create an event carrying no details besides its origin.
    #[must_use]
    pub const fn new(transfer: TransferHandle) -> Self {
        Self {
            transfer,
            location_count: None,
            location_state: None,
            transfer_state: None,
            bytes_received: None,
            bytes_total: None,
        }
    }

    /// Create an event with location count and both states filled in.
    #[must_use]
    pub const fn with_states(
        transfer: TransferHandle,
        location_count: Option<u32>,
        location_state: SourceLocationState,
        transfer_state: TransferState,
    ) -> Self {
        Self {
            transfer,
            location_count,
            location_state: Some(location_state),
            transfer_state: Some(transfer_state),
            bytes_received: None,
            bytes_total: None,
        }
    }

    /// Attach byte progress.
    #[must_use]
    pub fn with_progress(mut self, received: u64, total: u64) -> Self {
        self.bytes_received = Some(received);
        self.bytes_total = Some(total);
        self
    }

    /// Progress percentage (0.0 - 100.0) when both byte counts are known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress_percent(&self) -> Option<f64> {
        match (self.bytes_received, self.bytes_total) {
            (Some(_), Some(0)) => Some(100.0),
            (Some(received), Some(total)) => {
                Some((received.min(total) as f64 / total as f64) * 100.0)
            }
            _ => None,
        }
    }
}

impl fmt::Debug for TransferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferEvent")
            .field("location_count", &self.location_count)
            .field("location_state", &self.location_state)
            .field("transfer_state", &self.transfer_state)
            .field("bytes_received", &self.bytes_received)
            .field("bytes_total", &self.bytes_total)
            .finish_non_exhaustive()
    }
}

/// An event published by the aggregator itself.
#[derive(Clone)]
pub enum AggregatorEvent {
    /// A transfer became the selected one.
    SelectedTransfer {
        /// The newly selected transfer.
        delegate: TransferHandle,
    },
    /// The roster of transfers changed.
    TransferListUpdated {
        /// Snapshot of the roster after the change.
        transfers: Vec<TransferHandle>,
    },
}

impl AggregatorEvent {
    /// Create a selection changed event.
    #[must_use]
    pub const fn selected(delegate: TransferHandle) -> Self {
        Self::SelectedTransfer { delegate }
    }

    /// The transfer this event is about, for selection events.
    #[must_use]
    pub const fn delegate(&self) -> Option<&TransferHandle> {
        match self {
            Self::SelectedTransfer { delegate } => Some(delegate),
            Self::TransferListUpdated { .. } => None,
        }
    }
}

impl fmt::Debug for AggregatorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelectedTransfer { .. } => f.write_str("SelectedTransfer"),
            Self::TransferListUpdated { transfers } => f
                .debug_struct("TransferListUpdated")
                .field("len", &transfers.len())
                .finish(),
        }
    }
}
