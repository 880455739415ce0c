//! Race report model.
//!
//! Collected while the race runs, then either printed line by line or
//! rendered as JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;

use peerfetch_core::{SourceLocationState, TransferError, TransferState};

/// What happened to one transfer at one moment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Source location state changed.
    Location {
        state: SourceLocationState,
        #[serde(skip_serializing_if = "Option::is_none")]
        sources: Option<u32>,
    },
    /// Transfer state changed.
    State { state: TransferState },
    /// Bytes arrived.
    Progress { received: u64, total: u64 },
    /// The aggregator selected this transfer.
    Selected,
}

/// A forwarded event or selection change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEvent {
    /// Milliseconds since the race started.
    pub at_ms: u64,
    /// Roster index of the transfer (`None` if unknown).
    pub transfer: Option<usize>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// How the race ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

/// Full account of one race.
#[derive(Debug, Clone, Serialize)]
pub struct RaceReport {
    pub content_id: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub providers: usize,
    pub transfers: usize,
    /// Provider names in roster order.
    pub roster: Vec<String>,
    pub status: ReportStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<TransferError>,
    pub events: Vec<ReportEvent>,
}

impl RaceReport {
    /// Events of one transfer, in arrival order.
    pub fn events_for(&self, transfer: usize) -> impl Iterator<Item = &ReportEvent> {
        self.events
            .iter()
            .filter(move |e| e.transfer == Some(transfer))
    }

    /// Number of selection changes, including the initial selection.
    pub fn selections(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind == EventKind::Selected)
            .count()
    }
}
