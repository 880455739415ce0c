//! Timing and failure profile for in-memory transfers.

use std::time::Duration;

use peerfetch_core::{SourceLocationState, TransferError, TransferResult};

/// How an in-memory transfer behaves over time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferProfile {
    /// Delay between two discovered sources.
    pub locate_interval: Duration,
    /// Sources needed before retrieval can begin.
    pub sources_enough: u32,
    /// Sources at which the transfer reports more than it needs.
    pub sources_many: u32,
    /// Bytes delivered per chunk.
    pub chunk_size: usize,
    /// Delay between two chunks.
    pub chunk_interval: Duration,
    /// Report failure instead of delivering this chunk (zero-based). A
    /// payload with fewer chunks fails once it has been delivered.
    pub fail_after_chunks: Option<usize>,
}

impl Default for TransferProfile {
    fn default() -> Self {
        Self {
            locate_interval: Duration::from_millis(10),
            sources_enough: 2,
            sources_many: 5,
            chunk_size: 4096,
            chunk_interval: Duration::from_millis(5),
            fail_after_chunks: None,
        }
    }
}

impl TransferProfile {
    /// Set the source discovery interval.
    #[must_use]
    pub const fn with_locate_interval(mut self, interval: Duration) -> Self {
        self.locate_interval = interval;
        self
    }

    /// Set the "enough" and "many" source thresholds.
    #[must_use]
    pub const fn with_sources(mut self, enough: u32, many: u32) -> Self {
        self.sources_enough = enough;
        self.sources_many = many;
        self
    }

    /// Set the chunk size and the delay between chunks.
    #[must_use]
    pub const fn with_chunks(mut self, size: usize, interval: Duration) -> Self {
        self.chunk_size = size;
        self.chunk_interval = interval;
        self
    }

    /// Fail before delivering chunk number `chunks`.
    #[must_use]
    pub const fn failing_after(mut self, chunks: usize) -> Self {
        self.fail_after_chunks = Some(chunks);
        self
    }

    /// Reject profiles that could never make progress.
    pub fn validate(&self) -> TransferResult<()> {
        if self.chunk_size == 0 {
            return Err(TransferError::invalid_config("chunk_size must be positive"));
        }
        if self.sources_many < self.sources_enough {
            return Err(TransferError::invalid_config(format!(
                "sources_many ({}) is below sources_enough ({})",
                self.sources_many, self.sources_enough
            )));
        }
        Ok(())
    }

    /// Location state while searching with `sources` known.
    pub(crate) const fn locating_state(&self, sources: u32) -> SourceLocationState {
        if sources >= self.sources_many {
            SourceLocationState::LocatingHasMany
        } else if sources >= self.sources_enough {
            SourceLocationState::LocatingHasEnough
        } else {
            SourceLocationState::Locating
        }
    }
}
