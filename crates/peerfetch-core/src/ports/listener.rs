//! Listener ports.
//!
//! Listeners are invoked synchronously from whichever thread produced the
//! event. Implementations should return quickly and must not block.

use std::sync::Arc;

use crate::content::{AggregatorEvent, TransferEvent};

/// Shared handle to a transfer listener.
pub type ListenerHandle = Arc<dyn TransferListener>;

/// Receiver of per-transfer events.
///
/// All methods default to doing nothing so implementations only override
/// what they care about.
pub trait TransferListener: Send + Sync {
    /// The transfer's source location state or source count changed.
    fn content_location_state_updated(&self, _event: &TransferEvent) {}

    /// The transfer's lifecycle state changed.
    fn content_transfer_state_updated(&self, _event: &TransferEvent) {}

    /// The transfer received more data.
    fn content_transfer_progress(&self, _event: &TransferEvent) {}
}

/// Receiver of aggregator-level events.
pub trait AggregatorListener: Send + Sync {
    /// A different transfer became the selected one.
    fn selected_content_transfer(&self, _event: &AggregatorEvent) {}

    /// The roster of transfers changed.
    fn updated_content_transfer_list(&self, _event: &AggregatorEvent) {}
}

/// A listener that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl TransferListener for NoopListener {}

impl AggregatorListener for NoopListener {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::same_listener;

    #[test]
    fn test_listener_identity_is_pointer_identity() {
        let a: ListenerHandle = Arc::new(NoopListener);
        let b: ListenerHandle = Arc::new(NoopListener);
        assert!(same_listener(&a, &Arc::clone(&a)));
        assert!(!same_listener(&a, &b));
    }
}
