//! Transfer port.

use std::sync::Arc;

use crate::content::{Content, SourceLocationState, TransferResult, TransferState};

use super::listener::ListenerHandle;

/// Shared handle to a transfer.
pub type TransferHandle = Arc<dyn ContentTransfer>;

/// One provider-specific attempt to retrieve a piece of content.
///
/// A transfer owns its own concurrency: source location and data movement
/// happen on whatever threads or tasks the implementation chooses, and state
/// changes are reported to registered listeners from those contexts.
///
/// All operations must be safe to call from any thread and safe to call
/// redundantly: stopping a stopped search, cancelling a finished transfer or
/// removing a listener twice are no-ops.
pub trait ContentTransfer: Send + Sync {
    /// Register a listener for this transfer's events.
    fn add_listener(&self, listener: ListenerHandle);

    /// Remove a previously registered listener.
    fn remove_listener(&self, listener: &ListenerHandle);

    /// Begin searching for remote sources in the background.
    fn start_source_location(&self);

    /// Stop searching for remote sources.
    fn stop_source_location(&self);

    /// Current source location state.
    fn source_location_state(&self) -> SourceLocationState;

    /// Current transfer state.
    fn transfer_state(&self) -> TransferState;

    /// The retrieved content.
    ///
    /// Fails with `TransferError::NotCompleted` unless the transfer has
    /// reached `Completed`.
    fn content(&self) -> TransferResult<Content>;

    /// Abandon the transfer.
    fn cancel(&self);
}
