//! Provider port.

use std::sync::Arc;

use crate::content::ContentShare;

use super::transfer::TransferHandle;

/// Shared handle to a provider.
pub type ProviderHandle = Arc<dyn ContentProvider>;

/// A pluggable mechanism that can produce zero or one transfer per request.
///
/// The aggregator calls `retrieve_content` exactly once per provider and never
/// retries; a provider that cannot help returns `None`.
pub trait ContentProvider: Send + Sync {
    /// Attempt to produce a transfer for the described content.
    fn retrieve_content(&self, share: Option<&ContentShare>) -> Option<TransferHandle>;
}
