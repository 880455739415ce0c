//! Port definitions (trait abstractions) for content retrieval.
//!
//! Ports define the interfaces the aggregator expects from providers and the
//! transfers they produce, and the callbacks it offers to its own callers.
//!
//! # Design Rules
//!
//! - No transport types in any signature
//! - Every operation is callable from any thread and safe to repeat
//! - Identity of transfers and listeners is pointer identity of their `Arc`

mod listener;
mod provider;
mod transfer;

use std::sync::Arc;

pub use listener::{AggregatorListener, ListenerHandle, NoopListener, TransferListener};
pub use provider::{ContentProvider, ProviderHandle};
pub use transfer::{ContentTransfer, TransferHandle};

/// Whether two handles point at the same transfer.
///
/// Compares data pointers only, so two handles to one object are equal even
/// if their vtable pointers differ across codegen units.
#[must_use]
pub fn same_transfer(a: &TransferHandle, b: &TransferHandle) -> bool {
    same_object(a, b)
}

/// Whether two listener handles point at the same listener.
#[must_use]
pub fn same_listener(a: &ListenerHandle, b: &ListenerHandle) -> bool {
    same_object(a, b)
}

fn same_object<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}
