//! Content retrieval engine for peerfetch.
//!
//! - `TransferAggregator` - races every transfer the providers can produce
//!   for one piece of content and keeps the first to complete
//! - `memory` - an in-memory provider with timer-driven transfers, for demos
//!   and end-to-end tests

// Re-export core types for convenience
pub use peerfetch_core::{
    AggregatorConfig, AggregatorEvent, AggregatorListener, Content, ContentId, ContentProvider,
    ContentShare, ContentTransfer, ListenerHandle, PromotionPolicy, ProviderHandle,
    SourceLocationState, TransferError, TransferEvent, TransferHandle, TransferListener,
    TransferResult, TransferState, same_transfer,
};

// Race engine
mod aggregator;

pub use aggregator::{RaceOutcome, TransferAggregator};

// In-memory provider
pub mod memory;

pub use memory::{MemoryProvider, MemoryTransfer, TransferProfile};
