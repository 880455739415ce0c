//! Core domain types and port definitions for peerfetch.
//!
//! This crate holds everything the content retrieval engine and its adapters
//! agree on, without any runtime behavior:
//!
//! - `content` - identifiers, payloads, share descriptors, transfer states,
//!   events and the error type
//! - `ports` - the provider, transfer and listener traits that providers
//!   implement and the aggregator consumes
//! - `config` - aggregator configuration

pub mod config;
pub mod content;
pub mod ports;

// Re-export commonly used types for convenience
pub use config::{AggregatorConfig, PromotionPolicy};
pub use content::{
    AggregatorEvent, Content, ContentId, ContentShare, SourceLocationState, TransferError,
    TransferEvent, TransferResult, TransferState,
};
pub use ports::{
    AggregatorListener, ContentProvider, ContentTransfer, ListenerHandle, NoopListener,
    ProviderHandle, TransferHandle, TransferListener, same_listener, same_transfer,
};
