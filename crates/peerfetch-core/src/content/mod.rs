//! Content domain types.
//!
//! This module contains the types shared by providers, transfers and the
//! aggregator: what is being fetched, the states a transfer reports, the
//! events it emits and the errors a retrieval can end with.

mod errors;
mod events;
mod state;

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use errors::{TransferError, TransferResult};
pub use events::{AggregatorEvent, TransferEvent};
pub use state::{SourceLocationState, TransferState};

/// Logical identifier of a piece of content.
///
/// Every provider that can serve the same content agrees on this ID, which is
/// what lets several independent transfers race for one result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(Uuid);

impl ContentId {
    /// Create a fresh random content ID.
    #[must_use]
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse a content ID from its string form.
    pub fn parse(s: &str) -> Result<Self, TransferError> {
        let raw = s.strip_prefix("urn:content:").unwrap_or(s);
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|e| TransferError::other(format!("invalid content id '{s}': {e}")))
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:content:{}", self.0)
    }
}

/// A retrieved piece of content.
///
/// Produced by the winning transfer once it reports `Completed`. The payload
/// is reference counted, so cloning a `Content` does not copy the data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    /// Logical ID of the content.
    pub id: ContentId,
    /// MIME type of the payload (e.g. `text/plain`).
    pub mime_type: String,
    /// The payload itself.
    pub data: Bytes,
}

impl Content {
    /// Create a new content value.
    pub fn new(id: ContentId, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            id,
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Descriptor of shared content handed to providers.
///
/// Providers use it to decide whether they can service a request at all and,
/// if so, where to start looking for sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentShare {
    /// Logical ID of the shared content.
    pub content_id: ContentId,
    /// Human-readable name, if the publisher provided one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// MIME type, if the publisher provided one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ContentShare {
    /// Create a share descriptor for a content ID.
    #[must_use]
    pub const fn new(content_id: ContentId) -> Self {
        Self {
            content_id,
            name: None,
            mime_type: None,
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}
