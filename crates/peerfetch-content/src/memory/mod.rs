//! In-memory content provider.
//!
//! Serves a fixed catalog through timer-driven transfers, so races can be run
//! end to end without any network. Each provider hands out a fresh
//! `MemoryTransfer` per request, all sharing the provider's profile.

mod profile;
mod transfer;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::runtime::Handle;

use peerfetch_core::{
    Content, ContentId, ContentProvider, ContentShare, TransferHandle, TransferResult,
};

pub use profile::TransferProfile;
pub use transfer::MemoryTransfer;

/// Provider backed by a map of content held in memory.
pub struct MemoryProvider {
    name: String,
    runtime: Handle,
    profile: TransferProfile,
    catalog: RwLock<HashMap<ContentId, Content>>,
    issued: AtomicUsize,
}

impl MemoryProvider {
    /// Create an empty provider. Fails if the profile is invalid.
    pub fn new(
        name: impl Into<String>,
        runtime: Handle,
        profile: TransferProfile,
    ) -> TransferResult<Self> {
        profile.validate()?;
        Ok(Self {
            name: name.into(),
            runtime,
            profile,
            catalog: RwLock::new(HashMap::new()),
            issued: AtomicUsize::new(0),
        })
    }

    /// Add content to the catalog.
    #[must_use]
    pub fn with_content(self, content: Content) -> Self {
        self.insert(content);
        self
    }

    /// Add or replace content in the catalog.
    pub fn insert(&self, content: Content) {
        self.catalog
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(content.id, content);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn profile(&self) -> &TransferProfile {
        &self.profile
    }

    /// Number of transfers handed out so far.
    pub fn issued(&self) -> usize {
        self.issued.load(Ordering::SeqCst)
    }
}

impl ContentProvider for MemoryProvider {
    fn retrieve_content(&self, share: Option<&ContentShare>) -> Option<TransferHandle> {
        let share = share?;
        let content = self
            .catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&share.content_id)
            .cloned();

        let Some(content) = content else {
            tracing::debug!(
                target: "peerfetch.memory",
                provider = %self.name,
                content = %share.content_id,
                "Content not in catalog"
            );
            return None;
        };

        let seq = self.issued.fetch_add(1, Ordering::SeqCst);
        let transfer: TransferHandle = MemoryTransfer::new(
            format!("{}#{seq}", self.name),
            content,
            self.profile.clone(),
            self.runtime.clone(),
        );
        Some(transfer)
    }
}

impl std::fmt::Debug for MemoryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryProvider")
            .field("name", &self.name)
            .field("profile", &self.profile)
            .field("issued", &self.issued())
            .finish_non_exhaustive()
    }
}
