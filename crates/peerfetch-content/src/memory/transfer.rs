//! Timer-driven in-memory transfer.
//!
//! # Lifecycle
//!
//! - `start_source_location` spawns a search task that discovers one source
//!   per `locate_interval`
//! - Once enough sources are known a retrieval task streams the payload in
//!   chunks, then reports `Completed` (or `Failed` if the profile says so)
//! - Finishing, stopping or cancelling cancels the search token; the search
//!   task notices on its next tick
//!
//! Listeners are always notified after the status lock is released, so they
//! may call straight back into the transfer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use peerfetch_core::{
    Content, ContentTransfer, ListenerHandle, SourceLocationState, TransferError, TransferEvent,
    TransferHandle, TransferListener, TransferResult, TransferState, same_listener,
};

use super::profile::TransferProfile;

const LOG_TARGET: &str = "peerfetch.memory";

#[derive(Debug, Default)]
struct Status {
    location: SourceLocationState,
    state: TransferState,
    sources: u32,
    received: u64,
    retrieval_started: bool,
    /// Token of the running search, if any.
    search: Option<CancellationToken>,
}

/// A transfer that "downloads" content it already holds, on a schedule.
pub struct MemoryTransfer {
    name: String,
    content: Content,
    profile: TransferProfile,
    runtime: Handle,
    this: Weak<Self>,
    status: Mutex<Status>,
    listeners: RwLock<Vec<ListenerHandle>>,
    cancel: CancellationToken,
}

impl MemoryTransfer {
    /// Create an idle transfer whose tasks will run on `runtime`.
    pub fn new(
        name: impl Into<String>,
        content: Content,
        profile: TransferProfile,
        runtime: Handle,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            name: name.into(),
            content,
            profile,
            runtime,
            this: this.clone(),
            status: Mutex::new(Status::default()),
            listeners: RwLock::new(Vec::new()),
            cancel: CancellationToken::new(),
        })
    }

    /// Name given by the provider.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of sources discovered so far.
    pub fn sources(&self) -> u32 {
        self.status().sources
    }

    /// Bytes delivered so far.
    pub fn bytes_received(&self) -> u64 {
        self.status().received
    }

    fn status(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn event(
        &self,
        location: SourceLocationState,
        state: TransferState,
        sources: u32,
    ) -> Option<TransferEvent> {
        let this: TransferHandle = self.this.upgrade()?;
        Some(TransferEvent::with_states(
            this,
            Some(sources),
            location,
            state,
        ))
    }

    fn notify(
        &self,
        event: Option<TransferEvent>,
        notify: impl Fn(&dyn TransferListener, &TransferEvent),
    ) {
        let Some(event) = event else {
            return;
        };
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            notify(listener.as_ref(), &event);
        }
    }

    async fn search(self: Arc<Self>, token: CancellationToken) {
        loop {
            tokio::select! {
                () = token.cancelled() => return,
                () = tokio::time::sleep(self.profile.locate_interval) => {}
            }

            let (location, state, sources, begin_retrieval) = {
                let mut status = self.status();
                if token.is_cancelled() || !status.location.is_locating() {
                    return;
                }
                status.sources += 1;
                status.location = self.profile.locating_state(status.sources);
                let begin = status.location.has_enough()
                    && !status.retrieval_started
                    && !status.state.is_finished();
                status.retrieval_started |= begin;
                (status.location, status.state, status.sources, begin)
            };

            tracing::trace!(
                target: LOG_TARGET,
                transfer = %self.name,
                sources,
                location = %location,
                "Source discovered"
            );
            self.notify(self.event(location, state, sources), |l, e| {
                l.content_location_state_updated(e);
            });

            if begin_retrieval {
                self.runtime.spawn(Arc::clone(&self).retrieve());
            }
        }
    }

    async fn retrieve(self: Arc<Self>) {
        let (location, sources) = {
            let mut status = self.status();
            if status.state.is_finished() {
                return;
            }
            status.state = TransferState::Retrieving;
            (status.location, status.sources)
        };
        tracing::debug!(target: LOG_TARGET, transfer = %self.name, "Retrieval started");
        self.notify(
            self.event(location, TransferState::Retrieving, sources),
            |l, e| l.content_transfer_state_updated(e),
        );

        let total = self.content.len() as u64;
        let mut received = 0u64;
        let mut chunks = 0usize;
        while received < total {
            tokio::select! {
                () = self.cancel.cancelled() => return,
                () = tokio::time::sleep(self.profile.chunk_interval) => {}
            }

            if self.profile.fail_after_chunks == Some(chunks) {
                self.finish(TransferState::Failed);
                return;
            }

            received = (received + self.profile.chunk_size as u64).min(total);
            chunks += 1;

            let (location, sources) = {
                let mut status = self.status();
                if status.state.is_finished() {
                    return;
                }
                status.received = received;
                (status.location, status.sources)
            };
            let event = self
                .event(location, TransferState::Retrieving, sources)
                .map(|e| e.with_progress(received, total));
            self.notify(event, |l, e| l.content_transfer_progress(e));
        }

        // A payload shorter than the failure point still fails.
        if self.profile.fail_after_chunks.is_some() {
            self.finish(TransferState::Failed);
            return;
        }
        self.finish(TransferState::Completed);
    }

    /// Move to a terminal state and notify. Returns false if already finished.
    fn finish(&self, state: TransferState) -> bool {
        let (location, sources) = {
            let mut status = self.status();
            if status.state.is_finished() {
                return false;
            }
            status.state = state;
            status.location = status.location.stopped();
            if let Some(search) = status.search.take() {
                search.cancel();
            }
            (status.location, status.sources)
        };

        match state {
            TransferState::Completed => {
                tracing::debug!(target: LOG_TARGET, transfer = %self.name, sources, "Transfer completed");
            }
            _ => {
                tracing::debug!(target: LOG_TARGET, transfer = %self.name, %state, "Transfer ended");
            }
        }

        self.notify(self.event(location, state, sources), |l, e| {
            l.content_transfer_state_updated(e);
        });
        true
    }
}

impl ContentTransfer for MemoryTransfer {
    fn add_listener(&self, listener: ListenerHandle) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn remove_listener(&self, listener: &ListenerHandle) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| !same_listener(l, listener));
    }

    fn start_source_location(&self) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let (token, location, state, sources) = {
            let mut status = self.status();
            if status.state.is_finished() || status.location.is_locating() {
                return;
            }
            let token = self.cancel.child_token();
            status.search = Some(token.clone());
            status.location = match status.location {
                SourceLocationState::NotLocatingHasEnough => SourceLocationState::LocatingHasEnough,
                SourceLocationState::NotLocatingHasMany => SourceLocationState::LocatingHasMany,
                _ => SourceLocationState::Locating,
            };
            (token, status.location, status.state, status.sources)
        };

        tracing::debug!(target: LOG_TARGET, transfer = %self.name, "Source location started");
        self.runtime.spawn(this.search(token));
        self.notify(self.event(location, state, sources), |l, e| {
            l.content_location_state_updated(e);
        });
    }

    fn stop_source_location(&self) {
        let mut status = self.status();
        if let Some(search) = status.search.take() {
            search.cancel();
        }
        status.location = status.location.stopped();
    }

    fn source_location_state(&self) -> SourceLocationState {
        self.status().location
    }

    fn transfer_state(&self) -> TransferState {
        self.status().state
    }

    fn content(&self) -> TransferResult<Content> {
        match self.transfer_state() {
            TransferState::Completed => Ok(self.content.clone()),
            state => Err(TransferError::not_completed(state)),
        }
    }

    fn cancel(&self) {
        if self.finish(TransferState::Cancelled) {
            tracing::debug!(target: LOG_TARGET, transfer = %self.name, "Transfer cancelled");
        }
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for MemoryTransfer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.status();
        f.debug_struct("MemoryTransfer")
            .field("name", &self.name)
            .field("location", &status.location)
            .field("state", &status.state)
            .field("sources", &status.sources)
            .field("received", &status.received)
            .finish_non_exhaustive()
    }
}
