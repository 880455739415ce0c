//! Test doubles for aggregator tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use mockall::mock;

use peerfetch_core::{
    AggregatorEvent, AggregatorListener, Content, ContentId, ContentProvider, ContentShare,
    ContentTransfer, ListenerHandle, SourceLocationState, TransferError, TransferEvent,
    TransferHandle, TransferListener, TransferResult, TransferState, same_listener,
    same_transfer,
};

mock! {
    pub TransferObserver {}
    impl TransferListener for TransferObserver {
        fn content_location_state_updated(&self, event: &TransferEvent);
        fn content_transfer_state_updated(&self, event: &TransferEvent);
        fn content_transfer_progress(&self, event: &TransferEvent);
    }
}

mock! {
    pub SelectionObserver {}
    impl AggregatorListener for SelectionObserver {
        fn selected_content_transfer(&self, event: &AggregatorEvent);
        fn updated_content_transfer_list(&self, event: &AggregatorEvent);
    }
}

/// A call made on a fake transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Call {
    AddListener,
    RemoveListener,
    StartLocation,
    StopLocation,
    QueryLocation,
    QueryState,
    Content,
    Cancel,
}

/// One line in the shared journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Entry {
    Transfer(&'static str, Call),
    Selected(&'static str),
}

/// Ordered record of everything the aggregator did, across all fakes.
#[derive(Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<Entry>>>);

impl Journal {
    pub(crate) fn push(&self, entry: Entry) {
        self.0.lock().unwrap().push(entry);
    }

    pub(crate) fn entries(&self) -> Vec<Entry> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Recording transfer with settable states.
pub(crate) struct FakeTransfer {
    name: &'static str,
    journal: Journal,
    location: Mutex<SourceLocationState>,
    state: Mutex<TransferState>,
    content: Content,
    listeners: Mutex<Vec<ListenerHandle>>,
    complete_on_start: AtomicBool,
    this: Weak<Self>,
}

impl FakeTransfer {
    pub(crate) fn new(name: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            name,
            journal: journal.clone(),
            location: Mutex::new(SourceLocationState::NotLocating),
            state: Mutex::new(TransferState::Pending),
            content: Content::new(ContentId::new_random(), "text/plain", name.as_bytes().to_vec()),
            listeners: Mutex::new(Vec::new()),
            complete_on_start: AtomicBool::new(false),
            this: this.clone(),
        })
    }

    /// Report completion from inside `start_source_location`.
    pub(crate) fn complete_when_started(&self) {
        self.complete_on_start.store(true, Ordering::SeqCst);
    }

    /// A fake with its own journal, for tests that only need a handle.
    pub(crate) fn handle(name: &'static str) -> TransferHandle {
        Self::new(name, &Journal::default())
    }

    pub(crate) const fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn content_value(&self) -> Content {
        self.content.clone()
    }

    pub(crate) fn set_location(&self, state: SourceLocationState) {
        *self.location.lock().unwrap() = state;
    }

    pub(crate) fn set_state(&self, state: TransferState) {
        *self.state.lock().unwrap() = state;
    }

    pub(crate) fn state(&self) -> TransferState {
        *self.state.lock().unwrap()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }

    /// Calls made on this fake, in order.
    pub(crate) fn calls(&self) -> Vec<Call> {
        self.journal
            .entries()
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Transfer(name, call) if name == self.name => Some(call),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    /// Deliver an event to every registered listener, as a real transfer would.
    pub(crate) fn emit_location(self: &Arc<Self>, state: SourceLocationState, sources: u32) {
        self.set_location(state);
        let event = TransferEvent::with_states(
            Arc::clone(self) as TransferHandle,
            Some(sources),
            state,
            self.state(),
        );
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.content_location_state_updated(&event);
        }
    }

    pub(crate) fn emit_state(self: &Arc<Self>, state: TransferState) {
        self.set_state(state);
        let location = *self.location.lock().unwrap();
        let event =
            TransferEvent::with_states(Arc::clone(self) as TransferHandle, None, location, state);
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners {
            listener.content_transfer_state_updated(&event);
        }
    }

    fn record(&self, call: Call) {
        self.journal.push(Entry::Transfer(self.name, call));
    }
}

impl ContentTransfer for FakeTransfer {
    fn add_listener(&self, listener: ListenerHandle) {
        self.record(Call::AddListener);
        self.listeners.lock().unwrap().push(listener);
    }

    fn remove_listener(&self, listener: &ListenerHandle) {
        self.record(Call::RemoveListener);
        self.listeners
            .lock()
            .unwrap()
            .retain(|l| !same_listener(l, listener));
    }

    fn start_source_location(&self) {
        self.record(Call::StartLocation);
        self.set_location(SourceLocationState::Locating);
        if self.complete_on_start.load(Ordering::SeqCst) {
            if let Some(this) = self.this.upgrade() {
                this.emit_state(TransferState::Completed);
            }
        }
    }

    fn stop_source_location(&self) {
        self.record(Call::StopLocation);
        let mut location = self.location.lock().unwrap();
        *location = location.stopped();
    }

    fn source_location_state(&self) -> SourceLocationState {
        self.record(Call::QueryLocation);
        *self.location.lock().unwrap()
    }

    fn transfer_state(&self) -> TransferState {
        self.record(Call::QueryState);
        self.state()
    }

    fn content(&self) -> TransferResult<Content> {
        self.record(Call::Content);
        match self.state() {
            TransferState::Completed => Ok(self.content.clone()),
            state => Err(TransferError::not_completed(state)),
        }
    }

    fn cancel(&self) {
        self.record(Call::Cancel);
        let mut state = self.state.lock().unwrap();
        if !state.is_finished() {
            *state = TransferState::Cancelled;
        }
    }
}

/// Provider returning a fixed transfer (or none) and counting calls.
pub(crate) struct StubProvider {
    transfer: Option<TransferHandle>,
    calls: AtomicUsize,
}

impl StubProvider {
    pub(crate) const fn serving(transfer: TransferHandle) -> Self {
        Self {
            transfer: Some(transfer),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) const fn empty() -> Self {
        Self {
            transfer: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ContentProvider for StubProvider {
    fn retrieve_content(&self, _share: Option<&ContentShare>) -> Option<TransferHandle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.transfer.clone()
    }
}

/// Find which fake a handle refers to.
pub(crate) fn name_of(fakes: &[Arc<FakeTransfer>], handle: &TransferHandle) -> &'static str {
    fakes
        .iter()
        .find(|f| same_transfer(&(Arc::clone(f) as TransferHandle), handle))
        .map_or("unknown", |f| f.name())
}
