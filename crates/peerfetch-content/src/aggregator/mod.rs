//! Transfer aggregator.
//!
//! The aggregator races every transfer the providers could produce for one
//! piece of content, keeps exactly one of them "selected" for the purpose of
//! progress reporting, and tears down every loser once the first transfer
//! completes.
//!
//! # Concurrency Model
//!
//! - The aggregator owns no threads; all callbacks arrive on the transfers'
//!   own execution contexts, concurrently and in any order
//! - `RaceState` behind a single mutex decides who is selected and who won
//! - The mutex is never held while calling a transfer or a listener, so a
//!   transfer may call back into the aggregator from inside `cancel()`
//! - Transfers hold a `Weak` link back to the aggregator, so dropping the
//!   aggregator turns late events into no-ops

mod outcome;
mod race;
mod roster;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use tokio::sync::watch;

use peerfetch_core::{
    AggregatorConfig, AggregatorEvent, AggregatorListener, Content, ContentShare,
    ContentTransfer, ListenerHandle, ProviderHandle, SourceLocationState, TransferError,
    TransferEvent, TransferHandle, TransferListener, TransferResult, TransferState,
    same_listener, same_transfer,
};

pub use outcome::RaceOutcome;

use race::{Phase, RaceState};

const LOG_TARGET: &str = "peerfetch.content";

/// Races redundant transfers for one piece of content.
///
/// Cloning is cheap and every clone refers to the same race.
#[derive(Clone)]
pub struct TransferAggregator {
    shared: Arc<Shared>,
}

/// State shared between the aggregator handles and the transfer link.
struct Shared {
    /// Randomized at construction, fixed thereafter.
    roster: Vec<TransferHandle>,
    config: AggregatorConfig,
    race: Mutex<RaceState>,
    transfer_listeners: RwLock<Vec<ListenerHandle>>,
    aggregator_listeners: RwLock<Vec<Arc<dyn AggregatorListener>>>,
    outcome: watch::Sender<RaceOutcome>,
    /// The listener registered on every transfer.
    link: ListenerHandle,
}

/// Listener registered on transfers; forwards to the aggregator while alive.
struct AggregatorLink {
    shared: Weak<Shared>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn snapshot<T: Clone>(list: &RwLock<Vec<T>>) -> Vec<T> {
    list.read().unwrap_or_else(PoisonError::into_inner).clone()
}

impl TransferAggregator {
    /// Build an aggregator with the default configuration.
    ///
    /// Every provider is asked for a transfer exactly once. Fails with
    /// `TransferError::NoProviders` if none could produce one; no events are
    /// fired and no transfer is touched in that case.
    pub fn new(
        providers: &[ProviderHandle],
        share: Option<&ContentShare>,
    ) -> TransferResult<Self> {
        Self::with_config(providers, share, AggregatorConfig::default())
    }

    /// Build an aggregator with an explicit configuration.
    pub fn with_config(
        providers: &[ProviderHandle],
        share: Option<&ContentShare>,
        config: AggregatorConfig,
    ) -> TransferResult<Self> {
        let roster = roster::build_roster(providers, share, config.shuffle_seed)?;
        let (outcome, _) = watch::channel(RaceOutcome::Pending);
        let len = roster.len();

        let shared = Arc::new_cyclic(|weak| Shared {
            race: Mutex::new(RaceState::new(len)),
            roster,
            config,
            transfer_listeners: RwLock::new(Vec::new()),
            aggregator_listeners: RwLock::new(Vec::new()),
            outcome,
            link: Arc::new(AggregatorLink {
                shared: weak.clone(),
            }),
        });

        for transfer in &shared.roster {
            transfer.add_listener(Arc::clone(&shared.link));
        }

        tracing::debug!(
            target: LOG_TARGET,
            providers = providers.len(),
            transfers = len,
            "Transfer aggregator constructed"
        );

        Ok(Self { shared })
    }

    /// Announce the initial selection and start source location.
    ///
    /// Every live transfer reporting `NotLocating` is started, selected
    /// first. Does not wait for discovery. Calling this a second time, or
    /// after the race is decided, does nothing.
    pub fn start_source_location(&self) {
        self.shared.start_source_location();
    }

    /// The currently selected transfer.
    pub fn current_content_transfer(&self) -> TransferHandle {
        let selected = lock(&self.shared.race).selected();
        Arc::clone(&self.shared.roster[selected])
    }

    /// Snapshot of the full roster in its randomized order.
    pub fn content_transfer_list(&self) -> Vec<TransferHandle> {
        self.shared.roster.clone()
    }

    /// Register a listener for the selected transfer's events.
    pub fn add_content_transfer_listener(&self, listener: ListenerHandle) {
        self.shared
            .transfer_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Remove a per-transfer listener. Unknown listeners are ignored.
    pub fn remove_content_transfer_listener(&self, listener: &ListenerHandle) {
        self.shared
            .transfer_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| !same_listener(l, listener));
    }

    /// Register a listener for aggregator-level events.
    pub fn add_content_transfer_aggregator_listener(&self, listener: Arc<dyn AggregatorListener>) {
        self.shared
            .aggregator_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Remove an aggregator-level listener. Unknown listeners are ignored.
    pub fn remove_content_transfer_aggregator_listener(
        &self,
        listener: &Arc<dyn AggregatorListener>,
    ) {
        self.shared
            .aggregator_listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|l| {
                !std::ptr::eq(
                    Arc::as_ptr(l).cast::<()>(),
                    Arc::as_ptr(listener).cast::<()>(),
                )
            });
    }

    /// Subscribe to the race outcome.
    pub fn subscribe_outcome(&self) -> watch::Receiver<RaceOutcome> {
        self.shared.outcome.subscribe()
    }

    /// The current race outcome.
    pub fn outcome(&self) -> RaceOutcome {
        self.shared.outcome.borrow().clone()
    }

    /// Wait until the race is decided, up to `timeout`.
    pub async fn wait_for_content(&self, timeout: Duration) -> TransferResult<Content> {
        let mut rx = self.shared.outcome.subscribe();
        let decided = tokio::time::timeout(timeout, async {
            rx.wait_for(|outcome| !outcome.is_pending())
                .await
                .map(|outcome| outcome.clone())
        })
        .await;

        match decided {
            Ok(Ok(outcome)) => outcome.into_content(),
            Ok(Err(_)) => Err(TransferError::other("aggregator outcome channel closed")),
            Err(_) => Err(TransferError::timeout(timeout)),
        }
    }
}

impl Shared {
    fn position(&self, transfer: &TransferHandle) -> Option<usize> {
        self.roster.iter().position(|t| same_transfer(t, transfer))
    }

    fn notify_transfer_listeners(&self, notify: impl Fn(&dyn TransferListener)) {
        for listener in snapshot(&self.transfer_listeners) {
            notify(listener.as_ref());
        }
    }

    fn fire_selected(&self, index: usize) {
        tracing::debug!(target: LOG_TARGET, transfer = index, "Selected transfer changed");
        let event = AggregatorEvent::selected(Arc::clone(&self.roster[index]));
        for listener in snapshot(&self.aggregator_listeners) {
            listener.selected_content_transfer(&event);
        }
    }

    /// Whether an event from `index` should reach external listeners.
    ///
    /// Returns `None` once the race is decided: late events are dropped.
    fn routing(&self, index: usize) -> Option<bool> {
        let race = lock(&self.race);
        (!race.is_decided()).then(|| race.selected() == index)
    }

    fn start_source_location(&self) {
        let Some(start) = lock(&self.race).begin() else {
            tracing::debug!(target: LOG_TARGET, "Source location already started");
            return;
        };

        self.fire_selected(start.selected);

        for index in start.order {
            // A transfer may decide the race from inside its own start.
            if !lock(&self.race).is_live(index) {
                tracing::debug!(
                    target: LOG_TARGET,
                    transfer = index,
                    "Skipping transfer retired during start"
                );
                continue;
            }
            let transfer = &self.roster[index];
            if transfer.source_location_state() == SourceLocationState::NotLocating {
                tracing::debug!(target: LOG_TARGET, transfer = index, "Starting source location");
                transfer.start_source_location();
            }
        }
    }

    fn on_location_state(&self, event: &TransferEvent) {
        let Some(index) = self.position(&event.transfer) else {
            tracing::debug!(target: LOG_TARGET, "Ignoring event from unknown transfer");
            return;
        };
        let Some(selected) = self.routing(index) else {
            tracing::debug!(target: LOG_TARGET, transfer = index, "Ignoring late location event");
            return;
        };

        if selected {
            self.notify_transfer_listeners(|l| l.content_location_state_updated(event));
        }

        // Act on the transfer's current state, not the possibly stale event.
        let transfer = &self.roster[index];
        let state = transfer.source_location_state();
        if state == SourceLocationState::LocatingHasMany {
            tracing::debug!(
                target: LOG_TARGET,
                transfer = index,
                sources = ?event.location_count,
                "Enough redundancy found, stopping source location"
            );
            transfer.stop_source_location();
        }
    }

    fn on_progress(&self, event: &TransferEvent) {
        let Some(index) = self.position(&event.transfer) else {
            return;
        };
        if self.routing(index) == Some(true) {
            self.notify_transfer_listeners(|l| l.content_transfer_progress(event));
        }
    }

    fn on_transfer_state(&self, event: &TransferEvent) {
        let Some(index) = self.position(&event.transfer) else {
            tracing::debug!(target: LOG_TARGET, "Ignoring event from unknown transfer");
            return;
        };
        let state = event
            .transfer_state
            .unwrap_or_else(|| event.transfer.transfer_state());

        match state {
            TransferState::Completed => self.on_completed(index, event),
            TransferState::Failed | TransferState::Cancelled => {
                self.on_failed(index, state, event);
            }
            _ => {
                if self.routing(index) == Some(true) {
                    self.notify_transfer_listeners(|l| l.content_transfer_state_updated(event));
                }
            }
        }
    }

    fn on_completed(&self, index: usize, event: &TransferEvent) {
        let Some(victory) = lock(&self.race).complete(index) else {
            tracing::debug!(
                target: LOG_TARGET,
                transfer = index,
                "Race already decided, absorbing completion"
            );
            return;
        };

        tracing::info!(
            target: LOG_TARGET,
            winner = index,
            previous_selected = victory.previous_selected,
            losers = victory.losers.len(),
            "Transfer won the race"
        );

        let winner = &self.roster[index];
        if winner.source_location_state().is_locating() {
            winner.stop_source_location();
        }
        winner.remove_listener(&self.link);

        for loser in victory.losers {
            self.retire(loser);
        }

        if !victory.announced || victory.previous_selected != index {
            self.fire_selected(index);
        }

        let outcome = match winner.content() {
            Ok(content) => RaceOutcome::Completed {
                winner: index,
                content,
            },
            Err(err) => {
                tracing::warn!(
                    target: LOG_TARGET,
                    winner = index,
                    error = %err,
                    "Winning transfer could not produce its content"
                );
                RaceOutcome::Failed(err)
            }
        };
        self.outcome.send_replace(outcome);

        self.notify_transfer_listeners(|l| l.content_transfer_state_updated(event));
    }

    fn on_failed(&self, index: usize, state: TransferState, event: &TransferEvent) {
        let Some(failure) = lock(&self.race).fail(index, self.config.promotion) else {
            tracing::debug!(target: LOG_TARGET, transfer = index, %state, "Ignoring repeated or late failure");
            return;
        };

        let transfer = &self.roster[index];
        if transfer.source_location_state().is_locating() {
            transfer.stop_source_location();
        }
        transfer.remove_listener(&self.link);

        if failure.was_selected {
            tracing::warn!(target: LOG_TARGET, transfer = index, %state, "Selected transfer ended without content");
            self.notify_transfer_listeners(|l| l.content_transfer_state_updated(event));
        } else {
            tracing::debug!(target: LOG_TARGET, transfer = index, %state, "Standby transfer ended without content");
        }

        if let Some(next) = failure.promoted {
            self.fire_selected(next);
        }

        if failure.exhausted {
            tracing::warn!(
                target: LOG_TARGET,
                attempts = self.roster.len(),
                "Every transfer ended without content"
            );
            self.outcome
                .send_replace(RaceOutcome::Failed(TransferError::all_failed(self.roster.len())));
        }
    }

    /// Stop, unsubscribe and cancel a transfer that lost the race.
    fn retire(&self, index: usize) {
        let transfer = &self.roster[index];
        let state = transfer.source_location_state();
        tracing::debug!(target: LOG_TARGET, transfer = index, location = %state, "Retiring transfer");
        transfer.stop_source_location();
        transfer.remove_listener(&self.link);
        transfer.cancel();
    }

    fn cancel(&self) {
        let Some(live) = lock(&self.race).cancel() else {
            return;
        };
        tracing::info!(target: LOG_TARGET, live = live.len(), "Cancelling transfer race");
        for index in live {
            self.retire(index);
        }
        self.outcome.send_replace(RaceOutcome::Cancelled);
    }

    fn stop_source_location(&self) {
        let live = lock(&self.race).live();
        for index in live {
            self.roster[index].stop_source_location();
        }
    }

    fn transfer_state(&self) -> TransferState {
        if let Some(state) = self.outcome.borrow().transfer_state() {
            return state;
        }
        let selected = lock(&self.race).selected();
        self.roster[selected].transfer_state()
    }

    fn phase(&self) -> Phase {
        lock(&self.race).phase()
    }
}

impl TransferListener for AggregatorLink {
    fn content_location_state_updated(&self, event: &TransferEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_location_state(event);
        }
    }

    fn content_transfer_state_updated(&self, event: &TransferEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_transfer_state(event);
        }
    }

    fn content_transfer_progress(&self, event: &TransferEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_progress(event);
        }
    }
}

/// The aggregator reacts to transfer events exactly like its internal link,
/// so events can also be delivered to it directly.
impl TransferListener for TransferAggregator {
    fn content_location_state_updated(&self, event: &TransferEvent) {
        self.shared.on_location_state(event);
    }

    fn content_transfer_state_updated(&self, event: &TransferEvent) {
        self.shared.on_transfer_state(event);
    }

    fn content_transfer_progress(&self, event: &TransferEvent) {
        self.shared.on_progress(event);
    }
}

/// An aggregator is itself a transfer, so it can stand in wherever a single
/// transfer is expected (including inside another aggregator).
impl ContentTransfer for TransferAggregator {
    fn add_listener(&self, listener: ListenerHandle) {
        self.add_content_transfer_listener(listener);
    }

    fn remove_listener(&self, listener: &ListenerHandle) {
        self.remove_content_transfer_listener(listener);
    }

    fn start_source_location(&self) {
        self.shared.start_source_location();
    }

    fn stop_source_location(&self) {
        self.shared.stop_source_location();
    }

    fn source_location_state(&self) -> SourceLocationState {
        self.current_content_transfer().source_location_state()
    }

    fn transfer_state(&self) -> TransferState {
        self.shared.transfer_state()
    }

    fn content(&self) -> TransferResult<Content> {
        let outcome = self.outcome();
        if outcome.is_pending() {
            return Err(TransferError::not_completed(self.shared.transfer_state()));
        }
        outcome.into_content()
    }

    fn cancel(&self) {
        self.shared.cancel();
    }
}

impl std::fmt::Debug for TransferAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferAggregator")
            .field("transfers", &self.shared.roster.len())
            .field("phase", &self.shared.phase())
            .field("outcome", &*self.shared.outcome.borrow())
            .finish_non_exhaustive()
    }
}
