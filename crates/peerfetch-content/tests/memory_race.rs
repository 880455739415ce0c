//! End-to-end races over the in-memory provider.
//!
//! Every test builds real `MemoryProvider`s on the test runtime and lets the
//! aggregator race their transfers. Most tests run with paused time, so the
//! timer-driven transfers finish instantly and deterministically.
//!
//! # What is tested
//!
//! - The fastest transfer wins and every loser is cancelled
//! - `LocatingHasMany` stops the search on selected and standby transfers
//! - Failing transfers hand the selection to a standby
//! - A race where everything fails reports `AllTransfersFailed`
//! - Cancelling the aggregator cancels every transfer
//! - Only the selected transfer's events reach external listeners
//! - A multi-threaded race still produces exactly one winner

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;

use peerfetch_content::{
    AggregatorConfig, AggregatorEvent, AggregatorListener, Content, ContentId, ContentShare,
    ContentTransfer, MemoryProvider, ProviderHandle, RaceOutcome, SourceLocationState,
    TransferAggregator, TransferError, TransferEvent, TransferHandle, TransferListener,
    TransferProfile, TransferState, same_transfer,
};

const WAIT: Duration = Duration::from_secs(30);

// ── Helpers ────────────────────────────────────────────────────────

fn provider(name: &str, id: ContentId, payload: &str, profile: TransferProfile) -> ProviderHandle {
    Arc::new(
        MemoryProvider::new(name, Handle::current(), profile)
            .unwrap()
            .with_content(Content::new(id, "text/plain", payload.to_owned())),
    )
}

fn chunked(interval_ms: u64) -> TransferProfile {
    TransferProfile::default().with_chunks(4096, Duration::from_millis(interval_ms))
}

fn seeded() -> AggregatorConfig {
    AggregatorConfig::new().with_shuffle_seed(7)
}

/// Records the transfer behind every forwarded event.
#[derive(Default)]
struct Forwarded {
    transfers: Mutex<Vec<TransferHandle>>,
}

impl Forwarded {
    fn push(&self, event: &TransferEvent) {
        self.transfers.lock().unwrap().push(Arc::clone(&event.transfer));
    }
}

impl TransferListener for Forwarded {
    fn content_location_state_updated(&self, event: &TransferEvent) {
        self.push(event);
    }

    fn content_transfer_state_updated(&self, event: &TransferEvent) {
        self.push(event);
    }

    fn content_transfer_progress(&self, event: &TransferEvent) {
        self.push(event);
    }
}

/// Records every selection change.
#[derive(Default)]
struct Selections {
    delegates: Mutex<Vec<TransferHandle>>,
}

impl AggregatorListener for Selections {
    fn selected_content_transfer(&self, event: &AggregatorEvent) {
        if let Some(delegate) = event.delegate() {
            self.delegates.lock().unwrap().push(Arc::clone(delegate));
        }
    }
}

// ── Races ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn fastest_transfer_wins() {
    let id = ContentId::new_random();
    let providers = vec![
        provider("slow-a", id, "slow-a", chunked(50)),
        provider("fast", id, "fast", chunked(1)),
        provider("slow-b", id, "slow-b", chunked(50)),
    ];
    let share = ContentShare::new(id);
    let aggregator = TransferAggregator::with_config(&providers, Some(&share), seeded()).unwrap();

    aggregator.start_source_location();
    let content = aggregator.wait_for_content(WAIT).await.unwrap();

    assert_eq!(&content.data[..], b"fast");
    let RaceOutcome::Completed { winner, .. } = aggregator.outcome() else {
        panic!("race was not won");
    };
    for (index, transfer) in aggregator.content_transfer_list().iter().enumerate() {
        let expected = if index == winner {
            TransferState::Completed
        } else {
            TransferState::Cancelled
        };
        assert_eq!(transfer.transfer_state(), expected);
        assert!(!transfer.source_location_state().is_locating());
    }

    let current = aggregator.current_content_transfer();
    assert!(same_transfer(&current, &aggregator.content_transfer_list()[winner]));
}

#[tokio::test(start_paused = true)]
async fn has_many_stops_every_search() {
    let id = ContentId::new_random();
    let profile = chunked(1_000).with_sources(1, 2);
    let providers: Vec<ProviderHandle> = (0..3)
        .map(|i| provider(&format!("p{i}"), id, "payload", profile.clone()))
        .collect();
    let share = ContentShare::new(id);
    let aggregator = TransferAggregator::with_config(&providers, Some(&share), seeded()).unwrap();

    aggregator.start_source_location();
    tokio::time::sleep(Duration::from_millis(25)).await;

    for transfer in aggregator.content_transfer_list() {
        assert_eq!(
            transfer.source_location_state(),
            SourceLocationState::NotLocatingHasMany
        );
    }
    assert!(aggregator.outcome().is_pending());
    aggregator.cancel();
}

#[tokio::test(start_paused = true)]
async fn has_enough_keeps_searching() {
    let id = ContentId::new_random();
    let profile = chunked(1_000).with_sources(1, 10);
    let providers: Vec<ProviderHandle> = (0..2)
        .map(|i| provider(&format!("p{i}"), id, "payload", profile.clone()))
        .collect();
    let share = ContentShare::new(id);
    let aggregator = TransferAggregator::with_config(&providers, Some(&share), seeded()).unwrap();

    aggregator.start_source_location();
    tokio::time::sleep(Duration::from_millis(35)).await;

    for transfer in aggregator.content_transfer_list() {
        assert_eq!(
            transfer.source_location_state(),
            SourceLocationState::LocatingHasEnough
        );
    }
    aggregator.cancel();
}

#[tokio::test(start_paused = true)]
async fn failures_hand_selection_to_a_standby() {
    let id = ContentId::new_random();
    let providers = vec![
        provider("broken-a", id, "broken-a", chunked(1).failing_after(0)),
        provider("broken-b", id, "broken-b", chunked(1).failing_after(0)),
        provider("steady", id, "steady", chunked(40)),
    ];
    let share = ContentShare::new(id);
    let aggregator = TransferAggregator::with_config(&providers, Some(&share), seeded()).unwrap();
    let selections = Arc::new(Selections::default());
    aggregator.add_content_transfer_aggregator_listener(Arc::clone(&selections) as _);

    aggregator.start_source_location();
    let content = aggregator.wait_for_content(WAIT).await.unwrap();

    assert_eq!(&content.data[..], b"steady");
    let delegates = selections.delegates.lock().unwrap().clone();
    let last = delegates.last().unwrap();
    assert!(same_transfer(last, &aggregator.current_content_transfer()));
    assert_eq!(
        aggregator.current_content_transfer().transfer_state(),
        TransferState::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn all_failures_fail_the_race() {
    let id = ContentId::new_random();
    let providers: Vec<ProviderHandle> = (0..3)
        .map(|i| provider(&format!("p{i}"), id, "payload", chunked(2).failing_after(0)))
        .collect();
    let share = ContentShare::new(id);
    let aggregator = TransferAggregator::new(&providers, Some(&share)).unwrap();

    aggregator.start_source_location();
    let err = aggregator.wait_for_content(WAIT).await.unwrap_err();

    assert_eq!(err, TransferError::AllTransfersFailed { attempts: 3 });
    assert!(err.is_recoverable());
    assert_eq!(aggregator.transfer_state(), TransferState::Failed);
}

#[tokio::test(start_paused = true)]
async fn cancel_cancels_every_transfer() {
    let id = ContentId::new_random();
    let providers: Vec<ProviderHandle> = (0..3)
        .map(|i| provider(&format!("p{i}"), id, "payload", chunked(500)))
        .collect();
    let share = ContentShare::new(id);
    let aggregator = TransferAggregator::new(&providers, Some(&share)).unwrap();

    aggregator.start_source_location();
    tokio::time::sleep(Duration::from_millis(30)).await;
    aggregator.cancel();

    let err = aggregator.wait_for_content(WAIT).await.unwrap_err();
    assert!(err.is_cancelled());
    for transfer in aggregator.content_transfer_list() {
        assert_eq!(transfer.transfer_state(), TransferState::Cancelled);
    }
}

#[tokio::test(start_paused = true)]
async fn only_selected_events_are_forwarded() {
    let id = ContentId::new_random();
    let providers: Vec<ProviderHandle> = (0..4)
        .map(|i| provider(&format!("p{i}"), id, "x".repeat(20_000).as_str(), chunked(3 + i)))
        .collect();
    let share = ContentShare::new(id);
    let aggregator = TransferAggregator::with_config(&providers, Some(&share), seeded()).unwrap();
    let forwarded = Arc::new(Forwarded::default());
    aggregator.add_content_transfer_listener(Arc::clone(&forwarded) as _);
    let initial = aggregator.current_content_transfer();

    aggregator.start_source_location();
    aggregator.wait_for_content(WAIT).await.unwrap();
    let winner = aggregator.current_content_transfer();

    let transfers = forwarded.transfers.lock().unwrap().clone();
    assert!(!transfers.is_empty());
    for transfer in &transfers {
        assert!(same_transfer(transfer, &initial) || same_transfer(transfer, &winner));
    }
    assert!(same_transfer(transfers.last().unwrap(), &winner));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_race_has_one_winner() {
    let id = ContentId::new_random();
    let providers: Vec<ProviderHandle> = (0..8)
        .map(|i| provider(&format!("p{i}"), id, &format!("payload-{i}"), chunked(1)))
        .collect();
    let share = ContentShare::new(id);
    let aggregator = TransferAggregator::new(&providers, Some(&share)).unwrap();
    let mut outcome = aggregator.subscribe_outcome();

    aggregator.start_source_location();
    let content = aggregator.wait_for_content(WAIT).await.unwrap();

    let decided = outcome.wait_for(|o| !o.is_pending()).await.unwrap().clone();
    let RaceOutcome::Completed { winner, content: won } = decided else {
        panic!("race was not won");
    };
    assert_eq!(won, content);

    let roster = aggregator.content_transfer_list();
    assert_eq!(roster[winner].transfer_state(), TransferState::Completed);
    for (index, transfer) in roster.iter().enumerate() {
        assert!(transfer.transfer_state().is_finished(), "transfer {index} still running");
    }
}
