//! Race command handler.
//!
//! Builds a set of in-memory providers with staggered timing, races them
//! through a `TransferAggregator`, and reports every forwarded event and
//! selection change.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::runtime::Handle;

use peerfetch_content::{
    AggregatorConfig, AggregatorEvent, AggregatorListener, Content, ContentId, ContentProvider,
    ContentShare, ContentTransfer, ListenerHandle, MemoryProvider, PromotionPolicy,
    ProviderHandle, RaceOutcome, TransferAggregator, TransferError, TransferEvent,
    TransferHandle, TransferListener, TransferProfile, same_transfer,
};

use crate::commands::RaceArgs;
use crate::error::CliError;
use crate::presentation::{
    self, EventKind, RaceReport, ReportEvent, ReportStatus, print_event, print_summary,
};

const MIME_TYPE: &str = "application/octet-stream";

/// Validated race parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RacePlan {
    pub providers: usize,
    pub size: usize,
    pub failing: usize,
    pub seed: Option<u64>,
    pub timeout: Duration,
    pub promotion: PromotionPolicy,
}

impl RacePlan {
    /// Validate command-line arguments.
    pub fn from_args(args: &RaceArgs) -> Result<Self, CliError> {
        if args.providers == 0 {
            return Err(CliError::Arguments(
                "--providers must be at least 1".to_string(),
            ));
        }
        if args.fail > args.providers {
            return Err(CliError::Arguments(format!(
                "--fail ({}) cannot exceed --providers ({})",
                args.fail, args.providers
            )));
        }
        if args.timeout_ms == 0 {
            return Err(CliError::Arguments(
                "--timeout-ms must be positive".to_string(),
            ));
        }

        Ok(Self {
            providers: args.providers,
            size: args.size,
            failing: args.fail,
            seed: args.seed,
            timeout: Duration::from_millis(args.timeout_ms),
            promotion: if args.retain_failed {
                PromotionPolicy::Retain
            } else {
                PromotionPolicy::NextStandby
            },
        })
    }

    fn config(&self) -> AggregatorConfig {
        let config = AggregatorConfig::new().with_promotion(self.promotion);
        match self.seed {
            Some(seed) => config.with_shuffle_seed(seed),
            None => config,
        }
    }
}

/// Timing for provider `index`; failing providers give up after a few chunks.
pub fn profile_for(index: usize, failing: bool) -> TransferProfile {
    let locate_jitter = (index * 7 % 11) as u64;
    let chunk_jitter = (index * 5 % 7) as u64;
    let profile = TransferProfile::default()
        .with_locate_interval(Duration::from_millis(5 + locate_jitter))
        .with_sources(2, 4)
        .with_chunks(8 * 1024, Duration::from_millis(2 + chunk_jitter));
    if failing {
        profile.failing_after(1 + index % 3)
    } else {
        profile
    }
}

/// Deterministic payload of `size` bytes.
pub fn payload(size: usize) -> Content {
    let data: Vec<u8> = (0..size)
        .map(|i| u8::try_from(i % 251).unwrap_or_default())
        .collect();
    Content::new(ContentId::new_random(), MIME_TYPE, data)
}

/// Memory provider that remembers the transfer it handed out.
struct Tracked {
    name: String,
    inner: MemoryProvider,
    issued: Mutex<Option<TransferHandle>>,
}

impl ContentProvider for Tracked {
    fn retrieve_content(&self, share: Option<&ContentShare>) -> Option<TransferHandle> {
        let transfer = self.inner.retrieve_content(share)?;
        *self.issued.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&transfer));
        Some(transfer)
    }
}

impl Tracked {
    fn issued(&self, transfer: &TransferHandle) -> bool {
        self.issued
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| same_transfer(t, transfer))
    }
}

fn build_providers(
    plan: &RacePlan,
    content: &Content,
    runtime: &Handle,
) -> Result<Vec<Arc<Tracked>>, CliError> {
    (0..plan.providers)
        .map(|index| -> Result<Arc<Tracked>, CliError> {
            let failing = index < plan.failing;
            let name = format!("memory-{index}{}", if failing { " (flaky)" } else { "" });
            let inner = MemoryProvider::new(&name, runtime.clone(), profile_for(index, failing))?
                .with_content(content.clone());
            Ok(Arc::new(Tracked {
                name,
                inner,
                issued: Mutex::new(None),
            }))
        })
        .collect()
}

/// Listener that turns forwarded events into report entries.
struct RaceRecorder {
    started: Instant,
    roster: Vec<TransferHandle>,
    live: bool,
    events: Mutex<Vec<ReportEvent>>,
}

impl RaceRecorder {
    fn new(roster: Vec<TransferHandle>, live: bool) -> Self {
        Self {
            started: Instant::now(),
            roster,
            live,
            events: Mutex::new(Vec::new()),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    fn record(&self, transfer: &TransferHandle, kind: EventKind) {
        let event = ReportEvent {
            at_ms: self.elapsed_ms(),
            transfer: self.roster.iter().position(|t| same_transfer(t, transfer)),
            kind,
        };
        if self.live {
            print_event(&event);
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    fn take(&self) -> Vec<ReportEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl TransferListener for RaceRecorder {
    fn content_location_state_updated(&self, event: &TransferEvent) {
        let kind = EventKind::Location {
            state: event.location_state.unwrap_or_default(),
            sources: event.location_count,
        };
        self.record(&event.transfer, kind);
    }

    fn content_transfer_state_updated(&self, event: &TransferEvent) {
        let state = event
            .transfer_state
            .unwrap_or_else(|| event.transfer.transfer_state());
        self.record(&event.transfer, EventKind::State { state });
    }

    fn content_transfer_progress(&self, event: &TransferEvent) {
        let kind = EventKind::Progress {
            received: event.bytes_received.unwrap_or(0),
            total: event.bytes_total.unwrap_or(0),
        };
        self.record(&event.transfer, kind);
    }
}

impl AggregatorListener for RaceRecorder {
    fn selected_content_transfer(&self, event: &AggregatorEvent) {
        if let Some(delegate) = event.delegate() {
            self.record(delegate, EventKind::Selected);
        }
    }
}

const fn status_of(err: &TransferError) -> ReportStatus {
    match err {
        TransferError::Timeout { .. } => ReportStatus::TimedOut,
        TransferError::Cancelled => ReportStatus::Cancelled,
        _ => ReportStatus::Failed,
    }
}

/// Run one race on the current runtime and collect its report.
///
/// With `live` set, each event is printed as it arrives.
pub async fn run(plan: &RacePlan, live: bool) -> Result<RaceReport, CliError> {
    let started_at = Utc::now();
    let content = payload(plan.size);
    let tracked = build_providers(plan, &content, &Handle::current())?;
    let providers: Vec<ProviderHandle> = tracked
        .iter()
        .map(|p| Arc::clone(p) as ProviderHandle)
        .collect();

    let share = ContentShare::new(content.id)
        .with_name("demo.bin")
        .with_mime_type(MIME_TYPE);
    let aggregator = TransferAggregator::with_config(&providers, Some(&share), plan.config())?;

    let roster = aggregator.content_transfer_list();
    let names: Vec<String> = roster
        .iter()
        .map(|transfer| {
            tracked
                .iter()
                .find(|p| p.issued(transfer))
                .map_or_else(|| "unknown".to_string(), |p| p.name.clone())
        })
        .collect();

    let recorder = Arc::new(RaceRecorder::new(roster.clone(), live));
    aggregator.add_content_transfer_listener(Arc::clone(&recorder) as ListenerHandle);
    aggregator.add_content_transfer_aggregator_listener(
        Arc::clone(&recorder) as Arc<dyn AggregatorListener>
    );

    tracing::info!(
        content = %content.id,
        providers = plan.providers,
        failing = plan.failing,
        bytes = plan.size,
        "Starting race"
    );
    aggregator.start_source_location();

    let result = aggregator.wait_for_content(plan.timeout).await;
    if matches!(result, Err(TransferError::Timeout { .. })) {
        tracing::warn!(timeout_ms = plan.timeout.as_millis(), "Race timed out, cancelling");
        aggregator.cancel();
    }

    let winner = match aggregator.outcome() {
        RaceOutcome::Completed { winner, .. } => Some(winner),
        _ => None,
    };
    let (status, bytes, error) = match result {
        Ok(content) => (ReportStatus::Completed, Some(content.len()), None),
        Err(err) => (status_of(&err), None, Some(err)),
    };

    Ok(RaceReport {
        content_id: content.id.to_string(),
        started_at,
        elapsed_ms: recorder.elapsed_ms(),
        providers: plan.providers,
        transfers: roster.len(),
        roster: names,
        status,
        winner,
        bytes,
        error,
        events: recorder.take(),
    })
}

/// Execute the race command.
///
/// Prints a live event log followed by a summary, or a single JSON report
/// with `--json`. Fails (with a matching exit code) unless a transfer won.
pub async fn execute(args: &RaceArgs) -> Result<(), CliError> {
    let plan = RacePlan::from_args(args)?;
    let report = run(&plan, !args.json).await?;

    if args.json {
        println!("{}", presentation::render_json(&report)?);
    } else {
        print_summary(&report);
    }

    match report.error {
        Some(err) => Err(CliError::Transfer(err)),
        None => Ok(()),
    }
}
