//! Shared CLI presentation utilities.
//!
//! # Guidelines
//!
//! - Keep this module format-only: no race logic
//! - Everything printed to stdout goes through here

pub mod report;

pub use report::{EventKind, RaceReport, ReportEvent, ReportStatus};

/// Format a byte count with a binary unit.
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn transfer_label(transfer: Option<usize>) -> String {
    transfer.map_or_else(|| "#?".to_string(), |t| format!("#{t}"))
}

/// One line describing an event, as printed in the live log.
pub fn format_event(event: &ReportEvent) -> String {
    let detail = match &event.kind {
        EventKind::Location { state, sources } => match sources {
            Some(n) => format!("location {state} ({n} sources)"),
            None => format!("location {state}"),
        },
        EventKind::State { state } => format!("state {state}"),
        EventKind::Progress { received, total } => format!(
            "progress {} / {}",
            format_bytes(*received),
            format_bytes(*total)
        ),
        EventKind::Selected => "selected".to_string(),
    };
    format!(
        "[{:>6} ms] {:<4} {detail}",
        event.at_ms,
        transfer_label(event.transfer)
    )
}

/// Print one event line.
pub fn print_event(event: &ReportEvent) {
    println!("{}", format_event(event));
}

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Print the end-of-race summary.
pub fn print_summary(report: &RaceReport) {
    print_separator(48);
    println!("Content:     {}", report.content_id);
    println!(
        "Transfers:   {} from {} provider(s)",
        report.transfers, report.providers
    );
    for (index, name) in report.roster.iter().enumerate() {
        let marker = if report.winner == Some(index) { "*" } else { " " };
        println!("  {marker} #{index:<3} {name}");
    }
    println!("Selections:  {}", report.selections());
    match (report.status, report.winner, &report.error) {
        (ReportStatus::Completed, Some(winner), _) => {
            let bytes = report.bytes.map_or(0, |b| b as u64);
            println!(
                "Result:      #{winner} won with {} in {} ms",
                format_bytes(bytes),
                report.elapsed_ms
            );
        }
        (_, _, Some(err)) => println!("Result:      {} ({err})", err.user_message()),
        (status, ..) => println!("Result:      {status:?}"),
    }
}

/// Render the report as pretty JSON.
pub fn render_json(report: &RaceReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
