use std::path::Path;

use anyhow::{Context, Result};
use symscan_core::analysis::ScanReport;
use symscan_core::session::GenerateReport;

use crate::{open_session, persist_map, LogProgress, SessionOptions};

fn print_scan_report(report: &ScanReport) {
    println!("  Functions: {}", report.functions);
    println!("  Gaps: {}", report.gaps);
    println!("  External calls: {}", report.external_calls);
    if report.truncated > 0 {
        println!("  Shortened at the range start: {}", report.truncated);
    }
    if report.unterminated {
        println!("  Trailing code without a return was discarded.");
    }
    if report.cancelled {
        println!("  Cancelled before the end of the range.");
    }
}

/// Print a generate/fallback scan report, including signature naming.
pub fn print_generate_report(report: &GenerateReport) {
    print_scan_report(&report.scan);
    match report.named {
        Some(named) => println!("  Named from signatures: {named}"),
        None => println!("  Named from signatures: (no signature library)"),
    }
    println!(
        "  Calls resolved: {} (unresolved: {})",
        report.callers.resolved_calls, report.callers.unresolved_calls
    );
}

/// Scan `[start, end)` for functions and optionally write the resulting map.
pub fn scan_command(
    options: &SessionOptions,
    start: u32,
    end: u32,
    out: Option<&Path>,
    with_body: bool,
) -> Result<()> {
    let mut session = open_session(options)?;
    let report = session
        .scan_with(start, end, &mut LogProgress::new("scan"))
        .with_context(|| format!("Failed to scan {start:#010x}..{end:#010x}"))?;
    let callers = session.fill_callers();
    tracing::info!(
        functions = report.functions,
        gaps = report.gaps,
        resolved_calls = callers.resolved_calls,
        "scan finished"
    );

    println!("Scanned {start:#010x}..{end:#010x}:");
    print_scan_report(&report);
    if let Some(path) = persist_map(&session, out, None, with_body)? {
        println!("  Map: {}", path.display());
    }
    Ok(())
}

/// Scan the configured generate range and name what the signature library knows.
pub fn generate_command(
    options: &SessionOptions,
    out: Option<&Path>,
    with_body: bool,
) -> Result<()> {
    let mut session = open_session(options)?;
    let range = session.config().generate_range;
    let report = session.generate_symbol_map().context("Failed to generate symbol map")?;
    tracing::info!(
        functions = report.scan.functions,
        named = report.named.unwrap_or(0),
        "symbol map generated"
    );

    println!("Generated symbol map for {:#010x}..{:#010x}:", range.start, range.end);
    print_generate_report(&report);
    if let Some(path) = persist_map(&session, out, None, with_body)? {
        println!("  Map: {}", path.display());
    }
    Ok(())
}
