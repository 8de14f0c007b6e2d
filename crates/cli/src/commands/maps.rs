use std::path::Path;

use anyhow::{anyhow, Context, Result};
use symscan_core::session::MapOutcome;

use crate::commands::scan::print_generate_report;
use crate::{has_bodies, open_session, persist_map, SessionOptions};

/// Load `map`, or scan the fallback range when the file does not exist.
pub fn load_command(
    options: &SessionOptions,
    map: &Path,
    out: Option<&Path>,
    with_body: bool,
) -> Result<()> {
    let options = options.clone().with_map(None);
    let mut session = open_session(&options)?;
    let outcome = session
        .load_map_or_scan(map)
        .with_context(|| format!("Failed to load symbol map {}", map.display()))?;

    match outcome {
        MapOutcome::Loaded { map: report, callers } => {
            tracing::info!(
                loaded = report.loaded,
                malformed = report.malformed,
                "symbol map loaded"
            );
            println!("Loaded {}:", map.display());
            println!("  Symbols: {}", report.loaded);
            println!("  Malformed lines: {}", report.malformed);
            println!("  Duplicate addresses: {}", report.duplicates);
            println!("  Overlapping bodies dropped: {}", report.overlapping);
            println!("  Sized from image: {}", report.measured);
            println!("  Calls resolved: {}", callers.resolved_calls);
        }
        MapOutcome::Scanned(report) => {
            let range = session.config().fallback_range;
            tracing::info!(map = %map.display(), "no symbol map, scanned fallback range");
            println!(
                "No map at {}; scanned {:#010x}..{:#010x}:",
                map.display(),
                range.start,
                range.end
            );
            print_generate_report(&report);
        }
    }

    if let Some(path) = persist_map(&session, out, None, with_body)? {
        println!("  Map: {}", path.display());
    }
    Ok(())
}

/// Remove symbols (all, by prefix, or placeholders only) and rewrite the map.
pub fn clear_command(
    options: &SessionOptions,
    prefix: Option<&str>,
    placeholders: bool,
    out: Option<&Path>,
) -> Result<()> {
    if options.map.is_none() && out.is_none() {
        return Err(anyhow!("clear needs --map or --out to have anything to write"));
    }
    let mut session = open_session(options)?;
    let removed = if placeholders {
        session.clean_placeholders()
    } else {
        session.clear(prefix)
    };
    tracing::info!(removed, remaining = session.db().len(), "symbols cleared");

    println!("Removed {removed} symbol(s); {} remain.", session.db().len());
    persist_map(&session, out, options.map.as_deref(), has_bodies(&session))?;
    Ok(())
}

/// Apply a rename file to the map's symbols and rewrite the map.
pub fn rename_command(options: &SessionOptions, renames: &Path, out: Option<&Path>) -> Result<()> {
    if options.map.is_none() {
        return Err(anyhow!("rename needs --map with the symbols to rename"));
    }
    let mut session = open_session(options)?;
    let report = session
        .apply_renames(renames)
        .with_context(|| format!("Failed to apply renames from {}", renames.display()))?;
    if report.malformed > 0 {
        tracing::warn!(malformed = report.malformed, "skipped malformed rename lines");
    }
    tracing::info!(applied = report.applied, unmatched = report.unmatched, "renames applied");

    println!("Renamed {} symbol(s).", report.applied);
    println!("  Unmatched addresses: {}", report.unmatched);
    println!("  Malformed lines: {}", report.malformed);
    persist_map(&session, out, options.map.as_deref(), has_bodies(&session))?;
    Ok(())
}
