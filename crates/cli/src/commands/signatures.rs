use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::{has_bodies, open_session, persist_map, LogProgress, SessionOptions};

/// Hash the map's functions (optionally only those named `prefix*`) into a
/// signature library at `out`.
pub fn sig_create_command(
    options: &SessionOptions,
    out: &Path,
    prefix: Option<&str>,
) -> Result<()> {
    if options.map.is_none() {
        return Err(anyhow!("sig-create needs --map with named functions"));
    }
    let session = open_session(options)?;
    let (signatures, report) =
        session.signature_initialize_with(prefix, &mut LogProgress::new("sig-create"));
    if report.unreadable > 0 {
        tracing::warn!(unreadable = report.unreadable, "skipped functions outside the image");
    }
    session
        .signature_save(&signatures, out)
        .with_context(|| format!("Failed to write signature library {}", out.display()))?;
    tracing::info!(records = signatures.len(), path = %out.display(), "signature library written");

    println!("Wrote {} signature(s) to {}", signatures.len(), out.display());
    if report.unreadable > 0 {
        println!("  Skipped (unreadable): {}", report.unreadable);
    }
    Ok(())
}

/// Name placeholder functions from a signature library and rewrite the map.
pub fn sig_apply_command(options: &SessionOptions, sig: &Path, out: Option<&Path>) -> Result<()> {
    let mut session = open_session(options)?;
    let signatures = session
        .signature_load(sig)
        .with_context(|| format!("Failed to load signature library {}", sig.display()))?;
    let report = session.signature_apply_with(&signatures, &mut LogProgress::new("sig-apply"));
    tracing::info!(matched = report.matched, records = signatures.len(), "signatures applied");

    println!("Named {} function(s) from {}", report.matched, sig.display());
    if report.unreadable > 0 {
        println!("  Skipped (unreadable): {}", report.unreadable);
    }
    persist_map(&session, out, options.map.as_deref(), has_bodies(&session))?;
    Ok(())
}
