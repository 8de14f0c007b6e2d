use std::path::Path;

use anyhow::{anyhow, Context, Result};
use symscan_core::analysis::ScanObserver;
use symscan_core::model::Symbol;
use symscan_core::session::Session;

/// Parse an address given as hex, with or without a `0x` prefix.
pub fn parse_address(text: &str) -> Result<u32> {
    let trimmed = text.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > 8 {
        return Err(anyhow!("Invalid address '{text}': expected up to 8 hex digits"));
    }
    u32::from_str_radix(digits, 16).map_err(|_| anyhow!("Invalid address '{text}': not hex"))
}

/// clap `value_parser` adapter for [`parse_address`].
pub fn address_arg(text: &str) -> std::result::Result<u32, String> {
    parse_address(text).map_err(|e| e.to_string())
}

/// Save the session's symbols to `out` when given, else back to `map`.
///
/// Returns the path written, or `None` when there was nowhere to write.
pub fn persist_map<'a>(
    session: &Session,
    out: Option<&'a Path>,
    map: Option<&'a Path>,
    with_body: bool,
) -> Result<Option<&'a Path>> {
    let Some(target) = out.or(map) else {
        return Ok(None);
    };
    session
        .map_save(target, with_body)
        .with_context(|| format!("Failed to write symbol map {}", target.display()))?;
    tracing::info!(
        path = %target.display(),
        symbols = session.db().len(),
        with_body,
        "symbol map written"
    );
    Ok(Some(target))
}

/// True when symbols were loaded from a map that carried bodies, so rewrites keep them.
pub fn has_bodies(session: &Session) -> bool {
    session.symbols().any(|s| s.body.is_some())
}

/// One listing line: address, kind, size and name.
pub fn format_symbol(symbol: &Symbol) -> String {
    format!(
        "{:08x} {:<8} {:#07x} {}",
        symbol.address,
        symbol.kind.as_str(),
        symbol.size,
        symbol.name
    )
}

/// Observer that reports progress of long operations as `tracing` events.
#[derive(Debug, Clone, Copy)]
pub struct LogProgress {
    pub operation: &'static str,
}

impl LogProgress {
    pub fn new(operation: &'static str) -> Self {
        Self { operation }
    }
}

impl ScanObserver for LogProgress {
    fn on_progress(&mut self, done: usize) {
        tracing::debug!(operation = self.operation, done, "progress");
    }
}
