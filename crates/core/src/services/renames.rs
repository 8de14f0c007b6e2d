//! Bulk rename import.
//!
//! Each line is `<hex address> <decimal type> <name...>`. The name is taken
//! verbatim from a fixed column so names containing spaces survive. Only
//! existing symbols are renamed; the importer never creates symbols and does
//! not check the declared type against the symbol's kind.

use std::fs;
use std::path::Path;

use crate::db::SymbolDb;
use crate::error::{Error, Result};

/// Column where the name field starts (`"%08x %02d "` is 12 characters wide).
pub const NAME_COLUMN: usize = 12;

/// Lines shorter than this are skipped without being counted as malformed.
pub const MIN_LINE_LEN: usize = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenameReport {
    /// Symbols whose name was overwritten.
    pub applied: usize,
    /// Lines under [`MIN_LINE_LEN`] characters (no-ops).
    pub short_lines: usize,
    /// Lines that could not be tokenized.
    pub malformed: usize,
    /// Well-formed lines naming an address with no symbol.
    pub unmatched: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameLine {
    Short,
    Malformed,
    Rename { address: u32, declared_type: u32, name: String },
}

pub fn parse_line(line: &str) -> RenameLine {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.chars().count() < MIN_LINE_LEN {
        return RenameLine::Short;
    }

    let mut tokens = line.split_whitespace();
    let Some(address) = tokens.next().and_then(|t| u32::from_str_radix(t, 16).ok()) else {
        return RenameLine::Malformed;
    };
    let Some(declared_type) = tokens.next().and_then(|t| t.parse::<u32>().ok()) else {
        return RenameLine::Malformed;
    };
    match line.get(NAME_COLUMN..) {
        Some(name) if !name.trim().is_empty() => {
            RenameLine::Rename { address, declared_type, name: name.to_string() }
        }
        _ => RenameLine::Malformed,
    }
}

/// Apply every rename in `text` to `db`.
pub fn apply_str(text: &str, db: &mut SymbolDb) -> RenameReport {
    let mut report = RenameReport::default();
    for line in text.lines() {
        match parse_line(line) {
            RenameLine::Short => report.short_lines += 1,
            RenameLine::Malformed => report.malformed += 1,
            RenameLine::Rename { address, name, .. } => {
                if db.rename(address, name) {
                    report.applied += 1;
                } else {
                    report.unmatched += 1;
                }
            }
        }
    }
    report
}

/// Apply the rename file at `path` to `db`.
pub fn apply_renames(path: &Path, db: &mut SymbolDb) -> Result<RenameReport> {
    let raw = fs::read(path).map_err(|e| Error::from_io(path, e))?;
    Ok(apply_str(&String::from_utf8_lossy(&raw), db))
}
