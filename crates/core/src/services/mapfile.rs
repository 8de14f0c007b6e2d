//! Text symbol map codec.
//!
//! One record per line:
//!
//! ```text
//! <8-hex-digit address> <2-digit type> <name>[\t<hex body>]
//! ```
//!
//! `type` is `00` for functions and `01` for data. The optional tab-separated
//! hex blob carries the symbol's raw bytes so a map can be re-analysed without
//! the original image. Blank lines and lines starting with `#` are ignored.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::backends::MemoryImage;
use crate::db::{body_of, SymbolDb};
use crate::error::{Error, Result};
use crate::model::{placeholder_name, Symbol, SymbolKind};
use crate::services::util::{from_hex, to_hex, write_atomically};

/// Counters describing a map load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapLoadReport {
    /// Symbols present in the resulting database.
    pub loaded: usize,
    /// Lines skipped because they could not be parsed.
    pub malformed: usize,
    /// Lines whose address repeated an earlier line (the later line wins).
    pub duplicates: usize,
    /// Records that carried a body blob.
    pub with_body: usize,
    /// Records dropped because their body overlapped a later function.
    pub overlapping: usize,
    /// Bodiless functions sized by walking the image. Filled by the session.
    pub measured: usize,
}

/// Result of parsing one map line.
#[derive(Debug, PartialEq, Eq)]
pub enum MapLine {
    /// Blank or comment line.
    Ignored,
    Record(Symbol),
    Malformed,
}

/// Parse one line of a map file.
pub fn parse_line(line: &str) -> MapLine {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() || line.starts_with('#') {
        return MapLine::Ignored;
    }

    let (head, blob) = match line.split_once('\t') {
        Some((head, blob)) => (head, Some(blob.trim())),
        None => (line, None),
    };

    let mut fields = head.splitn(3, ' ');
    let (Some(address), Some(kind), Some(name)) = (fields.next(), fields.next(), fields.next())
    else {
        return MapLine::Malformed;
    };
    if address.is_empty() || address.len() > 8 {
        return MapLine::Malformed;
    }
    let Ok(address) = u32::from_str_radix(address, 16) else {
        return MapLine::Malformed;
    };
    let Some(kind) = kind.parse::<u8>().ok().and_then(SymbolKind::from_u8) else {
        return MapLine::Malformed;
    };
    if name.trim().is_empty() {
        return MapLine::Malformed;
    }

    let mut symbol = Symbol::new(address, 0, name, kind);
    if let Some(blob) = blob.filter(|b| !b.is_empty()) {
        let Some(body) = from_hex(blob) else {
            return MapLine::Malformed;
        };
        let Ok(size) = u32::try_from(body.len()) else {
            return MapLine::Malformed;
        };
        symbol.size = size;
        symbol.body = Some(body);
    }
    MapLine::Record(symbol)
}

/// Load a map file into a fresh database.
///
/// Fails with [`Error::NotFound`] when the file is absent. Functions loaded
/// without a body get their size inferred as the distance to the next symbol.
/// A function whose body overlaps the next function is dropped and counted.
pub fn load(path: &Path) -> Result<(SymbolDb, MapLoadReport)> {
    let raw = fs::read(path).map_err(|e| Error::from_io(path, e))?;
    let text = String::from_utf8_lossy(&raw);

    let mut report = MapLoadReport::default();
    let mut parsed: BTreeMap<u32, Symbol> = BTreeMap::new();
    for line in text.lines() {
        match parse_line(line) {
            MapLine::Ignored => {}
            MapLine::Malformed => report.malformed += 1,
            MapLine::Record(symbol) => {
                if parsed.insert(symbol.address, symbol).is_some() {
                    report.duplicates += 1;
                }
            }
        }
    }

    let next_addresses: Vec<Option<u32>> =
        parsed.keys().skip(1).map(|a| Some(*a)).chain(std::iter::once(None)).collect();
    let mut db = SymbolDb::new();
    for (mut symbol, next) in parsed.into_values().zip(next_addresses) {
        if symbol.body.is_some() {
            report.with_body += 1;
        } else if symbol.is_function() {
            symbol.size = next.map_or(0, |next| next - symbol.address);
        }
        report.overlapping += db.insert(symbol);
    }
    report.loaded = db.len();
    Ok((db, report))
}

/// Format one record line (without the trailing newline).
pub fn format_line(symbol: &Symbol, body: Option<&[u8]>) -> String {
    let name = sanitize_name(symbol);
    let mut line = format!("{:08x} {:02} {}", symbol.address, symbol.kind.to_u8(), name);
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        line.push('\t');
        line.push_str(&to_hex(body));
    }
    line
}

fn sanitize_name(symbol: &Symbol) -> String {
    let name: String = symbol
        .name
        .chars()
        .map(|c| if matches!(c, '\t' | '\r' | '\n') { ' ' } else { c })
        .collect();
    if name.trim().is_empty() {
        placeholder_name(symbol.address)
    } else {
        name
    }
}

/// Write `db` to `path`, ascending by address, replacing the file atomically.
///
/// With `with_body`, each symbol's bytes (stored body, else read from
/// `image`) are appended; symbols whose bytes cannot be read are written
/// without a blob.
pub fn save(
    db: &SymbolDb,
    path: &Path,
    with_body: bool,
    image: Option<&dyn MemoryImage>,
) -> Result<()> {
    write_atomically(path, |w: &mut dyn Write| {
        for symbol in db.iter() {
            let body = if with_body { body_for_save(symbol, image) } else { None };
            writeln!(w, "{}", format_line(symbol, body.as_deref()))?;
        }
        Ok(())
    })
}

fn body_for_save(symbol: &Symbol, image: Option<&dyn MemoryImage>) -> Option<Vec<u8>> {
    match (&symbol.body, image) {
        (Some(body), _) => Some(body.clone()),
        (None, Some(image)) => body_of(symbol, image).ok().map(|b| b.into_owned()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_records_and_keeps_spaces_in_names() {
        let MapLine::Record(sym) = parse_line("80003100 00 operator new(unsigned long)") else {
            panic!("expected a record");
        };
        assert_eq!(sym.address, 0x8000_3100);
        assert_eq!(sym.kind, SymbolKind::Function);
        assert_eq!(sym.name, "operator new(unsigned long)");
        assert!(sym.body.is_none());
    }

    #[test]
    fn parses_body_blob() {
        let MapLine::Record(sym) = parse_line("80003100 01 table\t0011aabb") else {
            panic!("expected a record");
        };
        assert_eq!(sym.kind, SymbolKind::Data);
        assert_eq!(sym.size, 4);
        assert_eq!(sym.body.as_deref(), Some(&[0x00, 0x11, 0xaa, 0xbb][..]));
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in [
            "80003100 00",
            "zzzzzzzz 00 name",
            "800031000 00 name",
            "80003100 07 name",
            "80003100 xx name",
            "80003100 00 name\tnothex",
        ] {
            assert_eq!(parse_line(line), MapLine::Malformed, "line {line:?}");
        }
        assert_eq!(parse_line(""), MapLine::Ignored);
        assert_eq!(parse_line("# generated"), MapLine::Ignored);
    }

    #[test]
    fn format_line_uses_fixed_width_fields() {
        let sym = Symbol::function(0x8130_0010, 8).with_name("with\ttab");
        assert_eq!(format_line(&sym, None), "81300010 00 with tab");
        let blr = [0x4e, 0x80, 0x00, 0x20];
        assert_eq!(format_line(&sym, Some(&blr)), "81300010 00 with tab\t4e800020");
    }
}
