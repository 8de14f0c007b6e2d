use anyhow::{anyhow, Result};
use symscan_core::model::Symbol;

use crate::{format_symbol, open_session, SessionOptions};

/// Print the symbol at `address`. With `containing`, fall back to the
/// function whose range covers it.
pub fn lookup_command(
    options: &SessionOptions,
    address: u32,
    containing: bool,
    json: bool,
) -> Result<()> {
    let session = open_session(options)?;
    let symbol = if containing {
        session.db().lookup_containing(address)
    } else {
        session.lookup(address)
    };
    let Some(symbol) = symbol else {
        return Err(anyhow!("No symbol at {address:#010x}"));
    };

    if json {
        println!("{}", serde_json::to_string_pretty(symbol)?);
        return Ok(());
    }

    println!("{}", format_symbol(symbol));
    print_refs("Callers", symbol.callers.iter());
    print_refs("Callees", symbol.callees.iter());
    Ok(())
}

fn print_refs<'a>(label: &str, addresses: impl Iterator<Item = &'a u32>) {
    let joined: Vec<String> = addresses.map(|a| format!("{a:08x}")).collect();
    if joined.is_empty() {
        println!("  {label}: (none)");
    } else {
        println!("  {label}: {}", joined.join(", "));
    }
}

/// List every symbol in ascending address order, optionally only functions.
pub fn list_command(options: &SessionOptions, functions_only: bool, json: bool) -> Result<()> {
    let session = open_session(options)?;
    let symbols: Vec<&Symbol> = if functions_only {
        session.db().functions().collect()
    } else {
        session.symbols().collect()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&symbols)?);
        return Ok(());
    }

    println!("Symbols:");
    if symbols.is_empty() {
        println!("(none)");
        return Ok(());
    }
    for symbol in symbols {
        println!("{}", format_symbol(symbol));
    }
    Ok(())
}
