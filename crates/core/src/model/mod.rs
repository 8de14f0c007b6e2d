//! Core data model: symbols and address ranges.
//!
//! A [`Symbol`] is one discovered or loaded unit of code or data. Symbols are
//! keyed by address inside a [`crate::db::SymbolDb`]; nothing outside the
//! database holds references into its storage.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Prefix of synthesized names given to functions that have not been resolved.
pub const PLACEHOLDER_PREFIX: &str = "zz_";

/// Build the placeholder name for a symbol at `address` (e.g. `zz_81300000`).
pub fn placeholder_name(address: u32) -> String {
    format!("{PLACEHOLDER_PREFIX}{address:08x}")
}

/// True when `name` is exactly the synthesized placeholder form.
pub fn is_placeholder(name: &str) -> bool {
    match name.strip_prefix(PLACEHOLDER_PREFIX) {
        Some(hex) => hex.len() == 8 && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Kind of symbol.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Data,
}

impl SymbolKind {
    /// Encode as the numeric type field used in map and rename files.
    pub fn to_u8(self) -> u8 {
        match self {
            SymbolKind::Function => 0,
            SymbolKind::Data => 1,
        }
    }

    /// Decode the numeric type field; unknown values are rejected.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(SymbolKind::Function),
            1 => Some(SymbolKind::Data),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Data => "data",
        }
    }
}

/// One discovered or loaded code/data unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub address: u32,
    /// Byte length. For functions: from entry through the instruction ending the function.
    pub size: u32,
    pub name: String,
    pub kind: SymbolKind,
    /// Addresses of functions that call into this symbol. Filled by `fill_callers`.
    pub callers: IndexSet<u32>,
    /// Call targets found in this symbol's body. Derived, never persisted.
    pub callees: IndexSet<u32>,
    /// Raw body bytes, present only when loaded from a map saved with bodies.
    #[serde(default, skip_serializing)]
    pub body: Option<Vec<u8>>,
}

impl Symbol {
    /// A function with the placeholder name.
    pub fn function(address: u32, size: u32) -> Self {
        Self::new(address, size, placeholder_name(address), SymbolKind::Function)
    }

    /// A data symbol.
    pub fn data(address: u32, size: u32, name: impl Into<String>) -> Self {
        Self::new(address, size, name, SymbolKind::Data)
    }

    pub fn new(address: u32, size: u32, name: impl Into<String>, kind: SymbolKind) -> Self {
        Self {
            address,
            size,
            name: name.into(),
            kind,
            callers: IndexSet::new(),
            callees: IndexSet::new(),
            body: None,
        }
    }

    /// Builder-style helper to attach a resolved name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn is_function(&self) -> bool {
        self.kind == SymbolKind::Function
    }

    /// True while the symbol still carries the placeholder synthesized for
    /// its own address.
    pub fn has_placeholder_name(&self) -> bool {
        self.name == placeholder_name(self.address)
    }

    /// One past the last byte covered by this symbol.
    pub fn end(&self) -> u64 {
        u64::from(self.address) + u64::from(self.size)
    }

    /// Range containment, `[address, address + size)`.
    pub fn contains(&self, address: u32) -> bool {
        address >= self.address && u64::from(address) < self.end()
    }
}

/// Half-open address range `[start, end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressRange {
    pub start: u32,
    pub end: u32,
}

impl AddressRange {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, address: u32) -> bool {
        address >= self.start && address < self.end
    }
}
