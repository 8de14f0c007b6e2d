//! The in-memory symbol database.
//!
//! `SymbolDb` is the single source of truth for a debug session: an ordered
//! map from address to [`Symbol`]. Frontends re-query it by address instead of
//! holding references into its storage, so clears and reloads never leave
//! anything dangling.
//!
//! Invariant: the address ranges of two Function symbols never overlap.
//! [`SymbolDb::insert`] evicts overlapping functions to keep it.

use std::borrow::Cow;
use std::collections::BTreeMap;

use crate::backends::{InsnClass, InstructionSet, MemoryImage, Words};
use crate::error::Result;
use crate::model::Symbol;

/// Outcome of [`SymbolDb::fill_callers`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillReport {
    /// Call instructions whose target resolved to a known symbol.
    pub resolved_calls: usize,
    /// Call instructions whose target is not covered by any symbol.
    pub unresolved_calls: usize,
    /// Functions whose body could not be read from the image.
    pub unreadable: usize,
}

/// Ordered address → symbol table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolDb {
    symbols: BTreeMap<u32, Symbol>,
}

impl SymbolDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Insert or overwrite the symbol at `symbol.address`.
    ///
    /// Inserting a function first evicts every other function whose range
    /// overlaps it. Returns the number of evicted symbols.
    pub fn insert(&mut self, symbol: Symbol) -> usize {
        let evicted =
            if symbol.is_function() { self.overlapping_functions(&symbol) } else { Vec::new() };
        for address in &evicted {
            self.symbols.remove(address);
        }
        self.symbols.insert(symbol.address, symbol);
        evicted.len()
    }

    fn overlapping_functions(&self, symbol: &Symbol) -> Vec<u32> {
        let end = symbol.end();
        let mut out: Vec<u32> = self
            .symbols
            .range(symbol.address..)
            .take_while(|(address, _)| u64::from(**address) < end)
            .filter(|(address, s)| s.is_function() && **address != symbol.address)
            .map(|(address, _)| *address)
            .collect();

        // Functions never overlap each other, so only the nearest preceding
        // one can reach into the new range.
        let previous = self.symbols.range(..symbol.address).rev().find(|(_, s)| s.is_function());
        if let Some((address, prev)) = previous {
            if prev.end() > u64::from(symbol.address) {
                out.push(*address);
            }
        }
        out
    }

    /// The function that starts before `boundary` and runs past it, if any.
    pub fn straddling(&self, boundary: u32) -> Option<&Symbol> {
        self.symbols
            .range(..boundary)
            .rev()
            .find(|(_, s)| s.is_function())
            .map(|(_, s)| s)
            .filter(|s| s.end() > u64::from(boundary))
    }

    /// Shorten the function straddling `boundary` so that it ends there,
    /// trimming a stored body to match. Returns `false` if nothing straddles.
    pub fn truncate_at(&mut self, boundary: u32) -> bool {
        let Some(address) = self.straddling(boundary).map(|s| s.address) else {
            return false;
        };
        let Some(function) = self.symbols.get_mut(&address) else {
            return false;
        };
        function.size = boundary - address;
        if let Some(body) = function.body.as_mut() {
            body.truncate(function.size as usize);
        }
        true
    }

    /// Remove all symbols, or only those whose name starts with `prefix`.
    ///
    /// Returns the number of symbols removed.
    pub fn clear(&mut self, prefix: Option<&str>) -> usize {
        let before = self.symbols.len();
        match prefix {
            None => self.symbols.clear(),
            Some(prefix) => self.symbols.retain(|_, s| !s.name.starts_with(prefix)),
        }
        before - self.symbols.len()
    }

    /// Exact-address lookup.
    pub fn lookup(&self, address: u32) -> Option<&Symbol> {
        self.symbols.get(&address)
    }

    /// Exact-address lookup, falling back to the function whose
    /// `[address, address + size)` contains `address`.
    ///
    /// Data symbols only ever match exactly.
    pub fn lookup_containing(&self, address: u32) -> Option<&Symbol> {
        if let Some(symbol) = self.symbols.get(&address) {
            return Some(symbol);
        }
        self.symbols
            .range(..address)
            .rev()
            .find(|(_, s)| s.is_function())
            .map(|(_, s)| s)
            .filter(|s| s.contains(address))
    }

    pub fn get_mut(&mut self, address: u32) -> Option<&mut Symbol> {
        self.symbols.get_mut(&address)
    }

    /// Overwrite the name of an existing symbol. Returns `false` if there is
    /// no symbol at `address`.
    pub fn rename(&mut self, address: u32, name: impl Into<String>) -> bool {
        match self.symbols.get_mut(&address) {
            Some(symbol) => {
                symbol.name = name.into();
                true
            }
            None => false,
        }
    }

    /// Symbols in ascending address order. Restartable.
    pub fn iter(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols.values()
    }

    /// Function symbols in ascending address order.
    pub fn functions(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.symbols.values().filter(|s| s.is_function())
    }

    /// Rebuild caller/callee cross-references from call instructions.
    ///
    /// Every symbol's derived sets are reset first, so calling this twice
    /// yields the same result. Call targets are resolved with
    /// [`SymbolDb::lookup_containing`].
    pub fn fill_callers(
        &mut self,
        image: &dyn MemoryImage,
        isa: &dyn InstructionSet,
    ) -> FillReport {
        for symbol in self.symbols.values_mut() {
            symbol.callers.clear();
            symbol.callees.clear();
        }

        let mut report = FillReport::default();
        let mut edges: Vec<(u32, u32, Option<u32>)> = Vec::new();
        for function in self.functions() {
            let Ok(bytes) = body_of(function, image) else {
                report.unreadable += 1;
                continue;
            };
            for target in call_targets(&bytes, function.address, isa) {
                let resolved = self.lookup_containing(target).map(|s| s.address);
                edges.push((function.address, target, resolved));
            }
        }

        for (caller, target, resolved) in edges {
            if let Some(symbol) = self.symbols.get_mut(&caller) {
                symbol.callees.insert(target);
            }
            match resolved.and_then(|address| self.symbols.get_mut(&address)) {
                Some(callee) => {
                    callee.callers.insert(caller);
                    report.resolved_calls += 1;
                }
                None => report.unresolved_calls += 1,
            }
        }
        report
    }
}

impl<'a> IntoIterator for &'a SymbolDb {
    type Item = &'a Symbol;
    type IntoIter = std::collections::btree_map::Values<'a, u32, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.values()
    }
}

/// The bytes of a symbol's body: the stored body when the symbol carries one,
/// otherwise `size` bytes read from the image.
pub fn body_of<'a>(symbol: &'a Symbol, image: &dyn MemoryImage) -> Result<Cow<'a, [u8]>> {
    match &symbol.body {
        Some(body) => Ok(Cow::Borrowed(body.as_slice())),
        None => image.read_bytes(symbol.address, symbol.size).map(Cow::Owned),
    }
}

/// Targets of every call instruction in `bytes`, in program order.
pub fn call_targets(bytes: &[u8], base: u32, isa: &dyn InstructionSet) -> Vec<u32> {
    Words::new(isa, bytes, base)
        .filter_map(|(address, word)| match isa.classify(word, address) {
            InsnClass::Call { target } => Some(target),
            _ => None,
        })
        .collect()
}
