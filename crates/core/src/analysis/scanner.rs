//! Function boundary discovery.
//!
//! Instructions are decoded sequentially. A function starts at the first
//! non-padding instruction after the previous function and ends at an
//! unconditional return, unless an earlier conditional branch in the same
//! body jumps past that return. Padding between functions is a gap, never a
//! function of its own.
//!
//! Scanning never reaches outside its range: a function that starts before
//! the range and runs into it is shortened to end at the range start instead
//! of being evicted.

use indexmap::IndexSet;

use crate::analysis::{Progress, ScanObserver};
use crate::backends::{InsnClass, InstructionSet, MemoryImage, Words};
use crate::db::SymbolDb;
use crate::error::{Error, Result};
use crate::model::{AddressRange, Symbol};

/// Outcome of one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Functions inserted into the database.
    pub functions: usize,
    /// Runs of padding skipped between (or before) functions.
    pub gaps: usize,
    /// Call targets that fall outside the scanned range.
    pub external_calls: usize,
    /// The range ended inside a run of instructions with no return.
    pub unterminated: bool,
    /// The observer asked to stop; functions found so far remain applied.
    pub cancelled: bool,
    /// Functions starting before the range that were shortened to end at it.
    pub truncated: usize,
}

/// Scans address ranges of one image for functions.
pub struct Scanner<'a> {
    pub image: &'a dyn MemoryImage,
    pub isa: &'a dyn InstructionSet,
    /// Report progress every this many functions.
    pub progress_interval: usize,
}

/// A function walked to its terminating return.
struct Found {
    /// One past the return instruction.
    end: u32,
    callees: IndexSet<u32>,
}

impl<'a> Scanner<'a> {
    pub fn new(image: &'a dyn MemoryImage, isa: &'a dyn InstructionSet) -> Self {
        Self { image, isa, progress_interval: 256 }
    }

    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval;
        self
    }

    fn check_range(&self, range: AddressRange) -> Result<()> {
        let width = self.isa.width();
        if range.start >= range.end {
            return Err(Error::Precondition(format!(
                "scan range start {:#010x} must be below end {:#010x}",
                range.start, range.end
            )));
        }
        if range.start % width != 0 || range.end % width != 0 {
            return Err(Error::Precondition(format!(
                "scan range {:#010x}..{:#010x} is not aligned to {width}-byte instructions",
                range.start, range.end
            )));
        }
        Ok(())
    }

    /// Discover functions in `[range.start, range.end)` and insert them into `db`.
    ///
    /// Only functions inside the range are inserted; an existing function at
    /// the same address keeps its name and gets its size and callees updated.
    pub fn scan(
        &self,
        range: AddressRange,
        db: &mut SymbolDb,
        observer: &mut dyn ScanObserver,
    ) -> Result<ScanReport> {
        self.check_range(range)?;
        let bytes = self.image.read_bytes(range.start, range.len())?;
        let words: Vec<(u32, u32)> = Words::new(self.isa, &bytes, range.start).collect();
        let width = self.isa.width();

        let mut report = ScanReport::default();
        let mut progress = Progress::new(observer, self.progress_interval);
        let mut index = 0;

        loop {
            if progress.cancelled() {
                report.cancelled = true;
                break;
            }

            let gap_start = index;
            while index < words.len() && self.is_padding(words[index]) {
                index += 1;
            }
            if index > gap_start {
                report.gaps += 1;
            }
            if index >= words.len() {
                break;
            }

            let address = words[index].0;
            let Some(found) =
                self.function_at(words[index..].iter().copied(), range, &mut report.external_calls)
            else {
                report.unterminated = true;
                break;
            };
            index += ((found.end - address) / width) as usize;

            let size = found.end - address;
            let mut symbol = match db.lookup(address) {
                Some(existing) if existing.is_function() => {
                    Symbol::function(address, size).with_name(existing.name.clone())
                }
                _ => Symbol::function(address, size),
            };
            symbol.callees = found.callees;
            let straddler = db.straddling(range.start).map(Symbol::end);
            if straddler.is_some_and(|end| end > u64::from(address)) && db.truncate_at(range.start)
            {
                report.truncated += 1;
            }
            db.insert(symbol);

            report.functions += 1;
            progress.tick(report.functions);
        }

        progress.finish(report.functions);
        Ok(report)
    }

    fn is_padding(&self, (address, word): (u32, u32)) -> bool {
        self.isa.classify(word, address) == InsnClass::Padding
    }

    /// Size of the function entered at `address`, walked to its terminating
    /// return without reading past `limit` bytes.
    ///
    /// With no limit the walk stops at the first unreadable word. Returns
    /// `None` when no return is reached.
    pub fn measure(&self, address: u32, limit: Option<u32>) -> Option<u32> {
        let width = self.isa.width();
        let end = limit.map_or(u32::MAX, |limit| address.saturating_add(limit));
        let words = (address..end).step_by(width as usize).map_while(|address| {
            let bytes = self.image.read_bytes(address, width).ok()?;
            Some((address, self.isa.word(&bytes)))
        });
        let mut external = 0;
        self.function_at(words, AddressRange::new(address, end), &mut external)
            .map(|found| found.end - address)
    }

    /// Walk one function from the first of `words`. Returns `None` when the
    /// words run out before a terminating return.
    fn function_at(
        &self,
        words: impl Iterator<Item = (u32, u32)>,
        range: AddressRange,
        external_calls: &mut usize,
    ) -> Option<Found> {
        let mut callees = IndexSet::new();
        // Highest in-range address reached by a forward conditional branch.
        let mut farthest = 0u32;

        for (address, word) in words {
            match self.isa.classify(word, address) {
                InsnClass::Return if farthest <= address => {
                    let end = address + self.isa.width();
                    return Some(Found { end, callees });
                }
                InsnClass::LocalBranch { target } if target > address && range.contains(target) => {
                    farthest = farthest.max(target);
                }
                InsnClass::Call { target } => {
                    if !range.contains(target) {
                        *external_calls += 1;
                    }
                    callees.insert(target);
                }
                _ => {}
            }
        }
        None
    }
}
