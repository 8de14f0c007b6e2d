//! Adapters for the machine being analysed.
//!
//! Two seams live here:
//! - [`MemoryImage`]: read access to code bytes by address (the debugger's
//!   memory accessor; a flat dump implementation is provided).
//! - [`InstructionSet`]: classification of single fixed-width instruction
//!   words, which is all the scanner, signature hashing and caller back-fill
//!   need to know about the architecture.

pub mod image;
pub mod ppc;

pub use image::{FlatImage, MemoryImage};
pub use ppc::PowerPc;

/// Control-flow role of one instruction word, as far as symbol recovery cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsnClass {
    /// Unconditional return; ends a function.
    Return,
    /// Alignment filler (no-op or zero word) between functions.
    Padding,
    /// Subroutine call to an absolute target address.
    Call { target: u32 },
    /// Conditional branch that stays inside the current function.
    LocalBranch { target: u32 },
    /// Anything else.
    Other,
}

/// A fixed-width instruction set.
pub trait InstructionSet: Send + Sync {
    /// Human-readable architecture name.
    fn name(&self) -> &'static str;

    /// Instruction width in bytes.
    fn width(&self) -> u32;

    /// Assemble one instruction word from exactly `width()` bytes.
    fn word(&self, bytes: &[u8]) -> u32;

    /// Classify the instruction word `word` located at `address`.
    fn classify(&self, word: u32, address: u32) -> InsnClass;

    /// Mask out operand fields that change between builds/relocations.
    ///
    /// Two copies of the same function linked at different addresses must
    /// produce identical masked streams.
    fn signature_mask(&self, word: u32) -> u32;
}

/// Iterator over the `(address, word)` pairs of a body starting at `base`.
///
/// Trailing bytes that do not fill a full instruction are ignored.
pub struct Words<'a> {
    isa: &'a dyn InstructionSet,
    bytes: &'a [u8],
    base: u32,
    offset: usize,
}

impl<'a> Words<'a> {
    pub fn new(isa: &'a dyn InstructionSet, bytes: &'a [u8], base: u32) -> Self {
        Self { isa, bytes, base, offset: 0 }
    }
}

impl Iterator for Words<'_> {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let width = self.isa.width() as usize;
        let chunk = self.bytes.get(self.offset..self.offset + width)?;
        let address = self.base.wrapping_add(self.offset as u32);
        self.offset += width;
        Some((address, self.isa.word(chunk)))
    }
}

/// Look up an instruction set by name (as accepted on the command line / in config).
pub fn instruction_set_by_name(name: &str) -> Option<Box<dyn InstructionSet>> {
    match name.to_lowercase().as_str() {
        "ppc" | "powerpc" | "ppc32" | "gekko" | "broadway" => Some(Box::new(PowerPc)),
        _ => None,
    }
}
