// crates/core/tests/common/mod.rs
#![allow(dead_code)]

use symscan_core::backends::ppc::{BLR, NOP};
use symscan_core::backends::FlatImage;

pub use symscan_core::backends::PowerPc;

/// `li r3, 0`
pub const LI_R3_0: u32 = 0x3860_0000;
/// `li r3, 1`
pub const LI_R3_1: u32 = 0x3860_0001;
/// `addi r4, r4, 8`
pub const ADDI_R4: u32 = 0x3884_0008;
pub const RET: u32 = BLR;
pub const PAD: u32 = NOP;

/// Lay out big-endian instruction words starting at `base`.
pub fn image_from_words(base: u32, words: &[u32]) -> FlatImage {
    FlatImage::new(base, words_to_bytes(words))
}

pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

/// Address of the `index`-th word after `base`.
pub fn at(base: u32, index: u32) -> u32 {
    base + index * 4
}
