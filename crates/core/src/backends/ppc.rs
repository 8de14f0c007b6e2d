//! 32-bit big-endian PowerPC (Gekko/Broadway flavour).
//!
//! Only the handful of encodings that matter for boundary detection and call
//! resolution are decoded; everything else is [`InsnClass::Other`].
//!
//! Both `nop` and the all-zero word classify as padding. A zero word is an
//! illegal instruction on PowerPC, but memory dumps zero-fill the holes
//! between functions, so a run of zeros ahead of a `blr` is a gap and the
//! function starts at the first non-zero word.

use super::{InsnClass, InstructionSet};

/// `ori r0, r0, 0`
pub const NOP: u32 = 0x6000_0000;
/// `blr`
pub const BLR: u32 = 0x4E80_0020;
/// `rfi`
pub const RFI: u32 = 0x4C00_0064;

const OP_BC: u32 = 16;
const OP_B: u32 = 18;
const OP_XL: u32 = 19;
const XL_BCLR: u32 = 16;
const XL_RFI: u32 = 50;

#[derive(Debug, Clone, Copy, Default)]
pub struct PowerPc;

fn primary(word: u32) -> u32 {
    word >> 26
}

/// BO field says "branch always" (condition and counter both ignored).
fn branch_always(word: u32) -> bool {
    (word >> 21) & 0x14 == 0x14
}

fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

fn branch_target(address: u32, displacement: i32, absolute: bool) -> u32 {
    if absolute {
        displacement as u32
    } else {
        address.wrapping_add(displacement as u32)
    }
}

impl PowerPc {
    /// Encode `bl target` placed at `address`. Handy for building fixtures.
    pub fn encode_bl(address: u32, target: u32) -> u32 {
        let displacement = target.wrapping_sub(address) & 0x03FF_FFFC;
        (OP_B << 26) | displacement | 1
    }

    /// Encode a conditional `bne cr0, target` placed at `address`.
    pub fn encode_bne(address: u32, target: u32) -> u32 {
        let displacement = target.wrapping_sub(address) & 0xFFFC;
        (OP_BC << 26) | (4 << 21) | (2 << 16) | displacement
    }
}

impl InstructionSet for PowerPc {
    fn name(&self) -> &'static str {
        "ppc"
    }

    fn width(&self) -> u32 {
        4
    }

    fn word(&self, bytes: &[u8]) -> u32 {
        u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn classify(&self, word: u32, address: u32) -> InsnClass {
        if word == NOP || word == 0 {
            return InsnClass::Padding;
        }
        let link = word & 1 == 1;
        let absolute = word & 2 == 2;
        match primary(word) {
            OP_B if link => {
                let displacement = sign_extend(word & 0x03FF_FFFC, 26);
                InsnClass::Call { target: branch_target(address, displacement, absolute) }
            }
            OP_BC if !link => {
                let displacement = sign_extend(word & 0xFFFC, 16);
                InsnClass::LocalBranch { target: branch_target(address, displacement, absolute) }
            }
            OP_XL => match (word >> 1) & 0x3FF {
                XL_BCLR if !link && branch_always(word) => InsnClass::Return,
                XL_RFI => InsnClass::Return,
                _ => InsnClass::Other,
            },
            _ => InsnClass::Other,
        }
    }

    fn signature_mask(&self, word: u32) -> u32 {
        let op = word & 0xFC00_0000;
        let (op2, op3) = match primary(word) {
            // paired singles
            4 => {
                let op2 = word & 0x3F;
                let op3 = if matches!(op2, 0 | 8 | 16 | 21 | 22) { word & 0x7C0 } else { 0 };
                (op2, op3)
            }
            // immediate arithmetic: keep registers, drop the immediate
            7 | 8 | 10..=15 => (word & 0x03FF_0000, 0),
            // extended opcodes
            19 | 31 | 63 => (word & 0x7FF, 0),
            59 => {
                let op2 = word & 0x3F;
                (op2, if op2 < 16 { word & 0x7C0 } else { 0 })
            }
            // loads/stores: keep registers, drop the displacement
            32..=55 => (word & 0x03FF_0000, 0),
            _ => (0, 0),
        };
        op | op2 | op3
    }
}
