//! Content-addressable lookup tables for the two 4-bit ALU slices.
//!
//! Each slice is a 64 KiB ROM addressed by `(in_flags, in2, in1, op)`
//! and produces a result nibble in its low half and a flag nibble in its
//! high half. Slice 1 handles the low nibble of the byte-wide ALU and
//! signals into slice 2 through the `Special` flag line; slice 2 handles
//! the high nibble and owns the N flag.

extern crate strum;
use strum::IntoEnumIterator;

extern crate packed_struct;
extern crate packed_struct_codegen;
use packed_struct::prelude::*;

use common::*;

use lazy_static::lazy_static;
lazy_static! {
    static ref ROMS: (Vec<u8>, Vec<u8>) = build_tables();
    /// Low-nibble slice image, 65 536 bytes.
    pub static ref ALU1: Vec<u8> = ROMS.0.clone();
    /// High-nibble slice image, 65 536 bytes.
    pub static ref ALU2: Vec<u8> = ROMS.1.clone();
}

pub const ROM_BYTES: usize = 1 << 16;

/// Address layout of one ALU ROM entry.
#[derive(Debug, PackedStruct)]
#[packed_struct(size_bytes = "2", endian = "lsb", bit_numbering = "lsb0")]
pub struct LutEntry {
    #[packed_field(bits = "0..=3", ty = "enum")]
    pub op: AluOp,
    #[packed_field(bits = "4..=7")]
    pub in1: Integer<u8, packed_bits::Bits::<4>>,
    #[packed_field(bits = "8..=11")]
    pub in2: Integer<u8, packed_bits::Bits::<4>>,
    #[packed_field(bits = "12..=15")]
    pub in_flags: Integer<u8, packed_bits::Bits::<4>>,
}

impl LutEntry {
    pub fn pack_lsb(&self) -> [u8; 2] {
        let bytes = self.pack().unwrap();
        [bytes[1], bytes[0]]
    }

    pub fn to_index(&self) -> usize {
        u16::from_le_bytes(self.pack_lsb()) as usize
    }
}

fn preserve_carry(in_flags: AluInFlags) -> AluOutFlags {
    if in_flags.contains(AluInFlags::C) {
        AluOutFlags::C
    } else {
        AluOutFlags::empty()
    }
}

fn preserve_overflow(in_flags: AluInFlags) -> AluOutFlags {
    if in_flags.contains(AluInFlags::V) {
        AluOutFlags::V
    } else {
        AluOutFlags::empty()
    }
}

fn zero_flag(work: u8) -> AluOutFlags {
    if work & 15 == 0 {
        AluOutFlags::Z
    } else {
        AluOutFlags::empty()
    }
}

fn negative_flag(work: u8) -> AluOutFlags {
    if work & (1 << 3) != 0 {
        AluOutFlags::N
    } else {
        AluOutFlags::empty()
    }
}

fn carry_flag(work: u8) -> AluOutFlags {
    if work & 16 != 0 {
        AluOutFlags::C
    } else {
        AluOutFlags::empty()
    }
}

fn ncz_flags(work: u8) -> AluOutFlags {
    negative_flag(work) | carry_flag(work) | zero_flag(work)
}

fn nz_flags(work: u8) -> AluOutFlags {
    negative_flag(work) | zero_flag(work)
}

fn cz_flags(work: u8) -> AluOutFlags {
    carry_flag(work) | zero_flag(work)
}

/// The pair of bytes the two slices hold for one address.
///
/// `in1`/`in2` are nibbles; the same table serves both slices, with the
/// physical circuit feeding each slice its own nibble of the operands.
pub fn lut_bytes(in_flags: AluInFlags, in2: u8, in1: u8, op: AluOp) -> (u8, u8) {
    let i = in1 & 15;
    let j = in2 & 15;
    let carry_in = in_flags.contains(AluInFlags::C);
    let special_in = in_flags.contains(AluInFlags::SPECIAL);

    match op {
        AluOp::Dec => {
            let work = i.wrapping_sub(1);
            let mut flags = preserve_carry(in_flags) | zero_flag(work);
            if work & 15 == 15 {
                flags |= AluOutFlags::SPECIAL;
            }
            let lo = (work & 15) | flags.bits();

            // Slice 2 only steps when slice 1 wrapped.
            let work = if special_in { i.wrapping_sub(1) } else { i };
            let flags = preserve_carry(in_flags)
                | nz_flags(work)
                | preserve_overflow(in_flags);
            (lo, (work & 15) | flags.bits())
        }
        AluOp::Inc => {
            let work = i + 1;
            let mut flags = preserve_carry(in_flags) | zero_flag(work);
            if work & 15 == 0 {
                flags |= AluOutFlags::SPECIAL;
            }
            let lo = (work & 15) | flags.bits();

            let work = if special_in { i + 1 } else { i };
            let flags = preserve_carry(in_flags)
                | nz_flags(work)
                | preserve_overflow(in_flags);
            (lo, (work & 15) | flags.bits())
        }
        AluOp::Add => {
            let work = i + j + if carry_in { 1 } else { 0 };
            let mut flags = ncz_flags(work);
            // Signed overflow: matching operand signs, result sign flips.
            if negative_flag(i) == negative_flag(j)
                && negative_flag(work) != negative_flag(i)
            {
                flags |= AluOutFlags::V;
            }
            let byte = (work & 15) | flags.bits();
            (byte, byte)
        }
        AluOp::Sub => {
            let mut work = i.wrapping_sub(j);
            if !carry_in {
                work = work.wrapping_sub(1);
            }
            let mut flags = nz_flags(work);
            if work & 16 == 0 {
                flags |= AluOutFlags::C;
            }
            if negative_flag(i) != negative_flag(j) && negative_flag(work).is_empty() {
                flags |= AluOutFlags::V;
            }
            let byte = (work & 15) | flags.bits();
            (byte, byte)
        }
        AluOp::Or => {
            let work = i | j;
            let flags =
                preserve_carry(in_flags) | zero_flag(work) | preserve_overflow(in_flags);
            let byte = (work & 15) | flags.bits();
            (byte, byte)
        }
        AluOp::And => {
            let work = i & j;
            let flags =
                preserve_carry(in_flags) | zero_flag(work) | preserve_overflow(in_flags);
            let byte = (work & 15) | flags.bits();
            (byte, byte)
        }
        AluOp::Xor => {
            let work = i ^ j;
            let flags =
                preserve_carry(in_flags) | zero_flag(work) | preserve_overflow(in_flags);
            let byte = (work & 15) | flags.bits();
            (byte, byte)
        }
        AluOp::Lsl => {
            let mut flags = if i & (1 << 3) != 0 {
                AluOutFlags::C
            } else {
                AluOutFlags::empty()
            };
            let work = (i << 1) & 15;
            flags |= nz_flags(work) | preserve_overflow(in_flags);
            let lo = work | flags.bits();

            // Slice 2 pulls the carry into bit 0 for the byte-wide chain.
            let mut flags = if i & (1 << 3) != 0 {
                AluOutFlags::C
            } else {
                AluOutFlags::empty()
            };
            let mut work = i << 1;
            if carry_in {
                work |= 1;
            }
            work &= 15;
            flags |= nz_flags(work) | preserve_overflow(in_flags);
            (lo, work | flags.bits())
        }
        AluOp::Lsr => {
            let mut flags = if i & 1 != 0 {
                // Carry is produced here but reported by slice 2.
                AluOutFlags::C
            } else {
                AluOutFlags::empty()
            };
            let mut work = i >> 1;
            if special_in {
                work |= 1 << 3;
            }
            flags |= zero_flag(work);
            let lo = (work & 15) | flags.bits();

            let work = i >> 1;
            let flags = nz_flags(work)
                | preserve_overflow(in_flags)
                | preserve_carry(in_flags);
            (lo, (work & 15) | flags.bits())
        }
        AluOp::Rol => {
            let mut flags = if i & (1 << 3) != 0 {
                AluOutFlags::C
            } else {
                AluOutFlags::empty()
            };
            let mut work = i << 1;
            if carry_in {
                work |= 1;
            }
            work &= 15;
            flags |= nz_flags(work) | preserve_overflow(in_flags);
            let byte = work | flags.bits();
            (byte, byte)
        }
        AluOp::Ror => {
            let mut flags = if i & 1 != 0 {
                // Slice 2 turns this marker into the final carry.
                AluOutFlags::SPECIAL
            } else {
                AluOutFlags::empty()
            };
            let mut work = i >> 1;
            if special_in {
                work |= 1 << 3;
            }
            flags |= zero_flag(work) | preserve_carry(in_flags);
            let lo = (work & 15) | flags.bits();

            let mut work = i >> 1;
            if carry_in {
                work |= 1 << 3;
            }
            work &= 15;
            let mut flags = nz_flags(work) | preserve_overflow(in_flags);
            if special_in {
                flags |= AluOutFlags::C;
            }
            (lo, work | flags.bits())
        }
        AluOp::Cmp => {
            // Subtract ignoring the carry input.
            let work = i.wrapping_sub(j);
            let mut flags = cz_flags(work) | preserve_overflow(in_flags);
            if work == 0 {
                flags |= AluOutFlags::SPECIAL;
            }
            let lo = (work & 15) | flags.bits();

            // Slice 2 borrows through slice 1's carry and inverts the
            // result into the 6502 convention, C set on no borrow.
            let mut work = i.wrapping_sub(j);
            if carry_in {
                work = work.wrapping_sub(1);
            }
            let mut flags = ncz_flags(work);
            flags.toggle(AluOutFlags::C);
            if work == 0 && special_in {
                flags |= AluOutFlags::C;
            }
            flags |= preserve_overflow(in_flags);
            (lo, (work & 15) | flags.bits())
        }
        AluOp::Sec => {
            if in_flags.is_empty() {
                ((i | 1) & 15, i & 15)
            } else {
                let mask = 0x02u8;
                (i & mask & 15, i & (mask >> 4) & 15)
            }
        }
        AluOp::Clc => {
            if in_flags.is_empty() {
                (i & !1 & 15, i & 15)
            } else {
                let mask = 0x3Du8;
                (i & mask & 15, i & (mask >> 4) & 15)
            }
        }
        AluOp::Clv => {
            if in_flags.is_empty() {
                // V sits at bit 2 of the status high nibble, slice 2's input.
                (i & 15, i & !(1 << 2) & 15)
            } else {
                let mask = 0xC0u8;
                (i & mask & 15, i & (mask >> 4) & 15)
            }
        }
        AluOp::Flags => {
            let work = i;
            let flags = preserve_carry(in_flags)
                | nz_flags(work)
                | preserve_overflow(in_flags);
            let byte = (work & 15) | flags.bits();
            (byte, byte)
        }
    }
}

/// Both slice images, in ROM address order: in_flags, then in2, then
/// in1, then the op select, outermost first.
pub fn build_tables() -> (Vec<u8>, Vec<u8>) {
    let mut rom1 = Vec::with_capacity(ROM_BYTES);
    let mut rom2 = Vec::with_capacity(ROM_BYTES);

    for in_flags in 0u8..=15 {
        let in_flags = AluInFlags::from_bits_truncate(in_flags);
        for in2 in 0u8..=15 {
            for in1 in 0u8..=15 {
                for op in AluOp::iter() {
                    let (lo, hi) = lut_bytes(in_flags, in2, in1, op);
                    rom1.push(lo);
                    rom2.push(hi);
                }
            }
        }
    }

    (rom1, rom2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(in_flags: AluInFlags, in2: u8, in1: u8, op: AluOp) -> (u8, u8) {
        let entry = LutEntry {
            op,
            in1: in1.into(),
            in2: in2.into(),
            in_flags: in_flags.bits().into(),
        };
        let index = entry.to_index();
        (ALU1[index], ALU2[index])
    }

    #[test]
    fn pack() {
        let entry = LutEntry {
            op: AluOp::Or,
            in1: 0.into(),
            in2: 0.into(),
            in_flags: 0xF.into(),
        };

        assert_eq!([AluOp::Or as u8, 0xF0], entry.pack_lsb());
        assert_eq!(0xF004, entry.to_index());
    }

    #[test]
    fn images_are_exactly_one_rom_each() {
        assert_eq!(ROM_BYTES, ALU1.len());
        assert_eq!(ROM_BYTES, ALU2.len());

        let again = build_tables();
        assert_eq!(*ALU1, again.0);
        assert_eq!(*ALU2, again.1);
    }

    #[test]
    fn and_masks_the_low_nibble() {
        for in_flags in 0u8..=15 {
            let in_flags = AluInFlags::from_bits_truncate(in_flags);
            for in1 in 0u8..=15 {
                let (lo, _) = entry(in_flags, 0xF, in1, AluOp::And);
                assert_eq!(in1 & 0xF, lo & 0xF);
            }
        }
    }

    #[test]
    fn add_without_carry() {
        for in2 in 0u8..=15 {
            for in1 in 0u8..=15 {
                let (lo, hi) = entry(AluInFlags::empty(), in2, in1, AluOp::Add);
                assert_eq!((in1 + in2) & 0xF, lo & 0xF);
                assert_eq!((in1 + in2) >> 4 & 1, (lo >> 4) & 1);
                assert_eq!(lo, hi);
            }
        }
    }

    #[test]
    fn add_with_carry_wraps_to_zero() {
        let (lo, _) = entry(AluInFlags::C, 0x0, 0xF, AluOp::Add);
        assert_eq!(0, lo & 0xF);
        let flags = AluOutFlags::from_bits_truncate(lo & 0xF0);
        assert!(flags.contains(AluOutFlags::C | AluOutFlags::Z));
        assert!(!flags.contains(AluOutFlags::N));
        assert!(!flags.contains(AluOutFlags::V));
    }

    #[test]
    fn cmp_zero_flag_tracks_equality() {
        for in2 in 0u8..=15 {
            for in1 in 0u8..=15 {
                let (lo, _) = entry(AluInFlags::empty(), in2, in1, AluOp::Cmp);
                let z = lo & AluOutFlags::Z.bits() != 0;
                assert_eq!(in1 == in2, z, "cmp {:x} {:x}", in1, in2);
            }
        }
    }

    #[test]
    fn cmp_inverts_carry_on_the_high_slice() {
        // No borrow: carry set, 6502 style.
        let (_, hi) = entry(AluInFlags::C, 0x1, 0x3, AluOp::Cmp);
        assert_ne!(0, hi & AluOutFlags::C.bits());
    }

    #[test]
    fn sec_direct_mode_sets_bit_zero() {
        let (lo, hi) = entry(AluInFlags::empty(), 0, 0b0100, AluOp::Sec);
        assert_eq!(0b0101, lo);
        assert_eq!(0b0100, hi);
    }

    #[test]
    fn clc_direct_mode_clears_bit_zero() {
        let (lo, hi) = entry(AluInFlags::empty(), 0, 0b0101, AluOp::Clc);
        assert_eq!(0b0100, lo);
        assert_eq!(0b0101, hi);
    }

    #[test]
    fn clv_direct_mode_clears_the_overflow_bit() {
        let (lo, hi) = entry(AluInFlags::empty(), 0, 0b1111, AluOp::Clv);
        assert_eq!(0b1111, lo);
        assert_eq!(0b1011, hi);
    }

    #[test]
    fn flag_ops_become_masks_with_nonzero_flags_in() {
        let all = 0xF;
        let (lo, hi) = entry(AluInFlags::SPECIAL, 0, all, AluOp::Sec);
        assert_eq!((0x02 & 0xF, 0x00), (lo, hi));
        let (lo, hi) = entry(AluInFlags::SPECIAL, 0, all, AluOp::Clc);
        assert_eq!((0x0D, 0x03), (lo, hi));
        let (lo, hi) = entry(AluInFlags::SPECIAL, 0, all, AluOp::Clv);
        assert_eq!((0x00, 0x0C), (lo, hi));
    }

    #[test]
    fn lsr_injects_special_into_bit_three() {
        let (lo, _) = entry(AluInFlags::SPECIAL, 0, 0b0000, AluOp::Lsr);
        assert_eq!(0b1000, lo & 0xF);
        assert_eq!(0, lo & AluOutFlags::Z.bits());
    }

    #[test]
    fn ror_chains_carry_between_slices() {
        // Bit 0 drops out of the low slice as the marker.
        let (lo, _) = entry(AluInFlags::empty(), 0, 0b0001, AluOp::Ror);
        assert_ne!(0, lo & AluOutFlags::SPECIAL.bits());
        // The marker comes back as slice 2's carry.
        let (_, hi) = entry(AluInFlags::SPECIAL, 0, 0b0000, AluOp::Ror);
        assert_ne!(0, hi & AluOutFlags::C.bits());
        // Carry in fills slice 2's bit 3.
        let (_, hi) = entry(AluInFlags::C, 0, 0b0000, AluOp::Ror);
        assert_eq!(0b1000, hi & 0xF);
    }

    #[test]
    fn flags_op_recomputes_z_and_n() {
        let (lo, _) = entry(AluInFlags::C, 0, 0, AluOp::Flags);
        assert_ne!(0, lo & AluOutFlags::Z.bits());
        assert_ne!(0, lo & AluOutFlags::C.bits());
        let (lo, _) = entry(AluInFlags::empty(), 0, 0b1000, AluOp::Flags);
        assert_ne!(0, lo & AluOutFlags::N.bits());
        assert_eq!(0, lo & AluOutFlags::C.bits());
    }

    #[test]
    fn inc_signals_nibble_wrap_to_the_high_slice() {
        let (lo, _) = entry(AluInFlags::empty(), 0, 0xF, AluOp::Inc);
        assert_ne!(0, lo & AluOutFlags::SPECIAL.bits());
        let (_, hi) = entry(AluInFlags::SPECIAL, 0, 0x7, AluOp::Inc);
        assert_eq!(0x8, hi & 0xF);
        let (_, hi) = entry(AluInFlags::empty(), 0, 0x7, AluOp::Inc);
        assert_eq!(0x7, hi & 0xF);
    }

    #[test]
    fn dec_signals_nibble_wrap_to_the_high_slice() {
        let (lo, _) = entry(AluInFlags::empty(), 0, 0x0, AluOp::Dec);
        assert_eq!(0xF, lo & 0xF);
        assert_ne!(0, lo & AluOutFlags::SPECIAL.bits());
        let (_, hi) = entry(AluInFlags::SPECIAL, 0, 0x8, AluOp::Dec);
        assert_eq!(0x7, hi & 0xF);
    }
}
