//! Control-line vocabulary shared by the microcode builder and the ALU
//! table generator. One type per decoder ROM word, plus the ALU op and
//! flag-nibble encodings the two ALU slices agree on.

extern crate strum;
#[macro_use]
extern crate strum_macros;

extern crate packed_struct;
extern crate packed_struct_codegen;

#[macro_use]
extern crate bitflags;

use packed_struct::prelude::*;

bitflags! {
    /// Decoder 1: program counter control, address latches and memory strobes.
    #[derive(Default)]
    pub struct D1: u8 {
        /// Increment the PC this tick. May coincide with CYCLE_RESET.
        const PC_INC = 1 << 0;
        /// Latch the data bus into the opcode register. Never on tick 0.
        const OPCODE_LOAD = 1 << 1;
        /// Drive the PC onto the address bus. Deasserted, the address
        /// latches drive it instead.
        const PC_TO_ADDRESS = 1 << 2;
        const ADDRL_LOAD = 1 << 3;
        const ADDRH_LOAD = 1 << 4;
        /// Load the PC from the address bus. Needs the two-tick dance,
        /// the second tick with PC_INC, which then loads rather than
        /// increments.
        const PC_LOAD = 1 << 5;
        /// RAM write strobe. The address lines must be stable one tick
        /// before and after.
        const RAM_WRITE = 1 << 6;
        /// Last state of the opcode; the tick counter restarts at 0 and
        /// the opcode latch contents become the next opcode.
        const CYCLE_RESET = 1 << 7;

        const ADDR_LOADS = Self::ADDRL_LOAD.bits | Self::ADDRH_LOAD.bits;
    }
}

bitflags! {
    /// Decoder 2: data-bus source selector in the low nibble, external
    /// bus arbitration and the branch flop in the high nibble.
    #[derive(Default)]
    pub struct D2: u8 {
        const R0_TO_DB = 1;
        const R1_TO_DB = 2;
        const R2_TO_DB = 3;
        const R3_TO_DB = 4;
        const R4_TO_DB = 5;
        const R5_TO_DB = 6;
        const R6_TO_DB = 7;
        /// Status register onto the bus, e.g. for transfer into the ALU.
        const ST_TO_DB = 8;
        const ZERO_TO_DB = 9;
        /// Address bus low half onto the data bus.
        const ADDR_WL_TO_DB = 10;
        /// Address bus high half onto the data bus.
        const ADDR_WH_TO_DB = 11;
        /// Result of the last ALU calculation onto the bus.
        const ALU_RES_TO_DB = 12;
        /// Flag output of the last ALU calculation onto the bus.
        const ALU_TEMP_ST_TO_DB = 13;
        /// Memory read. Must not be followed directly by a bus write,
        /// and the memory must stay addressed one tick after the read.
        const MEMORY_TO_DB = 14;
        /// The reset/idle state of the decoder output latch.
        const FF_TO_DB = 15;
        const SOURCE_MASK = 0x0F;

        /// Latch the ALU carry into the branch-decision flop. Needs the
        /// ALU op stable one tick before.
        const DO_BRANCH_LOAD = 1 << 4;
        const CPU_WANT_BUS = 1 << 5;
        const CPU_HAS_BUS = 1 << 6;
        /// Data direction for the external data bus.
        const BUS_DDR = 1 << 7;
    }
}

impl D2 {
    /// The 4-bit source-selector field on its own.
    pub fn source(self) -> D2 {
        self & D2::SOURCE_MASK
    }
}

bitflags! {
    /// Decoder 3: ALU input latches, the 4-bit op select and the result latch.
    #[derive(Default)]
    pub struct D3: u8 {
        const ALU_IN1_LOAD = 1 << 0;
        const ALU_IN2_LOAD = 1 << 1;
        /// Flag-nibble input latch.
        const ALU_IN3_LOAD = 1 << 2;
        const OP_MASK = 0x78;
        const ALU_RES_LOAD = 1 << 7;

        const ALU_IN_LOADS =
            Self::ALU_IN1_LOAD.bits | Self::ALU_IN2_LOAD.bits | Self::ALU_IN3_LOAD.bits;
    }
}

impl D3 {
    /// The op select field for `op`, positioned at bits 3..=6.
    pub fn op(op: AluOp) -> D3 {
        D3::from_bits_truncate((op as u8) << 3)
    }

    /// The 4-bit op field on its own, for stability comparisons.
    pub fn op_field(self) -> D3 {
        self & D3::OP_MASK
    }
}

bitflags! {
    /// Decoder 4: one-hot register write enables from the data bus.
    /// R0..R2 are A, X, Y in 6502 terms; R3/R4 the stack pointer halves;
    /// R5/R6 microcode temporaries.
    #[derive(Default)]
    pub struct D4: u8 {
        const DB_TO_R0 = 1 << 0;
        const DB_TO_R1 = 1 << 1;
        const DB_TO_R2 = 1 << 2;
        const DB_TO_R3 = 1 << 3;
        const DB_TO_R4 = 1 << 4;
        const DB_TO_R5 = 1 << 5;
        const DB_TO_R6 = 1 << 6;
        const DB_TO_ST = 1 << 7;
    }
}

bitflags! {
    /// Decoder 5: interrupt plumbing and the hardware breakpoint line.
    #[derive(Default)]
    pub struct D5: u8 {
        /// Latch the pending-IRQ decision. Requires the status register
        /// on the data bus this tick and the tick before.
        const IRQ_STATE_LATCH = 1 << 0;
        /// Assert the hardware breakpoint.
        const ILLEGAL_OP = 1 << 1;
        /// Clear the external IRQ line.
        const IRQ_LINE_RESET = 1 << 2;
    }
}

/// The sixteen ALU operations selected by decoder 3's op field.
///
/// Single-input operations (Dec, Inc, Lsl, Lsr, Rol, Ror, Flags) expect
/// both input latches loaded with the same value. Sec, Clc and Clv take
/// the status register on both inputs and write back to status; with a
/// non-zero flag input they instead become fixed-mask AND operations
/// (0x02, 0x3D, 0xC0) used by flag composition microcode.
#[derive(Clone, Copy, Display, Debug, PartialEq, Eq)]
#[derive(EnumCount, EnumIter, EnumString)]
#[derive(PrimitiveEnum_u8)]
pub enum AluOp {
    Dec = 0,
    Inc = 1,
    Add = 2,
    Sub = 3,
    Or = 4,
    And = 5,
    Xor = 6,
    Lsl = 7,
    Lsr = 8,
    Rol = 9,
    Ror = 10,
    Cmp = 11,
    Sec = 12,
    Clc = 13,
    Clv = 14,
    /// Recompute Z and N from the input, preserve C and V.
    Flags = 15,
}

bitflags! {
    /// The flag nibble presented to an ALU slice, in terms of the ROM
    /// address lines rather than the status register layout.
    #[derive(Default)]
    pub struct AluInFlags: u8 {
        /// Decimal mode; reserved, never consulted downstream.
        const D = 1 << 0;
        const C = 1 << 1;
        const V = 1 << 2;
        /// Inter-slice signal: carry-across-nibble for Lsr/Ror, the
        /// mid-byte bit for the flag logic. Fed from slice 1's output
        /// or bit 4 of the second input, depending on the op.
        const SPECIAL = 1 << 3;
    }
}

bitflags! {
    /// The flag nibble an ALU slice produces in the high half of its
    /// output byte.
    pub struct AluOutFlags: u8 {
        const C = 1 << 4;
        const Z = 1 << 5;
        const V = 1 << 6;
        const N = 1 << 7;
        /// Slice 1 repurposes the N position as the inter-slice marker.
        const SPECIAL = 1 << 7;
    }
}
