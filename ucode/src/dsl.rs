//! Composable microcode fragments: addressing-mode prologues, memory
//! and register transfer templates, branch plumbing and the IRQ-tail
//! rewrite. Every fragment leaves the builder in a state any other
//! fragment can follow.

use common::*;

use crate::{OpCode, IRQ_CHECK_LIMIT};

impl OpCode {
    /// Tail of every opcode: optionally check for a pending IRQ, fetch
    /// the next opcode from the PC, and restart the tick counter.
    ///
    /// The IRQ check compares the external request line with the I flag
    /// while the status register sits on the data bus; the latched
    /// decision selects the rewritten half of the ROM for the next
    /// opcode (see [`OpCode::find_irq_latch_and_replace`]). Opcodes that
    /// are already long skip the check to stay inside the slot.
    pub fn fetch_exec(&mut self, do_irq_check: bool) {
        if do_irq_check && self.len() < IRQ_CHECK_LIMIT {
            self.add(tick!(d2: D2::ST_TO_DB));
            self.add(tick!(d2: D2::ST_TO_DB, d5: D5::IRQ_STATE_LATCH));
            self.add(tick!()); // sync
        }

        self.load_register_from_memory(
            D4::empty(),
            D1::OPCODE_LOAD | D1::PC_TO_ADDRESS,
            false,
        );
        self.add(tick!(d1: D1::CYCLE_RESET));
    }

    pub fn fetch_exec_pre_inc(&mut self, do_irq_check: bool) {
        self.add(tick!(d1: D1::PC_INC));
        self.fetch_exec(do_irq_check);
    }

    /// Status register into the ALU flag input.
    pub fn st_to_alu(&mut self) {
        self.add(tick!(d2: D2::ST_TO_DB));
        self.add(tick!(d2: D2::ST_TO_DB, d3: D3::ALU_IN3_LOAD));
    }

    /// Status register from the last ALU flag output.
    pub fn load_st_from_alu_flags(&mut self) {
        self.add(tick!(d2: D2::ALU_TEMP_ST_TO_DB, d4: D4::DB_TO_ST));
    }

    /// Recompute Z and N from whatever sits in the ALU inputs, merging
    /// the other flags through from the current status.
    pub fn load_flags_do_flags(&mut self) {
        self.add(tick!(d2: D2::ST_TO_DB));
        self.add(tick!(d2: D2::ST_TO_DB, d3: D3::op(AluOp::Flags) | D3::ALU_IN3_LOAD));
        self.add(tick!(
            d2: D2::ALU_TEMP_ST_TO_DB,
            d3: D3::op(AluOp::Flags) | D3::ALU_RES_LOAD,
            d4: D4::DB_TO_ST,
        ));
    }

    /// Operand fetch: PC increment, then the byte at the PC into `dst`
    /// and both ALU inputs.
    pub fn load_immediate_prime_alu_pre_inc(&mut self, dst: D4) {
        self.add(tick!(d1: D1::PC_INC));
        self.load_register_from_memory(dst, D1::PC_TO_ADDRESS, true);
    }

    /// Register-to-register move through the data bus, priming the ALU
    /// on the way past.
    pub fn transfer_a_to_b_prime_alu(&mut self, src: D2, dst: D4) {
        self.add(tick!(d2: src));
        self.add(tick!(d2: src, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD, d4: dst));
    }

    /// Absolute addressing prologue: two operand bytes into the address
    /// latches.
    pub fn load_absolute_address_from_pc_with_pre_inc(&mut self) {
        self.add(tick!(d1: D1::PC_INC));
        self.load_register_from_memory(D4::empty(), D1::PC_TO_ADDRESS | D1::ADDRL_LOAD, false);

        self.add(tick!(d1: D1::PC_INC));
        self.load_register_from_memory(D4::empty(), D1::PC_TO_ADDRESS | D1::ADDRH_LOAD, false);
    }

    /// Zero-page addressing prologue: one operand byte into the low
    /// address latch, zero into the high one.
    pub fn load_zero_page_address_from_pc_with_pre_inc(&mut self) {
        self.add(tick!(d1: D1::PC_INC));
        self.load_register_from_memory(D4::empty(), D1::PC_TO_ADDRESS | D1::ADDRL_LOAD, false);

        self.add(tick!(d2: D2::ZERO_TO_DB));
        self.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::ZERO_TO_DB));
    }

    /// Reads the 16-bit target behind the current address, reproducing
    /// the 6502 page-wrap quirk: only the low address half is
    /// incremented between the two reads, so `JMP ($37FF)` takes its
    /// high byte from `$3700`. Corrupts R5 and R6.
    pub fn load_ind_addr_with_wrap_bug(&mut self) {
        self.load_register_from_memory(D4::DB_TO_R5, D1::empty(), false);

        // Step only the low address half through the ALU.
        self.add(tick!(d2: D2::ADDR_WL_TO_DB));
        self.add(tick!(
            d2: D2::ADDR_WL_TO_DB,
            d3: D3::op(AluOp::Inc) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD,
        ));
        self.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Inc) | D3::ALU_RES_LOAD));
        self.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::ALU_RES_TO_DB));

        self.load_register_from_memory(D4::DB_TO_R6, D1::empty(), false);

        // Move the pair into the address latches for the PC load.
        self.add(tick!(d2: D2::R5_TO_DB));
        self.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R5_TO_DB));
        self.add(tick!(d2: D2::R6_TO_DB));
        self.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::R6_TO_DB));
    }

    /// External-bus read with the arbitration handshake. `d1_source`
    /// carries the address-source select plus any latch strobes for the
    /// read tick; an opcode fetch holds the bus one tick longer for the
    /// opcode latch.
    pub fn load_register_from_memory(&mut self, dst: D4, d1_source: D1, prime_alu: bool) {
        let hold = d1_source & D1::PC_TO_ADDRESS;
        let alu = if prime_alu {
            D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD
        } else {
            D3::empty()
        };

        self.add(tick!(d2: D2::CPU_WANT_BUS));
        self.add(tick!(d1: hold, d2: D2::BUS_DDR | D2::CPU_HAS_BUS));
        self.add(tick!(d1: hold, d2: D2::BUS_DDR | D2::CPU_HAS_BUS | D2::MEMORY_TO_DB));
        self.add(tick!(
            d1: d1_source,
            d2: D2::BUS_DDR | D2::CPU_HAS_BUS | D2::MEMORY_TO_DB,
            d3: alu,
            d4: dst,
        ));
        if d1_source.contains(D1::OPCODE_LOAD) {
            self.add(tick!(d1: hold, d2: D2::BUS_DDR | D2::CPU_HAS_BUS | D2::MEMORY_TO_DB));
        }
        self.add(tick!(d1: hold, d2: D2::BUS_DDR | D2::CPU_HAS_BUS));
    }

    /// External-bus write: arbitration, one RAM strobe tick with the
    /// source held on the bus, then settle.
    pub fn write_register_to_memory(&mut self, src: D2, alu_op: D3, d1_source: D1) {
        self.add(tick!(d2: D2::CPU_WANT_BUS));
        self.add(tick!(d1: d1_source, d2: D2::CPU_HAS_BUS | src, d3: alu_op));
        self.add(tick!(d1: d1_source | D1::RAM_WRITE, d2: D2::CPU_HAS_BUS | src, d3: alu_op));
        self.add(tick!(d1: d1_source, d2: D2::CPU_HAS_BUS | src, d3: alu_op));
    }

    /// Full 16-bit add of an 8-bit register to the address latch pair,
    /// carrying through the ALU flag output.
    pub fn add_register_to_address(&mut self, src: D2) {
        self.add(tick!(d2: D2::ADDR_WL_TO_DB));
        self.add(tick!(d2: D2::ADDR_WL_TO_DB, d3: D3::ALU_IN1_LOAD));
        self.add(tick!(d2: src));
        self.add(tick!(d2: src, d3: D3::ALU_IN2_LOAD));
        self.add(tick!(d2: D2::ZERO_TO_DB));
        self.add(tick!(d2: D2::ZERO_TO_DB, d3: D3::op(AluOp::Add) | D3::ALU_IN3_LOAD));
        // Low half, no carry in.
        self.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Add) | D3::ALU_RES_LOAD));
        self.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Add)));
        // Carry into the high half.
        self.add(tick!(d2: D2::ALU_TEMP_ST_TO_DB));
        self.add(tick!(d2: D2::ALU_TEMP_ST_TO_DB, d3: D3::ALU_IN3_LOAD));
        self.add(tick!(d2: D2::ADDR_WH_TO_DB));
        self.add(tick!(d2: D2::ADDR_WH_TO_DB, d3: D3::ALU_IN1_LOAD));
        self.add(tick!(d2: D2::ZERO_TO_DB));
        self.add(tick!(d2: D2::ZERO_TO_DB, d3: D3::op(AluOp::Add) | D3::ALU_IN2_LOAD));
        self.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Add) | D3::ALU_RES_LOAD));
        self.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Add)));
    }

    /// 8-bit-only variant for zero-page indexing; the high latch stays
    /// zero and the carry is dropped.
    pub fn add_register_to_zero_page_address(&mut self, src: D2) {
        self.add(tick!(d2: D2::ADDR_WL_TO_DB));
        self.add(tick!(d2: D2::ADDR_WL_TO_DB, d3: D3::ALU_IN1_LOAD));
        self.add(tick!(d2: src));
        self.add(tick!(d2: src, d3: D3::ALU_IN2_LOAD));
        self.add(tick!(d2: D2::ZERO_TO_DB));
        self.add(tick!(d2: D2::ZERO_TO_DB, d3: D3::op(AluOp::Add) | D3::ALU_IN3_LOAD));
        self.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Add) | D3::ALU_RES_LOAD));
        self.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::ALU_RES_TO_DB));
    }

    pub fn compare_register_with_immediate(&mut self, src: D2) {
        self.load_immediate_prime_alu_pre_inc(D4::empty());
        self.compare_common(src);
    }

    /// Compare against an absolute operand, optionally indexed.
    pub fn compare_register_with_addr_plus_register(&mut self, src: D2, index: Option<D2>) {
        self.load_absolute_address_from_pc_with_pre_inc();
        if let Some(index) = index {
            self.add_register_to_address(index);
        }
        self.load_register_from_memory(D4::empty(), D1::empty(), true);
        self.compare_common(src);
    }

    pub fn compare_register_with_zero_page_addr_plus_register(
        &mut self,
        src: D2,
        index: Option<D2>,
    ) {
        self.load_zero_page_address_from_pc_with_pre_inc();
        if let Some(index) = index {
            self.add_register_to_zero_page_address(index);
        }
        self.load_register_from_memory(D4::empty(), D1::empty(), true);
        self.compare_common(src);
    }

    /// ALU compare of `src` against whatever is already latched in the
    /// second input, flag result straight back into status.
    pub fn compare_common(&mut self, src: D2) {
        self.st_to_alu();
        self.add(tick!(d2: src));
        self.add(tick!(d2: src, d3: D3::op(AluOp::Cmp) | D3::ALU_IN1_LOAD));
        self.add(tick!(
            d2: D2::ALU_TEMP_ST_TO_DB,
            d3: D3::op(AluOp::Cmp) | D3::ALU_RES_LOAD,
            d4: D4::DB_TO_ST,
        ));
    }

    /// Single-input ALU op: both inputs from `src`, result to `dst`,
    /// flags back into status.
    pub fn register_simple_alu_op(&mut self, src: D2, op: AluOp, dst: D4) {
        self.st_to_alu();
        self.add(tick!(d2: src));
        self.add(tick!(d2: src, d3: D3::op(op) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
        self.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(op) | D3::ALU_RES_LOAD, d4: dst));
        self.load_st_from_alu_flags();
    }

    /// Two-input ALU op: only the first input is (re)loaded from `src`,
    /// the second keeps whatever the operand fetch primed.
    pub fn register_alu_op(&mut self, src: D2, op: AluOp, dst: D4) {
        self.st_to_alu();
        self.add(tick!(d2: src));
        self.add(tick!(d2: src, d3: D3::op(op) | D3::ALU_IN1_LOAD));
        self.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(op) | D3::ALU_RES_LOAD, d4: dst));
        self.load_st_from_alu_flags();
    }

    /// The taken side of a conditional branch: sign-extend the offset
    /// byte and add it to the PC, 16 bits wide. Appended onto a
    /// flag-extraction stub.
    pub fn take_branch(&mut self) {
        // Offset byte into the ALU inputs and temp R5.
        self.load_immediate_prime_alu_pre_inc(D4::DB_TO_R5);

        // Shift bit 7 into the carry, park the shifted byte in R6.
        self.add(tick!(d2: D2::ALU_TEMP_ST_TO_DB, d3: D3::op(AluOp::Lsl)));
        self.add(tick!(
            d2: D2::ALU_TEMP_ST_TO_DB,
            d3: D3::op(AluOp::Lsl) | D3::ALU_RES_LOAD,
            d4: D4::DB_TO_R6,
        ));
        // Rotate the carry into the bottom of zero: 0 or 1.
        self.add(tick!(d2: D2::R6_TO_DB));
        self.add(tick!(d2: D2::R6_TO_DB, d3: D3::ALU_IN3_LOAD));
        self.add(tick!(d2: D2::ZERO_TO_DB));
        self.add(tick!(
            d2: D2::ZERO_TO_DB,
            d3: D3::op(AluOp::Rol) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD,
        ));
        self.add(tick!(d3: D3::op(AluOp::Rol) | D3::ALU_RES_LOAD));
        // 0 or 1, xor 0xFF.
        self.add(tick!(d2: D2::ALU_RES_TO_DB));
        self.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::ALU_IN1_LOAD));
        self.add(tick!(d2: D2::FF_TO_DB));
        self.add(tick!(d2: D2::FF_TO_DB, d3: D3::op(AluOp::Xor) | D3::ALU_IN2_LOAD));
        self.add(tick!(d3: D3::op(AluOp::Xor) | D3::ALU_RES_LOAD));
        // Increment: 0x00 or 0xFF, the sign extension for the high half.
        self.add(tick!(d2: D2::ALU_RES_TO_DB));
        self.add(tick!(
            d2: D2::ALU_RES_TO_DB,
            d3: D3::op(AluOp::Inc) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD,
        ));
        self.add(tick!(
            d2: D2::ALU_RES_TO_DB,
            d3: D3::op(AluOp::Inc) | D3::ALU_RES_LOAD,
            d4: D4::DB_TO_R6,
        ));
        // PC low plus offset, no carry in.
        self.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::ADDR_WL_TO_DB));
        self.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::ADDR_WL_TO_DB, d3: D3::ALU_IN1_LOAD));
        self.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::R5_TO_DB));
        self.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::R5_TO_DB, d3: D3::ALU_IN2_LOAD));
        self.add(tick!(d2: D2::ZERO_TO_DB));
        self.add(tick!(d2: D2::ZERO_TO_DB, d3: D3::op(AluOp::Add) | D3::ALU_IN3_LOAD));
        self.add(tick!(d3: D3::op(AluOp::Add) | D3::ALU_RES_LOAD));
        self.add(tick!(d2: D2::ALU_RES_TO_DB));
        self.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::ALU_RES_TO_DB));
        // Keep the carry for the high half.
        self.add(tick!(d2: D2::ALU_TEMP_ST_TO_DB));
        self.add(tick!(d2: D2::ALU_TEMP_ST_TO_DB, d3: D3::ALU_IN3_LOAD));
        // PC high plus sign extension plus carry.
        self.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::ADDR_WH_TO_DB));
        self.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::ADDR_WH_TO_DB, d3: D3::ALU_IN1_LOAD));
        self.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::R6_TO_DB));
        self.add(tick!(
            d1: D1::PC_TO_ADDRESS,
            d2: D2::R6_TO_DB,
            d3: D3::op(AluOp::Add) | D3::ALU_IN2_LOAD,
        ));
        self.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Add) | D3::ALU_RES_LOAD));
        self.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::ALU_RES_TO_DB));
        // New PC from the address latches.
        self.add(tick!(d1: D1::PC_LOAD));
        self.add(tick!(d1: D1::PC_LOAD | D1::PC_INC));
        self.add(tick!());
        self.fetch_exec_pre_inc(true);
    }

    /// The untaken side: step the PC past the offset byte.
    pub fn skip_branch(&mut self) {
        self.add(tick!(d1: D1::PC_INC));
        self.add(tick!());
        self.fetch_exec_pre_inc(true);
    }

    /// BIT: Z from memory AND accumulator, N and V copied from bits 7
    /// and 6 of the memory operand, everything merged back into status
    /// through the extended mask ops.
    pub fn common_bit_opcode(&mut self) {
        self.load_register_from_memory(D4::empty(), D1::empty(), true);
        // AND with a blank flag input for the temporary Z.
        self.add(tick!(d2: D2::R0_TO_DB));
        self.add(tick!(d2: D2::R0_TO_DB, d3: D3::ALU_IN1_LOAD));
        self.add(tick!(d2: D2::ZERO_TO_DB));
        self.add(tick!(d2: D2::ZERO_TO_DB, d3: D3::op(AluOp::And) | D3::ALU_IN3_LOAD));
        self.add(tick!(d3: D3::op(AluOp::And) | D3::ALU_RES_LOAD));
        // Non-zero flag input switches the pattern ops into mask mode.
        self.add(tick!(d2: D2::FF_TO_DB));
        self.add(tick!(d2: D2::FF_TO_DB, d3: D3::ALU_IN3_LOAD));
        // Extract just Z from the AND's flags into R5.
        self.add(tick!(d2: D2::ALU_TEMP_ST_TO_DB));
        self.add(tick!(
            d2: D2::ALU_TEMP_ST_TO_DB,
            d3: D3::op(AluOp::Sec) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD,
        ));
        self.add(tick!(
            d2: D2::ALU_RES_TO_DB,
            d3: D3::op(AluOp::Sec) | D3::ALU_RES_LOAD,
            d4: D4::DB_TO_R5,
        ));
        // Keep everything but Z and the copied bits of the real status in R6.
        self.add(tick!(d2: D2::ST_TO_DB));
        self.add(tick!(
            d2: D2::ST_TO_DB,
            d3: D3::op(AluOp::Clc) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD,
        ));
        self.add(tick!(
            d2: D2::ALU_RES_TO_DB,
            d3: D3::op(AluOp::Clc) | D3::ALU_RES_LOAD,
            d4: D4::DB_TO_R6,
        ));
        // N and V straight from the memory operand.
        self.load_register_from_memory(D4::empty(), D1::empty(), true);
        self.add(tick!(d3: D3::op(AluOp::Clv)));
        self.add(tick!(d3: D3::op(AluOp::Clv) | D3::ALU_RES_LOAD));
        // Or the pieces together and into status.
        self.add(tick!(d2: D2::ALU_RES_TO_DB));
        self.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::ALU_IN1_LOAD));
        self.add(tick!(d2: D2::R5_TO_DB));
        self.add(tick!(d2: D2::R5_TO_DB, d3: D3::ALU_IN2_LOAD));
        self.add(tick!(d2: D2::ZERO_TO_DB));
        self.add(tick!(d2: D2::ZERO_TO_DB, d3: D3::op(AluOp::Or) | D3::ALU_IN3_LOAD));
        self.add(tick!(d3: D3::op(AluOp::Or) | D3::ALU_RES_LOAD));
        self.add(tick!(d2: D2::ALU_RES_TO_DB));
        self.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::ALU_IN1_LOAD));
        self.add(tick!(d2: D2::R6_TO_DB));
        self.add(tick!(d2: D2::R6_TO_DB, d3: D3::op(AluOp::Or) | D3::ALU_IN2_LOAD));
        self.add(tick!(
            d2: D2::ALU_RES_TO_DB,
            d3: D3::op(AluOp::Or) | D3::ALU_RES_LOAD,
            d4: D4::DB_TO_ST,
        ));
        self.fetch_exec_pre_inc(true);
    }

    /// Retargets this opcode's tail for the pending-IRQ ROM half.
    ///
    /// Everything after the first `IRQStateLatch` tick is replaced by a
    /// redirect that computes `0xFC` (`0xFF << 2`) through temp R5,
    /// latches it as the next opcode and resets the cycle, so a latched
    /// request enters the interrupt microcode instead of fetching the
    /// next instruction. Opcodes that never latch the IRQ state are
    /// left untouched.
    pub fn find_irq_latch_and_replace(&mut self) {
        let latch = match self
            .ticks
            .iter()
            .position(|tick| tick.d5.contains(D5::IRQ_STATE_LATCH))
        {
            Some(latch) => latch,
            None => return,
        };

        self.ticks.truncate(latch + 1);
        self.got_reset = false;

        self.add(tick!(d2: D2::FF_TO_DB));
        self.add(tick!(
            d2: D2::FF_TO_DB,
            d3: D3::op(AluOp::Lsl) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD,
        ));
        self.add(tick!(
            d2: D2::ALU_RES_TO_DB,
            d3: D3::op(AluOp::Lsl) | D3::ALU_RES_LOAD,
            d4: D4::DB_TO_R5,
        ));
        self.add(tick!(d2: D2::R5_TO_DB));
        self.add(tick!(
            d2: D2::R5_TO_DB,
            d3: D3::op(AluOp::Lsl) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD,
        ));
        self.add(tick!(
            d1: D1::OPCODE_LOAD,
            d2: D2::ALU_RES_TO_DB,
            d3: D3::op(AluOp::Lsl) | D3::ALU_RES_LOAD,
        ));
        self.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Lsl)));
        self.add(tick!(d1: D1::CYCLE_RESET));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lda_immediate() -> OpCode {
        let mut op = OpCode::named("lda #imm");
        op.load_immediate_prime_alu_pre_inc(D4::DB_TO_R0);
        op.load_flags_do_flags();
        op.fetch_exec_pre_inc(true);
        op
    }

    #[test]
    fn fetch_exec_ends_with_the_only_cycle_reset() {
        let op = lda_immediate();
        let last = op.len() - 1;
        for (i, tick) in op.ticks().iter().enumerate() {
            assert_eq!(i == last, tick.d1.contains(D1::CYCLE_RESET));
        }
    }

    #[test]
    fn fetch_exec_skips_the_irq_check_when_long() {
        let mut op = OpCode::named("long");
        for _ in 0..IRQ_CHECK_LIMIT {
            op.add(tick!());
        }
        op.fetch_exec(true);
        assert!(op.ticks().iter().all(|t| t.d5.is_empty()));
    }

    #[test]
    fn irq_rewrite_keeps_the_prefix_and_retargets_the_tail() {
        let mut op = lda_immediate();
        let normal = op.clone();

        op.find_irq_latch_and_replace();

        let latch = normal
            .ticks()
            .iter()
            .position(|t| t.d5.contains(D5::IRQ_STATE_LATCH))
            .unwrap();
        assert_eq!(&normal.ticks()[..=latch], &op.ticks()[..=latch]);
        assert_eq!(latch + 9, op.len());

        // The redirect fetches the pseudo-opcode rather than memory.
        let tail = &op.ticks()[latch + 1..];
        assert!(tail.iter().any(|t| t.d1.contains(D1::OPCODE_LOAD)));
        assert!(tail.iter().all(|t| t.d2.source() != D2::MEMORY_TO_DB));
        assert!(tail.last().unwrap().d1.contains(D1::CYCLE_RESET));
    }

    #[test]
    fn irq_rewrite_is_idempotent() {
        let mut once = lda_immediate();
        once.find_irq_latch_and_replace();

        let mut twice = once.clone();
        twice.find_irq_latch_and_replace();

        assert_eq!(once.ticks(), twice.ticks());
    }

    #[test]
    fn irq_rewrite_without_latch_is_a_noop() {
        let mut op = OpCode::named("sei-like");
        op.fetch_exec_pre_inc(false);
        let before = op.clone();

        op.find_irq_latch_and_replace();

        assert_eq!(before.ticks(), op.ticks());
    }

    #[test]
    fn take_branch_is_thirty_five_ticks_past_the_operand_fetch() {
        let mut taken = OpCode::named("taken");
        // Stand-in for a flag extraction stub.
        taken.add(tick!());
        let stub = taken.len();
        taken.take_branch();

        let fetch_tail = {
            let mut tail = OpCode::named("tail");
            tail.fetch_exec_pre_inc(true);
            tail.len()
        };
        let operand_fetch = 6;
        assert_eq!(stub + operand_fetch + 35 + fetch_tail, taken.len());
    }
}
