//! The concrete instruction catalogue and the 256-entry dispatch table.
//!
//! Opcode bytes without microcode route to a shared illegal-op builder
//! that asserts the hardware breakpoint. The eight conditional branches
//! have a second builder for the branch-flop-set track, kept in a
//! sparse override map.

use std::collections::BTreeMap;

use common::*;

use crate::OpCode;

use lazy_static::lazy_static;
lazy_static! {
    /// The fully built and validated table; building it exercises every
    /// design rule, so reaching through this static proves the whole
    /// catalogue fits.
    pub static ref DISPATCH: DispatchTable = DispatchTable::build();
}

/// Operand-address prologues shared by most of the catalogue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    IndirectX,
    IndirectY,
}

fn operand_address(op: &mut OpCode, mode: Mode) {
    match mode {
        Mode::ZeroPage => op.load_zero_page_address_from_pc_with_pre_inc(),
        Mode::ZeroPageX => {
            op.load_zero_page_address_from_pc_with_pre_inc();
            op.add_register_to_zero_page_address(D2::R1_TO_DB);
        }
        Mode::ZeroPageY => {
            op.load_zero_page_address_from_pc_with_pre_inc();
            op.add_register_to_zero_page_address(D2::R2_TO_DB);
        }
        Mode::Absolute => op.load_absolute_address_from_pc_with_pre_inc(),
        Mode::AbsoluteX => {
            op.load_absolute_address_from_pc_with_pre_inc();
            op.add_register_to_address(D2::R1_TO_DB);
        }
        Mode::AbsoluteY => {
            op.load_absolute_address_from_pc_with_pre_inc();
            op.add_register_to_address(D2::R2_TO_DB);
        }
        Mode::IndirectX => {
            op.load_zero_page_address_from_pc_with_pre_inc();
            op.add_register_to_zero_page_address(D2::R1_TO_DB);
            op.load_ind_addr_with_wrap_bug();
        }
        Mode::IndirectY => {
            op.load_zero_page_address_from_pc_with_pre_inc();
            op.load_ind_addr_with_wrap_bug();
            op.add_register_to_address(D2::R2_TO_DB);
        }
    }
}

/// Loads the PC from the address latches; the PC_INC on the second tick
/// loads rather than increments.
fn load_pc_from_address(op: &mut OpCode) {
    op.add(tick!(d1: D1::PC_LOAD));
    op.add(tick!(d1: D1::PC_LOAD | D1::PC_INC));
    op.add(tick!());
}

/// Traps unimplemented opcodes on the hardware breakpoint, then keeps
/// going so a debugger can step past.
fn illegal() -> OpCode {
    let mut op = OpCode::named("illegal");
    op.add(tick!(d5: D5::ILLEGAL_OP));
    op.add(tick!());
    op.fetch_exec_pre_inc(true);
    op
}

fn nop(name: &'static str) -> OpCode {
    let mut op = OpCode::named(name);
    op.fetch_exec_pre_inc(true);
    op
}

fn load_immediate(name: &'static str, dst: D4) -> OpCode {
    let mut op = OpCode::named(name);
    op.load_immediate_prime_alu_pre_inc(dst);
    op.load_flags_do_flags();
    op.fetch_exec_pre_inc(true);
    op
}

fn load_memory(name: &'static str, mode: Mode, dst: D4) -> OpCode {
    let mut op = OpCode::named(name);
    operand_address(&mut op, mode);
    op.load_register_from_memory(dst, D1::empty(), true);
    op.load_flags_do_flags();
    op.fetch_exec_pre_inc(true);
    op
}

fn store_memory(name: &'static str, mode: Mode, src: D2) -> OpCode {
    let mut op = OpCode::named(name);
    operand_address(&mut op, mode);
    op.write_register_to_memory(src, D3::empty(), D1::empty());
    op.fetch_exec_pre_inc(true);
    op
}

fn transfer(name: &'static str, src: D2, dst: D4) -> OpCode {
    let mut op = OpCode::named(name);
    op.transfer_a_to_b_prime_alu(src, dst);
    op.load_flags_do_flags();
    op.fetch_exec_pre_inc(true);
    op
}

/// ADC/SBC/AND/ORA/EOR: operand into the ALU, result back into the
/// accumulator. `None` is immediate mode.
fn accumulator_alu(name: &'static str, mode: Option<Mode>, alu: AluOp) -> OpCode {
    let mut op = OpCode::named(name);
    match mode {
        None => op.load_immediate_prime_alu_pre_inc(D4::empty()),
        Some(mode) => {
            operand_address(&mut op, mode);
            op.load_register_from_memory(D4::empty(), D1::empty(), true);
        }
    }
    op.register_alu_op(D2::R0_TO_DB, alu, D4::DB_TO_R0);
    op.fetch_exec_pre_inc(true);
    op
}

fn compare(name: &'static str, mode: Option<Mode>, src: D2) -> OpCode {
    let mut op = OpCode::named(name);
    match mode {
        None => op.compare_register_with_immediate(src),
        Some(Mode::ZeroPage) => op.compare_register_with_zero_page_addr_plus_register(src, None),
        Some(Mode::ZeroPageX) => {
            op.compare_register_with_zero_page_addr_plus_register(src, Some(D2::R1_TO_DB))
        }
        Some(Mode::Absolute) => op.compare_register_with_addr_plus_register(src, None),
        Some(Mode::AbsoluteX) => {
            op.compare_register_with_addr_plus_register(src, Some(D2::R1_TO_DB))
        }
        Some(Mode::AbsoluteY) => {
            op.compare_register_with_addr_plus_register(src, Some(D2::R2_TO_DB))
        }
        Some(mode) => {
            operand_address(&mut op, mode);
            op.load_register_from_memory(D4::empty(), D1::empty(), true);
            op.compare_common(src);
        }
    }
    op.fetch_exec_pre_inc(true);
    op
}

fn shift_accumulator(name: &'static str, alu: AluOp) -> OpCode {
    let mut op = OpCode::named(name);
    op.register_simple_alu_op(D2::R0_TO_DB, alu, D4::DB_TO_R0);
    op.fetch_exec_pre_inc(true);
    op
}

/// Read-modify-write shifts go through temp R5.
fn shift_memory(name: &'static str, mode: Mode, alu: AluOp) -> OpCode {
    let mut op = OpCode::named(name);
    operand_address(&mut op, mode);
    op.load_register_from_memory(D4::DB_TO_R5, D1::empty(), false);
    op.register_simple_alu_op(D2::R5_TO_DB, alu, D4::DB_TO_R5);
    op.write_register_to_memory(D2::R5_TO_DB, D3::empty(), D1::empty());
    op.fetch_exec_pre_inc(true);
    op
}

fn step_register(name: &'static str, src: D2, alu: AluOp, dst: D4) -> OpCode {
    let mut op = OpCode::named(name);
    op.register_simple_alu_op(src, alu, dst);
    op.fetch_exec_pre_inc(true);
    op
}

/// INC/DEC on memory: the operand stays in the ALU inputs while the
/// stepped result is written straight from the result latch.
fn step_memory(name: &'static str, mode: Mode, alu: AluOp) -> OpCode {
    let mut op = OpCode::named(name);
    operand_address(&mut op, mode);
    op.st_to_alu();
    op.load_register_from_memory(D4::empty(), D1::empty(), true);
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(alu)));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(alu) | D3::ALU_RES_LOAD));
    op.write_register_to_memory(D2::ALU_RES_TO_DB, D3::op(alu), D1::empty());
    op.load_st_from_alu_flags();
    op.fetch_exec_pre_inc(true);
    op
}

fn bit(name: &'static str, mode: Mode) -> OpCode {
    let mut op = OpCode::named(name);
    operand_address(&mut op, mode);
    op.common_bit_opcode();
    op
}

/// SEC/CLC/CLV through the ALU's flag pattern ops, zero on the flag
/// input selecting the direct set/clear mode.
fn set_clear_flag(name: &'static str, alu: AluOp) -> OpCode {
    let mut op = OpCode::named(name);
    op.add(tick!(d2: D2::ST_TO_DB));
    op.add(tick!(d2: D2::ST_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ZERO_TO_DB));
    op.add(tick!(d2: D2::ZERO_TO_DB, d3: D3::op(alu) | D3::ALU_IN3_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(alu) | D3::ALU_RES_LOAD, d4: D4::DB_TO_ST));
    op.fetch_exec_pre_inc(true);
    op
}

/// Builds `1 << 2`, the I-flag mask, into temp R5.
fn interrupt_mask_to_r5(op: &mut OpCode) {
    op.add(tick!(d2: D2::ZERO_TO_DB));
    op.add(tick!(
        d2: D2::ZERO_TO_DB,
        d3: D3::op(AluOp::Inc) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD | D3::ALU_IN3_LOAD,
    ));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Inc) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R5));

    op.add(tick!(d2: D2::R5_TO_DB));
    op.add(tick!(d2: D2::R5_TO_DB, d3: D3::op(AluOp::Lsl) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Lsl) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R5));

    op.add(tick!(d2: D2::R5_TO_DB));
    op.add(tick!(d2: D2::R5_TO_DB, d3: D3::op(AluOp::Lsl) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Lsl) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R5));
}

fn cli() -> OpCode {
    let mut op = OpCode::named("cli");
    interrupt_mask_to_r5(&mut op);

    // Invert the mask, then AND it into the status.
    op.add(tick!(d2: D2::R5_TO_DB));
    op.add(tick!(d2: D2::R5_TO_DB, d3: D3::ALU_IN1_LOAD));
    op.add(tick!(d2: D2::FF_TO_DB));
    op.add(tick!(d2: D2::FF_TO_DB, d3: D3::op(AluOp::Xor) | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Xor) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R5));

    op.add(tick!(d2: D2::ST_TO_DB));
    op.add(tick!(d2: D2::ST_TO_DB, d3: D3::ALU_IN1_LOAD));
    op.add(tick!(d2: D2::R5_TO_DB));
    op.add(tick!(d2: D2::R5_TO_DB, d3: D3::op(AluOp::And) | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::And) | D3::ALU_RES_LOAD, d4: D4::DB_TO_ST));
    op.fetch_exec_pre_inc(true);
    op
}

fn sei() -> OpCode {
    let mut op = OpCode::named("sei");
    interrupt_mask_to_r5(&mut op);

    // OR the mask into the status.
    op.add(tick!(d2: D2::ST_TO_DB));
    op.add(tick!(d2: D2::ST_TO_DB, d3: D3::ALU_IN1_LOAD));
    op.add(tick!(d2: D2::R5_TO_DB));
    op.add(tick!(d2: D2::R5_TO_DB, d3: D3::op(AluOp::Or) | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Or) | D3::ALU_RES_LOAD, d4: D4::DB_TO_ST));
    // Interrupts are now off; checking for one here would be pointless.
    op.fetch_exec_pre_inc(false);
    op
}

fn jmp_absolute() -> OpCode {
    let mut op = OpCode::named("jmp abs");
    op.load_absolute_address_from_pc_with_pre_inc();
    load_pc_from_address(&mut op);
    op.fetch_exec(true);
    op
}

fn jmp_indirect() -> OpCode {
    let mut op = OpCode::named("jmp (abs)");
    op.load_absolute_address_from_pc_with_pre_inc();
    op.load_ind_addr_with_wrap_bug();
    load_pc_from_address(&mut op);
    op.fetch_exec(true);
    op
}

fn jsr() -> OpCode {
    let mut op = OpCode::named("jsr abs");
    op.add(tick!(d1: D1::PC_INC));
    // Target low byte into temp R5; the high byte is read at the end so
    // the PC can be stacked first.
    op.load_register_from_memory(D4::DB_TO_R5, D1::PC_TO_ADDRESS, false);
    op.add(tick!(d1: D1::PC_INC));
    op.add(tick!());

    // Stack pointer onto the address bus, SP low primed for the decrement.
    op.add(tick!(d2: D2::R4_TO_DB));
    op.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::R4_TO_DB));
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R3_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));

    // Push PC high.
    op.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::ADDR_WH_TO_DB, d4: D4::DB_TO_R6));
    op.write_register_to_memory(D2::R6_TO_DB, D3::empty(), D1::empty());
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R3));

    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R3_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    // Push PC low.
    op.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::ADDR_WL_TO_DB, d4: D4::DB_TO_R6));
    op.write_register_to_memory(D2::R6_TO_DB, D3::empty(), D1::empty());
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R3));

    // Target address from R5 and the byte still at the PC.
    op.add(tick!(d2: D2::R5_TO_DB));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R5_TO_DB));
    op.load_register_from_memory(D4::empty(), D1::ADDRH_LOAD | D1::PC_TO_ADDRESS, false);
    load_pc_from_address(&mut op);
    op.fetch_exec(true);
    op
}

fn rts() -> OpCode {
    let mut op = OpCode::named("rts");
    // SP into the PC so its auto-increment walks the stack.
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R3_TO_DB));
    op.add(tick!(d2: D2::R4_TO_DB));
    op.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::R4_TO_DB));
    load_pc_from_address(&mut op);
    // Return address into the latches, then the walked position becomes
    // the new SP low. SP high never changes.
    op.load_absolute_address_from_pc_with_pre_inc();
    op.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::ADDR_WL_TO_DB, d4: D4::DB_TO_R3));
    load_pc_from_address(&mut op);
    // The pushed address is the JSR operand minus one.
    op.fetch_exec_pre_inc(true);
    op
}

fn pha() -> OpCode {
    let mut op = OpCode::named("pha");
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R3_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::R4_TO_DB));
    op.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::R4_TO_DB));
    op.write_register_to_memory(D2::R0_TO_DB, D3::empty(), D1::empty());
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R3));
    op.fetch_exec_pre_inc(true);
    op
}

fn pla() -> OpCode {
    let mut op = OpCode::named("pla");
    // Pre-increment SP low.
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d2: D2::R3_TO_DB, d3: D3::op(AluOp::Inc) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Inc) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R3));
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R3_TO_DB));
    op.add(tick!(d2: D2::R4_TO_DB));
    op.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::R4_TO_DB));
    op.load_register_from_memory(D4::DB_TO_R0, D1::empty(), true);
    op.load_flags_do_flags();
    op.fetch_exec_pre_inc(true);
    op
}

fn php() -> OpCode {
    let mut op = OpCode::named("php");
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R3_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::R4_TO_DB));
    op.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::R4_TO_DB));
    op.write_register_to_memory(D2::ST_TO_DB, D3::empty(), D1::empty());
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R3));
    op.fetch_exec_pre_inc(true);
    op
}

fn plp() -> OpCode {
    let mut op = OpCode::named("plp");
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d2: D2::R3_TO_DB, d3: D3::op(AluOp::Inc) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Inc) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R3));
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R3_TO_DB));
    op.add(tick!(d2: D2::R4_TO_DB));
    op.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::R4_TO_DB));
    op.load_register_from_memory(D4::DB_TO_ST, D1::empty(), false);
    op.fetch_exec_pre_inc(true);
    op
}

fn rti() -> OpCode {
    let mut op = OpCode::named("rti");
    // SP into the PC; no pre-increment on the way in.
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R3_TO_DB));
    op.add(tick!(d2: D2::R4_TO_DB));
    op.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::R4_TO_DB));
    load_pc_from_address(&mut op);
    // Pull the status, then the return address.
    op.add(tick!(d1: D1::PC_INC));
    op.load_register_from_memory(D4::DB_TO_ST, D1::PC_TO_ADDRESS, false);
    op.load_absolute_address_from_pc_with_pre_inc();
    op.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::ADDR_WL_TO_DB, d4: D4::DB_TO_R3));
    load_pc_from_address(&mut op);
    // The pushed PC is the resume address itself, and the freshly
    // restored I flag decides later whether another IRQ may start.
    op.fetch_exec(false);
    op
}

/// Pseudo-opcode 0xFC: stack the PC and status, set I, then chain into
/// the vector fetch at 0x7F. This is where the IRQ-rewritten ROM halves
/// send control.
fn start_irq() -> OpCode {
    let mut op = OpCode::named("irq entry");
    // Stack the actual PC so RTI can return without a pre-increment.
    op.add(tick!(d2: D2::R4_TO_DB));
    op.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::R4_TO_DB));
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R3_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));

    op.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::ADDR_WH_TO_DB, d4: D4::DB_TO_R6));
    op.write_register_to_memory(D2::R6_TO_DB, D3::empty(), D1::empty());
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec)));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R3));
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::R3_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d1: D1::PC_TO_ADDRESS, d2: D2::ADDR_WL_TO_DB, d4: D4::DB_TO_R6));
    op.write_register_to_memory(D2::R6_TO_DB, D3::empty(), D1::empty());
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec)));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R3));

    // Push the status.
    op.add(tick!(d2: D2::R3_TO_DB));
    op.add(tick!(
        d1: D1::ADDRL_LOAD,
        d2: D2::R3_TO_DB,
        d3: D3::op(AluOp::Dec) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD,
    ));
    op.write_register_to_memory(D2::ST_TO_DB, D3::empty(), D1::empty());
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec)));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R3));

    // Disable interrupts.
    interrupt_mask_to_r5(&mut op);
    op.add(tick!(d2: D2::ST_TO_DB));
    op.add(tick!(d2: D2::ST_TO_DB, d3: D3::ALU_IN1_LOAD));
    op.add(tick!(d2: D2::R5_TO_DB));
    op.add(tick!(d2: D2::R5_TO_DB, d3: D3::op(AluOp::Or) | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Or) | D3::ALU_RES_LOAD, d4: D4::DB_TO_ST));

    // Chain into the vector fetch: 0xFF >> 1 = 0x7F as the next opcode.
    op.add(tick!(d2: D2::FF_TO_DB));
    op.add(tick!(d2: D2::FF_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Lsr)));
    op.add(tick!(d1: D1::OPCODE_LOAD, d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Lsr) | D3::ALU_RES_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Lsr)));
    op.add(tick!(d1: D1::CYCLE_RESET));
    op
}

/// Pseudo-opcode 0x7F, the second half of the IRQ entry: fetch the
/// vector at $FFFE/$FFFF into the PC.
fn start_irq2() -> OpCode {
    let mut op = OpCode::named("irq vector");
    // 0xFF to AddrH, 0xFE to AddrL.
    op.add(tick!(d2: D2::FF_TO_DB));
    op.add(tick!(
        d1: D1::ADDRH_LOAD,
        d2: D2::FF_TO_DB,
        d3: D3::op(AluOp::Dec) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD,
    ));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_RES_LOAD));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec)));

    op.add(tick!(d1: D1::PC_LOAD));
    op.add(tick!(d1: D1::PC_LOAD | D1::PC_INC));

    // $FFFE is in the PC; read the vector into the address latches.
    op.load_register_from_memory(D4::empty(), D1::ADDRL_LOAD | D1::PC_TO_ADDRESS, false);
    op.add(tick!(d1: D1::PC_INC));
    op.add(tick!());
    op.load_register_from_memory(D4::empty(), D1::ADDRH_LOAD | D1::PC_TO_ADDRESS, false);

    load_pc_from_address(&mut op);
    op.fetch_exec(false);
    op
}

/// Pseudo-opcode 0xFF: the reset bootstrap. Held during reset, it
/// clears the machine state and fetches the reset vector at $FFFC.
fn boot() -> OpCode {
    let mut op = OpCode::named("boot");
    // Let the clock settle out of reset.
    op.add(tick!());
    op.add(tick!());
    op.add(tick!());

    // Zero the status, one to SP high and temp R5.
    op.add(tick!(d2: D2::ZERO_TO_DB));
    op.add(tick!(
        d2: D2::ZERO_TO_DB,
        d3: D3::op(AluOp::Inc) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD | D3::ALU_IN3_LOAD,
        d4: D4::DB_TO_ST,
    ));
    op.add(tick!(
        d2: D2::ALU_RES_TO_DB,
        d3: D3::op(AluOp::Inc) | D3::ALU_RES_LOAD,
        d4: D4::DB_TO_R4 | D4::DB_TO_R5,
    ));

    // A carry-clear add drains the branch flop; the flop loads from the
    // ALU input side, so no result latch is needed.
    op.add(tick!(d3: D3::op(AluOp::Add)));
    op.add(tick!(d2: D2::DO_BRANCH_LOAD, d3: D3::op(AluOp::Add)));

    // 1 << 2 into the status: interrupts off.
    op.add(tick!(d2: D2::R5_TO_DB));
    op.add(tick!(d2: D2::R5_TO_DB, d3: D3::op(AluOp::Lsl) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Lsl) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R5));
    op.add(tick!(d2: D2::R5_TO_DB));
    op.add(tick!(d2: D2::R5_TO_DB, d3: D3::op(AluOp::Lsl) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Lsl) | D3::ALU_RES_LOAD, d4: D4::DB_TO_ST));

    // 0xFF to AddrH and SP low, then count it down to 0xFC for AddrL.
    op.add(tick!(d2: D2::FF_TO_DB));
    op.add(tick!(d1: D1::ADDRH_LOAD, d2: D2::FF_TO_DB, d4: D4::DB_TO_R0 | D4::DB_TO_R3));
    op.add(tick!(d2: D2::FF_TO_DB));
    op.add(tick!(d2: D2::FF_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R0));
    op.add(tick!(d2: D2::R0_TO_DB));
    op.add(tick!(d2: D2::R0_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_RES_LOAD, d4: D4::DB_TO_R0));
    op.add(tick!(d2: D2::R0_TO_DB));
    op.add(tick!(d2: D2::R0_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Dec) | D3::ALU_RES_LOAD));
    op.add(tick!(d1: D1::ADDRL_LOAD, d2: D2::ALU_RES_TO_DB));

    op.add(tick!(d1: D1::PC_LOAD));
    op.add(tick!(d1: D1::PC_LOAD | D1::PC_INC));

    // Zero A, X and Y.
    op.add(tick!(d2: D2::ZERO_TO_DB, d4: D4::DB_TO_R0 | D4::DB_TO_R1 | D4::DB_TO_R2));

    // $FFFC is in the PC; read the reset vector.
    op.load_register_from_memory(D4::empty(), D1::ADDRL_LOAD | D1::PC_TO_ADDRESS, false);
    op.add(tick!(d1: D1::PC_INC));
    op.add(tick!());
    op.load_register_from_memory(D4::empty(), D1::ADDRH_LOAD | D1::PC_TO_ADDRESS, false);

    load_pc_from_address(&mut op);
    // Fetch immediately so the reset opcode does not loop.
    op.fetch_exec(true);
    op
}

/// Shifts the Z flag into the ALU carry and latches the branch flop;
/// the opcode splits into its two tracks here.
fn extract_z_flag() -> OpCode {
    let mut op = OpCode::named("branch on z");
    op.add(tick!(d2: D2::ST_TO_DB));
    op.add(tick!(d2: D2::ST_TO_DB, d3: D3::op(AluOp::Lsr) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    // Two right shifts walk Z down into the carry.
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Lsr) | D3::ALU_RES_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Lsr) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d3: D3::op(AluOp::Lsr)));
    op.add(tick!(d2: D2::DO_BRANCH_LOAD, d3: D3::op(AluOp::Lsr)));
    op.add(tick!()); // sync
    op
}

fn extract_c_flag() -> OpCode {
    let mut op = OpCode::named("branch on c");
    op.add(tick!(d2: D2::ST_TO_DB));
    op.add(tick!(d2: D2::ST_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d3: D3::op(AluOp::Lsr)));
    op.add(tick!(d2: D2::DO_BRANCH_LOAD, d3: D3::op(AluOp::Lsr)));
    op.add(tick!()); // sync
    op
}

fn extract_n_flag() -> OpCode {
    let mut op = OpCode::named("branch on n");
    op.add(tick!(d2: D2::ST_TO_DB));
    op.add(tick!(d2: D2::ST_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d3: D3::op(AluOp::Lsl)));
    op.add(tick!(d2: D2::DO_BRANCH_LOAD, d3: D3::op(AluOp::Lsl)));
    op.add(tick!()); // sync
    op
}

fn extract_v_flag() -> OpCode {
    let mut op = OpCode::named("branch on v");
    op.add(tick!(d2: D2::ST_TO_DB));
    op.add(tick!(d2: D2::ST_TO_DB, d3: D3::op(AluOp::Lsl) | D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    // Two left shifts walk V up into the carry.
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::op(AluOp::Lsl) | D3::ALU_RES_LOAD));
    op.add(tick!(d2: D2::ALU_RES_TO_DB));
    op.add(tick!(d2: D2::ALU_RES_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD));
    op.add(tick!(d3: D3::op(AluOp::Lsl)));
    op.add(tick!(d2: D2::DO_BRANCH_LOAD, d3: D3::op(AluOp::Lsl)));
    op.add(tick!()); // sync
    op
}

/// One track of a conditional branch: the shared flag-extraction stub,
/// then either the 16-bit PC adjustment or a skip over the offset byte.
fn branch(name: &'static str, stub: &OpCode, takes: bool) -> OpCode {
    let mut op = OpCode::named(name);
    op.append(stub);
    if takes {
        op.take_branch();
    } else {
        op.skip_branch();
    }
    op
}

/// The 256-entry opcode map, its sparse branch-flop override map, and
/// the shared illegal-op builder behind the absent entries.
#[derive(Clone, Debug)]
pub struct DispatchTable {
    base: Vec<Option<OpCode>>,
    branch_set: BTreeMap<u8, OpCode>,
    illegal: OpCode,
}

impl DispatchTable {
    pub fn build() -> DispatchTable {
        let mut base: Vec<Option<OpCode>> = (0..256).map(|_| None).collect();

        let z = extract_z_flag();
        let c = extract_c_flag();
        let n = extract_n_flag();
        let v = extract_v_flag();

        {
            let mut set = |byte: u8, builder: OpCode| base[byte as usize] = Some(builder);

            // 0x00..0x0F
            set(0x01, accumulator_alu("ora (zp,x)", Some(Mode::IndirectX), AluOp::Or));
            set(0x05, accumulator_alu("ora zp", Some(Mode::ZeroPage), AluOp::Or));
            set(0x06, shift_memory("asl zp", Mode::ZeroPage, AluOp::Lsl));
            set(0x08, php());
            set(0x09, accumulator_alu("ora #imm", None, AluOp::Or));
            set(0x0A, shift_accumulator("asl a", AluOp::Lsl));
            set(0x0D, accumulator_alu("ora abs", Some(Mode::Absolute), AluOp::Or));
            set(0x0E, shift_memory("asl abs", Mode::Absolute, AluOp::Lsl));

            // 0x10..0x1F
            set(0x10, branch("bpl rel", &n, true));
            set(0x11, accumulator_alu("ora (zp),y", Some(Mode::IndirectY), AluOp::Or));
            set(0x15, accumulator_alu("ora zp,x", Some(Mode::ZeroPageX), AluOp::Or));
            set(0x16, shift_memory("asl zp,x", Mode::ZeroPageX, AluOp::Lsl));
            set(0x18, set_clear_flag("clc", AluOp::Clc));
            set(0x19, accumulator_alu("ora abs,y", Some(Mode::AbsoluteY), AluOp::Or));
            set(0x1D, accumulator_alu("ora abs,x", Some(Mode::AbsoluteX), AluOp::Or));
            set(0x1E, shift_memory("asl abs,x", Mode::AbsoluteX, AluOp::Lsl));

            // 0x20..0x2F
            set(0x20, jsr());
            set(0x21, accumulator_alu("and (zp,x)", Some(Mode::IndirectX), AluOp::And));
            set(0x24, bit("bit zp", Mode::ZeroPage));
            set(0x25, accumulator_alu("and zp", Some(Mode::ZeroPage), AluOp::And));
            set(0x26, shift_memory("rol zp", Mode::ZeroPage, AluOp::Rol));
            set(0x28, plp());
            set(0x29, accumulator_alu("and #imm", None, AluOp::And));
            set(0x2A, shift_accumulator("rol a", AluOp::Rol));
            set(0x2C, bit("bit abs", Mode::Absolute));
            set(0x2D, accumulator_alu("and abs", Some(Mode::Absolute), AluOp::And));
            set(0x2E, shift_memory("rol abs", Mode::Absolute, AluOp::Rol));

            // 0x30..0x3F
            set(0x30, branch("bmi rel", &n, false));
            set(0x31, accumulator_alu("and (zp),y", Some(Mode::IndirectY), AluOp::And));
            set(0x35, accumulator_alu("and zp,x", Some(Mode::ZeroPageX), AluOp::And));
            set(0x36, shift_memory("rol zp,x", Mode::ZeroPageX, AluOp::Rol));
            set(0x38, set_clear_flag("sec", AluOp::Sec));
            set(0x39, accumulator_alu("and abs,y", Some(Mode::AbsoluteY), AluOp::And));
            set(0x3D, accumulator_alu("and abs,x", Some(Mode::AbsoluteX), AluOp::And));
            set(0x3E, shift_memory("rol abs,x", Mode::AbsoluteX, AluOp::Rol));

            // 0x40..0x4F
            set(0x40, rti());
            set(0x41, accumulator_alu("eor (zp,x)", Some(Mode::IndirectX), AluOp::Xor));
            set(0x45, accumulator_alu("eor zp", Some(Mode::ZeroPage), AluOp::Xor));
            set(0x46, shift_memory("lsr zp", Mode::ZeroPage, AluOp::Lsr));
            set(0x48, pha());
            set(0x49, accumulator_alu("eor #imm", None, AluOp::Xor));
            set(0x4A, shift_accumulator("lsr a", AluOp::Lsr));
            set(0x4C, jmp_absolute());
            set(0x4D, accumulator_alu("eor abs", Some(Mode::Absolute), AluOp::Xor));
            set(0x4E, shift_memory("lsr abs", Mode::Absolute, AluOp::Lsr));

            // 0x50..0x5F
            set(0x50, branch("bvc rel", &v, true));
            set(0x51, accumulator_alu("eor (zp),y", Some(Mode::IndirectY), AluOp::Xor));
            set(0x55, accumulator_alu("eor zp,x", Some(Mode::ZeroPageX), AluOp::Xor));
            set(0x56, shift_memory("lsr zp,x", Mode::ZeroPageX, AluOp::Lsr));
            set(0x58, cli());
            set(0x59, accumulator_alu("eor abs,y", Some(Mode::AbsoluteY), AluOp::Xor));
            set(0x5D, accumulator_alu("eor abs,x", Some(Mode::AbsoluteX), AluOp::Xor));
            set(0x5E, shift_memory("lsr abs,x", Mode::AbsoluteX, AluOp::Lsr));

            // 0x60..0x6F
            set(0x60, rts());
            set(0x61, accumulator_alu("adc (zp,x)", Some(Mode::IndirectX), AluOp::Add));
            set(0x65, accumulator_alu("adc zp", Some(Mode::ZeroPage), AluOp::Add));
            set(0x66, shift_memory("ror zp", Mode::ZeroPage, AluOp::Ror));
            set(0x68, pla());
            set(0x69, accumulator_alu("adc #imm", None, AluOp::Add));
            set(0x6A, shift_accumulator("ror a", AluOp::Ror));
            set(0x6C, jmp_indirect());
            set(0x6D, accumulator_alu("adc abs", Some(Mode::Absolute), AluOp::Add));
            set(0x6E, shift_memory("ror abs", Mode::Absolute, AluOp::Ror));

            // 0x70..0x7F
            set(0x70, branch("bvs rel", &v, false));
            set(0x71, accumulator_alu("adc (zp),y", Some(Mode::IndirectY), AluOp::Add));
            set(0x75, accumulator_alu("adc zp,x", Some(Mode::ZeroPageX), AluOp::Add));
            set(0x76, shift_memory("ror zp,x", Mode::ZeroPageX, AluOp::Ror));
            set(0x78, sei());
            set(0x79, accumulator_alu("adc abs,y", Some(Mode::AbsoluteY), AluOp::Add));
            set(0x7D, accumulator_alu("adc abs,x", Some(Mode::AbsoluteX), AluOp::Add));
            set(0x7E, shift_memory("ror abs,x", Mode::AbsoluteX, AluOp::Ror));
            set(0x7F, start_irq2());

            // 0x80..0x8F
            set(0x81, store_memory("sta (zp,x)", Mode::IndirectX, D2::R0_TO_DB));
            set(0x84, store_memory("sty zp", Mode::ZeroPage, D2::R2_TO_DB));
            set(0x85, store_memory("sta zp", Mode::ZeroPage, D2::R0_TO_DB));
            set(0x86, store_memory("stx zp", Mode::ZeroPage, D2::R1_TO_DB));
            set(0x88, step_register("dey", D2::R2_TO_DB, AluOp::Dec, D4::DB_TO_R2));
            set(0x8A, transfer("txa", D2::R1_TO_DB, D4::DB_TO_R0));
            set(0x8C, store_memory("sty abs", Mode::Absolute, D2::R2_TO_DB));
            set(0x8D, store_memory("sta abs", Mode::Absolute, D2::R0_TO_DB));
            set(0x8E, store_memory("stx abs", Mode::Absolute, D2::R1_TO_DB));

            // 0x90..0x9F
            set(0x90, branch("bcc rel", &c, true));
            set(0x91, store_memory("sta (zp),y", Mode::IndirectY, D2::R0_TO_DB));
            set(0x94, store_memory("sty zp,x", Mode::ZeroPageX, D2::R2_TO_DB));
            set(0x95, store_memory("sta zp,x", Mode::ZeroPageX, D2::R0_TO_DB));
            set(0x96, store_memory("stx zp,y", Mode::ZeroPageY, D2::R1_TO_DB));
            set(0x98, transfer("tya", D2::R2_TO_DB, D4::DB_TO_R0));
            set(0x99, store_memory("sta abs,y", Mode::AbsoluteY, D2::R0_TO_DB));
            set(0x9A, transfer("txs", D2::R1_TO_DB, D4::DB_TO_R3));
            set(0x9D, store_memory("sta abs,x", Mode::AbsoluteX, D2::R0_TO_DB));

            // 0xA0..0xAF
            set(0xA0, load_immediate("ldy #imm", D4::DB_TO_R2));
            set(0xA1, load_memory("lda (zp,x)", Mode::IndirectX, D4::DB_TO_R0));
            set(0xA2, load_immediate("ldx #imm", D4::DB_TO_R1));
            set(0xA4, load_memory("ldy zp", Mode::ZeroPage, D4::DB_TO_R2));
            set(0xA5, load_memory("lda zp", Mode::ZeroPage, D4::DB_TO_R0));
            set(0xA6, load_memory("ldx zp", Mode::ZeroPage, D4::DB_TO_R1));
            set(0xA8, transfer("tay", D2::R0_TO_DB, D4::DB_TO_R2));
            set(0xA9, load_immediate("lda #imm", D4::DB_TO_R0));
            set(0xAA, transfer("tax", D2::R0_TO_DB, D4::DB_TO_R1));
            set(0xAC, load_memory("ldy abs", Mode::Absolute, D4::DB_TO_R2));
            set(0xAD, load_memory("lda abs", Mode::Absolute, D4::DB_TO_R0));
            set(0xAE, load_memory("ldx abs", Mode::Absolute, D4::DB_TO_R1));

            // 0xB0..0xBF
            set(0xB0, branch("bcs rel", &c, false));
            set(0xB1, load_memory("lda (zp),y", Mode::IndirectY, D4::DB_TO_R0));
            set(0xB4, load_memory("ldy zp,x", Mode::ZeroPageX, D4::DB_TO_R2));
            set(0xB5, load_memory("lda zp,x", Mode::ZeroPageX, D4::DB_TO_R0));
            set(0xB6, load_memory("ldx zp,y", Mode::ZeroPageY, D4::DB_TO_R1));
            set(0xB8, set_clear_flag("clv", AluOp::Clv));
            set(0xB9, load_memory("lda abs,y", Mode::AbsoluteY, D4::DB_TO_R0));
            set(0xBA, transfer("tsx", D2::R3_TO_DB, D4::DB_TO_R1));
            set(0xBC, load_memory("ldy abs,x", Mode::AbsoluteX, D4::DB_TO_R2));
            set(0xBD, load_memory("lda abs,x", Mode::AbsoluteX, D4::DB_TO_R0));
            set(0xBE, load_memory("ldx abs,y", Mode::AbsoluteY, D4::DB_TO_R1));

            // 0xC0..0xCF
            set(0xC0, compare("cpy #imm", None, D2::R2_TO_DB));
            set(0xC1, compare("cmp (zp,x)", Some(Mode::IndirectX), D2::R0_TO_DB));
            set(0xC4, compare("cpy zp", Some(Mode::ZeroPage), D2::R2_TO_DB));
            set(0xC5, compare("cmp zp", Some(Mode::ZeroPage), D2::R0_TO_DB));
            set(0xC6, step_memory("dec zp", Mode::ZeroPage, AluOp::Dec));
            set(0xC8, step_register("iny", D2::R2_TO_DB, AluOp::Inc, D4::DB_TO_R2));
            set(0xC9, compare("cmp #imm", None, D2::R0_TO_DB));
            set(0xCA, step_register("dex", D2::R1_TO_DB, AluOp::Dec, D4::DB_TO_R1));
            set(0xCC, compare("cpy abs", Some(Mode::Absolute), D2::R2_TO_DB));
            set(0xCD, compare("cmp abs", Some(Mode::Absolute), D2::R0_TO_DB));
            set(0xCE, step_memory("dec abs", Mode::Absolute, AluOp::Dec));

            // 0xD0..0xDF
            set(0xD0, branch("bne rel", &z, true));
            set(0xD1, compare("cmp (zp),y", Some(Mode::IndirectY), D2::R0_TO_DB));
            set(0xD5, compare("cmp zp,x", Some(Mode::ZeroPageX), D2::R0_TO_DB));
            set(0xD6, step_memory("inc zp,x", Mode::ZeroPageX, AluOp::Inc));
            set(0xD8, nop("cld")); // decimal mode is not in the ALU
            set(0xD9, compare("cmp abs,y", Some(Mode::AbsoluteY), D2::R0_TO_DB));
            set(0xDD, compare("cmp abs,x", Some(Mode::AbsoluteX), D2::R0_TO_DB));
            set(0xDE, step_memory("dec abs,x", Mode::AbsoluteX, AluOp::Dec));

            // 0xE0..0xEF
            set(0xE0, compare("cpx #imm", None, D2::R1_TO_DB));
            set(0xE1, accumulator_alu("sbc (zp,x)", Some(Mode::IndirectX), AluOp::Sub));
            set(0xE4, compare("cpx zp", Some(Mode::ZeroPage), D2::R1_TO_DB));
            set(0xE5, accumulator_alu("sbc zp", Some(Mode::ZeroPage), AluOp::Sub));
            set(0xE6, step_memory("inc zp", Mode::ZeroPage, AluOp::Inc));
            set(0xE8, step_register("inx", D2::R1_TO_DB, AluOp::Inc, D4::DB_TO_R1));
            set(0xE9, accumulator_alu("sbc #imm", None, AluOp::Sub));
            set(0xEA, nop("nop"));
            set(0xEC, compare("cpx abs", Some(Mode::Absolute), D2::R1_TO_DB));
            set(0xED, accumulator_alu("sbc abs", Some(Mode::Absolute), AluOp::Sub));
            set(0xEE, step_memory("inc abs", Mode::Absolute, AluOp::Inc));

            // 0xF0..0xFF
            set(0xF0, branch("beq rel", &z, false));
            set(0xF1, accumulator_alu("sbc (zp),y", Some(Mode::IndirectY), AluOp::Sub));
            set(0xF5, accumulator_alu("sbc zp,x", Some(Mode::ZeroPageX), AluOp::Sub));
            set(0xF6, step_memory("inc zp,x", Mode::ZeroPageX, AluOp::Inc));
            set(0xF8, nop("sed")); // decimal mode is not in the ALU
            set(0xF9, accumulator_alu("sbc abs,y", Some(Mode::AbsoluteY), AluOp::Sub));
            set(0xFC, start_irq());
            set(0xFD, accumulator_alu("sbc abs,x", Some(Mode::AbsoluteX), AluOp::Sub));
            set(0xFE, step_memory("inc abs,x", Mode::AbsoluteX, AluOp::Inc));
            set(0xFF, boot());
        }

        // The branch-flop-set tracks of the eight conditional branches.
        let mut branch_set = BTreeMap::new();
        branch_set.insert(0x10, branch("bpl rel", &n, false));
        branch_set.insert(0x30, branch("bmi rel", &n, true));
        branch_set.insert(0x50, branch("bvc rel", &v, false));
        branch_set.insert(0x70, branch("bvs rel", &v, true));
        branch_set.insert(0x90, branch("bcc rel", &c, false));
        branch_set.insert(0xB0, branch("bcs rel", &c, true));
        branch_set.insert(0xD0, branch("bne rel", &z, false));
        branch_set.insert(0xF0, branch("beq rel", &z, true));

        DispatchTable {
            base,
            branch_set,
            illegal: illegal(),
        }
    }

    /// The builder emitted for an opcode byte: the branch-flop override
    /// where one exists, else the base entry, else the illegal-op trap.
    pub fn entry(&self, byte: u8) -> &OpCode {
        self.branch_set
            .get(&byte)
            .or_else(|| self.base[byte as usize].as_ref())
            .unwrap_or(&self.illegal)
    }

    pub fn branch_override(&self, byte: u8) -> Option<&OpCode> {
        self.branch_set.get(&byte)
    }

    /// A copy with every builder retargeted for the pending-IRQ ROM
    /// half. Builders that never latch the IRQ state come through
    /// unchanged.
    pub fn irq_variants(&self) -> DispatchTable {
        let mut table = self.clone();
        for builder in table.base.iter_mut().flatten() {
            builder.find_irq_latch_and_replace();
        }
        for builder in table.branch_set.values_mut() {
            builder.find_irq_latch_and_replace();
        }
        table.illegal.find_irq_latch_and_replace();
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_TICKS;

    #[test]
    fn every_entry_ends_with_the_only_cycle_reset() {
        for table in &[DISPATCH.clone(), DISPATCH.irq_variants()] {
            for byte in 0..=255u8 {
                let op = table.entry(byte);
                assert!(op.len() <= MAX_TICKS, "{} too long", op.name());
                let last = op.len() - 1;
                for (i, tick) in op.ticks().iter().enumerate() {
                    assert_eq!(
                        i == last,
                        tick.d1.contains(D1::CYCLE_RESET),
                        "{} tick {}",
                        op.name(),
                        i
                    );
                }
            }
        }
    }

    #[test]
    fn absent_entries_trap_on_the_breakpoint_line() {
        let op = DISPATCH.entry(0x02);
        assert_eq!("illegal", op.name());
        assert!(op.ticks()[0].d5.contains(D5::ILLEGAL_OP));
    }

    #[test]
    fn the_eight_conditional_branches_have_overrides() {
        let branches = [0x10, 0x30, 0x50, 0x70, 0x90, 0xB0, 0xD0, 0xF0];
        for byte in 0..=255u8 {
            assert_eq!(
                branches.contains(&byte),
                DISPATCH.branch_override(byte).is_some(),
                "{:02x}",
                byte
            );
        }
    }

    #[test]
    fn branch_tracks_disagree_about_taking_the_branch() {
        for byte in [0x10u8, 0x30, 0x50, 0x70, 0x90, 0xB0, 0xD0, 0xF0].iter() {
            let base = DISPATCH.base[*byte as usize].as_ref().unwrap();
            let flop_set = DISPATCH.branch_override(*byte).unwrap();
            assert_ne!(base.len(), flop_set.len(), "{:02x}", byte);
        }
    }

    #[test]
    fn irq_half_shares_the_prefix_with_the_normal_half() {
        let irq = DISPATCH.irq_variants();
        for byte in 0..=255u8 {
            let normal = DISPATCH.entry(byte);
            let rewritten = irq.entry(byte);
            match normal
                .ticks()
                .iter()
                .position(|t| t.d5.contains(D5::IRQ_STATE_LATCH))
            {
                Some(latch) => {
                    assert_eq!(
                        &normal.ticks()[..=latch],
                        &rewritten.ticks()[..=latch],
                        "{}",
                        normal.name()
                    );
                    assert!(rewritten.ticks()[latch + 1..]
                        .iter()
                        .any(|t| t.d1.contains(D1::OPCODE_LOAD)));
                }
                None => assert_eq!(normal.ticks(), rewritten.ticks(), "{}", normal.name()),
            }
        }
    }

    #[test]
    fn pseudo_opcodes_sit_at_their_reserved_bytes() {
        assert_eq!("irq vector", DISPATCH.entry(0x7F).name());
        assert_eq!("irq entry", DISPATCH.entry(0xFC).name());
        assert_eq!("boot", DISPATCH.entry(0xFF).name());
        // The IRQ entry chain must itself never take the IRQ check.
        let irq = DISPATCH.irq_variants();
        assert_eq!(DISPATCH.entry(0x7F).ticks(), irq.entry(0x7F).ticks());
        assert_eq!(DISPATCH.entry(0xFC).ticks(), irq.entry(0xFC).ticks());
    }
}
