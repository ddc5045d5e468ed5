//! Hardware design rules, checked on the most recently appended tick.
//!
//! The rules encode setup/hold times of the board: the data bus must be
//! stable one tick before any latch load, the ALU op select must be
//! stable before its result or the branch flop is latched, and memory
//! reads and writes may not contend on consecutive ticks.

use common::*;

use crate::Tick;

/// Which rule family to enforce.
///
/// `Strict` adds the 4 MHz timing clauses: register loads get the same
/// bus-stability treatment as the other latches, and the ALU op select
/// must be stable for two ticks before a result or branch latch with no
/// input load in between. Several long opcodes (the indexed-indirect
/// compares in particular) do not fit in 63 ticks under `Strict`, so
/// `Baseline` is the shipping configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuleSet {
    Baseline,
    Strict,
}

/// One violated design rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum Violation {
    #[strum(serialize = "opcode fetch on tick 0")]
    OpCodeLoadOnFirstTick,
    #[strum(serialize = "IRQ latch on tick 0")]
    IrqLatchOnFirstTick,
    #[strum(serialize = "register load on tick 0")]
    RegisterLoadOnFirstTick,
    #[strum(serialize = "register load repeated on consecutive ticks")]
    RepeatedRegisterLoad,
    #[strum(serialize = "data bus not stable before a register load")]
    BusUnstableForRegisterLoad,
    #[strum(serialize = "ALU input load on tick 0")]
    AluInputLoadOnFirstTick,
    #[strum(serialize = "ALU input load repeated on consecutive ticks")]
    RepeatedAluInputLoad,
    #[strum(serialize = "data bus not stable before an ALU input load")]
    BusUnstableForAluInputLoad,
    #[strum(serialize = "address latch load on tick 0")]
    AddressLoadOnFirstTick,
    #[strum(serialize = "address latch load repeated on consecutive ticks")]
    RepeatedAddressLoad,
    #[strum(serialize = "data bus not stable before an address latch load")]
    BusUnstableForAddressLoad,
    #[strum(serialize = "branch flop latched before tick 3")]
    EarlyBranchLoad,
    #[strum(serialize = "ALU result latched before tick 3")]
    EarlyAluResultLoad,
    #[strum(serialize = "ALU op not stable before the branch flop latch")]
    AluOpUnstableForBranchLoad,
    #[strum(serialize = "ALU result latch repeated on consecutive ticks")]
    RepeatedAluResultLoad,
    #[strum(serialize = "ALU op not stable before the result latch")]
    AluOpUnstableForResultLoad,
    #[strum(serialize = "ALU input load while latching the ALU result")]
    AluInputLoadDuringResultLoad,
    #[strum(serialize = "ALU input load one tick before the result latch")]
    AluInputLoadBeforeResultLoad,
    #[strum(serialize = "opcode fetch repeated on consecutive ticks")]
    RepeatedOpCodeFetch,
    #[strum(serialize = "data bus not stable after an opcode fetch")]
    BusUnstableAfterOpCodeFetch,
    #[strum(serialize = "memory read in the tick after a RAM write")]
    ReadAfterWriteContention,
    #[strum(serialize = "RAM write in the tick after a memory read")]
    WriteAfterReadContention,
    #[strum(serialize = "address bus not stable for a memory access")]
    AddressUnstableForMemoryAccess,
    #[strum(serialize = "address bus not stable after a RAM write")]
    AddressUnstableAfterWrite,
    #[strum(serialize = "PC load while the PC drives the address bus")]
    PcLoadWhilePcOnAddressBus,
    #[strum(serialize = "IRQ latch without status on the data bus")]
    IrqLatchWithoutStatusOnBus,
}

/// Checks the last tick of `ticks` against its predecessors.
///
/// An empty slice is valid; so is any prefix of a sequence this has
/// accepted tick by tick.
pub fn check_last(ticks: &[Tick], rules: RuleSet) -> Result<(), Violation> {
    let pos = match ticks.len().checked_sub(1) {
        Some(pos) => pos,
        None => return Ok(()),
    };
    let strict = rules == RuleSet::Strict;
    let cur = &ticks[pos];

    // Boot constraints: the opcode latch holds the reset opcode and the
    // IRQ comparator has nothing valid to look at on tick 0.
    if ticks[0].d1.contains(D1::OPCODE_LOAD) {
        return Err(Violation::OpCodeLoadOnFirstTick);
    }
    if ticks[0].d5.contains(D5::IRQ_STATE_LATCH) {
        return Err(Violation::IrqLatchOnFirstTick);
    }

    if strict && !cur.d4.is_empty() {
        if pos == 0 {
            return Err(Violation::RegisterLoadOnFirstTick);
        }
        let prev = &ticks[pos - 1];
        if cur.d4.intersects(prev.d4) {
            return Err(Violation::RepeatedRegisterLoad);
        }
        if cur.d2.source() != prev.d2.source() {
            return Err(Violation::BusUnstableForRegisterLoad);
        }
    }

    if cur.d3.intersects(D3::ALU_IN_LOADS) {
        if pos == 0 {
            return Err(Violation::AluInputLoadOnFirstTick);
        }
        let prev = &ticks[pos - 1];
        // A repeated load is useless and flags a typo.
        if (cur.d3 & D3::ALU_IN_LOADS).intersects(prev.d3 & D3::ALU_IN_LOADS) {
            return Err(Violation::RepeatedAluInputLoad);
        }
        if cur.d2.source() != prev.d2.source() {
            return Err(Violation::BusUnstableForAluInputLoad);
        }
    }

    if cur.d1.intersects(D1::ADDR_LOADS) {
        if pos == 0 {
            return Err(Violation::AddressLoadOnFirstTick);
        }
        let prev = &ticks[pos - 1];
        if (cur.d1 & D1::ADDR_LOADS).intersects(prev.d1 & D1::ADDR_LOADS) {
            return Err(Violation::RepeatedAddressLoad);
        }
        if cur.d2.source() != prev.d2.source() {
            return Err(Violation::BusUnstableForAddressLoad);
        }
    }

    if ticks.len() == 1 {
        return Ok(());
    }
    let prev = &ticks[pos - 1];

    if pos <= 2 {
        // The ALU pipeline cannot produce anything meaningful yet.
        if ticks[0].d2.contains(D2::DO_BRANCH_LOAD) {
            return Err(Violation::EarlyBranchLoad);
        }
        if ticks[0].d3.contains(D3::ALU_RES_LOAD) {
            return Err(Violation::EarlyAluResultLoad);
        }
    } else {
        if cur.d2.contains(D2::DO_BRANCH_LOAD) {
            if cur.d3.op_field() != prev.d3.op_field() {
                return Err(Violation::AluOpUnstableForBranchLoad);
            }
            if strict && prev.d3.op_field() != ticks[pos - 2].d3.op_field() {
                return Err(Violation::AluOpUnstableForBranchLoad);
            }
        }

        if cur.d3.contains(D3::ALU_RES_LOAD) {
            if prev.d3.contains(D3::ALU_RES_LOAD) {
                return Err(Violation::RepeatedAluResultLoad);
            }
            if cur.d3.op_field() != prev.d3.op_field() {
                return Err(Violation::AluOpUnstableForResultLoad);
            }
            if strict && prev.d3.op_field() != ticks[pos - 2].d3.op_field() {
                return Err(Violation::AluOpUnstableForResultLoad);
            }
            if cur.d3.intersects(D3::ALU_IN_LOADS) {
                return Err(Violation::AluInputLoadDuringResultLoad);
            }
            if strict && prev.d3.intersects(D3::ALU_IN_LOADS) {
                return Err(Violation::AluInputLoadBeforeResultLoad);
            }
        }
    }

    if prev.d1.contains(D1::OPCODE_LOAD) {
        if cur.d1.contains(D1::OPCODE_LOAD) {
            return Err(Violation::RepeatedOpCodeFetch);
        }
        if cur.d2.source() != prev.d2.source() {
            return Err(Violation::BusUnstableAfterOpCodeFetch);
        }
    }

    if cur.d2.contains(D2::MEMORY_TO_DB) && prev.d1.contains(D1::RAM_WRITE) {
        return Err(Violation::ReadAfterWriteContention);
    }
    if cur.d1.contains(D1::RAM_WRITE) && prev.d2.source() == D2::MEMORY_TO_DB {
        return Err(Violation::WriteAfterReadContention);
    }

    if cur.d2.contains(D2::MEMORY_TO_DB) || cur.d1.contains(D1::RAM_WRITE) {
        if (cur.d1 & D1::PC_TO_ADDRESS) != (prev.d1 & D1::PC_TO_ADDRESS) {
            return Err(Violation::AddressUnstableForMemoryAccess);
        }
    }
    if prev.d1.contains(D1::RAM_WRITE) {
        if (cur.d1 & D1::PC_TO_ADDRESS) != (prev.d1 & D1::PC_TO_ADDRESS) {
            return Err(Violation::AddressUnstableAfterWrite);
        }
    }

    if cur.d1.contains(D1::PC_TO_ADDRESS)
        && (cur.d1.contains(D1::PC_LOAD) || prev.d1.contains(D1::PC_LOAD))
    {
        return Err(Violation::PcLoadWhilePcOnAddressBus);
    }

    if cur.d5.contains(D5::IRQ_STATE_LATCH) {
        if !cur.d2.contains(D2::ST_TO_DB) || !prev.d2.contains(D2::ST_TO_DB) {
            return Err(Violation::IrqLatchWithoutStatusOnBus);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_sequences_pass() {
        assert_eq!(Ok(()), check_last(&[], RuleSet::Baseline));
        assert_eq!(Ok(()), check_last(&[tick!()], RuleSet::Baseline));
        assert_eq!(Ok(()), check_last(&[tick!(), tick!()], RuleSet::Strict));
    }

    #[test]
    fn alu_input_load_needs_a_stable_bus() {
        let ticks = [tick!(d2: D2::R0_TO_DB), tick!(d2: D2::R1_TO_DB, d3: D3::ALU_IN1_LOAD)];
        assert_eq!(
            Err(Violation::BusUnstableForAluInputLoad),
            check_last(&ticks, RuleSet::Baseline)
        );

        let ticks = [tick!(d2: D2::R1_TO_DB), tick!(d2: D2::R1_TO_DB, d3: D3::ALU_IN1_LOAD)];
        assert_eq!(Ok(()), check_last(&ticks, RuleSet::Baseline));
    }

    #[test]
    fn alu_input_load_cannot_repeat() {
        let ticks = [
            tick!(d2: D2::R1_TO_DB, d3: D3::ALU_IN1_LOAD),
            tick!(d2: D2::R1_TO_DB, d3: D3::ALU_IN1_LOAD),
        ];
        assert_eq!(
            Err(Violation::RepeatedAluInputLoad),
            check_last(&ticks, RuleSet::Baseline)
        );
    }

    #[test]
    fn address_load_on_tick_zero_is_rejected() {
        let ticks = [tick!(d1: D1::ADDRL_LOAD, d2: D2::R0_TO_DB)];
        assert_eq!(
            Err(Violation::AddressLoadOnFirstTick),
            check_last(&ticks, RuleSet::Baseline)
        );
    }

    #[test]
    fn early_branch_and_result_loads_are_rejected() {
        let ticks = [tick!(d2: D2::DO_BRANCH_LOAD), tick!()];
        assert_eq!(
            Err(Violation::EarlyBranchLoad),
            check_last(&ticks, RuleSet::Baseline)
        );

        let ticks = [tick!(d3: D3::ALU_RES_LOAD), tick!()];
        assert_eq!(
            Err(Violation::EarlyAluResultLoad),
            check_last(&ticks, RuleSet::Baseline)
        );
    }

    #[test]
    fn result_load_needs_a_stable_op() {
        let ticks = [
            tick!(),
            tick!(d2: D2::ZERO_TO_DB),
            tick!(d2: D2::ZERO_TO_DB, d3: D3::op(AluOp::Add) | D3::ALU_IN1_LOAD),
            tick!(d3: D3::op(AluOp::Xor) | D3::ALU_RES_LOAD),
        ];
        assert_eq!(
            Err(Violation::AluOpUnstableForResultLoad),
            check_last(&ticks, RuleSet::Baseline)
        );
    }

    #[test]
    fn ram_write_after_memory_read_is_contention() {
        let ticks = [
            tick!(),
            tick!(d2: D2::MEMORY_TO_DB),
            tick!(d1: D1::RAM_WRITE, d2: D2::R0_TO_DB),
        ];
        assert_eq!(
            Err(Violation::WriteAfterReadContention),
            check_last(&ticks, RuleSet::Baseline)
        );
    }

    #[test]
    fn irq_latch_requires_status_on_the_bus_twice() {
        let ticks = [tick!(), tick!(d2: D2::ST_TO_DB, d5: D5::IRQ_STATE_LATCH)];
        assert_eq!(
            Err(Violation::IrqLatchWithoutStatusOnBus),
            check_last(&ticks, RuleSet::Baseline)
        );

        let ticks = [
            tick!(d2: D2::ST_TO_DB),
            tick!(d2: D2::ST_TO_DB, d5: D5::IRQ_STATE_LATCH),
        ];
        assert_eq!(Ok(()), check_last(&ticks, RuleSet::Baseline));
    }

    #[test]
    fn strict_rules_cover_register_loads() {
        let ticks = [tick!(d2: D2::R0_TO_DB), tick!(d2: D2::R1_TO_DB, d4: D4::DB_TO_R0)];
        assert_eq!(Ok(()), check_last(&ticks, RuleSet::Baseline));
        assert_eq!(
            Err(Violation::BusUnstableForRegisterLoad),
            check_last(&ticks, RuleSet::Strict)
        );
    }

    #[test]
    fn strict_rules_want_two_ticks_of_op_stability() {
        // One tick of stability: fine at the baseline, too fast at 4 MHz.
        let ticks = [
            tick!(),
            tick!(d2: D2::ZERO_TO_DB),
            tick!(d2: D2::ZERO_TO_DB, d3: D3::ALU_IN1_LOAD | D3::ALU_IN2_LOAD),
            tick!(d3: D3::op(AluOp::Lsl)),
            tick!(d2: D2::DO_BRANCH_LOAD, d3: D3::op(AluOp::Lsl)),
        ];
        assert_eq!(Ok(()), check_last(&ticks, RuleSet::Baseline));
        assert_eq!(
            Err(Violation::AluOpUnstableForBranchLoad),
            check_last(&ticks, RuleSet::Strict)
        );
    }
}
