//! Microcode assembler for the discrete-logic CPU's five decoder ROMs.
//!
//! An opcode is a sequence of [`Tick`]s, one control word per decoder
//! per tick. [`OpCode`] grows such a sequence, running every appended
//! tick through the hardware design rules; the `dsl` module layers the
//! reusable fragments (addressing modes, memory transfers, branch logic)
//! on top, and `table` assembles the full 256-entry dispatch table from
//! them.

extern crate strum;
#[macro_use]
extern crate strum_macros;

use std::io::{self, Write};

use common::*;

/// Hard ceiling on the tick counter; the 64th row of every ROM slot is
/// the zero terminator.
pub const MAX_TICKS: usize = 63;

/// Bytes one opcode occupies in one decoder ROM.
pub const SLOT_BYTES: usize = 64;

/// Tick index past which `FetchExec` drops the IRQ check to stay inside
/// the slot.
pub const IRQ_CHECK_LIMIT: usize = 50;

/// Control-line state for one clock edge: one word per decoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Tick {
    pub d1: D1,
    pub d2: D2,
    pub d3: D3,
    pub d4: D4,
    pub d5: D5,
}

impl Tick {
    /// The raw ROM byte for one decoder, 0-based.
    pub fn word(&self, decoder: usize) -> u8 {
        match decoder {
            0 => self.d1.bits(),
            1 => self.d2.bits(),
            2 => self.d3.bits(),
            3 => self.d4.bits(),
            4 => self.d5.bits(),
            _ => panic!("no decoder {}", decoder),
        }
    }
}

/// Sparse [`Tick`] literal; unnamed decoder words stay zero.
///
/// ```
/// use common::*;
/// let t = ucode::tick!(d1: D1::PC_INC);
/// assert_eq!(1, t.word(0));
/// ```
#[macro_export]
macro_rules! tick {
    ($($decoder:ident : $word:expr),* $(,)?) => {
        $crate::Tick {
            $($decoder: $word,)*
            ..$crate::Tick::default()
        }
    };
}

pub mod rules;

use rules::RuleSet;

mod dsl;
mod table;

pub use table::{DispatchTable, DISPATCH};

/// A growing, validated microcode sequence for one opcode.
#[derive(Clone, Debug)]
pub struct OpCode {
    name: &'static str,
    ticks: Vec<Tick>,
    rules: RuleSet,
    got_reset: bool,
}

impl OpCode {
    pub fn named(name: &'static str) -> OpCode {
        OpCode::with_rules(name, RuleSet::Baseline)
    }

    pub fn with_rules(name: &'static str, rules: RuleSet) -> OpCode {
        OpCode {
            name,
            ticks: Vec::new(),
            rules,
            got_reset: false,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn ticks(&self) -> &[Tick] {
        &self.ticks
    }

    /// Appends one tick, enforcing the design rules. Any violation is a
    /// bug in the microcode description, so it aborts the build.
    pub fn add(&mut self, tick: Tick) {
        assert!(
            !self.got_reset,
            "{}: tick appended after the cycle-reset tick",
            self.name
        );

        self.ticks.push(tick);
        if tick.d1.contains(D1::CYCLE_RESET) {
            self.got_reset = true;
        }

        if let Err(violation) = rules::check_last(&self.ticks, self.rules) {
            panic!(
                "{}: {} at tick {}",
                self.name,
                violation,
                self.ticks.len() - 1
            );
        }

        assert!(
            self.ticks.len() <= MAX_TICKS,
            "{}: opcode does not fit in {} ticks",
            self.name,
            MAX_TICKS
        );
    }

    /// Replays every tick of `fragment` through [`OpCode::add`].
    pub fn append(&mut self, fragment: &OpCode) {
        for tick in &fragment.ticks {
            self.add(*tick);
        }
    }

    /// Emits this opcode's column for one decoder: exactly
    /// [`SLOT_BYTES`] bytes, zero-padded past the last tick.
    pub fn write<W: Write>(&self, decoder: usize, out: &mut W) -> io::Result<()> {
        let mut slot = [0u8; SLOT_BYTES];
        for (i, tick) in self.ticks.iter().enumerate() {
            slot[i] = tick.word(decoder);
        }
        out.write_all(&slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_only_opcode_writes_reset_then_zeros() {
        let mut op = OpCode::named("reset only");
        op.add(tick!(d1: D1::CYCLE_RESET));

        let mut slot = Vec::new();
        op.write(0, &mut slot).unwrap();

        assert_eq!(SLOT_BYTES, slot.len());
        assert_eq!(0x80, slot[0]);
        assert!(slot[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn empty_slot_is_all_zeros_on_every_decoder() {
        let op = OpCode::named("empty");
        for decoder in 0..5 {
            let mut slot = Vec::new();
            op.write(decoder, &mut slot).unwrap();
            assert_eq!(vec![0u8; SLOT_BYTES], slot);
        }
    }

    #[test]
    #[should_panic(expected = "opcode fetch on tick 0")]
    fn opcode_fetch_on_first_tick_is_rejected() {
        let mut op = OpCode::named("bad fetch");
        op.add(tick!(d1: D1::OPCODE_LOAD));
    }

    #[test]
    #[should_panic(expected = "after the cycle-reset tick")]
    fn no_ticks_after_cycle_reset() {
        let mut op = OpCode::named("tail after reset");
        op.add(tick!(d1: D1::CYCLE_RESET));
        op.add(tick!());
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn capacity_stops_at_sixty_three_ticks() {
        let mut op = OpCode::named("too long");
        for _ in 0..=MAX_TICKS {
            op.add(tick!());
        }
    }

    #[test]
    fn append_matches_tick_by_tick_replay() {
        let mut fragment = OpCode::named("fragment");
        fragment.add(tick!(d1: D1::PC_INC));
        fragment.add(tick!(d2: D2::ST_TO_DB));
        fragment.add(tick!(d2: D2::ST_TO_DB, d3: D3::ALU_IN3_LOAD));

        let mut head = OpCode::named("head");
        head.add(tick!());

        let mut appended = head.clone();
        appended.append(&fragment);

        let mut replayed = head;
        for tick in fragment.ticks() {
            replayed.add(*tick);
        }

        assert_eq!(replayed.ticks(), appended.ticks());
    }
}
