//! Batch driver: builds the dispatch table, then emits the five decoder
//! ROM images and the two ALU slice images next to the project
//! directory. No flags; failures in the microcode description abort
//! with a diagnostic, I/O failures map to a non-zero exit.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::process;

use log::info;

use ucode::{DispatchTable, DISPATCH};

const DECODERS: usize = 5;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}

fn run() -> io::Result<()> {
    // Building the table validates every opcode before any file is
    // touched.
    let table = &*DISPATCH;
    let irq_table = write_decoder_roms(table)?;
    write_alu_roms()?;
    log_lengths(table, &irq_table);
    Ok(())
}

fn decoder_path(decoder: usize) -> String {
    format!("../DecoderROM{}.bin", decoder + 1)
}

/// Writes the normal halves of all five decoder files, then appends the
/// pending-IRQ halves. The rewrite works on a copy of the table, after
/// the normal halves are already on disk.
fn write_decoder_roms(table: &DispatchTable) -> io::Result<DispatchTable> {
    for decoder in 0..DECODERS {
        let path = decoder_path(decoder);
        let mut out = BufWriter::new(File::create(&path)?);
        for byte in 0..=255u8 {
            table.entry(byte).write(decoder, &mut out)?;
        }
        out.flush()?;
        info!("{}: normal half written", path);
    }

    let irq_table = table.irq_variants();
    for decoder in 0..DECODERS {
        let path = decoder_path(decoder);
        let mut out = BufWriter::new(OpenOptions::new().append(true).open(&path)?);
        for byte in 0..=255u8 {
            irq_table.entry(byte).write(decoder, &mut out)?;
        }
        out.flush()?;
        info!("{}: IRQ half appended", path);
    }

    Ok(irq_table)
}

fn write_alu_roms() -> io::Result<()> {
    let mut out = BufWriter::new(File::create("../ALU1.bin")?);
    out.write_all(&alu::ALU1)?;
    out.flush()?;
    info!("../ALU1.bin written");

    let mut out = BufWriter::new(File::create("../ALU2.bin")?);
    out.write_all(&alu::ALU2)?;
    out.flush()?;
    info!("../ALU2.bin written");

    Ok(())
}

/// Tick counts per opcode, eight to a row, worst variant of each slot.
fn log_lengths(table: &DispatchTable, irq_table: &DispatchTable) {
    for row in (0..256usize).step_by(8) {
        let lengths: Vec<String> = (row..row + 8)
            .map(|byte| {
                let byte = byte as u8;
                let length = table
                    .entry(byte)
                    .len()
                    .max(irq_table.entry(byte).len());
                format!("{:2}", length)
            })
            .collect();
        info!("opcode {:02x} : {}", row, lengths.join(" "));
    }
}
