// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundation.xyz>
// SPDX-License-Identifier: GPL-3.0-or-later

use clap::{Parser, Subcommand};
use consts::{BTLD_OFFSET, RESET_VECTOR_LEN};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::exit;
use std::{env, fs};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// PIC18 `GOTO k`: `1110 1111 k7..k0`, `1111 k19..k8`.
const GOTO_OPCODE_LO: u8 = 0xEF;
const GOTO_OPCODE_HI: u8 = 0xF0;

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct XtaskArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add the reset vector to a bootloader hex file:
    /// a GOTO to the bootloader placed at address 0
    #[command(verbatim_doc_comment)]
    PatchBootloader {
        /// Bootloader hex file as linked
        #[arg(short, long)]
        input: PathBuf,
        /// Patched hex file
        #[arg(short, long, default_value = "bootloader_patched.hex")]
        output: PathBuf,
    },
}

/// Instruction word placed at address 0, in memory order.
fn goto_bootloader() -> [u8; RESET_VECTOR_LEN] {
    // GOTO takes a word address
    let target = BTLD_OFFSET >> 1;
    [
        (target & 0xFF) as u8,
        GOTO_OPCODE_LO,
        ((target >> 8) & 0xFF) as u8,
        GOTO_OPCODE_HI | ((target >> 16) & 0x0F) as u8,
    ]
}

fn patch_records(hex: &str) -> Result<Vec<ihex::Record>, ihex::ReaderError> {
    let mut records = vec![ihex::Record::Data {
        offset: 0,
        value: goto_bootloader().to_vec(),
    }];

    let mut upper_address = 0u32;
    for record in ihex::Reader::new(hex) {
        let record = record?;
        match &record {
            ihex::Record::ExtendedLinearAddress(addr) => upper_address = u32::from(*addr) << 16,
            ihex::Record::ExtendedSegmentAddress(addr) => upper_address = u32::from(*addr) << 4,
            ihex::Record::Data { offset, .. } if upper_address == 0 && usize::from(*offset) < RESET_VECTOR_LEN => {
                tracing::warn!("input already has data at {:#x}, it will be overwritten", offset);
            }
            _ => {}
        }
        records.push(record);
    }
    Ok(records)
}

fn patch_bootloader(input: PathBuf, output: PathBuf) {
    let mut data = String::new();
    let mut file = fs::File::open(&input).expect("unable to open input file");
    file.read_to_string(&mut data).expect("unable to read the whole file");

    let records = match patch_records(&data) {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("error while parsing {}: {e}", input.display());
            exit(-1)
        }
    };
    tracing::info!("Reset vector {:02X?} jumps to {:#x}", goto_bootloader(), BTLD_OFFSET);

    let data = ihex::create_object_file_representation(&records).expect("error while create ihex object");

    let mut file = fs::File::create(&output).expect("unable to create output file");
    file.write_all(data.as_bytes()).expect("unable to write ihex object to file");
    tracing::info!("Patched bootloader written to {}", output.display());
}

fn main() {
    // Adding some info tracing just for logging activity
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", "info");
    }

    // Tracing using RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let args = XtaskArgs::parse();

    match args.command {
        Commands::PatchBootloader { input, output } => patch_bootloader(input, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goto_targets_bootloader() {
        assert_eq!(goto_bootloader(), [0x00, 0xEF, 0x30, 0xF0]);
    }

    #[test]
    fn vector_record_comes_first() {
        let input = ihex::create_object_file_representation(&[
            ihex::Record::Data {
                offset: 0x6000,
                value: vec![0x12, 0x34],
            },
            ihex::Record::EndOfFile,
        ])
        .unwrap();
        let patched = ihex::create_object_file_representation(&patch_records(&input).unwrap()).unwrap();

        let records: Vec<ihex::Record> = ihex::Reader::new(&patched).map(Result::unwrap).collect();
        assert_eq!(
            records,
            [
                ihex::Record::Data {
                    offset: 0,
                    value: vec![0x00, 0xEF, 0x30, 0xF0],
                },
                ihex::Record::Data {
                    offset: 0x6000,
                    value: vec![0x12, 0x34],
                },
                ihex::Record::EndOfFile,
            ]
        );
        assert!(patched.to_uppercase().starts_with(":0400000000EF30F0ED"));
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(patch_records(":zz").is_err());
    }
}
