// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {
    clap::{Parser, Subcommand},
    image::Image,
    link::Link,
    sign::Signer,
    std::path::PathBuf,
    tokio_serial::SerialPortBuilderExt,
};

pub use error::Error;

mod error;
mod image;
mod link;
mod sign;

#[cfg(test)]
mod tests;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long)]
    list_ports: bool,
    #[arg(short, long, default_value_t = String::from("/dev/ttyUSB0"))]
    port: String,
    #[arg(short, long, default_value_t = host_protocol::BAUD_RATE)]
    baudrate: u32,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign an Intel HEX image and program it through the bootloader.
    /// Reset the device once the start sequence is being sent.
    #[command(verbatim_doc_comment)]
    Flash {
        /// Application image
        #[arg(long)]
        hex: PathBuf,
        /// secp256k1 signing key, SEC1 PEM
        #[arg(long)]
        key: PathBuf,
        /// Start sequences to send before giving up
        #[arg(long, default_value_t = 20)]
        attempts: usize,
    },

    /// Print size and SHA-256 of an Intel HEX image
    Digest {
        #[arg(long)]
        hex: PathBuf,
    },

    /// Print the compressed public key of a signing key
    Pubkey {
        #[arg(long)]
        key: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    let args = Args::parse();

    if args.list_ports {
        let ports = tokio_serial::available_ports()?;
        println!("List of available serial ports:");
        for port in ports {
            println!("- {}", port.port_name);
        }
        return Ok(());
    }

    match args.command {
        Some(Command::Flash {
            hex: hex_path,
            key,
            attempts,
        }) => {
            let image = Image::from_hex_file(&hex_path)?;
            let signer = Signer::from_pem_file(&key)?;
            let digest = image.digest();
            let signature = signer.sign(digest);
            println!("Image: {} bytes, sha256 {}", image.len(), hex::encode(digest));

            let port = tokio_serial::new(&args.port, args.baudrate).open_native_async()?;
            let mut link = Link::new(port);
            link.handshake(attempts).await?;
            println!("MCU ready");
            link.flash(&image, &signature).await?;
            println!("Flashing done");
        }
        Some(Command::Digest { hex: hex_path }) => {
            let image = Image::from_hex_file(&hex_path)?;
            println!("size:   {} ({:#x})", image.len(), image.len());
            println!("sha256: {}", hex::encode(image.digest()));
        }
        Some(Command::Pubkey { key }) => {
            let pubkey = Signer::from_pem_file(&key)?.pubkey();
            println!("{}", hex::encode(pubkey));
            println!("{}", pubkey_literal(&pubkey));
        }
        None => {}
    }
    Ok(())
}

/// Rust array literal of `pubkey`, ready to paste as `SIGNING_PUBKEY`.
fn pubkey_literal(pubkey: &[u8; 33]) -> String {
    let bytes: Vec<String> = pubkey.iter().map(|b| format!("{b:#04X}").replace("0X", "0x")).collect();
    format!("[{}]", bytes.join(", "))
}
