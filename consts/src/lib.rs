// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Build-time memory layout and timing shared by the bootloader and the host tools.

#![no_std]

/// Total size of program memory in bytes.
pub const FLASH_SIZE: u32 = 0x8000;

/// Smallest unit that can be erased, and the size of the hardware write latch.
pub const ERASE_BLOCK_SIZE: u32 = 64;

/// Value read back from an erased byte.
pub const ERASED_BYTE: u8 = 0xFF;

/// Start of the bootloader code.
/// Everything below this address is owned by the application image and its
/// signature record, and is erased before every update.
pub const BTLD_OFFSET: u32 = 0x6000;

/// Width of the big-endian image size field.
pub const IMAGE_SIZE_LEN: usize = 3;

/// Location of the image size field, right below the bootloader.
pub const CODE_SIZE_OFFSET: u32 = BTLD_OFFSET - IMAGE_SIZE_LEN as u32;

/// Width of a compact `r || s` secp256k1 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Location of the image signature, right below the size field.
/// The application image must end below this address.
pub const SIGNAT_OFFSET: u32 = CODE_SIZE_OFFSET - SIGNATURE_LEN as u32;

/// Number of bytes at address 0 that jump into the bootloader.
pub const RESET_VECTOR_LEN: usize = 4;

/// Backup copy of the reset vector, staged at the start of block 1 while
/// block 0 is being erased.
pub const RESET_VECTOR_BACKUP: u32 = ERASE_BLOCK_SIZE;

/// Where the application's own entry instruction lives once programmed.
/// The first word of the image is relocated here because address 0 keeps
/// jumping into the bootloader.
pub const APP_ENTRY: u32 = 4;

/// Time a single handshake poll waits for a byte, in microseconds.
pub const HANDSHAKE_POLL_INTERVAL_US: u64 = 1_000;

/// Number of polls before the handshake window closes (about 1.2 s).
pub const HANDSHAKE_POLLS: u32 = 1_200;

/// Size of the receive buffer for one unescaped frame.
/// A 64-byte data chunk frame stores `@`, opcode, size, 3 address bytes and
/// the data, which is 70 bytes.
pub const FRAME_BUFFER_SIZE: usize = 72;

/// Compressed secp256k1 public key of the release signer.
pub const SIGNING_PUBKEY: [u8; 33] = [
    0x02, 0xBD, 0xBD, 0x77, 0x2F, 0xDE, 0x40, 0x99, 0xA7, 0xB1, 0xE8, 0x14, 0xD3, 0xF5, 0xB7, 0xFE, 0x13, 0xD4, 0x2B, 0x82,
    0x65, 0x22, 0x22, 0x8F, 0x42, 0xC4, 0x8D, 0xC1, 0xD3, 0xAC, 0x78, 0x35, 0x81,
];

const _: () = assert!(BTLD_OFFSET % ERASE_BLOCK_SIZE == 0);
const _: () = assert!(BTLD_OFFSET <= FLASH_SIZE);
const _: () = assert!(SIGNAT_OFFSET > 2 * ERASE_BLOCK_SIZE);
