// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Host to bootloader update protocol.
//! The host drives the session over a byte-oriented serial link, the bootloader
//! answers every frame with a single status byte.
//!
//! A frame is `@`, an opcode byte, the payload and `\n`. Inside a frame `\`
//! makes the following byte literal, so `@`, `\n` and `\` can travel in the
//! payload.

#![no_std]

use consts::{ERASE_BLOCK_SIZE, IMAGE_SIZE_LEN, SIGNATURE_LEN};
use heapless::Vec;


/// Starts a frame, and restarts it when seen unescaped mid-frame.
pub const FRAME_START: u8 = b'@';
/// Ends a frame.
pub const FRAME_END: u8 = b'\n';
/// Makes the next byte literal.
pub const FRAME_ESCAPE: u8 = b'\\';

/// Sent by the host right after reset to enter update mode.
pub const HANDSHAKE_REQUEST: &[u8] = b"@BTL\n";
/// Sent by the bootloader once the application area has been erased.
pub const HANDSHAKE_RESPONSE: &[u8] = b"@OK\n";

/// Serial line speed, 8N1.
pub const BAUD_RATE: u32 = 115_200;

/// Largest data chunk carried by a single `FLASH_DATA` frame.
pub const MAX_CHUNK_LEN: usize = ERASE_BLOCK_SIZE as usize;
/// Size byte plus 24-bit address in front of `FLASH_DATA` data.
pub const FLASH_DATA_HEADER_LEN: usize = 4;
/// Largest payload of any request.
pub const MAX_PAYLOAD_LEN: usize = FLASH_DATA_HEADER_LEN + MAX_CHUNK_LEN;
/// Worst case encoded frame, every opcode and payload byte escaped.
pub const MAX_ENCODED_LEN: usize = 2 + 2 * (1 + MAX_PAYLOAD_LEN);
/// Addresses travel as 24-bit big-endian values.
pub const MAX_ADDRESS: u32 = 0xFF_FFFF;

/// Encoded frame ready to be written to the link.
pub type EncodedFrame = Vec<u8, MAX_ENCODED_LEN>;

/// Host command selector, the first byte after `@`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Opcode {
    /// Store the 3-byte image size.
    ProgramSize = b'M',
    /// Store the 64-byte image signature.
    ProgramSignature = b'N',
    /// Program a chunk of the image.
    FlashData = b'D',
    /// End the session and reset.
    FlashStop = b'X',
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'M' => Some(Self::ProgramSize),
            b'N' => Some(Self::ProgramSignature),
            b'D' => Some(Self::FlashData),
            b'X' => Some(Self::FlashStop),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Single-byte answers from the bootloader.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Response {
    /// Frame executed.
    Ack = b'F',
    /// Malformed or wrong-length frame, the session is over.
    InvalidPayload = b'I',
    /// Frame targeted the signature record or beyond, the session is over.
    DeniedAddress = b'A',
    /// Resident image verified, the application is starting.
    SignatureValid = b'S',
    /// Resident image rejected, the device resets.
    SignatureInvalid = b'K',
}

impl Response {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'F' => Some(Self::Ack),
            b'I' => Some(Self::InvalidPayload),
            b'A' => Some(Self::DeniedAddress),
            b'S' => Some(Self::SignatureValid),
            b'K' => Some(Self::SignatureInvalid),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// The frame does not carry a well-formed request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidPayload;

impl core::fmt::Display for InvalidPayload {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid request payload")
    }
}

/// A decoded host command.
#[derive(Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request<'a> {
    /// Big-endian image size, written verbatim to the size field.
    ProgramSize([u8; IMAGE_SIZE_LEN]),
    /// Compact signature, written verbatim to the signature field.
    ProgramSignature(&'a [u8; SIGNATURE_LEN]),
    /// Image bytes for `addr..addr + data.len()`.
    FlashData { addr: u32, data: &'a [u8] },
    /// Leave the bootloader.
    FlashStop,
}

impl<'a> Request<'a> {
    /// Decode the opcode and payload of a received frame.
    ///
    /// `FLASH_DATA` is laid out as `{size, addr[3], data}`. At least `size`
    /// data bytes must follow the header; anything past `size` is ignored.
    pub fn parse(opcode: u8, payload: &'a [u8]) -> Result<Self, InvalidPayload> {
        match Opcode::from_byte(opcode).ok_or(InvalidPayload)? {
            Opcode::ProgramSize => {
                let size = payload.try_into().map_err(|_| InvalidPayload)?;
                Ok(Self::ProgramSize(size))
            }
            Opcode::ProgramSignature => {
                let signature = payload.try_into().map_err(|_| InvalidPayload)?;
                Ok(Self::ProgramSignature(signature))
            }
            Opcode::FlashData => {
                if payload.len() <= FLASH_DATA_HEADER_LEN {
                    return Err(InvalidPayload);
                }
                let size = usize::from(payload[0]);
                let addr = u24_from_be_bytes([payload[1], payload[2], payload[3]]);
                let data = payload[FLASH_DATA_HEADER_LEN..].get(..size).ok_or(InvalidPayload)?;
                Ok(Self::FlashData { addr, data })
            }
            Opcode::FlashStop => {
                if !payload.is_empty() {
                    return Err(InvalidPayload);
                }
                Ok(Self::FlashStop)
            }
        }
    }

    /// Image size request for an image of `size` bytes.
    pub fn program_size(size: u32) -> Result<Self, InvalidPayload> {
        if size > MAX_ADDRESS {
            return Err(InvalidPayload);
        }
        Ok(Self::ProgramSize(u24_to_be_bytes(size)))
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Self::ProgramSize(_) => Opcode::ProgramSize,
            Self::ProgramSignature(_) => Opcode::ProgramSignature,
            Self::FlashData { .. } => Opcode::FlashData,
            Self::FlashStop => Opcode::FlashStop,
        }
    }

    /// Build the escaped frame for this request.
    pub fn encode(&self) -> Result<EncodedFrame, InvalidPayload> {
        let mut frame = EncodedFrame::new();
        frame.push(FRAME_START).map_err(|_| InvalidPayload)?;
        push_escaped(&mut frame, self.opcode().as_byte())?;
        match self {
            Self::ProgramSize(size) => extend_escaped(&mut frame, size)?,
            Self::ProgramSignature(signature) => extend_escaped(&mut frame, &signature[..])?,
            Self::FlashData { addr, data } => {
                if data.len() > MAX_CHUNK_LEN || *addr > MAX_ADDRESS {
                    return Err(InvalidPayload);
                }
                // MAX_CHUNK_LEN fits in the size byte
                push_escaped(&mut frame, data.len() as u8)?;
                extend_escaped(&mut frame, &u24_to_be_bytes(*addr))?;
                extend_escaped(&mut frame, data)?;
            }
            Self::FlashStop => {}
        }
        frame.push(FRAME_END).map_err(|_| InvalidPayload)?;
        Ok(frame)
    }
}

/// Decode a 24-bit big-endian value.
pub fn u24_from_be_bytes(bytes: [u8; 3]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}

/// Encode the low 24 bits of `value` big-endian.
pub fn u24_to_be_bytes(value: u32) -> [u8; 3] {
    let [_, hi, mid, lo] = value.to_be_bytes();
    [hi, mid, lo]
}

fn push_escaped(frame: &mut EncodedFrame, byte: u8) -> Result<(), InvalidPayload> {
    if matches!(byte, FRAME_START | FRAME_END | FRAME_ESCAPE) {
        frame.push(FRAME_ESCAPE).map_err(|_| InvalidPayload)?;
    }
    frame.push(byte).map_err(|_| InvalidPayload)
}

fn extend_escaped(frame: &mut EncodedFrame, bytes: &[u8]) -> Result<(), InvalidPayload> {
    bytes.iter().try_for_each(|&byte| push_escaped(frame, byte))
}
