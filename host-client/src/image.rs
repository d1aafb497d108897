// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {
    crate::Error,
    consts::{ERASED_BYTE, RESET_VECTOR_LEN, SIGNAT_OFFSET},
    host_protocol::MAX_CHUNK_LEN,
    sha2::Digest,
    std::path::Path,
};

/// Application image as linked, starting at address 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    bytes: Vec<u8>,
}

impl Image {
    pub fn new(bytes: Vec<u8>) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(Error::ImageEmpty);
        }
        if bytes.len() as u64 >= u64::from(SIGNAT_OFFSET) {
            return Err(Error::ImageTooLarge {
                size: bytes.len() as u32,
            });
        }
        let mut second_word = bytes.iter().skip(RESET_VECTOR_LEN).take(RESET_VECTOR_LEN);
        if second_word.any(|&b| b != ERASED_BYTE) {
            return Err(Error::ImageErasedWordProgrammed);
        }
        Ok(Self { bytes })
    }

    pub fn from_hex_file(path: &Path) -> Result<Self, Error> {
        let data = std::fs::read_to_string(path).map_err(|e| Error::ReadHexFile(path.to_path_buf(), e))?;
        Self::from_hex(&data)
    }

    /// Load the data records of an Intel HEX file.
    ///
    /// Records above the first 64 KiB hold configuration words, which the
    /// bootloader does not program. Gaps read as erased.
    pub fn from_hex(data: &str) -> Result<Self, Error> {
        let mut bytes = Vec::new();
        let mut upper_address = 0u32;
        for record in ihex::Reader::new(data) {
            match record? {
                ihex::Record::ExtendedLinearAddress(addr) => {
                    upper_address = u32::from(addr) << 16;
                }
                ihex::Record::ExtendedSegmentAddress(addr) => {
                    upper_address = u32::from(addr) << 4;
                }
                ihex::Record::Data { offset, value } => {
                    if upper_address != 0 {
                        log::debug!("ignoring {} bytes at {:#x}", value.len(), upper_address + u32::from(offset));
                        continue;
                    }
                    let start = usize::from(offset);
                    let end = start + value.len();
                    if bytes.len() < end {
                        bytes.resize(end, ERASED_BYTE);
                    }
                    bytes[start..end].copy_from_slice(&value);
                }
                ihex::Record::EndOfFile => break,
                ihex::Record::StartSegmentAddress { .. } | ihex::Record::StartLinearAddress(_) => {}
            }
        }
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> u32 {
        // checked against SIGNAT_OFFSET on construction
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// SHA-256 of the image, the message the bootloader verifies.
    pub fn digest(&self) -> [u8; 32] {
        sha2::Sha256::digest(&self.bytes).into()
    }

    /// Data chunks the way the bootloader programs them, block aligned.
    pub fn chunks(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.bytes
            .chunks(MAX_CHUNK_LEN)
            .enumerate()
            .map(|(i, chunk)| ((i * MAX_CHUNK_LEN) as u32, chunk))
    }
}
