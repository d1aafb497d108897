// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Block-granular access to program memory.

use consts::{
    CODE_SIZE_OFFSET, ERASE_BLOCK_SIZE, IMAGE_SIZE_LEN, RESET_VECTOR_BACKUP, RESET_VECTOR_LEN, SIGNATURE_LEN, SIGNAT_OFFSET,
};
use embedded_storage::nor_flash::NorFlash;
use host_protocol::u24_from_be_bytes;

/// Program memory seen through its 64-byte erase blocks.
///
/// The flash must program single bytes (`WRITE_SIZE == 1`) and erase
/// `ERASE_BLOCK_SIZE` blocks. Writes are not checked against the reserved
/// regions, that is up to the caller.
pub struct Storage<F> {
    flash: F,
}

impl<F: NorFlash> Storage<F> {
    pub fn new(flash: F) -> Self {
        debug_assert_eq!(F::WRITE_SIZE, 1);
        debug_assert_eq!(F::ERASE_SIZE, ERASE_BLOCK_SIZE as usize);
        Self { flash }
    }

    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), F::Error> {
        self.flash.read(addr, buf)
    }

    /// Program `buf` at `addr`.
    ///
    /// Bytes collect in the write latch, which is committed whenever the next
    /// byte would land in another erase block, and after the last byte. Each
    /// commit blocks until the hardware program cycle is over.
    pub fn write(&mut self, addr: u32, buf: &[u8]) -> Result<(), F::Error> {
        let mut addr = addr;
        let mut pending = buf;
        while !pending.is_empty() {
            let room = (ERASE_BLOCK_SIZE - addr % ERASE_BLOCK_SIZE) as usize;
            let (latch, rest) = pending.split_at(room.min(pending.len()));
            trace!("commit {} bytes at {:#x}", latch.len(), addr);
            self.flash.write(addr, latch)?;
            addr += latch.len() as u32;
            pending = rest;
        }
        Ok(())
    }

    /// Erase the block starting at `index * ERASE_BLOCK_SIZE`.
    pub fn erase_block(&mut self, index: u32) -> Result<(), F::Error> {
        let from = index * ERASE_BLOCK_SIZE;
        self.flash.erase(from, from + ERASE_BLOCK_SIZE)
    }

    /// Erase every block below `limit` while keeping the reset vector alive.
    ///
    /// The vector is first copied to the start of block 1, then block 0 is
    /// erased and the vector written back right away. At any point of the
    /// sequence either address 0 or the backup holds the vector.
    pub fn erase_range(&mut self, limit: u32) -> Result<(), F::Error> {
        let mut vector = [0u8; RESET_VECTOR_LEN];
        self.read(0, &mut vector)?;
        debug!("saved reset vector {:?}", vector);

        self.erase_block(RESET_VECTOR_BACKUP / ERASE_BLOCK_SIZE)?;
        self.write(RESET_VECTOR_BACKUP, &vector)?;

        let blocks = limit / ERASE_BLOCK_SIZE;
        for index in 0..blocks {
            self.erase_block(index)?;
            if index == 0 {
                self.write(0, &vector)?;
            }
        }
        info!("erased {} blocks below {:#x}", blocks, limit);
        Ok(())
    }

    /// Image length stored in the signature record.
    pub fn image_size(&mut self) -> Result<u32, F::Error> {
        let mut size = [0u8; IMAGE_SIZE_LEN];
        self.read(CODE_SIZE_OFFSET, &mut size)?;
        Ok(u24_from_be_bytes(size))
    }

    /// Image signature stored in the signature record.
    pub fn signature(&mut self) -> Result<[u8; SIGNATURE_LEN], F::Error> {
        let mut signature = [0u8; SIGNATURE_LEN];
        self.read(SIGNAT_OFFSET, &mut signature)?;
        Ok(signature)
    }

    pub fn flash(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn release(self) -> F {
        self.flash
    }
}
