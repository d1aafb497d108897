// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Program memory backed by RAM, for host simulation and tests.
//! Erased bytes read `0xFF` and programming can only clear bits, like the real
//! array. A power cut can be scheduled after a given number of operations.

use consts::{ERASED_BYTE, ERASE_BLOCK_SIZE};
use embedded_storage::nor_flash::{ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RamFlashError {
    NotAligned,
    OutOfBounds,
    /// A scheduled power cut hit, the operation did not happen.
    PowerLoss,
}

impl NorFlashError for RamFlashError {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Self::NotAligned => NorFlashErrorKind::NotAligned,
            Self::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Self::PowerLoss => NorFlashErrorKind::Other,
        }
    }
}

#[derive(Clone)]
pub struct RamFlash<const N: usize> {
    mem: [u8; N],
    operations: usize,
    power_left: Option<usize>,
}

impl<const N: usize> Default for RamFlash<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RamFlash<N> {
    /// Fully erased memory.
    pub const fn new() -> Self {
        Self {
            mem: [ERASED_BYTE; N],
            operations: 0,
            power_left: None,
        }
    }

    /// Memory preloaded with `image` at address 0, the rest erased.
    pub fn with_contents(image: &[u8]) -> Self {
        let mut flash = Self::new();
        flash.mem[..image.len()].copy_from_slice(image);
        flash
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.mem
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mem
    }

    /// Number of completed erase and program operations.
    pub fn operations(&self) -> usize {
        self.operations
    }

    /// Let `operations` more erase or program operations complete, then fail
    /// every later one with [`RamFlashError::PowerLoss`].
    pub fn cut_power_after(&mut self, operations: usize) {
        self.power_left = Some(operations);
    }

    pub fn restore_power(&mut self) {
        self.power_left = None;
    }

    fn spend(&mut self) -> Result<(), RamFlashError> {
        match self.power_left {
            Some(0) => return Err(RamFlashError::PowerLoss),
            Some(left) => self.power_left = Some(left - 1),
            None => {}
        }
        self.operations += 1;
        Ok(())
    }

    fn span(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, RamFlashError> {
        let start = offset as usize;
        let end = start.checked_add(len).ok_or(RamFlashError::OutOfBounds)?;
        if end > N {
            return Err(RamFlashError::OutOfBounds);
        }
        Ok(start..end)
    }
}

impl<const N: usize> ErrorType for RamFlash<N> {
    type Error = RamFlashError;
}

impl<const N: usize> ReadNorFlash for RamFlash<N> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let span = self.span(offset, bytes.len())?;
        bytes.copy_from_slice(&self.mem[span]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        N
    }
}

impl<const N: usize> NorFlash for RamFlash<N> {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = ERASE_BLOCK_SIZE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from > to || from % ERASE_BLOCK_SIZE != 0 || to % ERASE_BLOCK_SIZE != 0 {
            return Err(RamFlashError::NotAligned);
        }
        let span = self.span(from, (to - from) as usize)?;
        self.spend()?;
        self.mem[span].fill(ERASED_BYTE);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let span = self.span(offset, bytes.len())?;
        self.spend()?;
        for (cell, byte) in self.mem[span].iter_mut().zip(bytes) {
            *cell &= byte;
        }
        Ok(())
    }
}
