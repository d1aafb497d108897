// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Hardware the bootloader is driven through.
//! Program memory is any [`embedded_storage::nor_flash::NorFlash`], the two
//! traits here cover the serial link and the CPU.

use core::time::Duration;

/// Byte-oriented serial link to the host.
pub trait Transport {
    type Error: core::fmt::Debug;

    /// Send one byte, returning once it left the transmitter.
    fn send(&mut self, byte: u8) -> Result<(), Self::Error>;

    /// Wait for the next byte, however long it takes.
    fn receive(&mut self) -> Result<u8, Self::Error>;

    /// Wait at most `timeout` for the next byte.
    fn poll(&mut self, timeout: Duration) -> Result<Option<u8>, Self::Error>;

    /// Turn the receiver on or off. Bytes arriving while it is off are lost.
    fn set_receive(&mut self, _enabled: bool) {}

    fn send_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        bytes.iter().try_for_each(|&byte| self.send(byte))
    }
}

/// Control transfers that leave the bootloader for good.
pub trait Platform {
    /// Full device reset.
    fn reset(&mut self) -> !;

    /// Start executing at `entry` as if the CPU had reset there.
    fn jump(&mut self, entry: u32) -> !;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn send(&mut self, byte: u8) -> Result<(), Self::Error> {
        T::send(self, byte)
    }

    fn receive(&mut self) -> Result<u8, Self::Error> {
        T::receive(self)
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<u8>, Self::Error> {
        T::poll(self, timeout)
    }

    fn set_receive(&mut self, enabled: bool) {
        T::set_receive(self, enabled)
    }

    fn send_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        T::send_all(self, bytes)
    }
}

impl<P: Platform + ?Sized> Platform for &mut P {
    fn reset(&mut self) -> ! {
        P::reset(self)
    }

    fn jump(&mut self, entry: u32) -> ! {
        P::jump(self, entry)
    }
}
