// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! [`Transport`] over a blocking UART.

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_io::{Read, ReadReady, Write};

use crate::port::Transport;

/// Granularity of the receive timeout.
const POLL_STEP_US: u32 = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    Io(E),
    /// The UART reported end of stream.
    Closed,
}

/// `embedded-io` has no receiver switch, so turning receive off only marks
/// the link: whatever the UART collected meanwhile is discarded when receive
/// is turned back on.
pub struct SerialTransport<S, D> {
    serial: S,
    delay: D,
    receiving: bool,
}

impl<S, D> SerialTransport<S, D> {
    pub fn new(serial: S, delay: D) -> Self {
        Self {
            serial,
            delay,
            receiving: true,
        }
    }

    pub fn release(self) -> (S, D) {
        (self.serial, self.delay)
    }
}

impl<S, D> Transport for SerialTransport<S, D>
where
    S: Read + ReadReady + Write,
    D: DelayNs,
{
    type Error = Error<S::Error>;

    fn send(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.serial.write_all(&[byte]).map_err(Error::Io)?;
        self.serial.flush().map_err(Error::Io)
    }

    fn receive(&mut self) -> Result<u8, Self::Error> {
        let mut byte = [0u8; 1];
        match self.serial.read(&mut byte).map_err(Error::Io)? {
            0 => Err(Error::Closed),
            _ => Ok(byte[0]),
        }
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<u8>, Self::Error> {
        let budget = u64::try_from(timeout.as_micros()).unwrap_or(u64::MAX);
        let mut waited = 0u64;
        loop {
            if self.serial.read_ready().map_err(Error::Io)? {
                return self.receive().map(Some);
            }
            if waited >= budget {
                return Ok(None);
            }
            self.delay.delay_us(POLL_STEP_US);
            waited += u64::from(POLL_STEP_US);
        }
    }

    fn set_receive(&mut self, enabled: bool) {
        if enabled && !self.receiving {
            let mut byte = [0u8; 1];
            let mut dropped = 0usize;
            while let Ok(true) = self.serial.read_ready() {
                match self.serial.read(&mut byte) {
                    Ok(n) if n > 0 => dropped += 1,
                    _ => break,
                }
            }
            if dropped > 0 {
                debug!("dropped {} bytes received while off", dropped);
            }
        }
        self.receiving = enabled;
    }

    fn send_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.serial.write_all(bytes).map_err(Error::Io)?;
        self.serial.flush().map_err(Error::Io)
    }
}
