// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Execution of host requests once update mode has been entered.

use consts::{APP_ENTRY, CODE_SIZE_OFFSET, RESET_VECTOR_LEN, SIGNAT_OFFSET};
use embedded_storage::nor_flash::NorFlash;
use host_protocol::{InvalidPayload, Request, Response};

use crate::flash::Storage;
use crate::framer::Framer;
use crate::port::{Platform, Transport};

/// Why a request was refused.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// Unknown opcode or wrong payload length.
    InvalidPayload,
    /// The write would reach the signature record or beyond.
    DeniedAddress,
    /// Program memory failed.
    Storage(E),
}

impl<E> Error<E> {
    /// Status byte reported to the host before the session ends.
    pub fn response(&self) -> Option<Response> {
        match self {
            Self::InvalidPayload => Some(Response::InvalidPayload),
            Self::DeniedAddress => Some(Response::DeniedAddress),
            Self::Storage(_) => None,
        }
    }
}

impl<E> From<InvalidPayload> for Error<E> {
    fn from(_: InvalidPayload) -> Self {
        Self::InvalidPayload
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidPayload => write!(f, "invalid request payload"),
            Self::DeniedAddress => write!(f, "address outside the application area"),
            Self::Storage(e) => write!(f, "program memory error: {:?}", e),
        }
    }
}

/// How the receive loop ended.
#[derive(Debug, Eq, PartialEq)]
pub enum SessionEnd<S, T> {
    /// A request was refused.
    Rejected(Error<S>),
    /// The link failed.
    Transport(T),
}

pub struct UpdateSession<'a, F, P> {
    storage: &'a mut Storage<F>,
    platform: &'a mut P,
}

impl<'a, F: NorFlash, P: Platform> UpdateSession<'a, F, P> {
    pub fn new(storage: &'a mut Storage<F>, platform: &'a mut P) -> Self {
        Self { storage, platform }
    }

    /// Execute one decoded frame. `FLASH_STOP` resets the device and does not return.
    pub fn handle(&mut self, opcode: u8, payload: &[u8]) -> Result<(), Error<F::Error>> {
        match Request::parse(opcode, payload)? {
            Request::ProgramSize(size) => {
                debug!("image size {:?}", size);
                self.storage.write(CODE_SIZE_OFFSET, &size).map_err(Error::Storage)
            }
            Request::ProgramSignature(signature) => {
                debug!("image signature received");
                self.storage.write(SIGNAT_OFFSET, signature).map_err(Error::Storage)
            }
            Request::FlashData { addr, data } => self.flash_data(addr, data),
            Request::FlashStop => {
                info!("update finished, resetting");
                self.platform.reset()
            }
        }
    }

    fn flash_data(&mut self, addr: u32, data: &[u8]) -> Result<(), Error<F::Error>> {
        if addr + data.len() as u32 >= SIGNAT_OFFSET {
            warn!("denied write of {} bytes at {:#x}", data.len(), addr);
            return Err(Error::DeniedAddress);
        }
        trace!("data {} bytes at {:#x}", data.len(), addr);

        if addr != 0 {
            return self.storage.write(addr, data).map_err(Error::Storage);
        }

        // Address 0 keeps jumping into the bootloader. The image's first word
        // moves to APP_ENTRY, where the image's second word would have gone.
        let entry = &data[..data.len().min(RESET_VECTOR_LEN)];
        self.storage.write(APP_ENTRY, entry).map_err(Error::Storage)?;
        if let Some(tail) = data.get(2 * RESET_VECTOR_LEN..) {
            if !tail.is_empty() {
                self.storage
                    .write((2 * RESET_VECTOR_LEN) as u32, tail)
                    .map_err(Error::Storage)?;
            }
        }
        Ok(())
    }

    /// Receive, execute and acknowledge frames until a request is refused or
    /// the link fails. A `FLASH_STOP` frame never comes back from here.
    pub fn serve<T: Transport, const N: usize>(
        &mut self,
        framer: &mut Framer<N>,
        transport: &mut T,
    ) -> SessionEnd<F::Error, T::Error> {
        loop {
            let byte = match transport.receive() {
                Ok(byte) => byte,
                Err(e) => return SessionEnd::Transport(e),
            };
            let Some(frame) = framer.feed(byte) else {
                continue;
            };
            if let Some(opcode) = frame.opcode {
                if let Err(e) = self.handle(opcode, frame.payload) {
                    return SessionEnd::Rejected(e);
                }
            }
            if let Err(e) = transport.send(Response::Ack.as_byte()) {
                return SessionEnd::Transport(e);
            }
        }
    }
}
