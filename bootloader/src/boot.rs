// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Power-on flow: wait for a host, then either take an update or boot the
//! resident image if its signature checks out.

use core::time::Duration;

use consts::{APP_ENTRY, BTLD_OFFSET, HANDSHAKE_POLLS, HANDSHAKE_POLL_INTERVAL_US};
use embedded_storage::nor_flash::NorFlash;
use host_protocol::{Response, HANDSHAKE_REQUEST, HANDSHAKE_RESPONSE};

use crate::flash::Storage;
use crate::framer::Framer;
use crate::port::{Platform, Transport};
use crate::session::{SessionEnd, UpdateSession};
use crate::verify::{ImageVerifier, Secp256k1Verify, VerificationResult};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Listening for the host's handshake.
    HandshakeWait,
    /// No host showed up, check and start the resident image.
    VerifyAndBoot,
    /// Host present, wipe the application area.
    Erase,
    /// Taking frames from the host.
    Receive,
}

pub struct Bootloader<F, T, P, V> {
    storage: Storage<F>,
    transport: T,
    platform: P,
    verifier: ImageVerifier<V>,
    framer: Framer,
}

impl<F, T, P, V> Bootloader<F, T, P, V>
where
    F: NorFlash,
    T: Transport,
    P: Platform,
    V: Secp256k1Verify,
{
    pub fn new(flash: F, transport: T, platform: P, verifier: ImageVerifier<V>) -> Self {
        Self {
            storage: Storage::new(flash),
            transport,
            platform,
            verifier,
            framer: Framer::new(),
        }
    }

    /// Run from power-on until the device resets or the application starts.
    pub fn run(mut self) -> ! {
        let mut state = State::HandshakeWait;
        loop {
            debug!("state {:?}", state);
            state = match state {
                State::HandshakeWait => match self.wait_for_handshake() {
                    Ok(true) => State::Erase,
                    Ok(false) => State::VerifyAndBoot,
                    Err(_) => {
                        warn!("link error while waiting for a host");
                        State::VerifyAndBoot
                    }
                },
                State::VerifyAndBoot => self.verify_and_boot(),
                State::Erase => self.erase(),
                State::Receive => self.receive(),
            };
        }
    }

    /// Poll for the handshake during the startup window.
    ///
    /// A byte that does not continue the request drops the partial match and
    /// is not reconsidered as the start of a new one.
    pub fn wait_for_handshake(&mut self) -> Result<bool, T::Error> {
        self.transport.set_receive(true);
        let interval = Duration::from_micros(HANDSHAKE_POLL_INTERVAL_US);
        let mut matched = 0;
        for _ in 0..HANDSHAKE_POLLS {
            let Some(byte) = self.transport.poll(interval)? else {
                continue;
            };
            if byte == HANDSHAKE_REQUEST[matched] {
                matched += 1;
                if matched == HANDSHAKE_REQUEST.len() {
                    info!("host handshake received");
                    return Ok(true);
                }
            } else {
                matched = 0;
            }
        }
        Ok(false)
    }

    fn verify_and_boot(&mut self) -> ! {
        let result = match self.verifier.verify(&mut self.storage) {
            Ok(result) => result,
            Err(_) => {
                error!("program memory read failed during verification");
                VerificationResult::Invalid
            }
        };

        if result == VerificationResult::Valid && core::hint::black_box(result) == VerificationResult::Valid {
            info!("image signature valid, starting application");
            // Nobody may be listening, a lost status byte does not stop the boot.
            let _ = self.transport.send(Response::SignatureValid.as_byte());
            self.platform.jump(APP_ENTRY)
        }

        warn!("image signature invalid");
        let _ = self.transport.send(Response::SignatureInvalid.as_byte());
        self.platform.reset()
    }

    fn erase(&mut self) -> State {
        self.transport.set_receive(false);
        if self.storage.erase_range(BTLD_OFFSET).is_err() {
            error!("erasing the application area failed");
            self.platform.reset()
        }
        if self.transport.send_all(HANDSHAKE_RESPONSE).is_err() {
            error!("handshake response not sent");
            self.platform.reset()
        }
        self.framer.clear();
        self.transport.set_receive(true);
        State::Receive
    }

    fn receive(&mut self) -> ! {
        let mut session = UpdateSession::new(&mut self.storage, &mut self.platform);
        match session.serve(&mut self.framer, &mut self.transport) {
            SessionEnd::Rejected(e) => {
                warn!("request refused: {:?}", e.response());
                if let Some(response) = e.response() {
                    let _ = self.transport.send(response.as_byte());
                }
            }
            SessionEnd::Transport(_) => error!("link error during update"),
        }
        self.platform.reset()
    }

    /// Hand the peripherals back.
    pub fn release(self) -> (F, T, P) {
        (self.storage.release(), self.transport, self.platform)
    }
}
