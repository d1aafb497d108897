// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Serial update and signed boot for single-bank microcontroller flash.
//!
//! On power-on the bootloader listens for a host handshake. With a host it
//! erases the application area and programs the image sent frame by frame,
//! otherwise it verifies the resident image's secp256k1 signature and either
//! starts it or resets.

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod boot;
pub mod flash;
pub mod framer;
#[cfg(all(feature = "cortex-m", target_arch = "arm"))]
pub mod jump_app;
pub mod port;
pub mod ram;
pub mod serial;
pub mod session;
pub mod verify;

#[cfg(test)]
mod tests;

pub use boot::{Bootloader, State};
pub use flash::Storage;
pub use framer::{Frame, Framer};
pub use port::{Platform, Transport};
pub use ram::{RamFlash, RamFlashError};
pub use serial::SerialTransport;
pub use session::{SessionEnd, UpdateSession};
pub use verify::{EccVerifier, ImageVerifier, VerificationResult};
