// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;

#[derive(Debug)]
pub enum Error {
    DeniedAddress,
    HandshakeFailed,
    ImageErasedWordProgrammed,
    ImageEmpty,
    ImageTooLarge { size: u32 },
    InvalidPayload,
    InvalidPemTag(String),
    InvalidSecretKey(secp256k1::Error),
    Link(std::io::Error),
    NoAck,
    OpenSerialPort(tokio_serial::Error),
    ParseDerContent(sec1::der::Error),
    ParseHex(ihex::ReaderError),
    ParsePem(pem::PemError),
    ReadHexFile(PathBuf, std::io::Error),
    ReadPemFile(PathBuf, std::io::Error),
}

impl From<pem::PemError> for Error {
    fn from(e: pem::PemError) -> Self {
        Error::ParsePem(e)
    }
}

impl From<ihex::ReaderError> for Error {
    fn from(e: ihex::ReaderError) -> Self {
        Error::ParseHex(e)
    }
}

impl From<tokio_serial::Error> for Error {
    fn from(e: tokio_serial::Error) -> Self {
        Error::OpenSerialPort(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::DeniedAddress => write!(f, "device refused a write address"),
            Error::HandshakeFailed => write!(f, "device did not answer the handshake; was it reset?"),
            Error::ImageErasedWordProgrammed => write!(
                f,
                "image bytes 4..8 must be left erased (0xFF), the bootloader cannot program them"
            ),
            Error::ImageEmpty => write!(f, "image has no data below the signature record"),
            Error::ImageTooLarge { size } => write!(
                f,
                "image is {size} bytes, it must end below {:#x}",
                consts::SIGNAT_OFFSET
            ),
            Error::InvalidPayload => write!(f, "device reported an invalid payload"),
            Error::InvalidPemTag(tag) => write!(f, "expected an EC PRIVATE KEY, found {tag}"),
            Error::InvalidSecretKey(e) => write!(f, "invalid secp256k1 secret key: {e}"),
            Error::Link(e) => write!(f, "serial link error: {e}"),
            Error::NoAck => write!(f, "device stopped answering"),
            Error::OpenSerialPort(e) => write!(f, "failed to open serial port: {e}"),
            Error::ParseDerContent(e) => write!(f, "failed to parse key: {e}"),
            Error::ParseHex(e) => write!(f, "failed to parse Intel HEX: {e}"),
            Error::ParsePem(e) => write!(f, "failed to parse PEM file: {e}"),
            Error::ReadHexFile(path, e) => write!(f, "failed to read {}: {e}", path.display()),
            Error::ReadPemFile(path, e) => write!(f, "failed to read {}: {e}", path.display()),
        }
    }
}

impl std::error::Error for Error {}
