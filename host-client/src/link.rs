// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {
    crate::{image::Image, Error},
    host_protocol::{Request, Response, HANDSHAKE_REQUEST, HANDSHAKE_RESPONSE},
    std::time::Duration,
    tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
};

/// Handshake bytes are sent one by one, the bootloader polls for each.
const HANDSHAKE_BYTE_GAP: Duration = Duration::from_millis(1);
/// Silence that ends a read.
const READ_TIMEOUT: Duration = Duration::from_millis(500);
/// Programming a block and erasing everything both fit well within this.
const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Host side of an update session.
pub struct Link<S> {
    port: S,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Link<S> {
    pub fn new(port: S) -> Self {
        Self { port }
    }

    pub fn into_inner(self) -> S {
        self.port
    }

    /// Repeat the handshake until the bootloader confirms update mode.
    /// The device has to be reset by hand while this runs.
    pub async fn handshake(&mut self, attempts: usize) -> Result<(), Error> {
        for attempt in 1..=attempts {
            log::info!("sending start sequence ({attempt}/{attempts})");
            for &byte in HANDSHAKE_REQUEST {
                self.port.write_all(&[byte]).await.map_err(Error::Link)?;
                self.port.flush().await.map_err(Error::Link)?;
                tokio::time::sleep(HANDSHAKE_BYTE_GAP).await;
            }
            if self.expect(HANDSHAKE_RESPONSE).await? {
                return Ok(());
            }
        }
        Err(Error::HandshakeFailed)
    }

    /// Program `image` and its signature, then tell the bootloader to reset.
    pub async fn flash(&mut self, image: &Image, signature: &[u8; 64]) -> Result<(), Error> {
        for (addr, data) in image.chunks() {
            log::debug!("data {} bytes at {addr:#06x}", data.len());
            self.request(&Request::FlashData { addr, data }).await?;
        }
        log::info!("sending size {}", image.len());
        let size = Request::program_size(image.len()).map_err(|_| Error::ImageTooLarge { size: image.len() })?;
        self.request(&size).await?;
        log::info!("sending signature {}", hex::encode(signature));
        self.request(&Request::ProgramSignature(signature)).await?;
        self.send(&Request::FlashStop).await
    }

    /// Send `request` and wait for its acknowledgement.
    pub async fn request(&mut self, request: &Request<'_>) -> Result<(), Error> {
        self.send(request).await?;
        loop {
            let Some(byte) = self.read_byte(ACK_TIMEOUT).await? else {
                return Err(Error::NoAck);
            };
            match Response::from_byte(byte) {
                Some(Response::Ack) => return Ok(()),
                Some(Response::InvalidPayload) => return Err(Error::InvalidPayload),
                Some(Response::DeniedAddress) => return Err(Error::DeniedAddress),
                _ => log::trace!("skipping {byte:#04x}"),
            }
        }
    }

    async fn send(&mut self, request: &Request<'_>) -> Result<(), Error> {
        let frame = request.encode().map_err(|_| Error::InvalidPayload)?;
        self.port.write_all(&frame).await.map_err(Error::Link)?;
        self.port.flush().await.map_err(Error::Link)
    }

    /// Read until the received bytes end with `expected`, or the line goes quiet.
    async fn expect(&mut self, expected: &[u8]) -> Result<bool, Error> {
        let mut received = Vec::new();
        while let Some(byte) = self.read_byte(READ_TIMEOUT).await? {
            received.push(byte);
            if received.ends_with(expected) {
                return Ok(true);
            }
        }
        if !received.is_empty() {
            log::warn!("received unexpected {:02x?}", received);
        }
        Ok(false)
    }

    async fn read_byte(&mut self, timeout: Duration) -> Result<Option<u8>, Error> {
        let mut byte = [0u8; 1];
        match tokio::time::timeout(timeout, self.port.read(&mut byte)).await {
            Err(_) => Ok(None),
            Ok(Ok(0)) => Err(Error::Link(std::io::ErrorKind::UnexpectedEof.into())),
            Ok(Ok(_)) => Ok(Some(byte[0])),
            Ok(Err(e)) => Err(Error::Link(e)),
        }
    }
}
