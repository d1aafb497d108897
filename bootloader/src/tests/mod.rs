use {
    crate::{port::Platform, port::Transport, ram::RamFlash},
    consts::{CODE_SIZE_OFFSET, ERASED_BYTE, FLASH_SIZE, SIGNAT_OFFSET},
    embedded_storage::nor_flash::{ErrorType, NorFlash, ReadNorFlash},
    host_protocol::{u24_to_be_bytes, Request},
    secp256k1::{Message, PublicKey, Secp256k1, SecretKey},
    sha2::Digest,
    std::{
        collections::VecDeque,
        panic::{catch_unwind, panic_any, AssertUnwindSafe},
        time::Duration,
    },
};


pub type Flash = RamFlash<{ FLASH_SIZE as usize }>;

/// Reset vector the bootloader keeps at address 0, a `GOTO 0x6000`.
pub const VECTOR: [u8; 4] = [0x00, 0xEF, 0x30, 0xF0];

/// Borrowed flash, so tests can look at the memory after the bootloader
/// has left for good.
pub struct FlashRef<'a>(pub &'a mut Flash);

impl ErrorType for FlashRef<'_> {
    type Error = <Flash as ErrorType>::Error;
}

impl ReadNorFlash for FlashRef<'_> {
    const READ_SIZE: usize = Flash::READ_SIZE;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.0.read(offset, bytes)
    }

    fn capacity(&self) -> usize {
        self.0.capacity()
    }
}

impl NorFlash for FlashRef<'_> {
    const WRITE_SIZE: usize = Flash::WRITE_SIZE;
    const ERASE_SIZE: usize = Flash::ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.0.erase(from, to)
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.0.write(offset, bytes)
    }
}

#[derive(Debug, Eq, PartialEq)]
pub struct LinkDown;

/// Serial link replaying a fixed byte script.
#[derive(Default)]
pub struct ScriptedLink {
    rx: VecDeque<u8>,
    pub sent: Vec<u8>,
    pub receiving: bool,
    pub polls: usize,
    pub fail_send: bool,
}

impl ScriptedLink {
    pub fn new(rx: &[u8]) -> Self {
        Self {
            rx: rx.iter().copied().collect(),
            ..Default::default()
        }
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl Transport for ScriptedLink {
    type Error = LinkDown;

    fn send(&mut self, byte: u8) -> Result<(), Self::Error> {
        if self.fail_send {
            return Err(LinkDown);
        }
        self.sent.push(byte);
        Ok(())
    }

    fn receive(&mut self) -> Result<u8, Self::Error> {
        if !self.receiving {
            return Err(LinkDown);
        }
        self.rx.pop_front().ok_or(LinkDown)
    }

    fn poll(&mut self, _timeout: Duration) -> Result<Option<u8>, Self::Error> {
        self.polls += 1;
        Ok(self.rx.pop_front())
    }

    fn set_receive(&mut self, enabled: bool) {
        self.receiving = enabled;
    }
}

/// How the bootloader left.
#[derive(Debug, Eq, PartialEq)]
pub enum Terminal {
    Reset,
    Jump(u32),
}

/// Platform that unwinds with a [`Terminal`] instead of leaving.
pub struct PanicPlatform;

impl Platform for PanicPlatform {
    fn reset(&mut self) -> ! {
        panic_any(Terminal::Reset)
    }

    fn jump(&mut self, entry: u32) -> ! {
        panic_any(Terminal::Jump(entry))
    }
}

/// Run `f` until it resets or jumps.
pub fn terminal<R>(f: impl FnOnce() -> R) -> Terminal {
    let payload = match catch_unwind(AssertUnwindSafe(f)) {
        Ok(_) => panic!("returned without resetting or jumping"),
        Err(payload) => payload,
    };
    *payload.downcast::<Terminal>().expect("panicked for another reason")
}

pub fn keypair() -> (SecretKey, [u8; 33]) {
    let secp = Secp256k1::new();
    let secret = SecretKey::from_slice(&[0x5A; 32]).unwrap();
    let pubkey = PublicKey::from_secret_key(&secp, &secret).serialize();
    (secret, pubkey)
}

pub fn sign(secret: &SecretKey, digest: [u8; 32]) -> [u8; 64] {
    Secp256k1::new()
        .sign_ecdsa(&Message::from_digest(digest), secret)
        .serialize_compact()
}

/// Image as linked for the device: bytes 4..8 are left erased.
pub fn sample_image(len: usize) -> Vec<u8> {
    let mut image: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
    for byte in image.iter_mut().skip(4).take(4) {
        *byte = ERASED_BYTE;
    }
    image
}

pub fn host_digest(image: &[u8]) -> [u8; 32] {
    sha2::Sha256::digest(image).into()
}

/// Memory as left by a completed update of `image`.
pub fn resident(image: &[u8], signature: &[u8; 64]) -> Flash {
    let mut flash = Flash::new();
    let mem = flash.as_bytes_mut();
    mem[..4].copy_from_slice(&VECTOR);
    let entry = image.len().min(4);
    mem[4..4 + entry].copy_from_slice(&image[..entry]);
    if image.len() > 8 {
        mem[8..image.len()].copy_from_slice(&image[8..]);
    }
    let size = CODE_SIZE_OFFSET as usize;
    mem[size..size + 3].copy_from_slice(&u24_to_be_bytes(image.len() as u32));
    let signat = SIGNAT_OFFSET as usize;
    mem[signat..signat + 64].copy_from_slice(signature);
    flash
}

/// Byte stream a host sends to program `image`, in the host's order.
pub fn update_stream(image: &[u8], signature: &[u8; 64]) -> Vec<u8> {
    let mut stream = Vec::new();
    for (i, chunk) in image.chunks(64).enumerate() {
        let frame = Request::FlashData {
            addr: (i * 64) as u32,
            data: chunk,
        }
        .encode()
        .unwrap();
        stream.extend_from_slice(&frame);
    }
    let size = Request::program_size(image.len() as u32).unwrap();
    stream.extend_from_slice(&size.encode().unwrap());
    stream.extend_from_slice(&Request::ProgramSignature(signature).encode().unwrap());
    stream.extend_from_slice(&Request::FlashStop.encode().unwrap());
    stream
}
