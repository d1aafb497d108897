// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Signature check of the resident application image.
//!
//! The digest covers the image as the host built it. Address 0 holds the
//! bootloader's reset vector and the image's first word was relocated to
//! `APP_ENTRY`, so the first chunk is put back into its original shape
//! before hashing: bytes `4..8` move to `0..4` and `4..8` read as erased.

use consts::{ERASED_BYTE, ERASE_BLOCK_SIZE, RESET_VECTOR_LEN, SIGNATURE_LEN, SIGNAT_OFFSET};
use embedded_storage::nor_flash::NorFlash;
use secp256k1::ffi::types::AlignedType;
use secp256k1::{ecdsa, Message, PublicKey, Secp256k1};

use crate::flash::Storage;

/// Result values far apart in Hamming distance, so that a single glitched
/// bit cannot turn one into the other.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum VerificationResult {
    Valid = 0xcafebabe,
    Invalid = 0xdeadbeef,
}

pub trait Sha256 {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> [u8; 32];
}

impl Sha256 for sha2::Sha256 {
    fn update(&mut self, data: &[u8]) {
        sha2::Digest::update(self, data);
    }

    fn finalize(self) -> [u8; 32] {
        sha2::Digest::finalize(self).into()
    }
}

pub trait Secp256k1Verify {
    fn verify_ecdsa(&self, msg: [u8; 32], signature: [u8; SIGNATURE_LEN], pubkey: [u8; 33]) -> VerificationResult;
}

/// Words of preallocated context memory for a verification-only context.
const CONTEXT_WORDS: usize = 64;

/// secp256k1 ECDSA on a stack-allocated context.
pub struct EccVerifier;

impl Secp256k1Verify for EccVerifier {
    fn verify_ecdsa(&self, msg: [u8; 32], signature: [u8; SIGNATURE_LEN], pubkey: [u8; 33]) -> VerificationResult {
        const CFI_SUCCESS: u32 = CF1 + CF2;
        const CF1: u32 = 13;
        const CF2: u32 = 7;
        let mut control_flow_integrity_counter = 0;

        let mut buf: [AlignedType; CONTEXT_WORDS] = core::array::from_fn(|_| AlignedType::zeroed());
        let Ok(secp) = Secp256k1::preallocated_verification_only(&mut buf) else {
            error!("secp256k1 context does not fit");
            return VerificationResult::Invalid;
        };
        let Ok(pubkey) = PublicKey::from_slice(&pubkey) else {
            return VerificationResult::Invalid;
        };
        let Ok(mut signature) = ecdsa::Signature::from_compact(&signature) else {
            return VerificationResult::Invalid;
        };
        control_flow_integrity_counter += CF1;

        // The signer is not required to produce low-S signatures.
        signature.normalize_s();
        if secp.verify_ecdsa(&Message::from_digest(msg), &signature, &pubkey).is_ok() {
            control_flow_integrity_counter += CF2;
            if core::hint::black_box(control_flow_integrity_counter) == CFI_SUCCESS {
                return VerificationResult::Valid;
            }
        }
        VerificationResult::Invalid
    }
}

/// Checks the resident image against its signature record.
pub struct ImageVerifier<V> {
    ecc: V,
    pubkey: [u8; 33],
}

impl<V: Secp256k1Verify> ImageVerifier<V> {
    pub fn new(ecc: V, pubkey: [u8; 33]) -> Self {
        Self { ecc, pubkey }
    }

    pub fn verify<F: NorFlash>(&self, storage: &mut Storage<F>) -> Result<VerificationResult, F::Error> {
        self.verify_with(storage, <sha2::Sha256 as sha2::Digest>::new())
    }

    /// Same as [`verify`](Self::verify) with a caller-provided hasher.
    pub fn verify_with<F: NorFlash, H: Sha256>(
        &self,
        storage: &mut Storage<F>,
        hasher: H,
    ) -> Result<VerificationResult, F::Error> {
        let size = storage.image_size()?;
        if size == 0 || size > SIGNAT_OFFSET {
            warn!("no plausible image, size field is {:#x}", size);
            return Ok(VerificationResult::Invalid);
        }
        info!("verifying {} byte image", size);

        let digest = image_digest(storage, size, hasher)?;
        let signature = storage.signature()?;
        Ok(self.ecc.verify_ecdsa(digest, signature, self.pubkey))
    }
}

/// SHA-256 over the first `size` bytes of the image, in its canonical form.
pub fn image_digest<F: NorFlash, H: Sha256>(
    storage: &mut Storage<F>,
    size: u32,
    mut hasher: H,
) -> Result<[u8; 32], F::Error> {
    const CHUNK: usize = ERASE_BLOCK_SIZE as usize;
    let mut chunk = [0u8; CHUNK];
    let mut addr = 0u32;
    let mut remaining = size as usize;

    while remaining > 0 {
        let len = remaining.min(CHUNK);
        if addr == 0 {
            // Read the whole block, a short image still needs bytes 4..8 relocated.
            storage.read(0, &mut chunk)?;
            canonicalize(&mut chunk);
        } else {
            storage.read(addr, &mut chunk[..len])?;
        }
        hasher.update(&chunk[..len]);
        addr += len as u32;
        remaining -= len;
    }
    Ok(hasher.finalize())
}

/// Undo the reset vector relocation on the first block.
pub fn canonicalize(block: &mut [u8]) {
    block.copy_within(RESET_VECTOR_LEN..2 * RESET_VECTOR_LEN, 0);
    block[RESET_VECTOR_LEN..2 * RESET_VECTOR_LEN].fill(ERASED_BYTE);
}
