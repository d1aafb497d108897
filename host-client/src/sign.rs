// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {crate::Error, sec1::der::Decode, std::path::Path};

#[derive(Debug)]
pub struct Signer {
    secp256k1: secp256k1::Secp256k1<secp256k1::All>,
    key: secp256k1::SecretKey,
}

impl Signer {
    pub fn new(key: secp256k1::SecretKey) -> Self {
        Self {
            secp256k1: secp256k1::Secp256k1::new(),
            key,
        }
    }

    /// Load a SEC1 `EC PRIVATE KEY` PEM file, as written by
    /// `openssl ecparam -name secp256k1 -genkey`.
    pub fn from_pem_file(path: &Path) -> Result<Self, Error> {
        let pem = std::fs::read(path).map_err(|e| Error::ReadPemFile(path.to_path_buf(), e))?;
        Self::from_pem(&pem)
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
        let key = pem::parse(pem)?;
        if key.tag() != "EC PRIVATE KEY" {
            return Err(Error::InvalidPemTag(key.tag().to_string()));
        }
        let secret = sec1::EcPrivateKey::from_der(key.contents())
            .map_err(Error::ParseDerContent)?
            .private_key;
        let secret = secp256k1::SecretKey::from_slice(secret).map_err(Error::InvalidSecretKey)?;
        Ok(Self::new(secret))
    }

    /// Compact `r || s` signature of `digest`.
    pub fn sign(&self, digest: [u8; 32]) -> [u8; 64] {
        self.secp256k1
            .sign_ecdsa(&secp256k1::Message::from_digest(digest), &self.key)
            .serialize_compact()
    }

    /// Compressed public key, the value to put in `SIGNING_PUBKEY`.
    pub fn pubkey(&self) -> [u8; 33] {
        self.key.public_key(&self.secp256k1).serialize()
    }
}
