// This file is part of TRINCI.
//
// Copyright (C) 2021 Affidaty Spa.
//
// TRINCI is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// TRINCI is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with TRINCI. If not, see <https://www.gnu.org/licenses/>.

use crate::{
    base::{
        schema::{SerializedIdentity, SignatureHeader},
        serialize::rmp_serialize,
    },
    crypto::ed25519::{KeyPair, PublicKey},
    Result,
};
use rand::{rngs::OsRng, RngCore};

#[cfg(test)]
use mockall::automock;

/// Length of the random nonce attached to each signature header.
pub const NONCE_SIZE: usize = 24;

/// Envelope signer capability.
/// The identity layer behind it is opaque to the rest of the library.
#[cfg_attr(test, automock)]
pub trait Signer: Send + Sync + 'static {
    /// Sign arbitrary bytes with the creator identity.
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Build a fresh signature header (creator identity + new nonce).
    fn signature_header(&self) -> Result<SignatureHeader>;
}

/// Generate a random nonce.
pub fn new_nonce() -> Vec<u8> {
    let mut nonce = vec![0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Signer backed by a local ed25519 keypair.
pub struct LocalSigner {
    /// Membership service provider identifier.
    msp_id: String,
    keypair: KeyPair,
}

impl LocalSigner {
    pub fn new(msp_id: impl Into<String>, keypair: KeyPair) -> Self {
        LocalSigner {
            msp_id: msp_id.into(),
            keypair,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Identity written as envelopes creator.
    pub fn identity(&self) -> SerializedIdentity {
        SerializedIdentity {
            msp_id: self.msp_id.clone(),
            id_bytes: self.keypair.public_key().to_bytes(),
        }
    }
}

impl Signer for LocalSigner {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        self.keypair.sign(data)
    }

    fn signature_header(&self) -> Result<SignatureHeader> {
        let creator = rmp_serialize(&self.identity())?;
        Ok(SignatureHeader {
            creator,
            nonce: new_nonce(),
        })
    }
}
