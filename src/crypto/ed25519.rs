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

//! Ed25519 keys used by the local envelope signer.

use crate::{Error, ErrorKind, Result};
use ed25519_dalek::{
    Keypair as KeyPairImpl, PublicKey as PublicKeyImpl, Signer as _, Verifier as _,
};
use rand::rngs::OsRng;
use std::convert::TryFrom;

pub struct KeyPair(KeyPairImpl);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    imp: PublicKeyImpl,
}

impl KeyPair {
    /// Load from the 64 bytes `secret || public` representation.
    pub fn from_bytes(bytes: &[u8]) -> Result<KeyPair> {
        let internal = KeyPairImpl::from_bytes(bytes)
            .map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))?;
        Ok(KeyPair(internal))
    }

    pub fn from_random() -> KeyPair {
        let mut csprng = OsRng {};
        let internal = KeyPairImpl::generate(&mut csprng);
        KeyPair(internal)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes().to_vec()
    }

    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>> {
        let sig = self
            .0
            .try_sign(data)
            .map_err(|err| Error::new_ext(ErrorKind::SigningFault, err))?;
        Ok(sig.to_bytes().to_vec())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey { imp: self.0.public }
    }
}

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<PublicKey> {
        let internal = PublicKeyImpl::from_bytes(bytes)
            .map_err(|err| Error::new_ext(ErrorKind::MalformedData, err))?;
        Ok(PublicKey { imp: internal })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.imp.to_bytes().to_vec()
    }

    pub fn verify(&self, data: &[u8], sig: &[u8]) -> bool {
        ed25519_dalek::Signature::try_from(sig)
            .and_then(|s| self.imp.verify(data, &s))
            .is_ok()
    }
}
