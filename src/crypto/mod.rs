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

//! Cryptographic primitives and the envelope signer capability.

pub mod ed25519;
pub mod hash;
pub mod sign;

pub use ed25519::{KeyPair, PublicKey};
pub use hash::{compute_tx_id, sha256};
pub use sign::{LocalSigner, Signer};

#[cfg(test)]
pub use sign::MockSigner;
