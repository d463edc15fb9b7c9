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

//! Digest helpers.
//!
//! Current implementation uses SHA-256.

use ring::digest;

/// SHA-256 digest length.
pub const SHA256_LEN: usize = 32;

/// Compute SHA-256 digest of arbitrary data.
pub fn sha256(data: &[u8]) -> [u8; SHA256_LEN] {
    let digest = digest::digest(&digest::SHA256, data);
    let mut out = [0u8; SHA256_LEN];
    out.copy_from_slice(digest.as_ref());
    out
}

/// Transaction identifier bound to the submitter.
/// Computed as the hex encoded SHA-256 of `nonce || creator`.
pub fn compute_tx_id(nonce: &[u8], creator: &[u8]) -> String {
    let mut ctx = digest::Context::new(&digest::SHA256);
    ctx.update(nonce);
    ctx.update(creator);
    hex::encode(ctx.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHA256_ABC_HEX: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    const SHA256_EMPTY_HEX: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn sha256_digest() {
        assert_eq!(hex::encode(sha256(b"abc")), SHA256_ABC_HEX);
        assert_eq!(hex::encode(sha256(b"")), SHA256_EMPTY_HEX);
    }

    #[test]
    fn tx_id_is_digest_of_nonce_and_creator() {
        let tx_id = compute_tx_id(b"ab", b"c");

        assert_eq!(tx_id, SHA256_ABC_HEX);
    }

    #[test]
    fn tx_id_depends_on_nonce() {
        let id1 = compute_tx_id(&[1; 24], b"creator");
        let id2 = compute_tx_id(&[2; 24], b"creator");

        assert_ne!(id1, id2);
    }
}
