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

//! Envelope construction and unwrapping.

use crate::{
    base::{
        schema::{ChannelHeader, Envelope, Header, HeaderType, Payload, Timestamp},
        serialize::{rmp_deserialize, rmp_serialize},
    },
    crypto::{compute_tx_id, Signer},
    Error, ErrorKind, Result,
};
use serde::Serialize;

/// Wrap `msg` into an envelope addressed to `channel_id` and signed by
/// `signer`.
///
/// # Errors
///
/// Signer failures are returned as `SigningFault`.
pub fn create_signed_envelope<S, T>(
    header_type: HeaderType,
    channel_id: &str,
    signer: &S,
    msg: &T,
    version: i32,
    epoch: u64,
) -> Result<Envelope>
where
    S: Signer + ?Sized,
    T: Serialize,
{
    let sig_header = signer
        .signature_header()
        .map_err(|err| Error::new_ext(ErrorKind::SigningFault, err))?;
    let tx_id = compute_tx_id(&sig_header.nonce, &sig_header.creator);

    let channel_header = ChannelHeader {
        header_type: header_type as i32,
        version,
        timestamp: Timestamp::now(),
        channel_id: channel_id.to_owned(),
        tx_id,
        epoch,
    };
    let payload = Payload {
        header: Header {
            channel_header: rmp_serialize(&channel_header)?,
            signature_header: rmp_serialize(&sig_header)?,
        },
        data: rmp_serialize(msg)?,
    };
    let payload = rmp_serialize(&payload)?;

    let signature = signer
        .sign(&payload)
        .map_err(|err| Error::new_ext(ErrorKind::SigningFault, err))?;

    Ok(Envelope { payload, signature })
}

/// Deserialize one envelope as stored within a block.
pub fn get_envelope_from_block(buf: &[u8]) -> Result<Envelope> {
    rmp_deserialize(buf)
}

/// Unwrap the envelope payload.
pub fn get_payload(env: &Envelope) -> Result<Payload> {
    rmp_deserialize(&env.payload)
}

pub fn unmarshal_channel_header(buf: &[u8]) -> Result<ChannelHeader> {
    rmp_deserialize(buf)
}
