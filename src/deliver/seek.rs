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

//! Seek request construction.

use crate::{
    base::{
        envelope::create_signed_envelope,
        schema::{Envelope, HeaderType, SeekBehavior, SeekInfo, SeekPosition},
    },
    crypto::Signer,
    db::Db,
    Result,
};

/// Where a delivery session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekTarget {
    /// From the first block, following the chain tail afterwards.
    Oldest,
    /// From the most recent block, following the chain tail afterwards.
    Newest,
    /// Just the given block.
    Specified(u64),
    /// From the given block, following the chain tail afterwards.
    From(u64),
}

impl SeekTarget {
    /// Start and stop positions requested to the ordering service.
    pub fn positions(&self) -> (SeekPosition, SeekPosition) {
        match *self {
            SeekTarget::Oldest => (SeekPosition::Oldest, SeekPosition::Specified(u64::MAX)),
            SeekTarget::Newest => (SeekPosition::Newest, SeekPosition::Specified(u64::MAX)),
            SeekTarget::Specified(number) => (
                SeekPosition::Specified(number),
                SeekPosition::Specified(number),
            ),
            SeekTarget::From(number) => (
                SeekPosition::Specified(number),
                SeekPosition::Specified(u64::MAX),
            ),
        }
    }

    /// Target resuming from what is already persisted: the lowest block
    /// missing between the first and the last stored ones, otherwise the
    /// block after the last one. An empty store resumes from `Oldest`.
    pub fn resume_from<D: Db>(db: &D) -> SeekTarget {
        let (first, last) = match (db.first_block_number(), db.last_block_number()) {
            (Some(first), Some(last)) => (first, last),
            _ => return SeekTarget::Oldest,
        };
        match (first..last).find(|number| db.load_block(*number).is_none()) {
            Some(missing) => {
                debug!("[deliver] block {} missing, resuming from there", missing);
                SeekTarget::From(missing)
            }
            None => SeekTarget::From(last.saturating_add(1)),
        }
    }
}

/// Build the signed seek request for the given positions.
///
/// # Errors
///
/// A signer failure is returned as `SigningFault`.
pub fn build_seek<S: Signer + ?Sized>(
    signer: &S,
    channel_id: &str,
    start: SeekPosition,
    stop: SeekPosition,
) -> Result<Envelope> {
    let seek_info = SeekInfo {
        start,
        stop,
        behavior: SeekBehavior::BlockUntilReady,
    };
    create_signed_envelope(
        HeaderType::DeliverSeekInfo,
        channel_id,
        signer,
        &seek_info,
        0,
        0,
    )
}

/// Build the signed seek request for a target.
pub fn build_seek_target<S: Signer + ?Sized>(
    signer: &S,
    channel_id: &str,
    target: SeekTarget,
) -> Result<Envelope> {
    let (start, stop) = target.positions();
    build_seek(signer, channel_id, start, stop)
}
