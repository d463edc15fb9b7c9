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

//! Structures exchanged with the ordering service plus the records produced
//! by the block decoder.
//!
//! Nested headers are kept as opaque serialized bytes, exactly as they are
//! signed, and unpacked on demand (see `base::envelope`).

use serde::{de::Visitor, Deserialize, Deserializer, Serialize, Serializer};
use serde_bytes::ByteBuf;
use std::time::{SystemTime, UNIX_EPOCH};

/// Status codes used by the ordering service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Unknown,
    Success,
    BadRequest,
    Forbidden,
    NotFound,
    RequestEntityTooLarge,
    InternalServerError,
    NotImplemented,
    ServiceUnavailable,
}

impl Status {
    /// Numeric status code.
    pub fn code(&self) -> i32 {
        use Status::*;
        match self {
            Unknown => 0,
            Success => 200,
            BadRequest => 400,
            Forbidden => 403,
            NotFound => 404,
            RequestEntityTooLarge => 413,
            InternalServerError => 500,
            NotImplemented => 501,
            ServiceUnavailable => 503,
        }
    }

    /// Unrecognized codes are mapped to `Unknown`.
    pub fn from_code(code: i64) -> Self {
        use Status::*;
        match code {
            200 => Success,
            400 => BadRequest,
            403 => Forbidden,
            404 => NotFound,
            413 => RequestEntityTooLarge,
            500 => InternalServerError,
            501 => NotImplemented,
            503 => ServiceUnavailable,
            _ => Unknown,
        }
    }
}

impl Serialize for Status {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StatusVisitor;

        impl<'de> Visitor<'de> for StatusVisitor {
            type Value = Status;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("an integer status code")
            }

            fn visit_i64<E>(self, value: i64) -> std::result::Result<Status, E> {
                Ok(Status::from_code(value))
            }

            fn visit_u64<E>(self, value: u64) -> std::result::Result<Status, E> {
                Ok(Status::from_code(value.min(i64::MAX as u64) as i64))
            }
        }

        deserializer.deserialize_i32(StatusVisitor)
    }
}

/// Kind of message carried by an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderType {
    /// Opaque application message.
    Message = 0,
    Config = 1,
    ConfigUpdate = 2,
    EndorserTransaction = 3,
    OrdererTransaction = 4,
    /// Seek request sent on the delivery stream.
    DeliverSeekInfo = 5,
}

impl HeaderType {
    pub fn from_i32(value: i32) -> Option<Self> {
        use HeaderType::*;
        let header_type = match value {
            0 => Message,
            1 => Config,
            2 => ConfigUpdate,
            3 => EndorserTransaction,
            4 => OrdererTransaction,
            5 => DeliverSeekInfo,
            _ => return None,
        };
        Some(header_type)
    }
}

/// Wall-clock time with nanoseconds resolution.
/// The default value (UNIX epoch) is used as "no time available" sentinel.
#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Timestamp { seconds, nanos }
    }

    /// Current system time.
    pub fn now() -> Self {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp {
            seconds: elapsed.as_secs() as i64,
            nanos: elapsed.subsec_nanos() as i32,
        }
    }

    /// Returns true for the epoch sentinel.
    pub fn is_zero(&self) -> bool {
        self.seconds == 0 && self.nanos == 0
    }
}

/// Signed and addressed wrapper of a serialized `Payload`.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone)]
pub struct Envelope {
    /// Serialized `Payload`.
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    /// Creator signature over the `payload` bytes.
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

/// Envelope content.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone)]
pub struct Payload {
    pub header: Header,
    /// Serialized message, its type depends on the channel header type.
    #[serde(with = "serde_bytes")]
    pub data: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone)]
pub struct Header {
    /// Serialized `ChannelHeader`.
    #[serde(with = "serde_bytes")]
    pub channel_header: Vec<u8>,
    /// Serialized `SignatureHeader`.
    #[serde(with = "serde_bytes")]
    pub signature_header: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone)]
pub struct ChannelHeader {
    /// `HeaderType` numeric value.
    pub header_type: i32,
    pub version: i32,
    /// Creation time as declared by the submitter.
    pub timestamp: Timestamp,
    pub channel_id: String,
    /// Transaction identifier.
    pub tx_id: String,
    pub epoch: u64,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone)]
pub struct SignatureHeader {
    /// Serialized `SerializedIdentity` of the creator.
    #[serde(with = "serde_bytes")]
    pub creator: Vec<u8>,
    /// Random value, used once.
    #[serde(with = "serde_bytes")]
    pub nonce: Vec<u8>,
}

/// Creator identity: membership provider identifier plus public key bytes.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone)]
pub struct SerializedIdentity {
    pub msp_id: String,
    #[serde(with = "serde_bytes")]
    pub id_bytes: Vec<u8>,
}

/// Wrapper of the application defined value submitted via broadcast.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone)]
pub struct ConfigValue {
    pub version: u64,
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
    pub mod_policy: String,
}

/// Position within the channel blocks sequence.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum SeekPosition {
    Oldest,
    Newest,
    Specified(u64),
}

/// Ordering service behavior when the requested block is not ready.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy)]
pub enum SeekBehavior {
    BlockUntilReady,
    FailIfNotReady,
}

/// Seek request, sent once at the beginning of a delivery stream.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct SeekInfo {
    pub start: SeekPosition,
    pub stop: SeekPosition,
    pub behavior: SeekBehavior,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone)]
pub struct BlockHeader {
    /// Block position within the channel.
    pub number: u64,
    #[serde(with = "serde_bytes")]
    pub previous_hash: Vec<u8>,
    /// Hash of the block data.
    #[serde(with = "serde_bytes")]
    pub data_hash: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone)]
pub struct BlockData {
    /// Serialized envelopes, in block order.
    pub data: Vec<ByteBuf>,
}

/// Ledger block as delivered by the ordering service.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub data: BlockData,
}

impl Block {
    pub fn new(number: u64, data_hash: Vec<u8>, envelopes: Vec<Vec<u8>>) -> Self {
        Block {
            header: BlockHeader {
                number,
                previous_hash: vec![],
                data_hash,
            },
            data: BlockData {
                data: envelopes.into_iter().map(ByteBuf::from).collect(),
            },
        }
    }

    pub fn number(&self) -> u64 {
        self.header.number
    }
}

/// Message received on the delivery stream.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum DeliverResponse {
    Status(Status),
    Block(Block),
}

/// Acknowledgement of one broadcast envelope.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct BroadcastResponse {
    pub status: Status,
    /// Optional human readable detail.
    pub info: String,
}

/// Transaction record produced by the block decoder.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct TransactionRecord {
    /// `block_number * tx_per_block + index_within_block`.
    pub global_sequence_number: u64,
    pub tx_id: String,
    pub timestamp: Timestamp,
}

/// Block summary record produced by the block decoder.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq, Eq, Clone)]
pub struct BlockSummary {
    pub number: u64,
    pub data_hash_hex: String,
    /// Number of envelopes declared by the block, decoded or not.
    pub transaction_count: usize,
    /// Timestamp of the last successfully decoded transaction.
    pub timestamp: Timestamp,
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::base::serialize::{rmp_deserialize, rmp_serialize};

    const BROADCAST_SUCCESS_HEX: &str = "92ccc8a0";
    const BROADCAST_BAD_REQUEST_HEX: &str = "92cd0190a26e6f";

    pub fn create_test_block(number: u64, envelopes: Vec<Vec<u8>>) -> Block {
        Block::new(number, vec![0xab, 0xcd, number as u8], envelopes)
    }

    #[test]
    fn status_codes() {
        let all = [
            Status::Unknown,
            Status::Success,
            Status::BadRequest,
            Status::Forbidden,
            Status::NotFound,
            Status::RequestEntityTooLarge,
            Status::InternalServerError,
            Status::NotImplemented,
            Status::ServiceUnavailable,
        ];

        for status in all {
            assert_eq!(Status::from_code(status.code() as i64), status);
        }
        assert_eq!(Status::from_code(999), Status::Unknown);
    }

    #[test]
    fn broadcast_response_serialize() {
        let ack = BroadcastResponse {
            status: Status::Success,
            info: String::new(),
        };

        let buf = rmp_serialize(&ack).unwrap();

        assert_eq!(hex::encode(&buf), BROADCAST_SUCCESS_HEX);
    }

    #[test]
    fn broadcast_response_deserialize() {
        let buf = hex::decode(BROADCAST_BAD_REQUEST_HEX).unwrap();

        let ack: BroadcastResponse = rmp_deserialize(&buf).unwrap();

        assert_eq!(ack.status, Status::BadRequest);
        assert_eq!(ack.info, "no");
    }

    #[test]
    fn unknown_status_deserialize() {
        // [ 999, "" ]
        let buf = hex::decode("92cd03e7a0").unwrap();

        let ack: BroadcastResponse = rmp_deserialize(&buf).unwrap();

        assert_eq!(ack.status, Status::Unknown);
    }

    #[test]
    fn header_type_values() {
        assert_eq!(HeaderType::from_i32(0), Some(HeaderType::Message));
        assert_eq!(HeaderType::from_i32(5), Some(HeaderType::DeliverSeekInfo));
        assert_eq!(HeaderType::from_i32(42), None);
        assert_eq!(HeaderType::DeliverSeekInfo as i32, 5);
    }

    #[test]
    fn timestamp_sentinel() {
        assert!(Timestamp::default().is_zero());
        assert!(!Timestamp::now().is_zero());
    }

    #[test]
    fn block_accessors() {
        let block = create_test_block(7, vec![vec![1], vec![2, 3]]);

        assert_eq!(block.number(), 7);
        assert_eq!(block.data.data.len(), 2);
        assert_eq!(block.data.data[1].as_ref(), &[2, 3]);
    }
}
