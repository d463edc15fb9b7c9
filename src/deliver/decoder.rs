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

//! Block decoding.
//!
//! Turns a delivered block into one transaction record per envelope plus a
//! block summary. Malformed envelopes are skipped one by one without
//! affecting the rest of the block.

use crate::{
    base::{
        envelope::{get_envelope_from_block, get_payload, unmarshal_channel_header},
        schema::{Block, BlockSummary, ConfigValue, Timestamp, TransactionRecord},
        serialize::rmp_deserialize,
    },
    Error, ErrorKind, Result,
};

/// Output of a block decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBlock {
    pub summary: BlockSummary,
    /// Successfully decoded records, in block order.
    pub transactions: Vec<TransactionRecord>,
    /// Number of skipped envelopes.
    pub failures: usize,
}

/// Block decoder.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    /// Global sequence number multiplier.
    tx_per_block: u64,
}

impl Decoder {
    pub fn new(tx_per_block: u64) -> Self {
        Decoder { tx_per_block }
    }

    /// Global sequence number of the `index`-th transaction of block `number`.
    pub fn global_sequence_number(&self, number: u64, index: usize) -> Result<u64> {
        number
            .checked_mul(self.tx_per_block)
            .and_then(|base| base.checked_add(index as u64))
            .ok_or_else(|| {
                Error::new_ext(
                    ErrorKind::MalformedData,
                    format!("sequence number overflow ({}, {})", number, index),
                )
            })
    }

    /// Decode a block.
    /// Returns `None` for the genesis block, that is never recorded.
    pub fn decode(&self, block: &Block) -> Option<DecodedBlock> {
        let number = block.number();
        if number == 0 {
            return None;
        }

        let mut transactions = Vec::with_capacity(block.data.data.len());
        let mut failures = 0;
        let mut last_timestamp = Timestamp::default();

        for (index, buf) in block.data.data.iter().enumerate() {
            match self.decode_transaction(number, index, buf) {
                Ok(record) => {
                    last_timestamp = record.timestamp;
                    transactions.push(record);
                }
                Err(err) => {
                    error!(
                        "[deliver] block {} tx {} skipped: {}",
                        number,
                        index,
                        err.to_string_full()
                    );
                    failures += 1;
                }
            }
        }

        let summary = BlockSummary {
            number,
            data_hash_hex: hex::encode(&block.header.data_hash),
            transaction_count: block.data.data.len(),
            timestamp: last_timestamp,
        };

        Some(DecodedBlock {
            summary,
            transactions,
            failures,
        })
    }

    fn decode_transaction(&self, number: u64, index: usize, buf: &[u8]) -> Result<TransactionRecord> {
        let env = get_envelope_from_block(buf)?;
        let payload = get_payload(&env)?;
        let channel_header = unmarshal_channel_header(&payload.header.channel_header)?;

        let msg: ConfigValue = rmp_deserialize(&payload.data)?;
        let value = std::str::from_utf8(&msg.value)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| {
                Error::new_ext(
                    ErrorKind::MalformedData,
                    format!("non numeric payload: {}", hex::encode(&msg.value)),
                )
            })?;
        debug!("[deliver] block number: {}, payload: {}", number, value);

        Ok(TransactionRecord {
            global_sequence_number: self.global_sequence_number(number, index)?,
            tx_id: channel_header.tx_id,
            timestamp: channel_header.timestamp,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::base::{
        envelope::tests::create_test_envelope_bytes,
        schema::{tests::create_test_block, ChannelHeader, Envelope, Header, Payload},
        serialize::rmp_serialize,
    };

    /// Envelope with explicit header fields, signature left empty.
    pub fn create_raw_envelope_bytes(tx_id: &str, timestamp: Timestamp, value: &[u8]) -> Vec<u8> {
        let channel_header = ChannelHeader {
            timestamp,
            channel_id: String::from("mychannel"),
            tx_id: tx_id.to_owned(),
            ..Default::default()
        };
        let data = ConfigValue {
            value: value.to_vec(),
            ..Default::default()
        };
        let payload = Payload {
            header: Header {
                channel_header: rmp_serialize(&channel_header).unwrap(),
                signature_header: vec![],
            },
            data: rmp_serialize(&data).unwrap(),
        };
        let env = Envelope {
            payload: rmp_serialize(&payload).unwrap(),
            signature: vec![],
        };
        rmp_serialize(&env).unwrap()
    }

    #[test]
    fn decode_block_five() {
        let decoder = Decoder::new(10);
        let block = create_test_block(
            5,
            vec![
                create_test_envelope_bytes("mychannel", b"1"),
                create_test_envelope_bytes("mychannel", b"2"),
            ],
        );

        let decoded = decoder.decode(&block).unwrap();

        assert_eq!(decoded.failures, 0);
        let gsns: Vec<u64> = decoded
            .transactions
            .iter()
            .map(|tx| tx.global_sequence_number)
            .collect();
        assert_eq!(gsns, vec![50, 51]);
        assert_eq!(decoded.summary.number, 5);
        assert_eq!(decoded.summary.transaction_count, 2);
        assert_eq!(decoded.summary.data_hash_hex, "abcd05");
        assert_eq!(decoded.summary.timestamp, decoded.transactions[1].timestamp);
    }

    #[test]
    fn decode_is_deterministic() {
        let decoder = Decoder::new(3);
        let block = create_test_block(
            2,
            vec![
                create_raw_envelope_bytes("a", Timestamp::new(10, 0), b"1"),
                create_raw_envelope_bytes("b", Timestamp::new(11, 0), b"2"),
            ],
        );

        let first = decoder.decode(&block);
        let second = decoder.decode(&block);

        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn sequence_number_formula() {
        for multiplier in [1u64, 7, 500] {
            let decoder = Decoder::new(multiplier);
            for number in [1u64, 2, 99, 1_000_000] {
                for index in [0usize, 1, 6] {
                    assert_eq!(
                        decoder.global_sequence_number(number, index).unwrap(),
                        number * multiplier + index as u64
                    );
                }
            }
        }
    }

    #[test]
    fn sequence_number_overflow() {
        let decoder = Decoder::new(10);
        let block = create_test_block(
            u64::MAX / 2,
            vec![create_raw_envelope_bytes("a", Timestamp::new(1, 0), b"1")],
        );

        let decoded = decoder.decode(&block).unwrap();

        assert!(decoded.transactions.is_empty());
        assert_eq!(decoded.failures, 1);
        assert_eq!(decoded.summary.transaction_count, 1);
    }

    #[test]
    fn genesis_block_skipped() {
        let decoder = Decoder::new(1);
        let block = create_test_block(0, vec![create_test_envelope_bytes("mychannel", b"1")]);

        assert!(decoder.decode(&block).is_none());
    }

    #[test]
    fn malformed_envelopes_skipped() {
        let decoder = Decoder::new(10);
        let block = create_test_block(
            3,
            vec![
                create_raw_envelope_bytes("a", Timestamp::new(100, 0), b"1"),
                vec![0xc1, 0xc1, 0xc1],
                create_raw_envelope_bytes("c", Timestamp::new(300, 5), b"3"),
                create_raw_envelope_bytes("d", Timestamp::new(400, 0), b"not a number"),
            ],
        );

        let decoded = decoder.decode(&block).unwrap();

        assert_eq!(decoded.failures, 2);
        assert_eq!(decoded.transactions.len(), 2);
        assert_eq!(decoded.transactions[0].tx_id, "a");
        assert_eq!(decoded.transactions[0].global_sequence_number, 30);
        assert_eq!(decoded.transactions[1].tx_id, "c");
        assert_eq!(decoded.transactions[1].global_sequence_number, 32);
        assert_eq!(decoded.summary.transaction_count, 4);
        // Last successfully decoded, not last in block.
        assert_eq!(decoded.summary.timestamp, Timestamp::new(300, 5));
    }

    #[test]
    fn empty_block_summary() {
        let decoder = Decoder::new(10);
        let block = create_test_block(7, vec![]);

        let decoded = decoder.decode(&block).unwrap();

        assert!(decoded.transactions.is_empty());
        assert_eq!(decoded.summary.transaction_count, 0);
        assert_eq!(decoded.summary.timestamp, Timestamp::default());
        assert!(decoded.summary.timestamp.is_zero());
    }

    #[test]
    fn all_failed_block_summary() {
        let decoder = Decoder::new(10);
        let block = create_test_block(7, vec![vec![0x00], vec![0x01]]);

        let decoded = decoder.decode(&block).unwrap();

        assert_eq!(decoded.failures, 2);
        assert_eq!(decoded.summary.transaction_count, 2);
        assert!(decoded.summary.timestamp.is_zero());
    }
}
