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
        schema::{BlockSummary, Timestamp, TransactionRecord},
        serialize::{rmp_deserialize, rmp_serialize},
    },
    db::{Db, DbFork},
    Error, ErrorKind, Result,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};

const BLOCKS: &str = "block";
const TRANSACTIONS: &str = "transaction";

const COLUMN_FAMILIES: [&str; 2] = [BLOCKS, TRANSACTIONS];

/// Block table row: number, data hash hex, transaction count, reserved, timestamp.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct BlockRow(u64, String, u64, u64, Timestamp);

impl From<&BlockSummary> for BlockRow {
    fn from(summary: &BlockSummary) -> Self {
        BlockRow(
            summary.number,
            summary.data_hash_hex.clone(),
            summary.transaction_count as u64,
            0,
            summary.timestamp,
        )
    }
}

impl From<BlockRow> for BlockSummary {
    fn from(row: BlockRow) -> Self {
        BlockSummary {
            number: row.0,
            data_hash_hex: row.1,
            transaction_count: row.2 as usize,
            timestamp: row.4,
        }
    }
}

/// Transaction table row: global sequence number, transaction id,
/// four reserved columns, timestamp.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TransactionRow(u64, String, String, String, String, u64, Timestamp);

impl From<&TransactionRecord> for TransactionRow {
    fn from(record: &TransactionRecord) -> Self {
        TransactionRow(
            record.global_sequence_number,
            record.tx_id.clone(),
            String::new(),
            String::new(),
            String::new(),
            0,
            record.timestamp,
        )
    }
}

impl From<TransactionRow> for TransactionRecord {
    fn from(row: TransactionRow) -> Self {
        TransactionRecord {
            global_sequence_number: row.0,
            tx_id: row.1,
            timestamp: row.6,
        }
    }
}

fn column_family<'a>(db: &'a DB, name: &str) -> Result<&'a ColumnFamily> {
    db.cf_handle(name).ok_or_else(|| {
        Error::new_ext(
            ErrorKind::DatabaseFault,
            format!("missing column family '{}'", name),
        )
    })
}

/// Database implementation using rocks db.
pub struct RocksDb {
    db: Arc<DB>,
}

/// Database writeable batch.
/// This structure is obtained via the `fork_create` method and allows to
/// atomically apply a set of changes to the database.
/// In the end, the changes shall be merged into the database using the
/// database `fork_merge` method.
pub struct RocksDbFork {
    db: Arc<DB>,
    batch: WriteBatch,
}

impl RocksDb {
    /// Create/Open a database from the filesystem.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| {
                let mut cf_opts = Options::default();
                cf_opts.set_compression_type(rocksdb::DBCompressionType::Snappy);
                ColumnFamilyDescriptor::new(*name, cf_opts)
            })
            .collect();

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|err| Error::new_ext(ErrorKind::DatabaseFault, err))?;

        Ok(RocksDb { db: Arc::new(db) })
    }

    fn load_row(&self, cf_name: &str, key: u64) -> Option<Vec<u8>> {
        let cf = match column_family(&self.db, cf_name) {
            Ok(cf) => cf,
            Err(err) => {
                warn!("[db] {}", err.to_string_full());
                return None;
            }
        };
        self.db
            .get_cf(cf, key.to_be_bytes())
            .unwrap_or_else(|err| {
                warn!("[db] {} read failure: {}", cf_name, err);
                None
            })
    }

    /// First or last row of a column family, depending on the iteration mode.
    fn edge_row(&self, cf_name: &str, mode: IteratorMode) -> Option<Vec<u8>> {
        let cf = column_family(&self.db, cf_name).ok()?;
        let mut iter = self.db.iterator_cf(cf, mode);
        match iter.next()? {
            Ok((_, value)) => Some(value.to_vec()),
            Err(err) => {
                warn!("[db] {} scan failure: {}", cf_name, err);
                None
            }
        }
    }
}

impl Db for RocksDb {
    /// Fork type.
    type DbForkType = RocksDbFork;

    /// Get block summary by number.
    fn load_block(&self, number: u64) -> Option<BlockSummary> {
        let buf = match number {
            u64::MAX => self.edge_row(BLOCKS, IteratorMode::End)?,
            _ => self.load_row(BLOCKS, number)?,
        };
        rmp_deserialize::<BlockRow>(&buf).ok().map(Into::into)
    }

    /// Get transaction record by global sequence number.
    fn load_transaction(&self, gsn: u64) -> Option<TransactionRecord> {
        let buf = self.load_row(TRANSACTIONS, gsn)?;
        rmp_deserialize::<TransactionRow>(&buf).ok().map(Into::into)
    }

    fn first_block_number(&self) -> Option<u64> {
        let buf = self.edge_row(BLOCKS, IteratorMode::Start)?;
        rmp_deserialize::<BlockRow>(&buf).ok().map(|row| row.0)
    }

    fn last_block_number(&self) -> Option<u64> {
        self.load_block(u64::MAX).map(|summary| summary.number)
    }

    /// Create a fork.
    fn fork_create(&self) -> RocksDbFork {
        RocksDbFork {
            db: self.db.clone(),
            batch: WriteBatch::default(),
        }
    }

    /// Commit a fork.
    /// The whole batch is written atomically.
    fn fork_merge(&self, fork: RocksDbFork) -> Result<()> {
        self.db
            .write(fork.batch)
            .map_err(|err| Error::new_ext(ErrorKind::DatabaseFault, err))
    }
}

impl DbFork for RocksDbFork {
    fn insert_block(&mut self, summary: &BlockSummary) -> Result<()> {
        let cf = column_family(&self.db, BLOCKS)?;
        let row = rmp_serialize(&BlockRow::from(summary))?;
        self.batch.put_cf(cf, summary.number.to_be_bytes(), row);
        Ok(())
    }

    fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<()> {
        let cf = column_family(&self.db, TRANSACTIONS)?;
        let row = rmp_serialize(&TransactionRow::from(record))?;
        self.batch
            .put_cf(cf, record.global_sequence_number.to_be_bytes(), row);
        Ok(())
    }
}
