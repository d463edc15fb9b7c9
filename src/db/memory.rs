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

//! Volatile database, useful to embedders that only need the latest view
//! and for tests.

use crate::{
    base::{
        schema::{BlockSummary, TransactionRecord},
        RwLock,
    },
    db::{Db, DbFork},
    Result,
};
use std::collections::BTreeMap;

#[derive(Default)]
struct Tables {
    blocks: BTreeMap<u64, BlockSummary>,
    transactions: BTreeMap<u64, TransactionRecord>,
}

/// In-memory database.
#[derive(Default)]
pub struct MemoryDb {
    tables: RwLock<Tables>,
}

/// Pending in-memory modifications.
#[derive(Default)]
pub struct MemoryDbFork {
    blocks: Vec<BlockSummary>,
    transactions: Vec<TransactionRecord>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored block summaries.
    pub fn blocks_count(&self) -> usize {
        self.tables.read().blocks.len()
    }

    /// Number of stored transaction records.
    pub fn transactions_count(&self) -> usize {
        self.tables.read().transactions.len()
    }
}

impl Db for MemoryDb {
    type DbForkType = MemoryDbFork;

    fn load_block(&self, number: u64) -> Option<BlockSummary> {
        let tables = self.tables.read();
        match number {
            u64::MAX => tables.blocks.values().next_back().cloned(),
            _ => tables.blocks.get(&number).cloned(),
        }
    }

    fn load_transaction(&self, gsn: u64) -> Option<TransactionRecord> {
        self.tables.read().transactions.get(&gsn).cloned()
    }

    fn first_block_number(&self) -> Option<u64> {
        self.tables.read().blocks.keys().next().copied()
    }

    fn last_block_number(&self) -> Option<u64> {
        self.tables.read().blocks.keys().next_back().copied()
    }

    fn fork_create(&self) -> MemoryDbFork {
        MemoryDbFork::default()
    }

    fn fork_merge(&self, fork: MemoryDbFork) -> Result<()> {
        let mut tables = self.tables.write();
        for record in fork.transactions {
            tables
                .transactions
                .insert(record.global_sequence_number, record);
        }
        for summary in fork.blocks {
            tables.blocks.insert(summary.number, summary);
        }
        Ok(())
    }
}

impl DbFork for MemoryDbFork {
    fn insert_block(&mut self, summary: &BlockSummary) -> Result<()> {
        self.blocks.push(summary.clone());
        Ok(())
    }

    fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<()> {
        self.transactions.push(record.clone());
        Ok(())
    }
}
