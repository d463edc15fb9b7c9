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

//! Persistence sink for decoded blocks.

use crate::{
    base::schema::{BlockSummary, TransactionRecord},
    Result,
};
#[cfg(test)]
use mockall::automock;

pub mod memory;
#[cfg(feature = "with-rocksdb")]
pub mod rocks;

pub use memory::{MemoryDb, MemoryDbFork};
#[cfg(feature = "with-rocksdb")]
pub use rocks::{RocksDb, RocksDbFork};

/// Trait providing access to the database.
/// The handle is shared by all the block workers.
#[cfg_attr(test, automock(type DbForkType = MockDbFork;))]
pub trait Db: Send + Sync + 'static {
    /// Type representing a database fork.
    type DbForkType: DbFork;

    /// Load block summary by number.
    /// This can be used to fetch the last block by passing u64::MAX as the number.
    fn load_block(&self, number: u64) -> Option<BlockSummary>;

    /// Load transaction record by global sequence number.
    fn load_transaction(&self, gsn: u64) -> Option<TransactionRecord>;

    /// Lowest persisted block number, if any.
    fn first_block_number(&self) -> Option<u64>;

    /// Highest persisted block number, if any.
    fn last_block_number(&self) -> Option<u64>;

    /// Create database fork.
    /// A fork is a set of uncommited modifications to the database.
    fn fork_create(&self) -> Self::DbForkType;

    /// Commit modifications contained in a database fork.
    /// Either all the fork content is applied or nothing is.
    fn fork_merge(&self, fork: Self::DbForkType) -> Result<()>;
}

/// Database fork trait.
/// Used to atomically apply the records of one block to the database.
#[cfg_attr(test, automock)]
pub trait DbFork: Send + 'static {
    /// Insert a block summary row.
    fn insert_block(&mut self, summary: &BlockSummary) -> Result<()>;

    /// Insert a transaction row.
    fn insert_transaction(&mut self, record: &TransactionRecord) -> Result<()>;
}
