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

//! Decode and persist worker pool.
//!
//! The receive loop pushes blocks into a bounded queue consumed by a fixed
//! number of workers. Pushing waits only when the queue is full.
//! Decoding and database writes run on the blocking thread pool.
//! Blocks are persisted atomically, one database fork per block, and no
//! ordering is guaranteed between different blocks.

use crate::{
    base::{schema::Block, Mutex},
    channel::{bounded_channel, Sender},
    db::{Db, DbFork},
    deliver::decoder::{DecodedBlock, Decoder},
    Error, ErrorKind, Result,
};
use async_std::task::{self, JoinHandle};
use std::sync::Arc;

/// Counters collected by the workers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Blocks whose records have been committed.
    pub blocks_persisted: u64,
    /// Blocks dropped because of a database failure.
    pub blocks_dropped: u64,
    /// Envelopes skipped by the decoder.
    pub transactions_skipped: u64,
}

/// Write the block records within a single fork.
/// Nothing is written if any insert fails.
pub fn persist_block<D: Db>(db: &D, decoded: &DecodedBlock) -> Result<()> {
    let mut fork = db.fork_create();
    for record in &decoded.transactions {
        fork.insert_transaction(record)?;
    }
    fork.insert_block(&decoded.summary)?;
    db.fork_merge(fork)
}

fn process_block<D: Db>(db: &D, decoder: &Decoder, block: &Block, report: &Mutex<DispatchReport>) {
    let decoded = match decoder.decode(block) {
        Some(decoded) => decoded,
        None => return,
    };
    let result = persist_block(db, &decoded);

    let mut report = report.lock();
    report.transactions_skipped += decoded.failures as u64;
    match result {
        Ok(()) => {
            debug!(
                "[dispatch] block {} persisted ({} records)",
                decoded.summary.number,
                decoded.transactions.len()
            );
            report.blocks_persisted += 1;
        }
        Err(err) => {
            warn!(
                "[dispatch] block {} dropped: {}",
                decoded.summary.number,
                err.to_string_full()
            );
            report.blocks_dropped += 1;
        }
    }
}

/// Bounded pool of decode and persist workers.
pub struct Dispatcher {
    /// Queue towards the workers.
    sender: Sender<Block>,
    /// Workers handles.
    workers: Vec<JoinHandle<()>>,
    report: Arc<Mutex<DispatchReport>>,
}

impl Dispatcher {
    /// Spawn `workers` workers fed through a queue of `queue_bound` blocks.
    /// Zero values are raised to one.
    pub fn new<D: Db>(db: Arc<D>, decoder: Decoder, workers: usize, queue_bound: usize) -> Self {
        let (sender, receiver) = bounded_channel::<Block>(queue_bound);
        let report = Arc::new(Mutex::new(DispatchReport::default()));

        let workers = (0..workers.max(1))
            .map(|id| {
                let receiver = receiver.clone();
                let db = db.clone();
                let report = report.clone();
                task::spawn(async move {
                    while let Ok(block) = receiver.recv().await {
                        let db = db.clone();
                        let report = report.clone();
                        // Database writes are synchronous.
                        task::spawn_blocking(move || {
                            process_block(db.as_ref(), &decoder, &block, &report)
                        })
                        .await;
                    }
                    debug!("[dispatch] worker {} exit", id);
                })
            })
            .collect();

        Dispatcher {
            sender,
            workers,
            report,
        }
    }

    /// Queue a block for decoding and persistence.
    pub async fn dispatch(&self, block: Block) -> Result<()> {
        self.sender
            .send(block)
            .await
            .map_err(|err| Error::new_ext(ErrorKind::Other, err))
    }

    /// Close the queue and wait for the workers to process every queued block.
    pub async fn shutdown(self) -> DispatchReport {
        self.sender.close();
        for worker in self.workers {
            worker.await;
        }
        let report = *self.report.lock();
        report
    }
}
