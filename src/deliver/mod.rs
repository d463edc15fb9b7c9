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

//! Delivery side: seek a channel position, stream its blocks and persist
//! their records.

pub mod client;
pub mod decoder;
pub mod dispatcher;
pub mod seek;
pub mod service;

pub use client::{DeliverClient, DeliverSession};
pub use decoder::{DecodedBlock, Decoder};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use seek::{build_seek, SeekTarget};
pub use service::DeliverService;

/// Default number of decode and persist workers.
pub const DEFAULT_WORKERS: usize = 4;
/// Default number of blocks waiting for a worker.
pub const DEFAULT_QUEUE_BOUND: usize = 64;
/// Default global sequence number multiplier.
pub const DEFAULT_TX_PER_BLOCK: u64 = 1;

/// Delivery session configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DeliverConfig {
    /// Channel to stream blocks from.
    pub channel_id: String,
    /// Global sequence number multiplier.
    #[serde(default = "default_tx_per_block")]
    pub tx_per_block: u64,
    /// Number of decode and persist workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Max number of blocks waiting for a worker.
    #[serde(default = "default_queue_bound")]
    pub queue_bound: usize,
}

fn default_tx_per_block() -> u64 {
    DEFAULT_TX_PER_BLOCK
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_queue_bound() -> usize {
    DEFAULT_QUEUE_BOUND
}

impl DeliverConfig {
    pub fn new(channel_id: impl Into<String>) -> Self {
        DeliverConfig {
            channel_id: channel_id.into(),
            tx_per_block: DEFAULT_TX_PER_BLOCK,
            workers: DEFAULT_WORKERS,
            queue_bound: DEFAULT_QUEUE_BOUND,
        }
    }
}
