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

//! Ordering service client.
//!
//! Streams blocks from a channel of a distributed-ledger ordering service,
//! decodes them into transaction records persisted to a local database and
//! submits new transactions waiting for their acknowledgement.

// External crates macros.
#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

// Public modules.
pub mod base;
pub mod broadcast;
pub mod channel;
pub mod config;
pub mod crypto;
pub mod db;
pub mod deliver;
pub mod error;
pub mod transport;

pub use base::{Block, BlockSummary, DeliverResponse, Envelope, Status, TransactionRecord};
pub use broadcast::{BroadcastClient, BroadcastConfig};
pub use config::ClientConfig;
pub use crypto::{KeyPair, LocalSigner, PublicKey, Signer};
pub use deliver::{DeliverConfig, DeliverService, DeliverSession, SeekTarget};
pub use error::{Error, ErrorKind, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: &str = env!("CARGO_PKG_VERSION_MAJOR");
pub const VERSION_MINOR: &str = env!("CARGO_PKG_VERSION_MINOR");
pub const VERSION_PATCH: &str = env!("CARGO_PKG_VERSION_PATCH");
pub const VERSION_PRE: &str = env!("CARGO_PKG_VERSION_PRE");
