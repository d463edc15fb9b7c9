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

//! Message stream capabilities towards the ordering service.
//!
//! Sessions are generic over these traits, so the same client code runs on
//! top of the framed TCP transport or of in-process channels.

use crate::Result;
use futures::future::BoxFuture;

#[cfg(feature = "tcp")]
pub mod tcp;

/// Outbound half of a message stream.
pub trait Sink<T>: Send + 'static {
    /// Send one item. A broken stream is reported as `BadNetwork`.
    fn send(&mut self, item: T) -> BoxFuture<'_, Result<()>>;
}

/// Inbound half of a message stream.
pub trait Source<T>: Send + 'static {
    /// Receive the next item.
    /// Returns `None` once the peer has closed the stream.
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<T>>>;
}
