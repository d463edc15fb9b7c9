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

//! Bounded mpmc channel built on top of async-std channel.
//!
//! Used as the queue between the delivery receive loop and the block workers
//! and, through the `Sink`/`Source` implementations, as an in-process
//! transport towards an ordering service living in the same process.

use crate::{
    transport::{Sink, Source},
    Error, ErrorKind, Result,
};
use async_std::{
    channel::{self as async_channel, Receiver as AsyncReceiver, Sender as AsyncSender},
    task,
};
use futures::future::BoxFuture;
use std::fmt::Display;

/// Default upper bound to outstanding channel elements.
const CHANNEL_BOUND: usize = 1000;

/// Errors which can be triggered by a channel.
#[derive(Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// Error during send. Broken channel.
    SendError,
    /// Error during receive. Broken channel.
    RecvError,
}

impl std::error::Error for ChannelError {}

impl Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            ChannelError::SendError => "channel send error",
            ChannelError::RecvError => "channel recv error",
        };
        write!(f, "{}", msg)
    }
}

/// Creates a mpmc channel holding at most `bound` outstanding elements.
/// A zero bound is raised to one.
pub fn bounded_channel<T>(bound: usize) -> (Sender<T>, Receiver<T>) {
    let (sender, receiver) = async_channel::bounded::<T>(bound.max(1));
    (Sender(sender), Receiver(receiver))
}

/// Creates a mpmc channel with the default bound.
pub fn simple_channel<T>() -> (Sender<T>, Receiver<T>) {
    bounded_channel(CHANNEL_BOUND)
}

/// Channel sender side.
pub struct Sender<T>(AsyncSender<T>);

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Sender(self.0.clone())
    }
}

impl<T> Sender<T> {
    /// Push an element, waiting while the channel is full.
    pub async fn send(&self, item: T) -> std::result::Result<(), ChannelError> {
        self.0.send(item).await.map_err(|_| ChannelError::SendError)
    }

    /// Synchronous wrapper of `send`.
    pub fn send_sync(&self, item: T) -> std::result::Result<(), ChannelError> {
        task::block_on(self.send(item))
    }

    /// Closes the channel.
    /// Returns true if this call has closed the channel and it was not closed already.
    /// The remaining messages can still be received.
    pub fn close(&self) -> bool {
        self.0.close()
    }
}

/// Channel receiver side.
pub struct Receiver<T>(AsyncReceiver<T>);

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Receiver(self.0.clone())
    }
}

impl<T> Receiver<T> {
    /// Wait for the next element.
    /// Fails once the channel is closed and drained.
    pub async fn recv(&self) -> std::result::Result<T, ChannelError> {
        self.0.recv().await.map_err(|_| ChannelError::RecvError)
    }

    /// Synchronous wrapper of `recv`.
    pub fn recv_sync(&self) -> std::result::Result<T, ChannelError> {
        task::block_on(self.recv())
    }

    /// Closes the channel.
    pub fn close(&self) -> bool {
        self.0.close()
    }
}

impl<T: Send + 'static> Sink<T> for Sender<T> {
    fn send(&mut self, item: T) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.0
                .send(item)
                .await
                .map_err(|_| Error::new_ext(ErrorKind::BadNetwork, ChannelError::SendError))
        })
    }
}

impl<T: Send + 'static> Source<T> for Receiver<T> {
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<T>>> {
        Box::pin(async move { Ok(self.0.recv().await.ok()) })
    }
}
