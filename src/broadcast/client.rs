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

//! Broadcast stream client.
//!
//! The stream carries no request identifier: an acknowledgement is bound to
//! its envelope only by the send-then-receive order. The stream is thus
//! locked for the whole exchange and at most one request is in flight.
//! The exchange runs in its own task, so it completes even when the caller
//! stops waiting and the next caller never reads a stale acknowledgement.

use crate::{
    base::{
        envelope::create_signed_envelope,
        schema::{BroadcastResponse, ConfigValue, Envelope, HeaderType, Status},
    },
    broadcast::BroadcastConfig,
    crypto::Signer,
    transport::{Sink, Source},
    Error, ErrorKind, Result,
};
use async_std::{sync::Mutex, task};
use futures::future;
use std::sync::Arc;

/// Client side of one broadcast stream, shareable between callers.
pub struct BroadcastClient<K, R>
where
    K: Sink<Envelope>,
    R: Source<BroadcastResponse>,
{
    stream: Arc<Mutex<(K, R)>>,
    client_id: String,
    channel_id: String,
    signer: Arc<dyn Signer>,
}

impl<K, R> BroadcastClient<K, R>
where
    K: Sink<Envelope>,
    R: Source<BroadcastResponse>,
{
    pub fn new(config: BroadcastConfig, signer: Arc<dyn Signer>, sink: K, source: R) -> Self {
        BroadcastClient {
            stream: Arc::new(Mutex::new((sink, source))),
            client_id: config.client_id,
            channel_id: config.channel_id,
            signer,
        }
    }

    /// Submit a transaction payload and wait for its acknowledgement.
    ///
    /// # Errors
    ///
    /// - `SigningFault` if the envelope cannot be signed. The stream is not
    ///   touched in this case.
    /// - `BadNetwork` if either the send or the acknowledgement receive fail.
    /// - `UnexpectedStatus` carrying the acknowledgement status if this is
    ///   not `Success`.
    ///
    /// The request is never retried.
    pub async fn broadcast(&self, payload: &[u8]) -> Result<()> {
        let msg = ConfigValue {
            value: payload.to_vec(),
            ..Default::default()
        };
        let env = create_signed_envelope(
            HeaderType::Message,
            &self.channel_id,
            self.signer.as_ref(),
            &msg,
            0,
            0,
        )?;

        let stream = self.stream.clone();
        let exchange = task::spawn(async move {
            let mut guard = stream.lock().await;
            let (sink, source) = &mut *guard;

            let send = async {
                sink.send(env).await.map_err(|err| {
                    Error::new_ext(
                        ErrorKind::BadNetwork,
                        format!("could not send: {}", err.to_string_full()),
                    )
                })
            };
            let recv = async {
                match source.recv().await? {
                    Some(ack) => Ok(ack),
                    None => Err(Error::new_ext(
                        ErrorKind::BadNetwork,
                        "broadcast stream closed",
                    )),
                }
            };
            let ((), ack) = future::try_join(send, recv).await?;
            Ok::<_, Error>(ack)
        });
        let ack = exchange.await?;

        match ack.status {
            Status::Success => {
                debug!("[broadcast] {}: transaction accepted", self.client_id);
                Ok(())
            }
            status => {
                warn!(
                    "[broadcast] {}: transaction rejected: {:?} {}",
                    self.client_id, status, ack.info
                );
                Err(Error::unexpected_status(status, ack.info))
            }
        }
    }

    /// Synchronous wrapper of `broadcast`.
    pub fn broadcast_sync(&self, payload: &[u8]) -> Result<()> {
        task::block_on(self.broadcast(payload))
    }
}
