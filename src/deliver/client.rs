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

//! Delivery stream client.

use crate::{
    base::schema::{DeliverResponse, Envelope, Status},
    crypto::Signer,
    db::Db,
    deliver::{
        decoder::Decoder,
        dispatcher::Dispatcher,
        seek::{build_seek_target, SeekTarget},
        DeliverConfig,
    },
    transport::{Sink, Source},
    Error, ErrorKind, Result,
};
use std::sync::Arc;

/// Client side of one delivery stream.
pub struct DeliverClient<K, R>
where
    K: Sink<Envelope>,
    R: Source<DeliverResponse>,
{
    /// Outbound stream, carries the seek request.
    sink: K,
    /// Inbound stream of blocks and statuses.
    source: R,
    channel_id: String,
    signer: Arc<dyn Signer>,
}

impl<K, R> DeliverClient<K, R>
where
    K: Sink<Envelope>,
    R: Source<DeliverResponse>,
{
    pub fn new(sink: K, source: R, channel_id: impl Into<String>, signer: Arc<dyn Signer>) -> Self {
        DeliverClient {
            sink,
            source,
            channel_id: channel_id.into(),
            signer,
        }
    }

    /// Request every block from the first one, then follow the tail.
    pub async fn seek_oldest(&mut self) -> Result<()> {
        self.seek(SeekTarget::Oldest).await
    }

    /// Request every block from the most recent one, then follow the tail.
    pub async fn seek_newest(&mut self) -> Result<()> {
        self.seek(SeekTarget::Newest).await
    }

    /// Request exactly one block.
    pub async fn seek_specified(&mut self, number: u64) -> Result<()> {
        self.seek(SeekTarget::Specified(number)).await
    }

    /// Sign and send the seek request.
    pub async fn seek(&mut self, target: SeekTarget) -> Result<()> {
        let env = build_seek_target(self.signer.as_ref(), &self.channel_id, target)?;
        debug!("[deliver] seek {:?} on '{}'", target, self.channel_id);
        self.sink.send(env).await
    }

    /// Process the delivery stream until the ordering service status.
    ///
    /// Blocks are queued to the dispatcher in arrival order, the genesis
    /// block is discarded. A `Success` status ends the stream normally, any
    /// other status is returned as `UnexpectedStatus`. A stream closed
    /// before the status, or a source failure of any kind, is a `BadNetwork`
    /// error.
    pub async fn read_until_close(&mut self, dispatcher: &Dispatcher) -> Result<Status> {
        loop {
            let msg = self.source.recv().await.map_err(|err| match err.kind {
                ErrorKind::BadNetwork => err,
                _ => {
                    warn!("[deliver] stream failure: {}", err.to_string_full());
                    Error::new_ext(ErrorKind::BadNetwork, err)
                }
            })?;
            let msg = match msg {
                Some(msg) => msg,
                None => {
                    warn!("[deliver] stream closed by peer");
                    return Err(Error::new_ext(
                        ErrorKind::BadNetwork,
                        "delivery stream closed",
                    ));
                }
            };
            match msg {
                DeliverResponse::Status(Status::Success) => {
                    info!("[deliver] delivery completed");
                    return Ok(Status::Success);
                }
                DeliverResponse::Status(status) => {
                    warn!("[deliver] delivery status: {:?}", status);
                    return Err(Error::unexpected_status(status, "deliver"));
                }
                DeliverResponse::Block(block) if block.number() == 0 => {
                    debug!("[deliver] genesis block discarded");
                }
                DeliverResponse::Block(block) => {
                    debug!(
                        "[deliver] block {} ({} envelopes)",
                        block.number(),
                        block.data.data.len()
                    );
                    dispatcher.dispatch(block).await?;
                }
            }
        }
    }
}

/// A complete delivery session: seek, stream, decode and persist.
pub struct DeliverSession<D, K, R>
where
    D: Db,
    K: Sink<Envelope>,
    R: Source<DeliverResponse>,
{
    config: DeliverConfig,
    db: Arc<D>,
    client: DeliverClient<K, R>,
}

impl<D, K, R> DeliverSession<D, K, R>
where
    D: Db,
    K: Sink<Envelope>,
    R: Source<DeliverResponse>,
{
    pub fn new(config: DeliverConfig, db: Arc<D>, signer: Arc<dyn Signer>, sink: K, source: R) -> Self {
        let client = DeliverClient::new(sink, source, config.channel_id.clone(), signer);
        DeliverSession { config, db, client }
    }

    /// Run the session.
    /// Returns once the stream is over and every received block has been
    /// processed by the workers.
    pub async fn run(mut self, target: SeekTarget) -> Result<Status> {
        self.client.seek(target).await?;

        let dispatcher = Dispatcher::new(
            self.db.clone(),
            Decoder::new(self.config.tx_per_block),
            self.config.workers,
            self.config.queue_bound,
        );
        let outcome = self.client.read_until_close(&dispatcher).await;

        let report = dispatcher.shutdown().await;
        info!(
            "[deliver] session over: {} blocks persisted, {} dropped, {} transactions skipped",
            report.blocks_persisted, report.blocks_dropped, report.transactions_skipped
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::{
            envelope::tests::create_test_envelope_bytes,
            schema::{tests::create_test_block, SeekPosition, SignatureHeader},
        },
        channel::{simple_channel, Receiver, Sender},
        crypto::{sign::tests::create_test_signer, MockSigner},
        db::MemoryDb,
        deliver::seek::tests::open_seek_envelope,
    };
    use async_std::task;
    use futures::future::BoxFuture;
    use std::collections::VecDeque;

    /// Source replaying a fixed sequence of outcomes.
    struct ScriptedSource(VecDeque<Result<Option<DeliverResponse>>>);

    impl Source<DeliverResponse> for ScriptedSource {
        fn recv(&mut self) -> BoxFuture<'_, Result<Option<DeliverResponse>>> {
            let next = self.0.pop_front().unwrap_or(Ok(None));
            Box::pin(async move { next })
        }
    }

    struct Orderer {
        requests: Receiver<Envelope>,
        responses: Sender<DeliverResponse>,
    }

    type TestSession = DeliverSession<MemoryDb, Sender<Envelope>, Receiver<DeliverResponse>>;

    fn create_test_session(db: Arc<MemoryDb>, signer: Arc<dyn Signer>) -> (TestSession, Orderer) {
        let (req_tx, req_rx) = simple_channel::<Envelope>();
        let (res_tx, res_rx) = simple_channel::<DeliverResponse>();
        let config = DeliverConfig {
            tx_per_block: 10,
            workers: 2,
            queue_bound: 2,
            ..DeliverConfig::new("mychannel")
        };
        let session = DeliverSession::new(config, db, signer, req_tx, res_rx);
        let orderer = Orderer {
            requests: req_rx,
            responses: res_tx,
        };
        (session, orderer)
    }

    fn test_block(number: u64, count: usize) -> DeliverResponse {
        let envelopes = (0..count)
            .map(|i| create_test_envelope_bytes("mychannel", i.to_string().as_bytes()))
            .collect();
        DeliverResponse::Block(create_test_block(number, envelopes))
    }

    #[test]
    fn specified_block_persisted() {
        let db = Arc::new(MemoryDb::new());
        let (session, orderer) = create_test_session(db.clone(), Arc::new(create_test_signer()));
        orderer.responses.send_sync(test_block(5, 2)).unwrap();
        orderer
            .responses
            .send_sync(DeliverResponse::Status(Status::Success))
            .unwrap();

        let status = task::block_on(session.run(SeekTarget::Specified(5))).unwrap();

        assert_eq!(status, Status::Success);
        let (channel_id, info) = open_seek_envelope(&orderer.requests.recv_sync().unwrap());
        assert_eq!(channel_id, "mychannel");
        assert_eq!(info.start, SeekPosition::Specified(5));
        assert_eq!(info.stop, SeekPosition::Specified(5));
        assert_eq!(db.transactions_count(), 2);
        assert!(db.load_transaction(50).is_some());
        assert!(db.load_transaction(51).is_some());
        let summary = db.load_block(5).unwrap();
        assert_eq!(summary.transaction_count, 2);
        assert_eq!(summary.timestamp, db.load_transaction(51).unwrap().timestamp);
    }

    #[test]
    fn only_one_seek_request() {
        let db = Arc::new(MemoryDb::new());
        let (session, orderer) = create_test_session(db, Arc::new(create_test_signer()));
        for number in 1..=3 {
            orderer.responses.send_sync(test_block(number, 1)).unwrap();
        }
        orderer
            .responses
            .send_sync(DeliverResponse::Status(Status::Success))
            .unwrap();

        task::block_on(session.run(SeekTarget::Oldest)).unwrap();

        let (_, info) = open_seek_envelope(&orderer.requests.recv_sync().unwrap());
        assert_eq!(info.start, SeekPosition::Oldest);
        orderer.requests.close();
        assert!(orderer.requests.recv_sync().is_err());
    }

    #[test]
    fn genesis_block_discarded() {
        let db = Arc::new(MemoryDb::new());
        let (session, orderer) = create_test_session(db.clone(), Arc::new(create_test_signer()));
        orderer.responses.send_sync(test_block(0, 3)).unwrap();
        orderer.responses.send_sync(test_block(1, 1)).unwrap();
        orderer
            .responses
            .send_sync(DeliverResponse::Status(Status::Success))
            .unwrap();

        task::block_on(session.run(SeekTarget::Oldest)).unwrap();

        assert_eq!(db.load_block(0), None);
        assert_eq!(db.blocks_count(), 1);
        assert_eq!(db.transactions_count(), 1);
    }

    #[test]
    fn failure_status_is_terminal() {
        let db = Arc::new(MemoryDb::new());
        let (session, orderer) = create_test_session(db.clone(), Arc::new(create_test_signer()));
        orderer.responses.send_sync(test_block(1, 1)).unwrap();
        orderer
            .responses
            .send_sync(DeliverResponse::Status(Status::NotFound))
            .unwrap();
        orderer.responses.send_sync(test_block(2, 1)).unwrap();

        let err = task::block_on(session.run(SeekTarget::Newest)).unwrap_err();

        assert_eq!(err.kind, ErrorKind::UnexpectedStatus);
        assert_eq!(err.status(), Some(Status::NotFound));
        // Blocks received before the status are still processed.
        assert_eq!(db.last_block_number(), Some(1));
    }

    #[test]
    fn success_status_is_terminal() {
        let db = Arc::new(MemoryDb::new());
        let (session, orderer) = create_test_session(db.clone(), Arc::new(create_test_signer()));
        orderer
            .responses
            .send_sync(DeliverResponse::Status(Status::Success))
            .unwrap();
        orderer.responses.send_sync(test_block(7, 1)).unwrap();

        let status = task::block_on(session.run(SeekTarget::Specified(7))).unwrap();

        assert_eq!(status, Status::Success);
        assert_eq!(db.blocks_count(), 0);
    }

    #[test]
    fn stream_closed_before_status() {
        let db = Arc::new(MemoryDb::new());
        let (session, orderer) = create_test_session(db.clone(), Arc::new(create_test_signer()));
        orderer.responses.send_sync(test_block(1, 2)).unwrap();
        drop(orderer.responses);

        let err = task::block_on(session.run(SeekTarget::Oldest)).unwrap_err();

        assert_eq!(err.kind, ErrorKind::BadNetwork);
        assert_eq!(db.transactions_count(), 2);
    }

    #[test]
    fn seek_send_failure() {
        let db = Arc::new(MemoryDb::new());
        let (session, orderer) = create_test_session(db.clone(), Arc::new(create_test_signer()));
        orderer.responses.send_sync(test_block(1, 1)).unwrap();
        drop(orderer.requests);

        let err = task::block_on(session.run(SeekTarget::Oldest)).unwrap_err();

        assert_eq!(err.kind, ErrorKind::BadNetwork);
        assert_eq!(db.blocks_count(), 0);
    }

    #[test]
    fn seek_signing_failure() {
        let mut signer = MockSigner::new();
        signer
            .expect_signature_header()
            .returning(|| Ok(SignatureHeader::default()));
        signer
            .expect_sign()
            .returning(|_| Err(Error::new(ErrorKind::Other)));
        let db = Arc::new(MemoryDb::new());
        let (session, orderer) = create_test_session(db, Arc::new(signer));

        let err = task::block_on(session.run(SeekTarget::Oldest)).unwrap_err();

        assert_eq!(err.kind, ErrorKind::SigningFault);
        orderer.requests.close();
        assert!(orderer.requests.recv_sync().is_err());
    }

    #[test]
    fn client_seek_forms() {
        let (req_tx, req_rx) = simple_channel::<Envelope>();
        let (_res_tx, res_rx) = simple_channel::<DeliverResponse>();
        let mut client = DeliverClient::new(req_tx, res_rx, "ch", Arc::new(create_test_signer()));

        task::block_on(async {
            client.seek_oldest().await.unwrap();
            client.seek_newest().await.unwrap();
            client.seek_specified(3).await.unwrap();
        });

        let starts: Vec<SeekPosition> = (0..3)
            .map(|_| open_seek_envelope(&req_rx.recv_sync().unwrap()).1.start)
            .collect();
        assert_eq!(
            starts,
            vec![
                SeekPosition::Oldest,
                SeekPosition::Newest,
                SeekPosition::Specified(3)
            ]
        );
    }

    #[test]
    fn undecodable_frame_is_bad_network() {
        let db = Arc::new(MemoryDb::new());
        let (req_tx, _req_rx) = simple_channel::<Envelope>();
        let source = ScriptedSource(
            vec![
                Ok(Some(test_block(1, 1))),
                Err(Error::new_ext(ErrorKind::MalformedData, "bad frame")),
            ]
            .into_iter()
            .collect(),
        );
        let config = DeliverConfig {
            tx_per_block: 10,
            ..DeliverConfig::new("mychannel")
        };
        let session = DeliverSession::new(
            config,
            db.clone(),
            Arc::new(create_test_signer()),
            req_tx,
            source,
        );

        let err = task::block_on(session.run(SeekTarget::Oldest)).unwrap_err();

        assert_eq!(err.kind, ErrorKind::BadNetwork);
        assert_eq!(db.blocks_count(), 1);
    }
}
