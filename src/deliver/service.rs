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
    base::schema::{DeliverResponse, Envelope, Status},
    db::Db,
    deliver::{client::DeliverSession, seek::SeekTarget},
    transport::{Sink, Source},
    Error, ErrorKind, Result,
};
use async_std::task;
use std::{
    sync::Arc,
    thread::{self, JoinHandle},
};

/// Delivery service data.
/// Runs one delivery session on a dedicated thread.
pub struct DeliverService<D, K, R>
where
    D: Db,
    K: Sink<Envelope>,
    R: Source<DeliverResponse>,
{
    /// Session waiting to be started.
    session: Option<DeliverSession<D, K, R>>,
    /// Where the session starts from.
    target: SeekTarget,
    /// Thread handle.
    handler: Option<JoinHandle<Result<Status>>>,
    /// To check if the worker thread is still alive.
    canary: Arc<()>,
}

impl<D, K, R> DeliverService<D, K, R>
where
    D: Db,
    K: Sink<Envelope>,
    R: Source<DeliverResponse>,
{
    /// Create a new delivery service instance.
    pub fn new(session: DeliverSession<D, K, R>, target: SeekTarget) -> Self {
        DeliverService {
            session: Some(session),
            target,
            handler: None,
            canary: Arc::new(()),
        }
    }

    /// Start delivery service.
    pub fn start(&mut self) {
        debug!("Starting deliver service");
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                warn!("service was already started");
                return;
            }
        };

        let target = self.target;
        let mut canary = Arc::clone(&self.canary);
        let handle = thread::spawn(move || {
            let _ = Arc::get_mut(&mut canary);
            task::block_on(session.run(target))
        });
        self.handler = Some(handle);
    }

    /// Check if service is running.
    pub fn is_running(&self) -> bool {
        // Intercepts both completed and crashed subthreads.
        Arc::strong_count(&self.canary) == 2 && self.session.is_none()
    }

    /// Wait for the session end and return its outcome.
    pub fn join(&mut self) -> Result<Status> {
        match self.handler.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(Error::new_ext(ErrorKind::Other, "deliver thread panicked"))),
            None => Err(Error::new_ext(
                ErrorKind::Other,
                "deliver service was not started",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        base::{envelope::tests::create_test_envelope_bytes, schema::tests::create_test_block},
        channel::{simple_channel, Receiver, Sender},
        crypto::sign::tests::create_test_signer,
        db::MemoryDb,
        deliver::DeliverConfig,
    };

    type TestService = DeliverService<MemoryDb, Sender<Envelope>, Receiver<DeliverResponse>>;

    fn create_deliver_service(
        db: Arc<MemoryDb>,
    ) -> (TestService, Receiver<Envelope>, Sender<DeliverResponse>) {
        let (req_tx, req_rx) = simple_channel::<Envelope>();
        let (res_tx, res_rx) = simple_channel::<DeliverResponse>();
        let session = DeliverSession::new(
            DeliverConfig::new("mychannel"),
            db,
            Arc::new(create_test_signer()),
            req_tx,
            res_rx,
        );
        (
            DeliverService::new(session, SeekTarget::Oldest),
            req_rx,
            res_tx,
        )
    }

    #[test]
    fn start_join() {
        let db = Arc::new(MemoryDb::new());
        let (mut svc, req_rx, res_tx) = create_deliver_service(db.clone());

        svc.start();
        assert!(svc.is_running());

        assert!(req_rx.recv_sync().is_ok());
        let block = create_test_block(3, vec![create_test_envelope_bytes("mychannel", b"9")]);
        res_tx.send_sync(DeliverResponse::Block(block)).unwrap();
        res_tx
            .send_sync(DeliverResponse::Status(Status::Success))
            .unwrap();

        assert_eq!(svc.join(), Ok(Status::Success));
        assert!(!svc.is_running());
        assert_eq!(db.last_block_number(), Some(3));
    }

    #[test]
    fn closed_stream_stops_service() {
        let db = Arc::new(MemoryDb::new());
        let (mut svc, _req_rx, res_tx) = create_deliver_service(db);

        svc.start();
        drop(res_tx);

        let err = svc.join().unwrap_err();
        assert_eq!(err.kind, ErrorKind::BadNetwork);
        assert!(!svc.is_running());
    }

    #[test]
    fn join_without_start() {
        let db = Arc::new(MemoryDb::new());
        let (mut svc, _, _) = create_deliver_service(db);

        assert_eq!(svc.join().unwrap_err().kind, ErrorKind::Other);
    }
}
