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

//! Framed TCP transport.
//!
//! Every message travels as a 4-byte big-endian length followed by the
//! MessagePack encoded body.

use crate::{
    base::serialize::{rmp_deserialize_owned, rmp_serialize},
    transport::{Sink, Source},
    Error, ErrorKind, Result,
};
use async_std::{
    io::{ReadExt, WriteExt},
    net::{TcpStream, ToSocketAddrs},
};
use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use std::{io, marker::PhantomData};

/// Largest accepted frame body.
pub const MAX_DATAGRAM_LEN: usize = 16 * 1024 * 1024;

/// Writing half of a framed connection.
pub struct TcpSink<T> {
    stream: TcpStream,
    _phantom: PhantomData<fn(T)>,
}

/// Reading half of a framed connection.
pub struct TcpSource<T> {
    stream: TcpStream,
    _phantom: PhantomData<fn() -> T>,
}

/// Connect to the ordering service and split the connection.
pub async fn connect<S, R, A>(addr: A) -> Result<(TcpSink<S>, TcpSource<R>)>
where
    A: ToSocketAddrs,
{
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|err| Error::new_ext(ErrorKind::BadNetwork, err))?;
    Ok(split(stream))
}

/// Split an established connection into its framed halves.
pub fn split<S, R>(stream: TcpStream) -> (TcpSink<S>, TcpSource<R>) {
    let sink = TcpSink {
        stream: stream.clone(),
        _phantom: PhantomData,
    };
    let source = TcpSource {
        stream,
        _phantom: PhantomData,
    };
    (sink, source)
}

async fn read_datagram(stream: &mut TcpStream) -> Result<Option<Vec<u8>>> {
    // Read the header
    let mut head = [0u8; 4];
    match stream.read_exact(&mut head).await {
        Ok(()) => (),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(Error::new_ext(ErrorKind::BadNetwork, err)),
    }
    let len = u32::from_be_bytes(head) as usize;
    if len > MAX_DATAGRAM_LEN {
        return Err(Error::new_ext(
            ErrorKind::MalformedData,
            format!("datagram too big ({} bytes)", len),
        ));
    }

    // Read the body
    let mut buf = vec![0u8; len];
    stream
        .read_exact(&mut buf)
        .await
        .map_err(|err| Error::new_ext(ErrorKind::BadNetwork, err))?;

    Ok(Some(buf))
}

async fn write_datagram(stream: &mut TcpStream, buf: Vec<u8>) -> Result<()> {
    if buf.len() > MAX_DATAGRAM_LEN {
        return Err(Error::new_ext(
            ErrorKind::MalformedData,
            format!("datagram too big ({} bytes)", buf.len()),
        ));
    }
    let head: [u8; 4] = (buf.len() as u32).to_be_bytes();
    stream
        .write_all(&head)
        .await
        .map_err(|err| Error::new_ext(ErrorKind::BadNetwork, err))?;
    stream
        .write_all(&buf)
        .await
        .map_err(|err| Error::new_ext(ErrorKind::BadNetwork, err))?;
    stream
        .flush()
        .await
        .map_err(|err| Error::new_ext(ErrorKind::BadNetwork, err))
}

impl<T: Serialize + Send + 'static> Sink<T> for TcpSink<T> {
    fn send(&mut self, item: T) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let buf = rmp_serialize(&item)?;
            write_datagram(&mut self.stream, buf).await
        })
    }
}

impl<T: DeserializeOwned + Send + 'static> Source<T> for TcpSource<T> {
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<T>>> {
        Box::pin(async move {
            match read_datagram(&mut self.stream).await? {
                Some(buf) => rmp_deserialize_owned(&buf).map(Some),
                None => Ok(None),
            }
        })
    }
}
