use std::{io, net::SocketAddr};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use rsocket_common::addr::ConnectAddress;
use snafu::{IntoError, Location, ResultExt, Snafu};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::debug;

use super::{ClientTransport, DuplexConnection};
use crate::{
    connector::ConnectionSetup,
    dns::{DnsResolver, LocalDnsResolver},
    frame::FrameDecoding,
    BoxError,
};

/// Bytes of the frame length prefix.
const FRAME_LENGTH_FIELD: usize = 3;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("dns resolver error"))]
    DnsResolver {
        #[snafu(source)]
        error: BoxError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("tcp connect to {addr} error"))]
    Connect {
        addr: SocketAddr,
        #[snafu(source)]
        error: io::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("tcp connection read write error"))]
    ReadWrite {
        #[snafu(source)]
        error: io::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Frames over TCP with a 24-bit length prefix.
#[derive(Debug, Clone)]
pub struct TcpClientTransport<D = LocalDnsResolver>
where
    D: DnsResolver,
{
    address: ConnectAddress,
    dns_resolver: D,
}

impl TcpClientTransport<LocalDnsResolver> {
    pub fn new(address: ConnectAddress) -> Self {
        Self::with_dns_resolver(address, LocalDnsResolver)
    }
}

impl<D> TcpClientTransport<D>
where
    D: DnsResolver,
{
    pub fn with_dns_resolver(address: ConnectAddress, dns_resolver: D) -> Self {
        Self {
            address,
            dns_resolver,
        }
    }
}

impl<D> ClientTransport for TcpClientTransport<D>
where
    D: DnsResolver,
{
    type Connection = TcpConnection;
    type Error = Error;

    #[tracing::instrument(skip(self, setup), fields(address = %self.address))]
    async fn connect(&self, setup: &ConnectionSetup) -> Result<TcpConnection, Error> {
        let socket_addr = self
            .dns_resolver
            .resolve(self.address.addr())
            .await
            .map_err(|e| DnsResolverSnafu.into_error(Box::new(e)))?;
        let stream = TcpStream::connect(socket_addr)
            .await
            .context(ConnectSnafu { addr: socket_addr })?;
        stream.set_nodelay(true).context(ReadWriteSnafu)?;

        let codec = LengthDelimitedCodec::builder()
            .length_field_length(FRAME_LENGTH_FIELD)
            .max_frame_length(setup.max_inbound_payload_size())
            .new_codec();
        debug!(%socket_addr, frame_decoding = ?setup.frame_decoding(), "tcp connected");
        Ok(TcpConnection {
            framed: Framed::new(stream, codec),
            frame_decoding: setup.frame_decoding(),
        })
    }
}

pub struct TcpConnection {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    frame_decoding: FrameDecoding,
}

impl TcpConnection {
    pub fn peer_addr(&self) -> io::Result<SocketAddr> {
        self.framed.get_ref().peer_addr()
    }
}

impl DuplexConnection for TcpConnection {
    type Error = Error;

    async fn send(&mut self, frame: Bytes) -> Result<(), Error> {
        self.framed.send(frame).await.context(ReadWriteSnafu)
    }

    async fn receive(&mut self) -> Option<Result<Bytes, Error>> {
        let frame_decoding = self.frame_decoding;
        let frame = self.framed.next().await?;
        Some(
            frame
                .map(|frame| frame_decoding.decode(frame))
                .context(ReadWriteSnafu),
        )
    }

    async fn close(&mut self) -> Result<(), Error> {
        SinkExt::<Bytes>::close(&mut self.framed).await.context(ReadWriteSnafu)
    }
}
