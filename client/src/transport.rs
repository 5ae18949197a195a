pub mod tcp;

use std::future::Future;

use bytes::Bytes;

use crate::connector::ConnectionSetup;

/// Opens connections to a remote responder.
///
/// Timeouts and retries of the connect attempt belong to the transport.
pub trait ClientTransport: Send + Sync {
    type Connection: DuplexConnection;
    type Error: std::error::Error + Send + Sync + 'static;

    fn connect(
        &self,
        setup: &ConnectionSetup,
    ) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send;
}

/// A connected, framed byte channel.
pub trait DuplexConnection: Send + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn send(&mut self, frame: Bytes) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// `None` once the remote side closed the connection.
    fn receive(&mut self) -> impl Future<Output = Option<Result<Bytes, Self::Error>>> + Send;

    fn close(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;
}
