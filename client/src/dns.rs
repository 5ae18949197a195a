use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::net::SocketAddr;

use rsocket_common::addr::Addr;
use snafu::{OptionExt, ResultExt, Snafu};
use tokio::net::lookup_host;

pub trait DnsResolver: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn resolve(&self, addr: Addr) -> impl Future<Output = Result<SocketAddr, Self::Error>> + Send;
}

#[derive(Debug, Snafu)]
pub enum LocalDnsError {
    #[snafu(display("IO error for host {addr}"))]
    Io { addr: Addr, source: io::Error },
    #[snafu(display("No valid address found for host {addr}"))]
    NotFound { addr: Addr },
}

/// Resolves through the operating system, preferring IPv4 addresses.
#[derive(Debug, Clone, Default)]
pub struct LocalDnsResolver;

impl DnsResolver for LocalDnsResolver {
    type Error = LocalDnsError;

    #[tracing::instrument(skip(self))]
    async fn resolve(&self, addr: Addr) -> Result<SocketAddr, Self::Error> {
        let candidates: Vec<SocketAddr> = lookup_host((addr.0.as_str(), addr.1))
            .await
            .context(IoSnafu { addr: addr.clone() })?
            .filter(|candidate| {
                !candidate.ip().is_multicast() && !candidate.ip().is_unspecified()
            })
            .collect();
        candidates
            .iter()
            .find(|candidate| candidate.is_ipv4())
            .or_else(|| candidates.first())
            .copied()
            .context(NotFoundSnafu { addr })
    }
}
