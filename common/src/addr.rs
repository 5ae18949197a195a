use std::{fmt::Display, str::FromStr};

use snafu::{Location, ResultExt, Snafu};
use url::Url;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display(
        "wrong connect address format: {addr}, expected: 'tcp://example.com:7000'"
    ))]
    WrongFormat {
        addr: String,
        #[snafu(source)]
        error: url::ParseError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("unexpected scheme: {input}"))]
    UnexpectedScheme {
        input: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("port number not found in {addr}"))]
    PortNotFound {
        addr: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("host not found in {addr}"))]
    HostNotFound {
        addr: String,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Scheme {
    Tcp,
}

impl Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scheme::Tcp => write!(f, "tcp"),
        }
    }
}

/// Host and port, not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addr(pub String, pub u16);

impl Display for Addr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.0, self.1)
    }
}

impl From<&Addr> for Addr {
    fn from(value: &Addr) -> Self {
        value.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ConnectAddress {
    scheme: Scheme,
    host: String,
    port: u16,
}

impl ConnectAddress {
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: Scheme::Tcp,
            host: host.into(),
            port,
        }
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn addr(&self) -> Addr {
        Addr(self.host.clone(), self.port)
    }
}

impl FromStr for ConnectAddress {
    type Err = Error;

    #[tracing::instrument]
    fn from_str(addr: &str) -> Result<Self, Self::Err> {
        let addr_url = Url::parse(addr).context(WrongFormatSnafu { addr })?;

        let scheme = match addr_url.scheme() {
            "tcp" => Scheme::Tcp,
            input => return UnexpectedSchemeSnafu { input }.fail(),
        };

        let Some(port) = addr_url.port() else {
            return PortNotFoundSnafu { addr }.fail();
        };

        let Some(host) = addr_url.host_str() else {
            return HostNotFoundSnafu { addr }.fail();
        };

        Ok(Self {
            scheme,
            host: host.trim_start_matches('[').trim_end_matches(']').to_owned(),
            port,
        })
    }
}

impl Display for ConnectAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}
