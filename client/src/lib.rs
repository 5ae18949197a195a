#![forbid(unsafe_code)]

use std::fmt::Display;

use snafu::{Location, Snafu};

pub mod connector;
pub mod data_mime;
pub mod dns;
pub mod frame;
pub mod requester;
pub mod transport;

pub use connector::{ConnectionSetup, Connector};
pub use frame::FrameDecoding;
pub use requester::{Requester, RequesterBuilder};
pub use transport::{ClientTransport, DuplexConnection};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurerStage {
    Strategies,
    Connector,
}

impl Display for ConfigurerStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigurerStage::Strategies => write!(f, "strategies"),
            ConfigurerStage::Connector => write!(f, "connector"),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display(
        "Cannot select default data mime type, decoders advertise {}; set the data mime type explicitly",
        rsocket_common::mime::display_list(formats)
    ))]
    AmbiguousConfiguration {
        formats: Vec<rsocket_common::MimeType>,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{stage} configurer #{index} failed"))]
    Configurer {
        stage: ConfigurerStage,
        index: usize,
        #[snafu(source)]
        error: BoxError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("transport connect error"))]
    Transport {
        #[snafu(source)]
        error: BoxError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("metadata error"))]
    Metadata {
        source: rsocket_common::metadata::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("no {kind} for {type_name} as {mime}"))]
    NoCodec {
        kind: &'static str,
        type_name: &'static str,
        mime: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("codec error"))]
    Codec {
        source: rsocket_common::codec::Error,
        #[snafu(implicit)]
        location: Location,
    },
}
