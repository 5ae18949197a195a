use std::time::Duration;

use bytes::Bytes;
use rsocket_common::MimeType;

use crate::frame::FrameDecoding;

/// Largest frame a 24-bit length prefix can describe.
pub const MAX_FRAME_LENGTH: usize = 0xFF_FFFF;

/// Transport-level settings, adjustable by connector configurers before a
/// connection is established.
#[derive(Debug, Clone)]
pub struct Connector {
    keepalive_interval: Duration,
    keepalive_max_lifetime: Duration,
    mtu: Option<usize>,
    max_inbound_payload_size: usize,
}

impl Default for Connector {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(20),
            keepalive_max_lifetime: Duration::from_secs(90),
            mtu: None,
            max_inbound_payload_size: MAX_FRAME_LENGTH,
        }
    }
}

impl Connector {
    pub fn keepalive(&mut self, interval: Duration, max_lifetime: Duration) -> &mut Self {
        self.keepalive_interval = interval;
        self.keepalive_max_lifetime = max_lifetime;
        self
    }

    /// Fragment outbound frames larger than `mtu`. `None` disables fragmentation.
    pub fn mtu(&mut self, mtu: Option<usize>) -> &mut Self {
        self.mtu = mtu;
        self
    }

    /// Capped at [`MAX_FRAME_LENGTH`].
    pub fn max_inbound_payload_size(&mut self, size: usize) -> &mut Self {
        self.max_inbound_payload_size = size.min(MAX_FRAME_LENGTH);
        self
    }

    pub(crate) fn finish(
        self,
        data_mime_type: MimeType,
        metadata_mime_type: MimeType,
        frame_decoding: FrameDecoding,
        setup_payload: SetupPayload,
    ) -> ConnectionSetup {
        ConnectionSetup {
            data_mime_type,
            metadata_mime_type,
            frame_decoding,
            keepalive_interval: self.keepalive_interval,
            keepalive_max_lifetime: self.keepalive_max_lifetime,
            mtu: self.mtu,
            max_inbound_payload_size: self.max_inbound_payload_size,
            setup_payload,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupPayload {
    pub data: Option<Bytes>,
    pub metadata: Option<Bytes>,
}

/// Everything a transport needs to open a connection. Immutable.
#[derive(Debug, Clone)]
pub struct ConnectionSetup {
    data_mime_type: MimeType,
    metadata_mime_type: MimeType,
    frame_decoding: FrameDecoding,
    keepalive_interval: Duration,
    keepalive_max_lifetime: Duration,
    mtu: Option<usize>,
    max_inbound_payload_size: usize,
    setup_payload: SetupPayload,
}

impl ConnectionSetup {
    pub fn data_mime_type(&self) -> &MimeType {
        &self.data_mime_type
    }

    pub fn metadata_mime_type(&self) -> &MimeType {
        &self.metadata_mime_type
    }

    pub fn frame_decoding(&self) -> FrameDecoding {
        self.frame_decoding
    }

    pub fn keepalive_interval(&self) -> Duration {
        self.keepalive_interval
    }

    pub fn keepalive_max_lifetime(&self) -> Duration {
        self.keepalive_max_lifetime
    }

    pub fn mtu(&self) -> Option<usize> {
        self.mtu
    }

    pub fn max_inbound_payload_size(&self) -> usize {
        self.max_inbound_payload_size
    }

    pub fn setup_payload(&self) -> &SetupPayload {
        &self.setup_payload
    }
}
