use bytes::{Bytes, BytesMut};
use rsocket_common::buffer::{Allocator, BufferFactory};

/// How received frames are turned into payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDecoding {
    /// Payloads alias the transport's receive buffer.
    ZeroCopy,
    /// Payloads are copied out of the receive buffer.
    Copying,
}

impl FrameDecoding {
    /// Zero-copy only for buffer factories whose memory may alias transport
    /// buffers.
    pub fn select(factory: &dyn BufferFactory) -> Self {
        match factory.allocator() {
            Allocator::Pooled => FrameDecoding::ZeroCopy,
            Allocator::Heap => FrameDecoding::Copying,
        }
    }

    pub fn decode(self, frame: BytesMut) -> Bytes {
        match self {
            FrameDecoding::ZeroCopy => frame.freeze(),
            FrameDecoding::Copying => Bytes::copy_from_slice(&frame),
        }
    }
}
