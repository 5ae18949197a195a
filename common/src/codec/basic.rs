//! Codecs for plain strings and raw bytes. These form the default codec set of
//! [`crate::strategies::StrategiesBuilder`].

use std::any::{type_name, Any, TypeId};

use bytes::{BufMut, Bytes, BytesMut};
use snafu::{IntoError, OptionExt};

use super::{
    mime_label, supports_mime, DecodeSnafu, Decoder, Encoder, Error, UnsupportedSnafu,
};
use crate::{
    buffer::{BufferFactory, DataBuffer},
    mime::MimeType,
};

/// UTF-8 text. Decodes into `String`, encodes `String` and `&'static str`.
#[derive(Debug, Clone)]
pub struct StringCodec {
    mime_types: Vec<MimeType>,
}

impl StringCodec {
    /// Supports `text/plain` only.
    pub fn text_plain_only() -> Self {
        Self {
            mime_types: vec![MimeType::TEXT_PLAIN],
        }
    }

    /// Supports `text/plain` and any other format.
    pub fn all_mime_types() -> Self {
        Self {
            mime_types: vec![MimeType::TEXT_PLAIN, MimeType::ALL],
        }
    }
}

impl Decoder for StringCodec {
    fn name(&self) -> &'static str {
        "StringCodec"
    }

    fn decodable_mime_types(&self) -> Vec<MimeType> {
        self.mime_types.clone()
    }

    fn can_decode(&self, target: TypeId, mime: Option<&MimeType>) -> bool {
        target == TypeId::of::<String>() && supports_mime(&self.mime_types, mime)
    }

    fn decode(
        &self,
        buf: Bytes,
        target: TypeId,
        mime: Option<&MimeType>,
    ) -> Result<Box<dyn Any + Send>, Error> {
        if !self.can_decode(target, mime) {
            return UnsupportedSnafu {
                codec: Decoder::name(self),
                type_name: "requested type",
                mime: mime_label(mime),
            }
            .fail();
        }
        let text = String::from_utf8(buf.to_vec()).map_err(|e| {
            DecodeSnafu {
                codec: Decoder::name(self),
            }
            .into_error(Box::new(e))
        })?;
        Ok(Box::new(text))
    }
}

impl Encoder for StringCodec {
    fn name(&self) -> &'static str {
        "StringCodec"
    }

    fn encodable_mime_types(&self) -> Vec<MimeType> {
        self.mime_types.clone()
    }

    fn can_encode(&self, source: TypeId, mime: Option<&MimeType>) -> bool {
        (source == TypeId::of::<String>() || source == TypeId::of::<&'static str>())
            && supports_mime(&self.mime_types, mime)
    }

    fn encode(
        &self,
        value: &dyn Any,
        factory: &dyn BufferFactory,
        mime: Option<&MimeType>,
    ) -> Result<DataBuffer, Error> {
        let text = value
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| value.downcast_ref::<&'static str>().copied())
            .filter(|_| supports_mime(&self.mime_types, mime))
            .context(UnsupportedSnafu {
                codec: Encoder::name(self),
                type_name: "non-string value",
                mime: mime_label(mime),
            })?;
        let mut buf = factory.allocate(text.len());
        buf.put_slice(text.as_bytes());
        Ok(buf)
    }
}

/// Raw bytes codec for a single byte container type `T`.
macro_rules! raw_bytes_codec {
    ($(#[$meta:meta])* $name:ident, $ty:ty, $from_bytes:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Decoder for $name {
            fn name(&self) -> &'static str {
                stringify!($name)
            }

            fn decodable_mime_types(&self) -> Vec<MimeType> {
                vec![MimeType::ALL]
            }

            fn can_decode(&self, target: TypeId, _mime: Option<&MimeType>) -> bool {
                target == TypeId::of::<$ty>()
            }

            fn decode(
                &self,
                buf: Bytes,
                target: TypeId,
                mime: Option<&MimeType>,
            ) -> Result<Box<dyn Any + Send>, Error> {
                if !Decoder::can_decode(self, target, mime) {
                    return UnsupportedSnafu {
                        codec: stringify!($name),
                        type_name: "requested type",
                        mime: mime_label(mime),
                    }
                    .fail();
                }
                let convert: fn(Bytes) -> $ty = $from_bytes;
                Ok(Box::new(convert(buf)))
            }
        }

        impl Encoder for $name {
            fn name(&self) -> &'static str {
                stringify!($name)
            }

            fn encodable_mime_types(&self) -> Vec<MimeType> {
                vec![MimeType::ALL]
            }

            fn can_encode(&self, source: TypeId, _mime: Option<&MimeType>) -> bool {
                source == TypeId::of::<$ty>()
            }

            fn encode(
                &self,
                value: &dyn Any,
                factory: &dyn BufferFactory,
                mime: Option<&MimeType>,
            ) -> Result<DataBuffer, Error> {
                let bytes = value.downcast_ref::<$ty>().context(UnsupportedSnafu {
                    codec: stringify!($name),
                    type_name: type_name::<$ty>(),
                    mime: mime_label(mime),
                })?;
                let mut buf = factory.allocate(bytes.len());
                buf.put_slice(&bytes[..]);
                Ok(buf)
            }
        }
    };
}

raw_bytes_codec!(
    /// Reference-counted [`Bytes`], decoded without copying.
    BytesCodec,
    Bytes,
    |buf| buf
);
raw_bytes_codec!(
    /// Owned `Vec<u8>`.
    VecCodec,
    Vec<u8>,
    |buf| buf.to_vec()
);
raw_bytes_codec!(
    /// Growable [`BytesMut`] buffers.
    BytesMutCodec,
    BytesMut,
    |buf| BytesMut::from(&buf[..])
);
