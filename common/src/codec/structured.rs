use std::{
    any::{type_name, Any, TypeId},
    fmt::Debug,
    marker::PhantomData,
};

use bytes::Bytes;
use snafu::{IntoError, OptionExt};

use super::{
    mime_label, supports_mime, Codec, DecodeSnafu, Decoder, EncodeSnafu, Encoder, Error,
    UnsupportedSnafu,
};
use crate::{
    buffer::{BufferFactory, DataBuffer},
    mime::MimeType,
};

/// Decodes values of type `T` from the data format of codec `C`.
pub struct SerdeDecoder<C, T> {
    mime_types: Vec<MimeType>,
    _p: PhantomData<fn() -> (C, T)>,
}

impl<C, T> SerdeDecoder<C, T>
where
    C: Codec,
{
    pub fn new() -> Self {
        Self::with_mime_types(vec![C::mime_type()])
    }

    /// Advertise other formats than the codec's own, e.g. vendor json types.
    pub fn with_mime_types(mime_types: Vec<MimeType>) -> Self {
        Self {
            mime_types,
            _p: PhantomData,
        }
    }
}

impl<C, T> Default for SerdeDecoder<C, T>
where
    C: Codec,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C, T> Debug for SerdeDecoder<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerdeDecoder")
            .field("codec", &type_name::<C>())
            .field("target", &type_name::<T>())
            .field("mime_types", &self.mime_types)
            .finish()
    }
}

impl<C, T> Decoder for SerdeDecoder<C, T>
where
    C: Codec,
    T: for<'a> serde::Deserialize<'a> + Send + 'static,
{
    fn name(&self) -> &'static str {
        "SerdeDecoder"
    }

    fn decodable_mime_types(&self) -> Vec<MimeType> {
        self.mime_types.clone()
    }

    fn can_decode(&self, target: TypeId, mime: Option<&MimeType>) -> bool {
        target == TypeId::of::<T>() && supports_mime(&self.mime_types, mime)
    }

    #[tracing::instrument(skip(self, buf))]
    fn decode(
        &self,
        buf: Bytes,
        target: TypeId,
        mime: Option<&MimeType>,
    ) -> Result<Box<dyn Any + Send>, Error> {
        if !self.can_decode(target, mime) {
            return UnsupportedSnafu {
                codec: type_name::<C>(),
                type_name: "requested type",
                mime: mime_label(mime),
            }
            .fail();
        }
        let value = C::decode::<T>(buf).map_err(|e| {
            DecodeSnafu {
                codec: type_name::<C>(),
            }
            .into_error(Box::new(e))
        })?;
        Ok(Box::new(value))
    }
}

/// Encodes values of type `T` into the data format of codec `C`.
pub struct SerdeEncoder<C, T> {
    mime_types: Vec<MimeType>,
    _p: PhantomData<fn() -> (C, T)>,
}

impl<C, T> SerdeEncoder<C, T>
where
    C: Codec,
{
    pub fn new() -> Self {
        Self {
            mime_types: vec![C::mime_type()],
            _p: PhantomData,
        }
    }
}

impl<C, T> Default for SerdeEncoder<C, T>
where
    C: Codec,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C, T> Debug for SerdeEncoder<C, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerdeEncoder")
            .field("codec", &type_name::<C>())
            .field("source", &type_name::<T>())
            .finish()
    }
}

impl<C, T> Encoder for SerdeEncoder<C, T>
where
    C: Codec,
    T: serde::Serialize + 'static,
{
    fn name(&self) -> &'static str {
        "SerdeEncoder"
    }

    fn encodable_mime_types(&self) -> Vec<MimeType> {
        self.mime_types.clone()
    }

    fn can_encode(&self, source: TypeId, mime: Option<&MimeType>) -> bool {
        source == TypeId::of::<T>() && supports_mime(&self.mime_types, mime)
    }

    #[tracing::instrument(skip(self, value, factory))]
    fn encode(
        &self,
        value: &dyn Any,
        factory: &dyn BufferFactory,
        mime: Option<&MimeType>,
    ) -> Result<DataBuffer, Error> {
        let item = value
            .downcast_ref::<T>()
            .filter(|_| supports_mime(&self.mime_types, mime))
            .context(UnsupportedSnafu {
                codec: type_name::<C>(),
                type_name: type_name::<T>(),
                mime: mime_label(mime),
            })?;
        let mut buf = factory.allocate(0);
        C::encode(item, &mut buf).map_err(|e| {
            EncodeSnafu {
                codec: type_name::<C>(),
            }
            .into_error(Box::new(e))
        })?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        buffer::PooledBufferFactory,
        codec::{bincode::Bincode, decode_to, json::Json},
    };

    #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Quote {
        symbol: String,
        price: u32,
    }

    #[test]
    fn json_decoder_advertises_json() {
        let decoder = SerdeDecoder::<Json, Quote>::new();
        assert_eq!(
            decoder.decodable_mime_types(),
            vec![MimeType::APPLICATION_JSON]
        );
        assert!(decoder.can_decode(TypeId::of::<Quote>(), Some(&MimeType::APPLICATION_JSON)));
        assert!(!decoder.can_decode(TypeId::of::<Quote>(), Some(&MimeType::APPLICATION_XML)));
        assert!(!decoder.can_decode(TypeId::of::<String>(), None));
    }

    #[test]
    fn json_decode() {
        let decoder = SerdeDecoder::<Json, Quote>::new();
        let quote: Quote = decode_to(
            &decoder,
            Bytes::from_static(br#"{"symbol":"RS","price":42}"#),
            Some(&MimeType::APPLICATION_JSON),
        )
        .unwrap();
        assert_eq!(
            quote,
            Quote {
                symbol: "RS".into(),
                price: 42
            }
        );
    }

    #[test]
    fn bincode_encode_through_pooled_factory() {
        let encoder = SerdeEncoder::<Bincode, Quote>::new();
        let decoder = SerdeDecoder::<Bincode, Quote>::new();
        let factory = PooledBufferFactory::default();
        let quote = Quote {
            symbol: "RS".into(),
            price: 7,
        };
        let buf = encoder.encode(&quote, &factory, None).unwrap();
        let decoded: Quote = decode_to(&decoder, buf.freeze(), None).unwrap();
        assert_eq!(decoded, quote);
        assert!(encoder.encode(&"not a quote", &factory, None).is_err());
    }
}
