pub mod basic;
pub mod bincode;
pub mod json;
pub mod structured;

use std::any::{type_name, Any, TypeId};

use bytes::{Bytes, BytesMut};
use snafu::{Location, OptionExt, Snafu};

use crate::{
    buffer::{BufferFactory, DataBuffer},
    mime::MimeType,
};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("{codec} cannot handle {type_name} as {mime}"))]
    Unsupported {
        codec: &'static str,
        type_name: &'static str,
        mime: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{codec} encode error"))]
    Encode {
        codec: &'static str,
        #[snafu(source)]
        error: Box<dyn std::error::Error + Send + Sync + 'static>,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{codec} decode error"))]
    Decode {
        codec: &'static str,
        #[snafu(source)]
        error: Box<dyn std::error::Error + Send + Sync + 'static>,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("decoded value is not a {type_name}"))]
    Downcast {
        type_name: &'static str,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Serde data format usable by [`structured::SerdeDecoder`] and
/// [`structured::SerdeEncoder`].
pub trait Codec: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn mime_type() -> MimeType;

    fn encode<T>(item: &T, buf: &mut BytesMut) -> Result<(), Self::Error>
    where
        T: serde::Serialize;

    fn decode<T>(buf: Bytes) -> Result<T, Self::Error>
    where
        T: for<'a> serde::Deserialize<'a>;
}

/// Converts wire bytes of some data format into an in-memory value.
pub trait Decoder: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Formats this decoder advertises, most specific first.
    fn decodable_mime_types(&self) -> Vec<MimeType>;

    fn can_decode(&self, target: TypeId, mime: Option<&MimeType>) -> bool;

    fn decode(
        &self,
        buf: Bytes,
        target: TypeId,
        mime: Option<&MimeType>,
    ) -> Result<Box<dyn Any + Send>, Error>;
}

/// Converts an in-memory value into wire bytes of some data format.
pub trait Encoder: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn encodable_mime_types(&self) -> Vec<MimeType>;

    fn can_encode(&self, source: TypeId, mime: Option<&MimeType>) -> bool;

    fn encode(
        &self,
        value: &dyn Any,
        factory: &dyn BufferFactory,
        mime: Option<&MimeType>,
    ) -> Result<DataBuffer, Error>;
}

/// `None` means the caller has no format preference.
pub(crate) fn supports_mime(supported: &[MimeType], mime: Option<&MimeType>) -> bool {
    mime.map_or(true, |mime| {
        supported.iter().any(|candidate| candidate.is_compatible_with(mime))
    })
}

pub(crate) fn mime_label(mime: Option<&MimeType>) -> String {
    mime.map_or_else(|| "any".to_owned(), ToString::to_string)
}

/// Decodes `buf` with `decoder` into a `T`.
pub fn decode_to<T: Any>(
    decoder: &dyn Decoder,
    buf: Bytes,
    mime: Option<&MimeType>,
) -> Result<T, Error> {
    let value = decoder.decode(buf, TypeId::of::<T>(), mime)?;
    value
        .downcast::<T>()
        .ok()
        .map(|value| *value)
        .context(DowncastSnafu {
            type_name: type_name::<T>(),
        })
}

/// First decoder in `decoders` able to produce `T` from `mime`.
pub fn find_decoder<'a, T: Any>(
    decoders: &'a [std::sync::Arc<dyn Decoder>],
    mime: Option<&MimeType>,
) -> Option<&'a dyn Decoder> {
    decoders
        .iter()
        .find(|decoder| decoder.can_decode(TypeId::of::<T>(), mime))
        .map(|decoder| decoder.as_ref())
}

/// First encoder in `encoders` able to write `T` as `mime`.
pub fn find_encoder<'a, T: Any>(
    encoders: &'a [std::sync::Arc<dyn Encoder>],
    mime: Option<&MimeType>,
) -> Option<&'a dyn Encoder> {
    encoders
        .iter()
        .find(|encoder| encoder.can_encode(TypeId::of::<T>(), mime))
        .map(|encoder| encoder.as_ref())
}
