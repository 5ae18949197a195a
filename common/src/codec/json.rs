use bytes::{Buf, BufMut};

use super::Codec;
use crate::mime::MimeType;

#[derive(Debug)]
pub struct Json;

impl Codec for Json {
    type Error = serde_json::Error;

    fn mime_type() -> MimeType {
        MimeType::APPLICATION_JSON
    }

    #[tracing::instrument(skip_all)]
    fn encode<T>(item: &T, buf: &mut bytes::BytesMut) -> Result<(), Self::Error>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer(buf.writer(), item)
    }

    #[tracing::instrument(skip_all)]
    fn decode<T>(buf: bytes::Bytes) -> Result<T, Self::Error>
    where
        T: for<'a> serde::Deserialize<'a>,
    {
        serde_json::from_reader(buf.reader())
    }
}
