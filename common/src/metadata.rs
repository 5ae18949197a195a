use std::{collections::HashMap, fmt::Debug};

use bytes::{Buf, BufMut, Bytes};
use snafu::{ensure, Location, ResultExt, Snafu};

use crate::{buffer::BufferFactory, mime::MimeType};

pub const ROUTE_KEY: &str = "route";

const MAX_MIME_LENGTH: usize = 128;
const MAX_METADATA_LENGTH: usize = 0xFF_FFFF;
const WELL_KNOWN_FLAG: u8 = 0x80;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("metadata truncated while reading {what}"))]
    Truncated {
        what: &'static str,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("metadata entry for {mime} is not valid utf-8"))]
    InvalidUtf8 {
        mime: String,
        source: std::str::Utf8Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("invalid mime type in composite metadata"))]
    InvalidEntryMime {
        source: crate::mime::Error,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{what} too long: {len}, max: {max}"))]
    TooLong {
        what: &'static str,
        len: usize,
        max: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataValue {
    Text(String),
    Bytes(Bytes),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(text) => Some(text),
            MetadataValue::Bytes(_) => None,
        }
    }
}

/// Parses per-message metadata into named values.
pub trait MetadataExtractor: Debug + Send + Sync + 'static {
    fn extract(
        &self,
        metadata: Bytes,
        mime: &MimeType,
    ) -> Result<HashMap<String, MetadataValue>, Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Bytes,
}

#[derive(Debug, Clone)]
struct EntryExtractor {
    mime: MimeType,
    name: String,
    kind: ValueKind,
}

/// Extracts registered metadata entries, either standalone or as entries of
/// composite metadata. Routing metadata yields its first tag.
#[derive(Debug, Clone, Default)]
pub struct DefaultMetadataExtractor {
    extractors: Vec<EntryExtractor>,
}

impl DefaultMetadataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata_to_extract(
        mut self,
        mime: MimeType,
        kind: ValueKind,
        name: impl Into<String>,
    ) -> Self {
        self.extractors.push(EntryExtractor {
            mime,
            name: name.into(),
            kind,
        });
        self
    }

    fn extract_entry(
        &self,
        mut entry: Bytes,
        mime: &MimeType,
        result: &mut HashMap<String, MetadataValue>,
    ) -> Result<(), Error> {
        if mime.equals_type_and_subtype(&MimeType::MESSAGE_RSOCKET_ROUTING) {
            let mut tags = decode_routing(&mut entry)?;
            if !tags.is_empty() {
                result.insert(ROUTE_KEY.to_owned(), MetadataValue::Text(tags.swap_remove(0)));
            }
            return Ok(());
        }
        for extractor in self
            .extractors
            .iter()
            .filter(|e| e.mime.equals_type_and_subtype(mime))
        {
            let value = match extractor.kind {
                ValueKind::Text => MetadataValue::Text(
                    std::str::from_utf8(&entry)
                        .context(InvalidUtf8Snafu {
                            mime: mime.to_string(),
                        })?
                        .to_owned(),
                ),
                ValueKind::Bytes => MetadataValue::Bytes(entry.clone()),
            };
            result.insert(extractor.name.clone(), value);
        }
        Ok(())
    }
}

impl MetadataExtractor for DefaultMetadataExtractor {
    #[tracing::instrument(skip(self, metadata))]
    fn extract(
        &self,
        metadata: Bytes,
        mime: &MimeType,
    ) -> Result<HashMap<String, MetadataValue>, Error> {
        let mut result = HashMap::new();
        if mime.equals_type_and_subtype(&MimeType::MESSAGE_RSOCKET_COMPOSITE_METADATA) {
            for entry in decode_composite(metadata)? {
                self.extract_entry(entry.content, &entry.mime, &mut result)?;
            }
        } else {
            self.extract_entry(metadata, mime, &mut result)?;
        }
        Ok(result)
    }
}

/// One entry of composite metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeEntry {
    pub mime: MimeType,
    pub content: Bytes,
}

const WELL_KNOWN_IDS: [u8; 7] = [0x01, 0x05, 0x06, 0x0A, 0x21, 0x7E, 0x7F];

fn well_known_mime(id: u8) -> Option<MimeType> {
    let mime = match id {
        0x01 => MimeType::APPLICATION_CBOR,
        0x05 => MimeType::APPLICATION_JSON,
        0x06 => MimeType::APPLICATION_OCTET_STREAM,
        0x0A => MimeType::APPLICATION_XML,
        0x21 => MimeType::TEXT_PLAIN,
        0x7E => MimeType::MESSAGE_RSOCKET_ROUTING,
        0x7F => MimeType::MESSAGE_RSOCKET_COMPOSITE_METADATA,
        _ => return None,
    };
    Some(mime)
}

fn well_known_id(mime: &MimeType) -> Option<u8> {
    WELL_KNOWN_IDS
        .into_iter()
        .find(|id| well_known_mime(*id).as_ref() == Some(mime))
}

/// Splits composite metadata into its entries. Entries tagged with an
/// unknown well-known id are skipped.
pub fn decode_composite(mut buf: Bytes) -> Result<Vec<CompositeEntry>, Error> {
    let mut entries = Vec::new();
    while buf.has_remaining() {
        let header = buf.get_u8();
        let mime = if header & WELL_KNOWN_FLAG != 0 {
            well_known_mime(header & !WELL_KNOWN_FLAG)
        } else {
            let len = header as usize + 1;
            ensure!(buf.remaining() >= len, TruncatedSnafu { what: "mime type" });
            let raw = buf.split_to(len);
            let text = std::str::from_utf8(&raw).context(InvalidUtf8Snafu {
                mime: "composite entry mime",
            })?;
            Some(text.parse::<MimeType>().context(InvalidEntryMimeSnafu)?)
        };
        ensure!(buf.remaining() >= 3, TruncatedSnafu { what: "entry length" });
        let len = (buf.get_u16() as usize) << 8 | buf.get_u8() as usize;
        ensure!(buf.remaining() >= len, TruncatedSnafu { what: "entry content" });
        let content = buf.split_to(len);
        match mime {
            Some(mime) => entries.push(CompositeEntry { mime, content }),
            None => tracing::debug!(id = header, "skip unknown well-known mime entry"),
        }
    }
    Ok(entries)
}

/// Tags of routing metadata; each tag is length-prefixed with one byte.
pub fn decode_routing(buf: &mut Bytes) -> Result<Vec<String>, Error> {
    let mut tags = Vec::new();
    while buf.has_remaining() {
        let len = buf.get_u8() as usize;
        ensure!(buf.remaining() >= len, TruncatedSnafu { what: "route tag" });
        let tag = buf.split_to(len);
        let text = std::str::from_utf8(&tag).context(InvalidUtf8Snafu {
            mime: MimeType::MESSAGE_RSOCKET_ROUTING.to_string(),
        })?;
        tags.push(text.to_owned());
    }
    Ok(tags)
}

pub fn encode_routing(tags: &[&str], factory: &dyn BufferFactory) -> Result<Bytes, Error> {
    let mut buf = factory.allocate(tags.iter().map(|t| t.len() + 1).sum());
    for tag in tags {
        ensure!(
            tag.len() <= u8::MAX as usize,
            TooLongSnafu {
                what: "route tag",
                len: tag.len(),
                max: u8::MAX as usize,
            }
        );
        buf.put_u8(tag.len() as u8);
        buf.put_slice(tag.as_bytes());
    }
    Ok(buf.freeze())
}

pub fn encode_composite(
    entries: &[CompositeEntry],
    factory: &dyn BufferFactory,
) -> Result<Bytes, Error> {
    let mut buf = factory.allocate(entries.iter().map(|e| e.content.len() + 4).sum());
    for entry in entries {
        match well_known_id(&entry.mime) {
            Some(id) => buf.put_u8(id | WELL_KNOWN_FLAG),
            None => {
                let mime = entry.mime.to_string();
                ensure!(
                    !mime.is_empty() && mime.len() <= MAX_MIME_LENGTH,
                    TooLongSnafu {
                        what: "mime type",
                        len: mime.len(),
                        max: MAX_MIME_LENGTH,
                    }
                );
                buf.put_u8((mime.len() - 1) as u8);
                buf.put_slice(mime.as_bytes());
            }
        }
        let len = entry.content.len();
        ensure!(
            len <= MAX_METADATA_LENGTH,
            TooLongSnafu {
                what: "metadata entry",
                len,
                max: MAX_METADATA_LENGTH,
            }
        );
        buf.put_u16((len >> 8) as u16);
        buf.put_u8(len as u8);
        buf.put_slice(&entry.content);
    }
    Ok(buf.freeze())
}
