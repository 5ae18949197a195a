//! Default data mime type selection.
//!
//! When no data mime type is configured, it is derived from the decoders of
//! the strategies in registration order. The built-in string and byte
//! decoders advertise formats that say nothing about the application's data,
//! so they are skipped. A single remaining format wins; several distinct ones
//! are ambiguous and must be resolved by setting the data mime type.

use std::sync::Arc;

use rsocket_common::{codec::Decoder, MimeType};
use tracing::debug;

use crate::AmbiguousConfigurationSnafu;

/// Formats advertised by the default decoders of
/// [`rsocket_common::StrategiesBuilder::new`].
pub const DEFAULT_DATA_MIME_TYPES: [MimeType; 2] = [MimeType::TEXT_PLAIN, MimeType::ALL];

fn is_default_mime_type(mime: &MimeType) -> bool {
    DEFAULT_DATA_MIME_TYPES
        .iter()
        .any(|default| default.equals_type_and_subtype(mime))
}

fn without_parameters(mime: &MimeType) -> MimeType {
    MimeType::new(mime.type_(), mime.subtype())
}

/// Format a decoder stands for, if it is not one of the defaults. Parameters
/// are dropped.
fn distinguishing_mime_type(decoder: &dyn Decoder) -> Option<MimeType> {
    decoder
        .decodable_mime_types()
        .iter()
        .find(|mime| mime.is_concrete() && !is_default_mime_type(mime))
        .map(without_parameters)
}

#[tracing::instrument(skip_all)]
pub fn resolve(decoders: &[Arc<dyn Decoder>]) -> Result<MimeType, crate::Error> {
    let mut candidates: Vec<MimeType> = Vec::new();
    for decoder in decoders {
        if let Some(mime) = distinguishing_mime_type(decoder.as_ref()) {
            if !candidates.contains(&mime) {
                candidates.push(mime);
            }
        }
    }

    if candidates.len() > 1 {
        return AmbiguousConfigurationSnafu {
            formats: candidates,
        }
        .fail();
    }

    let selected = match candidates.pop() {
        Some(mime) => mime,
        // only defaults: the first concrete format in decoder order
        None => decoders
            .iter()
            .flat_map(|decoder| decoder.decodable_mime_types())
            .find(MimeType::is_concrete)
            .map(|mime| without_parameters(&mime))
            .unwrap_or(MimeType::TEXT_PLAIN),
    };
    debug!(%selected, "resolved default data mime type");
    Ok(selected)
}
