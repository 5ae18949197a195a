use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt::Display,
    hash::{Hash, Hasher},
    str::FromStr,
};

use snafu::{ensure, Location, OptionExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid mime type '{input}': {reason}"))]
    InvalidMimeType {
        input: String,
        reason: &'static str,
        #[snafu(implicit)]
        location: Location,
    },
}

const WILDCARD: &str = "*";

/// A data format identifier such as `application/json`.
///
/// Type, subtype and parameter names compare case-insensitively.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MimeType {
    type_: Cow<'static, str>,
    subtype: Cow<'static, str>,
    parameters: BTreeMap<String, String>,
}

impl MimeType {
    pub const ALL: MimeType = MimeType::from_static("*", "*");
    pub const TEXT_PLAIN: MimeType = MimeType::from_static("text", "plain");
    pub const APPLICATION_JSON: MimeType = MimeType::from_static("application", "json");
    pub const APPLICATION_XML: MimeType = MimeType::from_static("application", "xml");
    pub const APPLICATION_CBOR: MimeType = MimeType::from_static("application", "cbor");
    pub const APPLICATION_OCTET_STREAM: MimeType =
        MimeType::from_static("application", "octet-stream");
    pub const APPLICATION_BINCODE: MimeType = MimeType::from_static("application", "x-bincode");
    pub const MESSAGE_RSOCKET_ROUTING: MimeType =
        MimeType::from_static("message", "x.rsocket.routing.v0");
    pub const MESSAGE_RSOCKET_COMPOSITE_METADATA: MimeType =
        MimeType::from_static("message", "x.rsocket.composite-metadata.v0");

    pub const fn from_static(type_: &'static str, subtype: &'static str) -> Self {
        Self {
            type_: Cow::Borrowed(type_),
            subtype: Cow::Borrowed(subtype),
            parameters: BTreeMap::new(),
        }
    }

    pub fn new(type_: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            type_: Cow::Owned(type_.into().to_ascii_lowercase()),
            subtype: Cow::Owned(subtype.into().to_ascii_lowercase()),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_wildcard_type(&self) -> bool {
        self.type_ == WILDCARD
    }

    /// `*` or a structured-syntax wildcard like `*+json`.
    pub fn is_wildcard_subtype(&self) -> bool {
        self.subtype == WILDCARD || self.subtype.starts_with("*+")
    }

    pub fn is_concrete(&self) -> bool {
        !self.is_wildcard_type() && !self.is_wildcard_subtype()
    }

    fn subtype_suffix(&self) -> Option<&str> {
        self.subtype.rsplit_once('+').map(|(_, suffix)| suffix)
    }

    /// Whether this type includes `other`, e.g. `text/*` includes `text/plain`.
    /// Not symmetric.
    pub fn includes(&self, other: &MimeType) -> bool {
        if self.is_wildcard_type() {
            return true;
        }
        if !self.type_.eq_ignore_ascii_case(&other.type_) {
            return false;
        }
        if self.subtype.eq_ignore_ascii_case(&other.subtype) || self.subtype == WILDCARD {
            return true;
        }
        // application/*+xml includes application/soap+xml
        match (self.subtype.strip_prefix("*+"), other.subtype_suffix()) {
            (Some(suffix), Some(other_suffix)) => suffix.eq_ignore_ascii_case(other_suffix),
            _ => false,
        }
    }

    /// Symmetric variant of [`MimeType::includes`].
    pub fn is_compatible_with(&self, other: &MimeType) -> bool {
        self.includes(other) || other.includes(self)
    }

    /// Equality on type and subtype only, ignoring parameters.
    pub fn equals_type_and_subtype(&self, other: &MimeType) -> bool {
        self.type_.eq_ignore_ascii_case(&other.type_)
            && self.subtype.eq_ignore_ascii_case(&other.subtype)
    }
}

impl PartialEq for MimeType {
    fn eq(&self, other: &Self) -> bool {
        self.equals_type_and_subtype(other) && self.parameters == other.parameters
    }
}

impl Eq for MimeType {}

impl Hash for MimeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_.to_ascii_lowercase().hash(state);
        self.subtype.to_ascii_lowercase().hash(state);
        self.parameters.hash(state);
    }
}

impl Display for MimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.type_, self.subtype)?;
        for (name, value) in &self.parameters {
            write!(f, ";{name}={value}")?;
        }
        Ok(())
    }
}

impl FromStr for MimeType {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let mut parts = input.split(';');
        let full_type = parts.next().unwrap_or_default().trim();
        ensure!(
            !full_type.is_empty(),
            InvalidMimeTypeSnafu {
                input,
                reason: "'mimeType' must not be empty",
            }
        );
        // a bare "*" is shorthand for "*/*"
        let (type_, subtype) = if full_type == WILDCARD {
            (WILDCARD, WILDCARD)
        } else {
            full_type.split_once('/').context(InvalidMimeTypeSnafu {
                input,
                reason: "does not contain '/'",
            })?
        };
        ensure!(
            !type_.is_empty() && !subtype.is_empty(),
            InvalidMimeTypeSnafu {
                input,
                reason: "type and subtype must not be empty",
            }
        );
        ensure!(
            !subtype.contains('/'),
            InvalidMimeTypeSnafu {
                input,
                reason: "subtype contains '/'",
            }
        );
        ensure!(
            !(type_ == WILDCARD && subtype != WILDCARD),
            InvalidMimeTypeSnafu {
                input,
                reason: "wildcard type is legal only in '*/*'",
            }
        );

        let mut mime = MimeType::new(type_, subtype);
        for parameter in parts.map(str::trim).filter(|p| !p.is_empty()) {
            let (name, value) = parameter.split_once('=').context(InvalidMimeTypeSnafu {
                input,
                reason: "parameter does not contain '='",
            })?;
            mime = mime.with_parameter(name.trim(), value.trim().trim_matches('"'));
        }
        Ok(mime)
    }
}

impl TryFrom<String> for MimeType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<MimeType> for String {
    fn from(value: MimeType) -> Self {
        value.to_string()
    }
}

/// Renders a list of mime types as `[a, b]` for error messages.
pub fn display_list(mime_types: &[MimeType]) -> String {
    let items = mime_types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
    format!("[{}]", items.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_parameters() {
        let mime: MimeType = "Text/Plain; charset=UTF-8".parse().unwrap();
        assert_eq!(mime.type_(), "text");
        assert_eq!(mime.subtype(), "plain");
        assert_eq!(mime.parameter("CHARSET"), Some("UTF-8"));
        assert_eq!(mime.to_string(), "text/plain;charset=UTF-8");
        assert!(mime.equals_type_and_subtype(&MimeType::TEXT_PLAIN));
        assert_ne!(mime, MimeType::TEXT_PLAIN);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("".parse::<MimeType>().is_err());
        assert!("text".parse::<MimeType>().is_err());
        assert!("*/json".parse::<MimeType>().is_err());
        assert!("text/plain;charset".parse::<MimeType>().is_err());
    }

    #[test]
    fn case_insensitive_equality() {
        let parsed: MimeType = "APPLICATION/JSON".parse().unwrap();
        assert_eq!(parsed, MimeType::APPLICATION_JSON);
    }

    #[test]
    fn wildcard_inclusion() {
        let text_any: MimeType = "text/*".parse().unwrap();
        assert!(MimeType::ALL.includes(&MimeType::APPLICATION_JSON));
        assert!(text_any.includes(&MimeType::TEXT_PLAIN));
        assert!(!MimeType::TEXT_PLAIN.includes(&text_any));
        assert!(MimeType::TEXT_PLAIN.is_compatible_with(&text_any));
        assert!(!text_any.includes(&MimeType::APPLICATION_JSON));

        let any_json: MimeType = "application/*+json".parse().unwrap();
        let cloud_events: MimeType = "application/cloudevents+json".parse().unwrap();
        assert!(any_json.includes(&cloud_events));
        assert!(!any_json.is_concrete());
        assert!(cloud_events.is_concrete());
        assert!(!MimeType::ALL.is_concrete());
    }

    #[test]
    fn serde_as_string() {
        let json = serde_json::to_string(&MimeType::APPLICATION_JSON).unwrap();
        assert_eq!(json, "\"application/json\"");
        let back: MimeType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MimeType::APPLICATION_JSON);
    }
}
