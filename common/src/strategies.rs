use std::{fmt::Debug, sync::Arc};

use snafu::{Location, OptionExt, Snafu};

use crate::{
    adapter::ReactiveAdapterRegistry,
    buffer::{BufferFactory, PooledBufferFactory},
    codec::{
        basic::{BytesCodec, BytesMutCodec, StringCodec, VecCodec},
        Decoder, Encoder,
    },
    metadata::{DefaultMetadataExtractor, MetadataExtractor, ValueKind, ROUTE_KEY},
    mime::MimeType,
    route::{PathRouteMatcher, RouteMatcher},
};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid argument: {message}"))]
    InvalidArgument {
        message: &'static str,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Route hierarchy separator of the default route matcher.
pub const DEFAULT_ROUTE_SEPARATOR: char = '.';

/// Immutable set of codecs and capabilities shared by every connection built
/// from it. Cloning is cheap.
#[derive(Clone)]
pub struct Strategies {
    encoders: Arc<[Arc<dyn Encoder>]>,
    decoders: Arc<[Arc<dyn Decoder>]>,
    route_matcher: Arc<dyn RouteMatcher>,
    metadata_extractor: Arc<dyn MetadataExtractor>,
    buffer_factory: Arc<dyn BufferFactory>,
    adapter_registry: Arc<ReactiveAdapterRegistry>,
}

impl Strategies {
    /// Builder seeded with the default codecs.
    pub fn builder() -> StrategiesBuilder {
        StrategiesBuilder::new()
    }

    /// Builder seeded from this bundle, see [`StrategiesBuilder::from_existing`].
    pub fn mutate(&self) -> StrategiesBuilder {
        StrategiesBuilder::from_existing(self)
    }

    pub fn encoders(&self) -> &[Arc<dyn Encoder>] {
        &self.encoders
    }

    pub fn decoders(&self) -> &[Arc<dyn Decoder>] {
        &self.decoders
    }

    pub fn route_matcher(&self) -> &Arc<dyn RouteMatcher> {
        &self.route_matcher
    }

    pub fn metadata_extractor(&self) -> &Arc<dyn MetadataExtractor> {
        &self.metadata_extractor
    }

    pub fn buffer_factory(&self) -> &Arc<dyn BufferFactory> {
        &self.buffer_factory
    }

    pub fn adapter_registry(&self) -> &Arc<ReactiveAdapterRegistry> {
        &self.adapter_registry
    }
}

impl Default for Strategies {
    fn default() -> Self {
        StrategiesBuilder::new().build()
    }
}

impl Debug for Strategies {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let encoders: Vec<_> = self.encoders.iter().map(|e| e.name()).collect();
        let decoders: Vec<_> = self.decoders.iter().map(|d| d.name()).collect();
        f.debug_struct("Strategies")
            .field("encoders", &encoders)
            .field("decoders", &decoders)
            .field("route_matcher", &self.route_matcher)
            .field("metadata_extractor", &self.metadata_extractor)
            .field("buffer_factory", &self.buffer_factory)
            .finish()
    }
}

/// Accumulates configuration for a [`Strategies`] bundle.
///
/// The builder is consumed by [`StrategiesBuilder::build`]. Unset
/// capabilities are filled with defaults at build time.
pub struct StrategiesBuilder {
    encoders: Vec<Arc<dyn Encoder>>,
    decoders: Vec<Arc<dyn Decoder>>,
    route_matcher: Option<Arc<dyn RouteMatcher>>,
    metadata_extractor: Option<Arc<dyn MetadataExtractor>>,
    buffer_factory: Option<Arc<dyn BufferFactory>>,
    adapter_registry: Arc<ReactiveAdapterRegistry>,
}

impl StrategiesBuilder {
    /// Seeded with the string, `Bytes`, `Vec<u8>` and `BytesMut` codecs.
    pub fn new() -> Self {
        // decoder order matters for selecting the default data mime type
        let decoders: Vec<Arc<dyn Decoder>> = vec![
            Arc::new(StringCodec::all_mime_types()),
            Arc::new(BytesCodec),
            Arc::new(VecCodec),
            Arc::new(BytesMutCodec),
        ];
        let encoders: Vec<Arc<dyn Encoder>> = vec![
            Arc::new(StringCodec::all_mime_types()),
            Arc::new(BytesCodec),
            Arc::new(VecCodec),
            Arc::new(BytesMutCodec),
        ];
        Self {
            encoders,
            decoders,
            ..Self::empty()
        }
    }

    /// No codecs at all.
    pub fn empty() -> Self {
        Self {
            encoders: Vec::new(),
            decoders: Vec::new(),
            route_matcher: None,
            metadata_extractor: None,
            buffer_factory: None,
            adapter_registry: ReactiveAdapterRegistry::shared(),
        }
    }

    /// Copies codecs, buffer factory and adapter registry from `other`.
    /// Route matcher and metadata extractor are left unset.
    pub fn from_existing(other: &Strategies) -> Self {
        Self {
            encoders: other.encoders.to_vec(),
            decoders: other.decoders.to_vec(),
            route_matcher: None,
            metadata_extractor: None,
            buffer_factory: Some(other.buffer_factory.clone()),
            adapter_registry: other.adapter_registry.clone(),
        }
    }

    pub fn encoder(mut self, encoder: impl Encoder) -> Self {
        self.encoders.push(Arc::new(encoder));
        self
    }

    pub fn decoder(mut self, decoder: impl Decoder) -> Self {
        self.decoders.push(Arc::new(decoder));
        self
    }

    /// Direct access to the encoder list, e.g. to insert or reorder.
    pub fn encoders(mut self, f: impl FnOnce(&mut Vec<Arc<dyn Encoder>>)) -> Self {
        f(&mut self.encoders);
        self
    }

    /// Direct access to the decoder list, e.g. to insert or reorder.
    pub fn decoders(mut self, f: impl FnOnce(&mut Vec<Arc<dyn Decoder>>)) -> Self {
        f(&mut self.decoders);
        self
    }

    pub fn route_matcher(mut self, route_matcher: Option<Arc<dyn RouteMatcher>>) -> Self {
        self.route_matcher = route_matcher;
        self
    }

    pub fn metadata_extractor(
        mut self,
        metadata_extractor: Option<Arc<dyn MetadataExtractor>>,
    ) -> Self {
        self.metadata_extractor = metadata_extractor;
        self
    }

    pub fn buffer_factory(mut self, buffer_factory: Option<Arc<dyn BufferFactory>>) -> Self {
        self.buffer_factory = buffer_factory;
        self
    }

    pub fn adapter_registry(
        mut self,
        registry: Option<Arc<ReactiveAdapterRegistry>>,
    ) -> Result<Self, Error> {
        self.adapter_registry = registry.context(InvalidArgumentSnafu {
            message: "reactive adapter registry is required",
        })?;
        Ok(self)
    }

    #[tracing::instrument(skip_all)]
    pub fn build(self) -> Strategies {
        tracing::debug!(
            encoders = self.encoders.len(),
            decoders = self.decoders.len(),
            default_route_matcher = self.route_matcher.is_none(),
            default_metadata_extractor = self.metadata_extractor.is_none(),
            default_buffer_factory = self.buffer_factory.is_none(),
            "build strategies"
        );
        Strategies {
            encoders: self.encoders.into(),
            decoders: self.decoders.into(),
            route_matcher: self.route_matcher.unwrap_or_else(default_route_matcher),
            metadata_extractor: self
                .metadata_extractor
                .unwrap_or_else(default_metadata_extractor),
            buffer_factory: self.buffer_factory.unwrap_or_else(default_buffer_factory),
            adapter_registry: self.adapter_registry,
        }
    }
}

impl Default for StrategiesBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_route_matcher() -> Arc<dyn RouteMatcher> {
    Arc::new(PathRouteMatcher::new(DEFAULT_ROUTE_SEPARATOR))
}

fn default_metadata_extractor() -> Arc<dyn MetadataExtractor> {
    Arc::new(DefaultMetadataExtractor::new().metadata_to_extract(
        MimeType::TEXT_PLAIN,
        ValueKind::Text,
        ROUTE_KEY,
    ))
}

fn default_buffer_factory() -> Arc<dyn BufferFactory> {
    Arc::new(PooledBufferFactory::default())
}
