use std::{
    any::{type_name, Any},
    collections::HashMap,
    fmt::Debug,
    sync::Arc,
};

use bytes::Bytes;
use rsocket_common::{
    buffer::BufferFactory,
    codec::{self, find_decoder, find_encoder},
    metadata::{self, encode_composite, encode_routing, CompositeEntry, MetadataValue},
    MimeType, Strategies, StrategiesBuilder,
};
use snafu::{IntoError, OptionExt, ResultExt};
use tracing::debug;

use crate::{
    connector::{ConnectionSetup, Connector, SetupPayload},
    data_mime,
    frame::FrameDecoding,
    transport::{ClientTransport, DuplexConnection},
    BoxError, CodecSnafu, ConfigurerSnafu, ConfigurerStage, MetadataSnafu, NoCodecSnafu,
    TransportSnafu,
};

pub type StrategiesConfigurer =
    Arc<dyn Fn(StrategiesBuilder) -> Result<StrategiesBuilder, BoxError> + Send + Sync>;

pub type ConnectorConfigurer =
    Arc<dyn Fn(&mut Connector, &Strategies) -> Result<(), BoxError> + Send + Sync>;

/// Describes how to connect a [`Requester`].
///
/// Configurers are only recorded here. They run, in registration order, each
/// time [`RequesterBuilder::connect`] is awaited.
#[derive(Clone, Default)]
pub struct RequesterBuilder {
    data_mime_type: Option<MimeType>,
    metadata_mime_type: Option<MimeType>,
    setup_route: Option<String>,
    setup_data: Option<Bytes>,
    strategies: Option<Strategies>,
    strategies_configurers: Vec<StrategiesConfigurer>,
    connector_configurers: Vec<ConnectorConfigurer>,
}

impl RequesterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips default data mime type resolution.
    pub fn data_mime_type(mut self, mime: MimeType) -> Self {
        self.data_mime_type = Some(mime);
        self
    }

    /// Defaults to composite metadata.
    pub fn metadata_mime_type(mut self, mime: MimeType) -> Self {
        self.metadata_mime_type = Some(mime);
        self
    }

    /// Route sent in the setup payload metadata.
    pub fn setup_route(mut self, route: impl Into<String>) -> Self {
        self.setup_route = Some(route.into());
        self
    }

    pub fn setup_data(mut self, data: Bytes) -> Self {
        self.setup_data = Some(data);
        self
    }

    /// Base strategies. Used as they are unless strategies configurers are
    /// registered, in which case the configurers start from
    /// [`Strategies::mutate`].
    pub fn strategies(mut self, strategies: Strategies) -> Self {
        self.strategies = Some(strategies);
        self
    }

    pub fn strategies_configurer<F>(mut self, configurer: F) -> Self
    where
        F: Fn(StrategiesBuilder) -> Result<StrategiesBuilder, BoxError> + Send + Sync + 'static,
    {
        self.strategies_configurers.push(Arc::new(configurer));
        self
    }

    /// `configurer` also receives the final strategies.
    pub fn connector_configurer<F>(mut self, configurer: F) -> Self
    where
        F: Fn(&mut Connector, &Strategies) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.connector_configurers.push(Arc::new(configurer));
        self
    }

    fn resolve_strategies(&self) -> Result<Strategies, crate::Error> {
        if self.strategies_configurers.is_empty() {
            return Ok(self.strategies.clone().unwrap_or_default());
        }
        let mut builder = match &self.strategies {
            Some(strategies) => strategies.mutate(),
            None => StrategiesBuilder::new(),
        };
        for (index, configurer) in self.strategies_configurers.iter().enumerate() {
            builder = configurer(builder).context(ConfigurerSnafu {
                stage: ConfigurerStage::Strategies,
                index,
            })?;
        }
        Ok(builder.build())
    }

    /// Connects through `transport`. Nothing, configurers included, runs until
    /// the returned future is polled.
    #[tracing::instrument(skip_all)]
    pub async fn connect<T>(&self, transport: &T) -> Result<Requester<T::Connection>, crate::Error>
    where
        T: ClientTransport,
    {
        let strategies = self.resolve_strategies()?;

        let mut connector = Connector::default();
        for (index, configurer) in self.connector_configurers.iter().enumerate() {
            configurer(&mut connector, &strategies).context(ConfigurerSnafu {
                stage: ConfigurerStage::Connector,
                index,
            })?;
        }

        let data_mime_type = match &self.data_mime_type {
            Some(mime) => mime.clone(),
            None => data_mime::resolve(strategies.decoders())?,
        };
        let frame_decoding = FrameDecoding::select(strategies.buffer_factory().as_ref());
        let metadata_mime_type = self
            .metadata_mime_type
            .clone()
            .unwrap_or(MimeType::MESSAGE_RSOCKET_COMPOSITE_METADATA);
        let setup_metadata = self
            .setup_route
            .as_deref()
            .map(|route| {
                encode_route(
                    route,
                    &metadata_mime_type,
                    strategies.buffer_factory().as_ref(),
                )
            })
            .transpose()
            .context(MetadataSnafu)?;

        let setup = connector.finish(
            data_mime_type,
            metadata_mime_type,
            frame_decoding,
            SetupPayload {
                data: self.setup_data.clone(),
                metadata: setup_metadata,
            },
        );
        debug!(
            data_mime_type = %setup.data_mime_type(),
            metadata_mime_type = %setup.metadata_mime_type(),
            frame_decoding = ?setup.frame_decoding(),
            "connecting"
        );

        let connection = transport
            .connect(&setup)
            .await
            .map_err(|e| TransportSnafu.into_error(Box::new(e)))?;
        Ok(Requester {
            connection,
            setup,
            strategies,
        })
    }
}

impl Debug for RequesterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequesterBuilder")
            .field("data_mime_type", &self.data_mime_type)
            .field("metadata_mime_type", &self.metadata_mime_type)
            .field("setup_route", &self.setup_route)
            .field("strategies", &self.strategies)
            .field("strategies_configurers", &self.strategies_configurers.len())
            .field("connector_configurers", &self.connector_configurers.len())
            .finish()
    }
}

/// Route metadata in the given metadata mime type.
fn encode_route(
    route: &str,
    metadata_mime_type: &MimeType,
    factory: &dyn BufferFactory,
) -> Result<Bytes, metadata::Error> {
    if metadata_mime_type.equals_type_and_subtype(&MimeType::MESSAGE_RSOCKET_COMPOSITE_METADATA) {
        let routing = encode_routing(&[route], factory)?;
        return encode_composite(
            &[CompositeEntry {
                mime: MimeType::MESSAGE_RSOCKET_ROUTING,
                content: routing,
            }],
            factory,
        );
    }
    if metadata_mime_type.equals_type_and_subtype(&MimeType::MESSAGE_RSOCKET_ROUTING) {
        return encode_routing(&[route], factory);
    }
    Ok(Bytes::copy_from_slice(route.as_bytes()))
}

/// A connected requester with its resolved settings.
pub struct Requester<C> {
    connection: C,
    setup: ConnectionSetup,
    strategies: Strategies,
}

impl<C> Requester<C>
where
    C: DuplexConnection,
{
    pub fn data_mime_type(&self) -> &MimeType {
        self.setup.data_mime_type()
    }

    pub fn metadata_mime_type(&self) -> &MimeType {
        self.setup.metadata_mime_type()
    }

    pub fn frame_decoding(&self) -> FrameDecoding {
        self.setup.frame_decoding()
    }

    pub fn setup(&self) -> &ConnectionSetup {
        &self.setup
    }

    pub fn strategies(&self) -> &Strategies {
        &self.strategies
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    pub fn into_connection(self) -> C {
        self.connection
    }

    pub fn route_metadata(&self, route: &str) -> Result<Bytes, crate::Error> {
        encode_route(
            route,
            self.metadata_mime_type(),
            self.strategies.buffer_factory().as_ref(),
        )
        .context(MetadataSnafu)
    }

    pub fn extract_metadata(
        &self,
        metadata: Bytes,
    ) -> Result<HashMap<String, MetadataValue>, crate::Error> {
        self.strategies
            .metadata_extractor()
            .extract(metadata, self.metadata_mime_type())
            .context(MetadataSnafu)
    }

    /// Encodes `value` as the data mime type with the first capable encoder.
    pub fn encode_data<T: Any>(&self, value: &T) -> Result<Bytes, crate::Error> {
        let mime = self.data_mime_type();
        let encoder =
            find_encoder::<T>(self.strategies.encoders(), Some(mime)).context(NoCodecSnafu {
                kind: "encoder",
                type_name: type_name::<T>(),
                mime: mime.to_string(),
            })?;
        let buf = encoder
            .encode(value, self.strategies.buffer_factory().as_ref(), Some(mime))
            .context(CodecSnafu)?;
        Ok(buf.freeze())
    }

    /// Decodes `data` from the data mime type with the first capable decoder.
    pub fn decode_data<T: Any>(&self, data: Bytes) -> Result<T, crate::Error> {
        let mime = self.data_mime_type();
        let decoder =
            find_decoder::<T>(self.strategies.decoders(), Some(mime)).context(NoCodecSnafu {
                kind: "decoder",
                type_name: type_name::<T>(),
                mime: mime.to_string(),
            })?;
        codec::decode_to(decoder, data, Some(mime)).context(CodecSnafu)
    }
}

impl<C> Debug for Requester<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Requester")
            .field("setup", &self.setup)
            .field("strategies", &self.strategies)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use rsocket_common::{buffer::HeapBufferFactory, metadata::ROUTE_KEY};

    use super::*;

    #[test]
    fn route_metadata_per_mime_type() {
        let factory = HeapBufferFactory;
        let text = encode_route("quotes", &MimeType::TEXT_PLAIN, &factory).unwrap();
        assert_eq!(&text[..], b"quotes");

        let routing = encode_route("quotes", &MimeType::MESSAGE_RSOCKET_ROUTING, &factory).unwrap();
        assert_eq!(&routing[..], b"\x06quotes");

        let composite = encode_route(
            "quotes",
            &MimeType::MESSAGE_RSOCKET_COMPOSITE_METADATA,
            &factory,
        )
        .unwrap();
        let values = Strategies::default()
            .metadata_extractor()
            .extract(composite, &MimeType::MESSAGE_RSOCKET_COMPOSITE_METADATA)
            .unwrap();
        assert_eq!(values[ROUTE_KEY].as_text(), Some("quotes"));
    }
}
