use std::{
    any::{Any, TypeId},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::Bytes;
use parking_lot::Mutex;
use rsocket_client::{
    connector::ConnectionSetup, BoxError, ClientTransport, ConfigurerStage, DuplexConnection,
    Error, FrameDecoding, RequesterBuilder,
};
use rsocket_common::{
    buffer::{HeapBufferFactory, PooledBufferFactory},
    codec::{json::Json, structured::SerdeDecoder, structured::SerdeEncoder, Decoder},
    metadata::ROUTE_KEY,
    MimeType, Strategies, StrategiesBuilder,
};

#[derive(Debug, snafu::Snafu)]
#[snafu(display("connection refused"))]
struct Refused;

#[derive(Default)]
struct MockConnection;

impl DuplexConnection for MockConnection {
    type Error = Refused;

    async fn send(&mut self, _frame: Bytes) -> Result<(), Refused> {
        Ok(())
    }

    async fn receive(&mut self) -> Option<Result<Bytes, Refused>> {
        None
    }

    async fn close(&mut self) -> Result<(), Refused> {
        Ok(())
    }
}

/// Records every setup it is asked to connect with.
#[derive(Default)]
struct MockTransport {
    setups: Mutex<Vec<ConnectionSetup>>,
    refuse: bool,
}

impl MockTransport {
    fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    fn connects(&self) -> usize {
        self.setups.lock().len()
    }

    fn last_setup(&self) -> ConnectionSetup {
        self.setups.lock().last().cloned().expect("no connect")
    }
}

impl ClientTransport for MockTransport {
    type Connection = MockConnection;
    type Error = Refused;

    async fn connect(&self, setup: &ConnectionSetup) -> Result<MockConnection, Refused> {
        self.setups.lock().push(setup.clone());
        if self.refuse {
            return Err(Refused);
        }
        Ok(MockConnection)
    }
}

/// Advertises one format, decodes nothing.
struct TestDecoder(MimeType);

impl Decoder for TestDecoder {
    fn name(&self) -> &'static str {
        "TestDecoder"
    }

    fn decodable_mime_types(&self) -> Vec<MimeType> {
        vec![self.0.clone()]
    }

    fn can_decode(&self, _target: TypeId, _mime: Option<&MimeType>) -> bool {
        false
    }

    fn decode(
        &self,
        _buf: Bytes,
        _target: TypeId,
        _mime: Option<&MimeType>,
    ) -> Result<Box<dyn Any + Send>, rsocket_common::codec::Error> {
        unimplemented!()
    }
}

#[tokio::test]
async fn configurers_are_deferred_until_connect_is_polled() {
    let strategies_calls = Arc::new(AtomicUsize::new(0));
    let connector_calls = Arc::new(AtomicUsize::new(0));
    let transport = MockTransport::default();

    let builder = RequesterBuilder::new()
        .strategies_configurer({
            let calls = strategies_calls.clone();
            move |builder| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(builder)
            }
        })
        .connector_configurer({
            let calls = connector_calls.clone();
            move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

    let pending = builder.connect(&transport);
    assert_eq!(strategies_calls.load(Ordering::SeqCst), 0);
    assert_eq!(connector_calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.connects(), 0);
    drop(pending);
    assert_eq!(transport.connects(), 0);

    builder.connect(&transport).await.unwrap();
    assert_eq!(strategies_calls.load(Ordering::SeqCst), 1);
    assert_eq!(connector_calls.load(Ordering::SeqCst), 1);
    assert_eq!(transport.connects(), 1);

    // once per registered callback per attempt
    builder.connect(&transport).await.unwrap();
    assert_eq!(strategies_calls.load(Ordering::SeqCst), 2);
    assert_eq!(connector_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn configurers_run_in_registration_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let transport = MockTransport::default();
    let record = |name: &'static str| {
        let order = order.clone();
        move |builder: StrategiesBuilder| -> Result<StrategiesBuilder, BoxError> {
            order.lock().push(name);
            Ok(builder)
        }
    };
    let connector_order = order.clone();

    RequesterBuilder::new()
        .strategies_configurer(record("first"))
        .strategies_configurer(record("second"))
        .connector_configurer(move |_, _| {
            connector_order.lock().push("connector");
            Ok(())
        })
        .connect(&transport)
        .await
        .unwrap();

    assert_eq!(*order.lock(), ["first", "second", "connector"]);
}

#[tokio::test]
async fn connector_configurer_sees_final_strategies_and_tunes_setup() {
    let transport = MockTransport::default();
    let seen_decoders = Arc::new(AtomicUsize::new(0));
    let seen = seen_decoders.clone();

    RequesterBuilder::new()
        .strategies_configurer(|builder| Ok(builder.decoder(TestDecoder(MimeType::APPLICATION_JSON))))
        .connector_configurer(move |connector, strategies| {
            seen.store(strategies.decoders().len(), Ordering::SeqCst);
            connector
                .keepalive(Duration::from_secs(5), Duration::from_secs(30))
                .mtu(Some(1024));
            Ok(())
        })
        .connect(&transport)
        .await
        .unwrap();

    assert_eq!(seen_decoders.load(Ordering::SeqCst), 5);
    let setup = transport.last_setup();
    assert_eq!(setup.keepalive_interval(), Duration::from_secs(5));
    assert_eq!(setup.keepalive_max_lifetime(), Duration::from_secs(30));
    assert_eq!(setup.mtu(), Some(1024));
}

#[tokio::test]
async fn default_data_mime_type_is_text_plain() {
    let transport = MockTransport::default();
    let requester = RequesterBuilder::new().connect(&transport).await.unwrap();
    assert_eq!(requester.data_mime_type(), &MimeType::TEXT_PLAIN);
    assert_eq!(
        requester.metadata_mime_type(),
        &MimeType::MESSAGE_RSOCKET_COMPOSITE_METADATA
    );
    assert_eq!(transport.last_setup().data_mime_type(), &MimeType::TEXT_PLAIN);
}

#[tokio::test]
async fn default_data_mime_type_from_custom_decoder() {
    let strategies = Strategies::builder()
        .decoder(TestDecoder(MimeType::APPLICATION_JSON))
        .build();
    let requester = RequesterBuilder::new()
        .strategies(strategies)
        .connect(&MockTransport::default())
        .await
        .unwrap();
    assert_eq!(requester.data_mime_type(), &MimeType::APPLICATION_JSON);
}

#[tokio::test]
async fn ambiguous_default_fails_before_transport_connect() {
    let strategies = Strategies::builder()
        .decoder(TestDecoder(MimeType::APPLICATION_JSON))
        .decoder(TestDecoder(MimeType::APPLICATION_XML))
        .build();
    let transport = MockTransport::default();
    let err = RequesterBuilder::new()
        .strategies(strategies)
        .connect(&transport)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::AmbiguousConfiguration { .. }));
    let message = err.to_string();
    assert!(message.contains("Cannot select default data mime type"));
    assert!(message.contains("application/json"));
    assert!(message.contains("application/xml"));
    assert_eq!(transport.connects(), 0);
}

#[tokio::test]
async fn explicit_data_mime_type_is_used_verbatim() {
    let strategies = Strategies::builder()
        .decoder(TestDecoder(MimeType::APPLICATION_JSON))
        .decoder(TestDecoder(MimeType::APPLICATION_XML))
        .build();
    let explicit = MimeType::APPLICATION_CBOR.with_parameter("version", "2");
    let requester = RequesterBuilder::new()
        .strategies(strategies)
        .data_mime_type(explicit.clone())
        .connect(&MockTransport::default())
        .await
        .unwrap();
    assert_eq!(requester.data_mime_type(), &explicit);
}

#[tokio::test]
async fn frame_decoding_matches_buffer_factory() {
    for (strategies, expected) in [
        (
            Strategies::builder()
                .buffer_factory(Some(Arc::new(PooledBufferFactory::default())))
                .build(),
            FrameDecoding::ZeroCopy,
        ),
        (
            Strategies::builder()
                .buffer_factory(Some(Arc::new(HeapBufferFactory)))
                .build(),
            FrameDecoding::Copying,
        ),
        (Strategies::default(), FrameDecoding::ZeroCopy),
    ] {
        let transport = MockTransport::default();
        let requester = RequesterBuilder::new()
            .strategies(strategies)
            .connect(&transport)
            .await
            .unwrap();
        assert_eq!(requester.frame_decoding(), expected);
        assert_eq!(transport.last_setup().frame_decoding(), expected);
    }
}

#[tokio::test]
async fn supplied_strategies_are_used_verbatim_without_configurers() {
    let strategies = Strategies::default();
    let requester = RequesterBuilder::new()
        .strategies(strategies.clone())
        .connect(&MockTransport::default())
        .await
        .unwrap();
    assert!(Arc::ptr_eq(
        requester.strategies().route_matcher(),
        strategies.route_matcher()
    ));
}

#[tokio::test]
async fn configurers_extend_supplied_strategies() {
    let strategies = Strategies::builder()
        .buffer_factory(Some(Arc::new(HeapBufferFactory)))
        .build();
    let requester = RequesterBuilder::new()
        .strategies(strategies.clone())
        .strategies_configurer(|builder| Ok(builder.decoder(TestDecoder(MimeType::APPLICATION_XML))))
        .connect(&MockTransport::default())
        .await
        .unwrap();
    assert_eq!(requester.data_mime_type(), &MimeType::APPLICATION_XML);
    assert_eq!(requester.frame_decoding(), FrameDecoding::Copying);
    assert!(Arc::ptr_eq(
        requester.strategies().buffer_factory(),
        strategies.buffer_factory()
    ));
    assert!(!Arc::ptr_eq(
        requester.strategies().route_matcher(),
        strategies.route_matcher()
    ));
}

#[tokio::test]
async fn strategies_configurer_failure_aborts_connect() {
    let transport = MockTransport::default();
    let connector_calls = Arc::new(AtomicUsize::new(0));
    let calls = connector_calls.clone();
    let err = RequesterBuilder::new()
        .strategies_configurer(|_| Err::<_, BoxError>("bad codec setup".into()))
        .connector_configurer(move |_, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .connect(&transport)
        .await
        .unwrap_err();

    let Error::Configurer { stage, index, .. } = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(*stage, ConfigurerStage::Strategies);
    assert_eq!(*index, 0);
    assert_eq!(connector_calls.load(Ordering::SeqCst), 0);
    assert_eq!(transport.connects(), 0);
}

#[tokio::test]
async fn strategies_configurer_can_propagate_invalid_argument() {
    let err = RequesterBuilder::new()
        .strategies_configurer(|builder| Ok(builder.adapter_registry(None)?))
        .connect(&MockTransport::default())
        .await
        .unwrap_err();
    let Error::Configurer { error, .. } = err else {
        panic!("unexpected error: {err:?}");
    };
    assert!(error
        .downcast_ref::<rsocket_common::strategies::Error>()
        .is_some());
}

#[tokio::test]
async fn connector_configurer_failure_aborts_connect() {
    let transport = MockTransport::default();
    let err = RequesterBuilder::new()
        .connector_configurer(|_, _| Ok(()))
        .connector_configurer(|_, _| Err("no keepalive".into()))
        .connect(&transport)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Configurer {
            stage: ConfigurerStage::Connector,
            index: 1,
            ..
        }
    ));
    assert_eq!(transport.connects(), 0);
}

#[tokio::test]
async fn transport_failure_is_propagated() {
    let transport = MockTransport::refusing();
    let err = RequesterBuilder::new()
        .connect(&transport)
        .await
        .unwrap_err();
    let Error::Transport { error, .. } = err else {
        panic!("unexpected error: {err:?}");
    };
    assert!(error.downcast_ref::<Refused>().is_some());
    assert_eq!(transport.connects(), 1);
}

#[tokio::test]
async fn setup_route_is_encoded_in_the_metadata_mime_type() {
    let transport = MockTransport::default();
    let requester = RequesterBuilder::new()
        .setup_route("connect.client")
        .setup_data(Bytes::from_static(b"hello"))
        .connect(&transport)
        .await
        .unwrap();

    let setup = transport.last_setup();
    assert_eq!(
        setup.setup_payload().data,
        Some(Bytes::from_static(b"hello"))
    );
    let metadata = setup.setup_payload().metadata.clone().unwrap();
    let values = requester.extract_metadata(metadata).unwrap();
    assert_eq!(values[ROUTE_KEY].as_text(), Some("connect.client"));

    let text = RequesterBuilder::new()
        .metadata_mime_type(MimeType::TEXT_PLAIN)
        .setup_route("connect.client")
        .connect(&transport)
        .await
        .unwrap();
    assert_eq!(
        transport.last_setup().setup_payload().metadata,
        Some(Bytes::from_static(b"connect.client"))
    );
    let values = text
        .extract_metadata(text.route_metadata("quotes.btc").unwrap())
        .unwrap();
    assert_eq!(values[ROUTE_KEY].as_text(), Some("quotes.btc"));
}

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
struct Quote {
    symbol: String,
    price: u32,
}

#[tokio::test]
async fn requester_codes_data_in_its_data_mime_type() {
    let strategies = Strategies::builder()
        .encoder(SerdeEncoder::<Json, Quote>::new())
        .decoder(SerdeDecoder::<Json, Quote>::new())
        .build();
    let mut requester = RequesterBuilder::new()
        .strategies(strategies)
        .connect(&MockTransport::default())
        .await
        .unwrap();
    assert_eq!(requester.data_mime_type(), &MimeType::APPLICATION_JSON);

    let quote = Quote {
        symbol: "RS".into(),
        price: 3,
    };
    let data = requester.encode_data(&quote).unwrap();
    assert_eq!(&data[..], br#"{"symbol":"RS","price":3}"#);
    let decoded: Quote = requester.decode_data(data.clone()).unwrap();
    assert_eq!(decoded, quote);
    // the string codec accepts any format
    let text: String = requester.decode_data(data).unwrap();
    assert!(text.starts_with('{'));
    assert!(matches!(
        requester.encode_data(&1u64),
        Err(Error::NoCodec { .. })
    ));

    let connection = requester.connection_mut();
    connection.send(Bytes::new()).await.unwrap();
    assert!(connection.receive().await.is_none());
}
