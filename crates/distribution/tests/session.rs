use std::time::Duration;
use synopticon_distribution::session::{SessionConfig, StreamListFilter, StreamSessionManager};
use synopticon_distribution::SessionError;
use synopticon_events::EventBus;
use synopticon_types::{AnalysisResult, Capability, DestinationSpec, StreamPatch, StreamSpec, StreamStatus, TransportKind};

fn udp_spec(port: u16) -> StreamSpec {
    StreamSpec {
        transport: TransportKind::Udp,
        source: Capability::FaceDetection,
        destination: DestinationSpec { host: Some("127.0.0.1".to_string()), port: Some(port), ..Default::default() },
        filter: None,
        client_id: None,
    }
}

#[tokio::test]
async fn create_rejects_a_destination_missing_required_fields() {
    let manager = StreamSessionManager::new(std::sync::Arc::new(EventBus::default()), SessionConfig::default());
    let spec = StreamSpec {
        transport: TransportKind::Udp,
        source: Capability::FaceDetection,
        destination: DestinationSpec::default(),
        filter: None,
        client_id: None,
    };
    let result = manager.create(spec);
    assert!(matches!(result, Err(SessionError::InvalidDestination(TransportKind::Udp, _))));
}

#[tokio::test]
async fn lifecycle_create_list_modify_remove() {
    let manager = StreamSessionManager::new(std::sync::Arc::new(EventBus::default()), SessionConfig::default());
    let id = manager.create(udp_spec(29_001)).unwrap();

    let listed = manager.list(StreamListFilter::default()).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, StreamStatus::Pending);

    manager
        .modify(id, StreamPatch { status: Some(StreamStatus::Paused), ..Default::default() })
        .await
        .unwrap();
    let fetched = manager.get(id).await.unwrap();
    assert_eq!(fetched.status, StreamStatus::Paused);

    // Destination changes are rejected for non-connectionless transports,
    // but UDP is connectionless so this must succeed (spec §4.F).
    manager
        .modify(
            id,
            StreamPatch {
                destination: Some(DestinationSpec { host: Some("127.0.0.1".to_string()), port: Some(29_002), ..Default::default() }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    manager.remove(id).await.unwrap();
    assert!(manager.get(id).await.is_none());
}

#[tokio::test]
async fn connectionless_destination_patch_is_allowed_on_udp() {
    let manager = StreamSessionManager::new(std::sync::Arc::new(EventBus::default()), SessionConfig::default());
    let id = manager.create(udp_spec(29_003)).unwrap();
    // `type`/`source`/`id` have no representation in `StreamPatch` at all,
    // so immutability is enforced by the type system; only `destination`
    // needs a runtime check against the transport.
    let patch = StreamPatch { destination: Some(DestinationSpec { host: Some("127.0.0.1".into()), port: Some(29_006), ..Default::default() }), ..Default::default() };
    let result = manager.modify(id, patch).await;
    assert!(result.is_ok(), "udp is connection-less so destination patches are allowed");
}

#[tokio::test]
async fn submit_delivers_to_a_live_udp_listener() {
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = socket.local_addr().unwrap().port();

    let manager = StreamSessionManager::new(std::sync::Arc::new(EventBus::default()), SessionConfig::default());
    let _id = manager.create(udp_spec(port)).unwrap();

    let result = AnalysisResult::make_success("Pα", 0, 1.0, vec![], None, serde_json::Value::Null);
    manager.submit(Capability::FaceDetection, &result).await;

    let mut buf = [0u8; 1500];
    let received = tokio::time::timeout(Duration::from_secs(2), socket.recv(&mut buf)).await;
    assert!(received.is_ok(), "expected the UDP distributor to deliver the submitted result");
}

#[tokio::test]
async fn share_creates_a_sibling_stream_with_same_source_and_filter() {
    let manager = StreamSessionManager::new(std::sync::Arc::new(EventBus::default()), SessionConfig::default());
    let id = manager.create(udp_spec(29_004)).unwrap();
    let second_id = manager
        .share(id, DestinationSpec { host: Some("127.0.0.1".to_string()), port: Some(29_005), ..Default::default() })
        .await
        .unwrap();
    assert_ne!(id, second_id);
    let original = manager.get(id).await.unwrap();
    let shared = manager.get(second_id).await.unwrap();
    assert_eq!(original.source, shared.source);
    assert_eq!(original.transport, shared.transport);
}
