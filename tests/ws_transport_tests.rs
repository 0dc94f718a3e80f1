// Integration tests for the websocket transport
//
// The fake service greets each connection, acknowledges audio frames with a
// text event, and hangs up when it receives "bye".

mod common;

use common::{FakeService, GOOD_KEY};
use livescribe::channel::{ChannelState, DuplexChannel, WsTransport};
use livescribe::Error;
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn event_type(payload: &str) -> String {
    let value: serde_json::Value = serde_json::from_str(payload).unwrap();
    value["type"].as_str().unwrap().to_string()
}

#[test]
fn test_session_url_appends_session_id() {
    let transport = WsTransport::new("wss://example.com/realtime/").unwrap();
    assert_eq!(
        transport.session_url("sess-9").unwrap().as_str(),
        "wss://example.com/realtime/sess-9"
    );
}

#[test]
fn test_non_websocket_scheme_is_rejected() {
    assert!(matches!(
        WsTransport::new("http://example.com/realtime"),
        Err(Error::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_audio_round_trip_over_websocket() {
    let service = FakeService::start().await;
    let transport = WsTransport::new(&service.ws_url())
        .unwrap()
        .with_credential(GOOD_KEY);
    let channel = DuplexChannel::new("sess-1", Arc::new(transport)).unwrap();

    channel.start().await.unwrap();

    let ready = channel.receive(WAIT).await.unwrap().unwrap();
    assert_eq!(event_type(&ready), "ready");

    channel.send_bytes(&[1u8; 640]).await.unwrap();
    let ack = channel.receive(WAIT).await.unwrap().unwrap();
    let ack: serde_json::Value = serde_json::from_str(&ack).unwrap();
    assert_eq!(ack["type"], "ack");
    assert_eq!(ack["bytes"], 640);

    channel.send_text("flush").await.unwrap();
    channel.stop().unwrap();
    channel.close().await;
    assert_eq!(channel.state(), ChannelState::Closed);

    let (sessions, auth, audio) = service.state.snapshot(|r| {
        (r.ws_sessions.clone(), r.ws_auth.clone(), r.ws_audio.clone())
    });
    assert_eq!(sessions, vec!["sess-1".to_string()]);
    assert_eq!(auth, vec![Some(format!("Bearer {GOOD_KEY}"))]);
    assert_eq!(audio, vec![vec![1u8; 640]]);
}

#[tokio::test]
async fn test_quiet_socket_times_out_without_error() {
    let service = FakeService::start().await;
    let transport = WsTransport::new(&service.ws_url()).unwrap();
    let channel = DuplexChannel::new("sess-2", Arc::new(transport)).unwrap();
    channel.start().await.unwrap();

    // Consume the greeting, then nothing else is sent
    channel.receive(WAIT).await.unwrap().unwrap();
    assert_eq!(
        channel.receive(Duration::from_millis(100)).await.unwrap(),
        None
    );

    channel.close().await;
}

#[tokio::test]
async fn test_server_hang_up_is_peer_closed() {
    let service = FakeService::start().await;
    let transport = WsTransport::new(&service.ws_url()).unwrap();
    let channel = DuplexChannel::new("sess-3", Arc::new(transport)).unwrap();
    channel.start().await.unwrap();

    channel.receive(WAIT).await.unwrap().unwrap();
    channel.send_text("bye").await.unwrap();

    assert!(matches!(channel.receive(WAIT).await, Err(Error::PeerClosed)));
    channel.close().await;
}

#[tokio::test]
async fn test_connect_failure_is_transport_error() {
    let transport = WsTransport::new("ws://127.0.0.1:9/realtime")
        .unwrap()
        .with_connect_timeout(Duration::from_secs(2));
    let channel = DuplexChannel::new("sess-4", Arc::new(transport)).unwrap();

    assert!(matches!(channel.start().await, Err(Error::Transport(_))));
    assert_eq!(channel.state(), ChannelState::Created);
}
