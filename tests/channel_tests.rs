// Integration tests for the duplex channel lifecycle
//
// These tests drive a DuplexChannel over the in-memory loopback and verify the
// Created → Started → Stopped → Closed rules.

use livescribe::channel::{ChannelState, DuplexChannel, Frame, MemoryTransport, WireOp};
use livescribe::Error;
use std::sync::Arc;
use std::time::Duration;

fn loopback(session_id: &str) -> (DuplexChannel, livescribe::channel::MemoryPeer) {
    let (transport, peer) = MemoryTransport::new();
    let channel = DuplexChannel::new(session_id, Arc::new(transport)).unwrap();
    (channel, peer)
}

#[test]
fn test_empty_session_id_is_rejected() {
    let (transport, _peer) = MemoryTransport::new();
    let result = DuplexChannel::new("", Arc::new(transport));
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[tokio::test]
async fn test_new_channel_does_not_connect() {
    let (channel, peer) = loopback("sess-1");
    assert_eq!(channel.state(), ChannelState::Created);
    assert_eq!(peer.connect_attempts(), 0);
}

#[tokio::test]
async fn test_operations_before_start_fail() {
    let (channel, _peer) = loopback("sess-1");

    assert!(matches!(
        channel.send_bytes(&[1, 2]).await,
        Err(Error::State { state: ChannelState::Created, .. })
    ));
    assert!(matches!(
        channel.send_text("hi").await,
        Err(Error::State { .. })
    ));
    assert!(matches!(
        channel.receive(Duration::ZERO).await,
        Err(Error::State { .. })
    ));
    assert!(matches!(channel.stop(), Err(Error::State { .. })));
}

#[tokio::test]
async fn test_started_channel_sends_in_order() {
    let (channel, mut peer) = loopback("sess-1");
    channel.start().await.unwrap();
    assert_eq!(channel.state(), ChannelState::Started);

    channel.send_bytes(&[1, 2, 3]).await.unwrap();
    channel.send_text("{\"type\":\"flush\"}").await.unwrap();
    channel.send_bytes(&[4]).await.unwrap();

    assert_eq!(
        peer.ops(),
        &[
            WireOp::Connected("sess-1".to_string()),
            WireOp::Sent(Frame::Audio(vec![1, 2, 3])),
            WireOp::Sent(Frame::Text("{\"type\":\"flush\"}".to_string())),
            WireOp::Sent(Frame::Audio(vec![4])),
        ]
    );
}

#[tokio::test]
async fn test_empty_audio_is_a_noop() {
    let (channel, mut peer) = loopback("sess-1");

    // Not on the wire, and not an error even before start
    channel.send_bytes(&[]).await.unwrap();

    channel.start().await.unwrap();
    channel.send_bytes(&[]).await.unwrap();
    channel.stop().unwrap();
    channel.send_bytes(&[]).await.unwrap();

    assert!(peer.audio_chunks().is_empty());
}

#[tokio::test]
async fn test_start_twice_fails() {
    let (channel, _peer) = loopback("sess-1");
    channel.start().await.unwrap();
    assert!(matches!(
        channel.start().await,
        Err(Error::State { state: ChannelState::Started, .. })
    ));
}

#[tokio::test]
async fn test_failed_connect_stays_created() {
    let (channel, peer) = loopback("sess-1");
    peer.refuse_connect();

    assert!(matches!(channel.start().await, Err(Error::Transport(_))));
    assert_eq!(channel.state(), ChannelState::Created);
}

#[tokio::test]
async fn test_receive_returns_pending_event() {
    let (channel, peer) = loopback("sess-1");
    channel.start().await.unwrap();

    peer.emit("{\"text\":\"hello\"}");
    let event = channel.receive(Duration::from_millis(100)).await.unwrap();
    assert_eq!(event.as_deref(), Some("{\"text\":\"hello\"}"));
}

#[tokio::test(start_paused = true)]
async fn test_receive_times_out_without_event() {
    let (channel, _peer) = loopback("sess-1");
    channel.start().await.unwrap();

    let started = tokio::time::Instant::now();
    let event = channel.receive(Duration::from_millis(500)).await.unwrap();
    assert_eq!(event, None);

    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(500));
    assert!(waited < Duration::from_millis(600), "overshoot: {:?}", waited);
}

#[tokio::test]
async fn test_zero_timeout_checks_once() {
    let (channel, peer) = loopback("sess-1");
    channel.start().await.unwrap();

    assert_eq!(channel.receive(Duration::ZERO).await.unwrap(), None);

    peer.emit("ready");
    assert_eq!(
        channel.receive(Duration::ZERO).await.unwrap().as_deref(),
        Some("ready")
    );
}

#[tokio::test]
async fn test_peer_hang_up_is_reported() {
    let (channel, mut peer) = loopback("sess-1");
    channel.start().await.unwrap();

    peer.emit("last");
    peer.hang_up();

    assert_eq!(
        channel.receive(Duration::from_millis(50)).await.unwrap().as_deref(),
        Some("last")
    );
    assert!(matches!(
        channel.receive(Duration::from_millis(50)).await,
        Err(Error::PeerClosed)
    ));
}

#[tokio::test]
async fn test_stopped_channel_rejects_io() {
    let (channel, _peer) = loopback("sess-1");
    channel.start().await.unwrap();
    channel.stop().unwrap();

    assert_eq!(channel.state(), ChannelState::Stopped);
    assert!(matches!(
        channel.send_bytes(&[1]).await,
        Err(Error::State { state: ChannelState::Stopped, .. })
    ));
    assert!(matches!(
        channel.receive(Duration::ZERO).await,
        Err(Error::State { .. })
    ));
}

#[tokio::test]
async fn test_close_is_idempotent_from_any_state() {
    let (never_started, mut peer) = loopback("sess-1");
    never_started.close().await;
    never_started.close().await;
    assert_eq!(never_started.state(), ChannelState::Closed);
    assert!(peer.ops().is_empty());

    let (channel, mut peer) = loopback("sess-2");
    channel.start().await.unwrap();
    channel.close().await;
    channel.close().await;

    let closes = peer.ops().iter().filter(|op| **op == WireOp::Closed).count();
    assert_eq!(closes, 1, "the write half is shut down once");
}

#[tokio::test]
async fn test_closed_channel_rejects_everything() {
    let (channel, _peer) = loopback("sess-1");
    channel.start().await.unwrap();
    channel.close().await;

    assert!(matches!(
        channel.send_bytes(&[]).await,
        Err(Error::State { state: ChannelState::Closed, .. })
    ));
    assert!(matches!(
        channel.send_bytes(&[1]).await,
        Err(Error::State { state: ChannelState::Closed, .. })
    ));
    assert!(matches!(channel.send_text("x").await, Err(Error::State { .. })));
    assert!(matches!(
        channel.receive(Duration::ZERO).await,
        Err(Error::State { .. })
    ));
    assert!(matches!(channel.start().await, Err(Error::State { .. })));
    assert!(matches!(channel.stop(), Err(Error::State { .. })));
}

#[tokio::test]
async fn test_send_failure_surfaces_transport_error() {
    let (channel, mut peer) = loopback("sess-1");
    peer.fail_send_at(2);
    channel.start().await.unwrap();

    channel.send_bytes(&[1]).await.unwrap();
    assert!(matches!(
        channel.send_bytes(&[2]).await,
        Err(Error::Transport(_))
    ));
    assert_eq!(peer.audio_chunks(), vec![vec![1]]);
}
