use super::{Connection, EventStream, Frame, FrameSink, Transport};
use crate::error::{Error, Result};
use base64::Engine;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Audio frame message published to NATS
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    pub channels: u16,
    pub timestamp: String, // RFC3339 timestamp
    #[serde(rename = "final")]
    pub final_frame: bool,
}

pub fn audio_subject(session_id: &str) -> String {
    format!("audio.frame.{session_id}")
}

pub fn control_subject(session_id: &str) -> String {
    format!("audio.control.{session_id}")
}

pub fn events_subject(session_id: &str) -> String {
    format!("stt.events.{session_id}")
}

/// NATS transport
///
/// Audio is published as JSON `AudioFrameMessage`s on `audio.frame.<session>`,
/// text on `audio.control.<session>`, and events are read from
/// `stt.events.<session>`.
#[derive(Debug, Clone)]
pub struct NatsTransport {
    url: String,
    sample_rate: u32,
    channels: u16,
}

impl NatsTransport {
    pub fn new(url: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        Self {
            url: url.into(),
            sample_rate,
            channels,
        }
    }
}

#[async_trait::async_trait]
impl Transport for NatsTransport {
    async fn connect(&self, session_id: &str) -> Result<Connection> {
        info!("Connecting to NATS at {}", self.url);

        let client = async_nats::connect(self.url.as_str())
            .await
            .map_err(|e| Error::Transport(format!("failed to connect to NATS: {e}")))?;

        let subject = events_subject(session_id);
        let subscriber = client
            .subscribe(subject.clone())
            .await
            .map_err(|e| Error::Transport(format!("failed to subscribe to {subject}: {e}")))?;

        info!("Subscribed to {}", subject);

        Ok(Connection {
            sink: Box::new(NatsSink {
                client,
                frames: FrameBuilder::new(session_id, self.sample_rate, self.channels),
            }),
            events: Box::new(NatsEvents { subscriber }),
        })
    }

    fn name(&self) -> &str {
        "nats"
    }
}

/// Numbers outbound audio frames for one session
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    session_id: String,
    sample_rate: u32,
    channels: u16,
    sequence: u32,
}

impl FrameBuilder {
    pub fn new(session_id: impl Into<String>, sample_rate: u32, channels: u16) -> Self {
        Self {
            session_id: session_id.into(),
            sample_rate,
            channels,
            sequence: 0,
        }
    }

    /// Builds the next frame and advances the sequence (wrapping)
    pub fn frame_message(&mut self, pcm_bytes: &[u8], is_final: bool) -> AudioFrameMessage {
        let message = AudioFrameMessage {
            session_id: self.session_id.clone(),
            sequence: self.sequence,
            pcm: base64::engine::general_purpose::STANDARD.encode(pcm_bytes),
            sample_rate: self.sample_rate,
            channels: self.channels,
            timestamp: chrono::Utc::now().to_rfc3339(),
            final_frame: is_final,
        };
        self.sequence = self.sequence.wrapping_add(1);
        message
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Decodes an event payload published on the events subject
pub fn decode_event(payload: &[u8]) -> Result<String> {
    String::from_utf8(payload.to_vec())
        .map_err(|e| Error::Protocol(format!("event payload is not UTF-8: {e}")))
}

struct NatsSink {
    client: async_nats::Client,
    frames: FrameBuilder,
}

impl NatsSink {
    async fn publish_audio(&mut self, pcm_bytes: &[u8], is_final: bool) -> Result<()> {
        let message = self.frames.frame_message(pcm_bytes, is_final);
        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(audio_subject(self.frames.session_id()), payload.into())
            .await
            .map_err(|e| Error::Transport(format!("failed to publish audio frame: {e}")))?;

        debug!(
            "Published audio frame (sequence={}, bytes={}, final={})",
            message.sequence,
            pcm_bytes.len(),
            is_final
        );
        Ok(())
    }
}

#[async_trait::async_trait]
impl FrameSink for NatsSink {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        match frame {
            Frame::Audio(bytes) => self.publish_audio(&bytes, false).await,
            Frame::Text(text) => self
                .client
                .publish(
                    control_subject(self.frames.session_id()),
                    text.into_bytes().into(),
                )
                .await
                .map_err(|e| Error::Transport(format!("failed to publish control message: {e}"))),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.publish_audio(&[], true).await?;
        self.client
            .flush()
            .await
            .map_err(|e| Error::Transport(format!("failed to flush NATS connection: {e}")))
    }
}

struct NatsEvents {
    subscriber: async_nats::Subscriber,
}

#[async_trait::async_trait]
impl EventStream for NatsEvents {
    async fn next(&mut self) -> Result<Option<String>> {
        match self.subscriber.next().await {
            Some(message) => decode_event(&message.payload).map(Some),
            None => Ok(None),
        }
    }
}

