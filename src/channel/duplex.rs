use super::{ChannelState, EventStream, Frame, FrameSink, Transport};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const CREATED: u8 = 0;
const STARTED: u8 = 1;
const STOPPED: u8 = 2;
const CLOSED: u8 = 3;

fn decode_state(raw: u8) -> ChannelState {
    match raw {
        CREATED => ChannelState::Created,
        STARTED => ChannelState::Started,
        STOPPED => ChannelState::Stopped,
        _ => ChannelState::Closed,
    }
}

/// Bidirectional connection bound 1:1 to a session id
///
/// The write and read halves sit behind separate locks so one feeder and one
/// receiver can use the channel at the same time. Dropping the channel releases
/// both halves; `close()` additionally shuts the write half down in order.
pub struct DuplexChannel {
    session_id: String,
    transport: Arc<dyn Transport>,
    state: AtomicU8,
    sink: Mutex<Option<Box<dyn FrameSink>>>,
    events: Mutex<Option<Box<dyn EventStream>>>,
}

impl DuplexChannel {
    /// Allocates a channel for `session_id` without touching the network
    pub fn new(session_id: &str, transport: Arc<dyn Transport>) -> Result<Self> {
        if session_id.is_empty() {
            return Err(Error::InvalidArgument(
                "session id must not be empty".to_string(),
            ));
        }

        debug!(
            "Channel created for session {} ({} transport)",
            session_id,
            transport.name()
        );

        Ok(Self {
            session_id: session_id.to_string(),
            transport,
            state: AtomicU8::new(CREATED),
            sink: Mutex::new(None),
            events: Mutex::new(None),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> ChannelState {
        decode_state(self.state.load(Ordering::SeqCst))
    }

    /// Connects the transport and moves Created → Started
    ///
    /// A failed connect leaves the channel in Created.
    pub async fn start(&self) -> Result<()> {
        let state = self.state();
        if state != ChannelState::Created {
            return Err(Error::State {
                operation: "start",
                state,
            });
        }

        let connection = self.transport.connect(&self.session_id).await?;
        *self.sink.lock().await = Some(connection.sink);
        *self.events.lock().await = Some(connection.events);

        if self
            .state
            .compare_exchange(CREATED, STARTED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // close() won the race while we were connecting
            self.sink.lock().await.take();
            self.events.lock().await.take();
            return Err(Error::State {
                operation: "start",
                state: self.state(),
            });
        }

        info!(
            "Channel started for session {} via {}",
            self.session_id,
            self.transport.name()
        );
        Ok(())
    }

    /// Sends one audio buffer. An empty buffer is a no-op unless the channel is closed.
    pub async fn send_bytes(&self, buf: &[u8]) -> Result<()> {
        let state = self.state();
        if state == ChannelState::Closed {
            return Err(Error::State {
                operation: "send audio on",
                state,
            });
        }
        if buf.is_empty() {
            return Ok(());
        }
        self.send(Frame::Audio(buf.to_vec()), "send audio on").await
    }

    /// Sends a control/text message
    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.send(Frame::Text(text.to_string()), "send text on").await
    }

    async fn send(&self, frame: Frame, operation: &'static str) -> Result<()> {
        self.ensure_started(operation)?;
        let mut sink = self.sink.lock().await;
        match sink.as_mut() {
            Some(sink) => sink.send(frame).await,
            None => Err(Error::State {
                operation,
                state: self.state(),
            }),
        }
    }

    /// Waits at most `timeout` for one inbound payload.
    ///
    /// `Ok(None)` means nothing arrived in time. A zero timeout checks once without
    /// waiting. The end of the remote stream is reported as `PeerClosed`.
    pub async fn receive(&self, timeout: Duration) -> Result<Option<String>> {
        self.ensure_started("receive from")?;

        let polled = tokio::time::timeout(timeout, async {
            let mut events = self.events.lock().await;
            match events.as_mut() {
                Some(stream) => stream.next().await,
                None => Err(Error::State {
                    operation: "receive from",
                    state: self.state(),
                }),
            }
        })
        .await;

        match polled {
            Err(_elapsed) => Ok(None),
            Ok(Ok(Some(payload))) => Ok(Some(payload)),
            Ok(Ok(None)) => Err(Error::PeerClosed),
            Ok(Err(e)) => Err(e),
        }
    }

    /// Started → Stopped; the connection stays allocated
    pub fn stop(&self) -> Result<()> {
        self.state
            .compare_exchange(STARTED, STOPPED, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|raw| Error::State {
                operation: "stop",
                state: decode_state(raw),
            })?;
        info!("Channel stopped for session {}", self.session_id);
        Ok(())
    }

    /// Releases the connection. Idempotent and infallible.
    pub async fn close(&self) {
        if self.state.swap(CLOSED, Ordering::SeqCst) == CLOSED {
            return;
        }

        let sink = self.sink.lock().await.take();
        if let Some(mut sink) = sink {
            if let Err(e) = sink.close().await {
                warn!(
                    "Failed to shut down channel for session {}: {}",
                    self.session_id, e
                );
            }
        }
        self.events.lock().await.take();

        info!("Channel closed for session {}", self.session_id);
    }

    fn ensure_started(&self, operation: &'static str) -> Result<()> {
        match self.state() {
            ChannelState::Started => Ok(()),
            state => Err(Error::State { operation, state }),
        }
    }
}
