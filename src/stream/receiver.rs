use crate::channel::DuplexChannel;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// One message delivered by the remote service
///
/// The payload is kept as received; callers decide how to interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub payload: String,
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    pub fn new(payload: String) -> Self {
        Self {
            payload,
            received_at: Utc::now(),
        }
    }

    /// Decodes the payload as JSON
    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Polls a channel for inbound events with a bounded wait per poll
pub struct EventReceiver<'a> {
    channel: &'a DuplexChannel,
    poll_interval: Duration,
    sink: Option<mpsc::UnboundedSender<InboundEvent>>,
    received: usize,
}

impl<'a> EventReceiver<'a> {
    pub fn new(
        channel: &'a DuplexChannel,
        poll_interval: Duration,
        sink: Option<mpsc::UnboundedSender<InboundEvent>>,
    ) -> Self {
        Self {
            channel,
            poll_interval,
            sink,
            received: 0,
        }
    }

    /// Number of events delivered so far
    pub fn received(&self) -> usize {
        self.received
    }

    /// Polls once. `Ok(true)` when an event arrived within the poll interval.
    pub async fn poll_once(&mut self) -> Result<bool> {
        match self.channel.receive(self.poll_interval).await? {
            Some(payload) => {
                self.deliver(payload);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Collects events still pending after feeding stopped.
    ///
    /// Stops at the first empty poll, when the peer ends the stream, on
    /// cancellation, or after `max_attempts` polls. Returns the number drained.
    pub async fn drain(&mut self, max_attempts: usize, cancel: &CancellationToken) -> Result<usize> {
        let mut drained = 0;

        for _ in 0..max_attempts {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Drain interrupted by cancellation");
                    break;
                }
                polled = self.poll_once() => polled,
            };

            match polled {
                Ok(true) => drained += 1,
                Ok(false) => break,
                Err(Error::PeerClosed) => {
                    debug!("Peer ended the event stream during drain");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        info!("Drained {} pending events", drained);
        Ok(drained)
    }

    fn deliver(&mut self, payload: String) {
        self.received += 1;
        debug!("Event {} received ({} bytes)", self.received, payload.len());

        if let Some(sink) = &self.sink {
            if sink.send(InboundEvent::new(payload)).is_err() {
                warn!("Event consumer went away; further events are counted but dropped");
                self.sink = None;
            }
        }
    }
}
