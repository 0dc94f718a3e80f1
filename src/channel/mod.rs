//! Duplex channel bound to one transcription session
//!
//! A `DuplexChannel` owns one connection produced by a `Transport` and enforces the
//! Created → Started → Stopped → Closed lifecycle. Transports only move frames;
//! they know nothing about lifecycle rules.
//!
//! Available transports:
//! - `WsTransport`: WebSocket (binary audio frames, text events)
//! - `NatsTransport`: NATS subjects keyed by session id
//! - `MemoryTransport`: in-process loopback for tests and dry runs

mod duplex;
pub mod memory;
pub mod nats;
pub mod ws;

pub use duplex::DuplexChannel;
pub use memory::{MemoryPeer, MemoryTransport, WireOp};
pub use nats::NatsTransport;
pub use ws::WsTransport;

use crate::error::Result;
use std::fmt;

/// Outbound frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw PCM audio
    Audio(Vec<u8>),
    /// Control or text message
    Text(String),
}

impl Frame {
    pub fn len(&self) -> usize {
        match self {
            Frame::Audio(bytes) => bytes.len(),
            Frame::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lifecycle state of a duplex channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Resources allocated, not yet active
    Created,
    /// Able to send and receive
    Started,
    /// Send/receive disabled, handle still valid
    Stopped,
    /// Handle released (terminal)
    Closed,
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChannelState::Created => "created",
            ChannelState::Started => "started",
            ChannelState::Stopped => "stopped",
            ChannelState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Write half of a live connection
#[async_trait::async_trait]
pub trait FrameSink: Send {
    async fn send(&mut self, frame: Frame) -> Result<()>;

    /// Best-effort orderly shutdown of the write half
    async fn close(&mut self) -> Result<()>;
}

/// Read half of a live connection
#[async_trait::async_trait]
pub trait EventStream: Send {
    /// Waits for the next inbound text payload.
    ///
    /// Returns `Ok(None)` once the peer has ended the stream. Must be cancel-safe:
    /// dropping the future before it resolves loses no payload.
    async fn next(&mut self) -> Result<Option<String>>;
}

/// Both halves of a connection bound to one session
pub struct Connection {
    pub sink: Box<dyn FrameSink>,
    pub events: Box<dyn EventStream>,
}

/// Opens connections for sessions
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self, session_id: &str) -> Result<Connection>;

    /// Transport name for logging
    fn name(&self) -> &str;
}
