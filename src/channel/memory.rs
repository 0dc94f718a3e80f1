//! In-process loopback transport
//!
//! The transport half plugs into a `DuplexChannel`; the `MemoryPeer` half plays the
//! remote service: it emits events, inspects everything the client did on the wire,
//! and can inject connect/send failures.

use super::{Connection, EventStream, Frame, FrameSink, Transport};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// Something the client did on the wire, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireOp {
    Connected(String),
    Sent(Frame),
    /// The client started waiting for an inbound event
    Polled,
    Closed,
}

struct Shared {
    ops_tx: mpsc::UnboundedSender<WireOp>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<String>>>,
    refuse_connect: AtomicBool,
    /// 1-based index of the send that fails; 0 disables
    fail_send_at: AtomicUsize,
    sends: AtomicUsize,
    connects: AtomicUsize,
}

impl Shared {
    fn record(&self, op: WireOp) {
        // The peer may already be gone; the op log is best-effort
        let _ = self.ops_tx.send(op);
    }
}

/// Client side of the loopback. Accepts a single connection.
#[derive(Clone)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryPeer) {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            ops_tx,
            events_rx: Mutex::new(Some(events_rx)),
            refuse_connect: AtomicBool::new(false),
            fail_send_at: AtomicUsize::new(0),
            sends: AtomicUsize::new(0),
            connects: AtomicUsize::new(0),
        });

        let peer = MemoryPeer {
            shared: Arc::clone(&shared),
            events_tx: Some(events_tx),
            ops_rx,
            ops: Vec::new(),
        };

        (Self { shared }, peer)
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, session_id: &str) -> Result<Connection> {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        if self.shared.refuse_connect.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection refused by peer".to_string()));
        }

        let events = self
            .shared
            .events_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Transport("loopback already connected".to_string()))?;

        self.shared.record(WireOp::Connected(session_id.to_string()));

        Ok(Connection {
            sink: Box::new(MemorySink {
                shared: Arc::clone(&self.shared),
            }),
            events: Box::new(MemoryEvents {
                shared: Arc::clone(&self.shared),
                rx: events,
            }),
        })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct MemorySink {
    shared: Arc<Shared>,
}

#[async_trait::async_trait]
impl FrameSink for MemorySink {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        let n = self.shared.sends.fetch_add(1, Ordering::SeqCst) + 1;
        if self.shared.fail_send_at.load(Ordering::SeqCst) == n {
            return Err(Error::Transport(format!("send #{n} rejected by peer")));
        }
        self.shared.record(WireOp::Sent(frame));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.shared.record(WireOp::Closed);
        Ok(())
    }
}

struct MemoryEvents {
    shared: Arc<Shared>,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait::async_trait]
impl EventStream for MemoryEvents {
    async fn next(&mut self) -> Result<Option<String>> {
        self.shared.record(WireOp::Polled);
        Ok(self.rx.recv().await)
    }
}

/// Remote side of the loopback
pub struct MemoryPeer {
    shared: Arc<Shared>,
    events_tx: Option<mpsc::UnboundedSender<String>>,
    ops_rx: mpsc::UnboundedReceiver<WireOp>,
    ops: Vec<WireOp>,
}

impl MemoryPeer {
    /// Queues an inbound event for the client
    pub fn emit(&self, payload: impl Into<String>) {
        if let Some(tx) = &self.events_tx {
            let _ = tx.send(payload.into());
        }
    }

    /// Sender usable from another task while the client runs
    pub fn emitter(&self) -> Option<mpsc::UnboundedSender<String>> {
        self.events_tx.clone()
    }

    /// Ends the event stream once every emitter is dropped
    pub fn hang_up(&mut self) {
        self.events_tx = None;
    }

    pub fn refuse_connect(&self) {
        self.shared.refuse_connect.store(true, Ordering::SeqCst);
    }

    /// Makes the n-th send (1-based) fail with a transport error
    pub fn fail_send_at(&self, n: usize) {
        self.shared.fail_send_at.store(n, Ordering::SeqCst);
    }

    pub fn connect_attempts(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Everything recorded so far, in wire order
    pub fn ops(&mut self) -> &[WireOp] {
        while let Ok(op) = self.ops_rx.try_recv() {
            self.ops.push(op);
        }
        &self.ops
    }

    /// Audio payloads received, in order
    pub fn audio_chunks(&mut self) -> Vec<Vec<u8>> {
        self.ops()
            .iter()
            .filter_map(|op| match op {
                WireOp::Sent(Frame::Audio(bytes)) => Some(bytes.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&mut self) -> Vec<String> {
        self.ops()
            .iter()
            .filter_map(|op| match op {
                WireOp::Sent(Frame::Text(text)) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}
