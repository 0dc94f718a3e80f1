//! Real-time streaming: paced audio out, events in, ordered shutdown

mod controller;
mod feeder;
mod receiver;

pub use controller::{RunReport, SessionController, StreamSettings};
pub use feeder::{chunk_bytes, AudioFeeder, AudioFormat, FALLBACK_CHUNK_BYTES};
pub use receiver::{EventReceiver, InboundEvent};
