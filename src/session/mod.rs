//! Session metadata and bookkeeping
//!
//! - `Session`: identifiers and time budget assigned by the remote service
//! - `GracePeriod` and `SessionCloseResult`: inputs and output of the remote close
//! - `SessionRegistry`: sessions that are pending, streaming or closing
//! - `SessionStats`: counters reported when a run finishes

mod registry;
mod session;
mod stats;

pub use registry::{SessionEntry, SessionPhase, SessionRegistry};
pub use session::{GracePeriod, ModelType, Session, SessionCloseResult};
pub use stats::SessionStats;
