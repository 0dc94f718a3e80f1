pub mod api;
pub mod audio;
pub mod channel;
pub mod config;
pub mod error;
pub mod session;
pub mod stream;

pub use api::{HttpApi, SessionApi};
pub use audio::{open_source, AudioFile};
pub use channel::{ChannelState, DuplexChannel, Frame, Transport};
pub use config::Config;
pub use error::{Error, Result, RunError, Stage};
pub use session::{GracePeriod, ModelType, Session, SessionCloseResult, SessionStats};
pub use stream::{AudioFormat, InboundEvent, RunReport, SessionController, StreamSettings};
