use crate::channel::ChannelState;
use std::fmt;
use thiserror::Error;

/// Result type for livescribe operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the streaming client and the remote API
#[derive(Error, Debug)]
pub enum Error {
    /// Network or connection failure
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote side answered with something we could not understand
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The remote side reported a failure status
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// Payload encode/decode failure on our side
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Channel operation attempted in the wrong lifecycle state
    #[error("cannot {operation} a channel in {state} state")]
    State {
        operation: &'static str,
        state: ChannelState,
    },

    #[error("operation cancelled")]
    Cancelled,

    /// Reading the audio source failed for a reason other than end of input
    #[error("audio source read failed: {0}")]
    AudioSource(#[source] std::io::Error),

    /// The remote side ended the event stream
    #[error("connection closed by peer")]
    PeerClosed,

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl Error {
    /// True for failures detected locally without contacting the remote side
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_) | Error::State { .. } | Error::Cancelled
        )
    }
}

/// Lifecycle stage in which a session run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Create,
    Open,
    Start,
    Feed,
    Receive,
    Drain,
    Close,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Create => "create session",
            Stage::Open => "open channel",
            Stage::Start => "start channel",
            Stage::Feed => "feed audio",
            Stage::Receive => "receive events",
            Stage::Drain => "drain events",
            Stage::Close => "close session",
        };
        f.write_str(name)
    }
}

/// First fatal error of a session run, tagged with the failing stage
#[derive(Error, Debug)]
#[error("{stage} failed: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: Error,
}

impl RunError {
    pub fn new(stage: Stage, source: Error) -> Self {
        Self { stage, source }
    }

    /// The underlying error, unchanged
    pub fn error(&self) -> &Error {
        &self.source
    }

    pub fn into_inner(self) -> Error {
        self.source
    }
}
