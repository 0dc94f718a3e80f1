use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Recognition model requested when creating a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    #[default]
    Speed,
    Quality,
    QualityV2,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Speed => "speed",
            ModelType::Quality => "quality",
            ModelType::QualityV2 => "quality_v2",
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "speed" => Ok(ModelType::Speed),
            "quality" => Ok(ModelType::Quality),
            "quality_v2" => Ok(ModelType::QualityV2),
            other => Err(Error::InvalidArgument(format!("unknown model type: {other}"))),
        }
    }
}

/// A server-allocated real-time transcription context
///
/// Immutable once created; the channel and the close request both refer back to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub task_id: String,
    pub session_id: String,
    pub usage_id: String,
    /// Session time budget in seconds
    pub max_time: u32,
}

impl Session {
    pub fn time_budget(&self) -> Duration {
        Duration::from_secs(u64::from(self.max_time))
    }
}

/// Time allowance given to the remote service before a session is fully closed
///
/// Held in whole seconds. Zero means "no grace period".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GracePeriod(u64);

impl GracePeriod {
    pub const NONE: GracePeriod = GracePeriod(0);

    /// Normalizes a caller-supplied value.
    ///
    /// Non-positive (and NaN) values mean no grace period. A positive value below one
    /// second becomes one second; larger values are truncated to whole seconds.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !(secs > 0.0) {
            return GracePeriod::NONE;
        }
        GracePeriod((secs.trunc() as u64).max(1))
    }

    pub fn from_duration(duration: Duration) -> Self {
        if duration.is_zero() {
            return GracePeriod::NONE;
        }
        GracePeriod(duration.as_secs().max(1))
    }

    pub fn as_secs(&self) -> u64 {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0 == 0
    }
}

/// Terminal record produced by the explicit close operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCloseResult {
    pub status: String,
    #[serde(default)]
    pub duration: Option<i32>,
    #[serde(default)]
    pub error_code: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
}

impl SessionCloseResult {
    pub fn is_success(&self) -> bool {
        self.error_code.is_none()
    }
}
