use crate::error::Result;
use crate::session::{GracePeriod, ModelType};
use crate::stream::{AudioFormat, StreamSettings};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub api_base_url: String,
    pub websocket_url: String,
    pub nats_url: String,
    pub credential: String,
    pub request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api/".to_string(),
            websocket_url: "ws://localhost:8080/realtime".to_string(),
            nats_url: "nats://localhost:4222".to_string(),
            credential: String::new(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub bytes_per_sample: u16,
    pub chunk_duration_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            bytes_per_sample: 2,
            chunk_duration_ms: 200,
        }
    }
}

/// Which transport carries the real-time channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Websocket,
    Nats,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub model: ModelType,
    pub transport: TransportKind,
    pub poll_interval_ms: u64,
    pub drain_attempts: usize,
    pub grace_period_secs: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            model: ModelType::Speed,
            transport: TransportKind::Websocket,
            poll_interval_ms: 500,
            drain_attempts: 3,
            grace_period_secs: 0.0,
        }
    }
}

impl Config {
    /// Loads `<path>.toml` if present, then `LIVESCRIBE__*` environment overrides
    /// (e.g. `LIVESCRIBE__SERVICE__CREDENTIAL`).
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("LIVESCRIBE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.service.request_timeout_secs)
    }

    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            bytes_per_sample: self.audio.bytes_per_sample,
        }
    }
}

impl From<&Config> for StreamSettings {
    fn from(config: &Config) -> Self {
        Self {
            format: config.audio_format(),
            chunk_duration: Duration::from_millis(config.audio.chunk_duration_ms),
            poll_interval: Duration::from_millis(config.stream.poll_interval_ms),
            drain_attempts: config.stream.drain_attempts,
            grace_period: GracePeriod::from_secs_f64(config.stream.grace_period_secs),
        }
    }
}
