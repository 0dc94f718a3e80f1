use super::feeder::{AudioFeeder, AudioFormat};
use super::receiver::{EventReceiver, InboundEvent};
use crate::api::SessionApi;
use crate::channel::{ChannelState, DuplexChannel, Transport};
use crate::error::{Error, Result, RunError, Stage};
use crate::session::{
    GracePeriod, ModelType, Session, SessionCloseResult, SessionPhase, SessionRegistry,
    SessionStats,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

/// Tuning for a streaming run
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub format: AudioFormat,
    /// Audio covered by one chunk
    pub chunk_duration: Duration,
    /// Bounded wait of each receive poll
    pub poll_interval: Duration,
    /// Maximum polls after feeding stops
    pub drain_attempts: usize,
    pub grace_period: GracePeriod,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            chunk_duration: Duration::from_millis(200),
            poll_interval: Duration::from_millis(500),
            drain_attempts: 3,
            grace_period: GracePeriod::NONE,
        }
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub session: Session,
    pub stats: SessionStats,
    pub close: SessionCloseResult,
}

/// Orchestrates session creation, concurrent feed/receive, and ordered shutdown
pub struct SessionController {
    api: Arc<dyn SessionApi>,
    transport: Arc<dyn Transport>,
    registry: Arc<SessionRegistry>,
    credential: String,
    settings: StreamSettings,
}

impl SessionController {
    pub fn new(
        api: Arc<dyn SessionApi>,
        transport: Arc<dyn Transport>,
        credential: impl Into<String>,
        settings: StreamSettings,
    ) -> Self {
        Self {
            api,
            transport,
            registry: Arc::new(SessionRegistry::new()),
            credential: credential.into(),
            settings,
        }
    }

    /// Shares an existing registry instead of a private one
    pub fn with_registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Requests a new session from the remote service and tracks it
    pub async fn create_session(&self, model: ModelType) -> Result<Session> {
        if self.credential.trim().is_empty() {
            return Err(Error::InvalidCredential(
                "credential must not be empty".to_string(),
            ));
        }

        let session = self.api.create_session(model, &self.credential).await?;
        info!(
            "Session created: task_id={} session_id={} max_time={}s",
            session.task_id, session.session_id, session.max_time
        );

        self.registry.register(session.clone()).await;
        Ok(session)
    }

    /// Allocates a channel for `session_id`; no network traffic
    pub fn open_channel(&self, session_id: &str) -> Result<DuplexChannel> {
        DuplexChannel::new(session_id, Arc::clone(&self.transport))
    }

    pub async fn close_session(
        &self,
        task_id: &str,
        grace_period: GracePeriod,
    ) -> Result<SessionCloseResult> {
        if task_id.is_empty() {
            return Err(Error::InvalidArgument("task id must not be empty".to_string()));
        }

        let result = self
            .api
            .close_session(task_id, &self.credential, grace_period)
            .await?;
        info!(
            "Session {} closed with status {} (grace period {}s)",
            task_id,
            result.status,
            grace_period.as_secs()
        );
        Ok(result)
    }

    /// Create → open → run. A failed creation never opens a channel.
    pub async fn transcribe<R>(
        &self,
        model: ModelType,
        source: &mut R,
        events: Option<mpsc::UnboundedSender<InboundEvent>>,
        cancel: &CancellationToken,
    ) -> std::result::Result<RunReport, RunError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let session = self
            .create_session(model)
            .await
            .map_err(|e| RunError::new(Stage::Create, e))?;

        let channel = match self.open_channel(&session.session_id) {
            Ok(channel) => channel,
            Err(e) => {
                self.abandon(&session).await;
                return Err(RunError::new(Stage::Open, e));
            }
        };

        self.run(&session, channel, source, events, cancel).await
    }

    /// Streams `source` through `channel` while collecting events, then shuts down.
    ///
    /// Shutdown order is fixed: stop feeding, drain pending events, close the
    /// channel, close the remote session. The remote close is attempted exactly
    /// once on every path; if an earlier stage already failed, that failure is
    /// returned and a close failure is only logged.
    pub async fn run<R>(
        &self,
        session: &Session,
        channel: DuplexChannel,
        source: &mut R,
        events: Option<mpsc::UnboundedSender<InboundEvent>>,
        cancel: &CancellationToken,
    ) -> std::result::Result<RunReport, RunError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        let span = info_span!(
            "session",
            task_id = %session.task_id,
            run_id = %uuid::Uuid::new_v4()
        );
        self.run_session(session, channel, source, events, cancel)
            .instrument(span)
            .await
    }

    async fn run_session<R>(
        &self,
        session: &Session,
        channel: DuplexChannel,
        source: &mut R,
        events: Option<mpsc::UnboundedSender<InboundEvent>>,
        cancel: &CancellationToken,
    ) -> std::result::Result<RunReport, RunError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        self.registry
            .set_phase(&session.task_id, SessionPhase::Streaming)
            .await;
        let started_at = Utc::now();
        let clock = tokio::time::Instant::now();

        let mut feeder = AudioFeeder::new(self.settings.format, self.settings.chunk_duration);
        let mut receiver = EventReceiver::new(&channel, self.settings.poll_interval, events);

        let streamed = self
            .stream(&channel, &mut feeder, &mut receiver, source, cancel)
            .await;
        let events_received = receiver.received();

        if channel.state() == ChannelState::Started {
            if let Err(e) = channel.stop() {
                warn!("Failed to stop channel: {}", e);
            }
        }
        channel.close().await;

        self.registry
            .set_phase(&session.task_id, SessionPhase::Closing)
            .await;
        let closed = self
            .close_session(&session.task_id, self.settings.grace_period)
            .await;
        self.registry.remove(&session.task_id).await;

        let stats = SessionStats {
            task_id: session.task_id.clone(),
            started_at,
            duration_secs: clock.elapsed().as_secs_f64(),
            chunks_sent: feeder.chunks_sent(),
            bytes_sent: feeder.bytes_sent(),
            events_received,
        };
        info!(
            "Run finished: {} chunks, {} bytes, {} events in {:.1}s",
            stats.chunks_sent, stats.bytes_sent, stats.events_received, stats.duration_secs
        );

        match (streamed, closed) {
            (Err(e), closed) => {
                if let Err(close_error) = closed {
                    warn!(
                        "Best-effort session close after {} failure also failed: {}",
                        e.stage, close_error
                    );
                }
                Err(e)
            }
            (Ok(()), Ok(close)) => {
                if !close.is_success() {
                    warn!(
                        "Remote reported unsuccessful close: status={} error_code={:?}",
                        close.status, close.error_code
                    );
                }
                Ok(RunReport {
                    session: session.clone(),
                    stats,
                    close,
                })
            }
            (Ok(()), Err(e)) => Err(RunError::new(Stage::Close, e)),
        }
    }

    async fn stream<R>(
        &self,
        channel: &DuplexChannel,
        feeder: &mut AudioFeeder,
        receiver: &mut EventReceiver<'_>,
        source: &mut R,
        cancel: &CancellationToken,
    ) -> std::result::Result<(), RunError>
    where
        R: AsyncRead + Unpin + Send + ?Sized,
    {
        channel
            .start()
            .await
            .map_err(|e| RunError::new(Stage::Start, e))?;

        // A receive failure stops the feeder without cancelling the caller's token
        let feed_cancel = cancel.child_token();
        let mut receive_error: Option<Error> = None;

        let fed = {
            let feed = feeder.feed(channel, source, &feed_cancel);
            tokio::pin!(feed);

            loop {
                if receive_error.is_some() {
                    break feed.as_mut().await;
                }

                tokio::select! {
                    biased;
                    result = feed.as_mut() => break result,
                    polled = receiver.poll_once() => {
                        if let Err(e) = polled {
                            warn!("Receiving failed, stopping the feeder: {}", e);
                            feed_cancel.cancel();
                            receive_error = Some(e);
                        }
                    }
                }
            }
        };

        if let Some(e) = receive_error {
            return Err(RunError::new(Stage::Receive, e));
        }
        match fed {
            Ok(()) => {}
            Err(Error::Cancelled) => return Err(RunError::new(Stage::Feed, Error::Cancelled)),
            Err(e) => {
                // Events already queued are still delivered before the feed error surfaces
                let drained = receiver.drain(self.settings.drain_attempts, cancel).await;
                if let Err(drain_error) = drained {
                    warn!("Drain after feed failure also failed: {}", drain_error);
                }
                return Err(RunError::new(Stage::Feed, e));
            }
        }

        receiver
            .drain(self.settings.drain_attempts, cancel)
            .await
            .map_err(|e| RunError::new(Stage::Drain, e))?;

        Ok(())
    }

    async fn abandon(&self, session: &Session) {
        if let Err(e) = self
            .close_session(&session.task_id, self.settings.grace_period)
            .await
        {
            warn!("Failed to close abandoned session {}: {}", session.task_id, e);
        }
        self.registry.remove(&session.task_id).await;
    }
}
