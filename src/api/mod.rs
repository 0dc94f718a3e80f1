//! Remote service operations
//!
//! `SessionApi` is the narrow seam the streaming controller needs (create and
//! close a real-time session). `HttpApi` implements it over HTTP together with
//! the request/response operations (upload, status, export, translation, summary,
//! callback delivery).

mod http;
mod types;

pub use http::HttpApi;
pub use types::{
    CallbackRecord, CallbackRequest, CallbackResponse, ExportFormat, ExportKind, Language,
    ShareLink, StatusResult, SummaryContent, SummaryTask, TaskType, TextTranslation,
    TranslatedUtterance, TranslationResult, UploadOptions, UploadResult, Utterance,
    UtteranceTranslation,
};

use crate::error::Result;
use crate::session::{GracePeriod, ModelType, Session, SessionCloseResult};
use async_trait::async_trait;

/// Session lifecycle calls made against the remote service
#[async_trait]
pub trait SessionApi: Send + Sync {
    /// Allocates a real-time session on the remote side (consumes quota)
    async fn create_session(&self, model: ModelType, credential: &str) -> Result<Session>;

    /// Closes a session by task id.
    ///
    /// A non-success status reported by the remote side is a valid result, not an error.
    async fn close_session(
        &self,
        task_id: &str,
        credential: &str,
        grace_period: GracePeriod,
    ) -> Result<SessionCloseResult>;
}
