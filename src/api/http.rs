use super::types::{
    CallbackRequest, CallbackResponse, ExportFormat, ExportKind, Language, ShareLink, StatusResult, SummaryTask, TextTranslation,
    TranslationResult, UploadOptions, UploadResult, Utterance, UtteranceTranslation,
};
use super::SessionApi;
use crate::error::{Error, Result};
use crate::session::{GracePeriod, ModelType, Session, SessionCloseResult};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{multipart, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// HTTP client for the transcription service
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Serialize)]
struct CreateSessionRequest {
    model: ModelType,
}

#[derive(Serialize)]
struct CloseSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
}

#[derive(Serialize)]
struct TranslateTranscriptRequest<'a> {
    task_id: &'a str,
    lang: Language,
}

#[derive(Serialize)]
struct TranslateUtterancesRequest<'a> {
    utterances: &'a [Utterance],
    lang: Language,
}

#[derive(Serialize)]
struct TranslateTextRequest<'a> {
    text: &'a str,
    lang: Language,
}

#[derive(Serialize)]
struct CreateSummaryRequest<'a> {
    utterances: &'a [Utterance],
}

fn require_credential(credential: &str) -> Result<()> {
    if credential.trim().is_empty() {
        return Err(Error::InvalidCredential(
            "credential must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn require_non_empty(value: &str, what: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(())
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidArgument(format!("invalid api url {base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidArgument(format!(
                "api url {base_url} cannot carry a path"
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build http client: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidArgument(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn endpoint_with_query(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    fn post_json<B: Serialize>(
        &self,
        segments: &[&str],
        credential: &str,
        body: &B,
    ) -> Result<RequestBuilder> {
        let body = serde_json::to_vec(body)?;
        Ok(self
            .client
            .post(self.endpoint(segments)?)
            .bearer_auth(credential)
            .header(CONTENT_TYPE, "application/json")
            .body(body))
    }

    async fn send_raw(&self, request: RequestBuilder) -> Result<Vec<u8>> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("request failed: {e}")))?;

        let status = response.status();
        debug!("{} -> {}", response.url(), status);

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::InvalidCredential(
                    format!("rejected by service ({status}): {message}"),
                ),
                _ => Error::Server {
                    status: status.as_u16(),
                    message,
                },
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response body: {e}")))?;
        Ok(body.to_vec())
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let body = self.send_raw(request).await?;
        serde_json::from_slice(&body)
            .map_err(|e| Error::Protocol(format!("unexpected response body: {e}")))
    }

    /// Uploads an audio file for offline transcription
    pub async fn upload(
        &self,
        credential: &str,
        path: impl AsRef<Path>,
        options: &UploadOptions,
    ) -> Result<UploadResult> {
        require_credential(credential)?;
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(Error::AudioSource)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        info!("Uploading {} ({} bytes)", path.display(), bytes.len());

        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(file_name))
            .text("transcribe_only", options.transcribe_only.to_string())
            .text("short_asr", options.short_mode.to_string())
            .text("model", options.model.as_str());

        let request = self
            .client
            .post(self.endpoint(&["transcribe", "upload"])?)
            .bearer_auth(credential)
            .multipart(form);
        self.send(request).await
    }

    /// Looks a task up by task id or by share id
    pub async fn status(
        &self,
        credential: &str,
        task_id: Option<&str>,
        share_id: Option<&str>,
    ) -> Result<StatusResult> {
        require_credential(credential)?;
        let mut query = Vec::new();
        if let Some(task_id) = task_id.filter(|id| !id.is_empty()) {
            query.push(("task_id", task_id));
        }
        if let Some(share_id) = share_id.filter(|id| !id.is_empty()) {
            query.push(("share_id", share_id));
        }
        if query.is_empty() {
            return Err(Error::InvalidArgument(
                "either a task id or a share id is required".to_string(),
            ));
        }

        let url = self.endpoint_with_query(&["transcribe", "status"], &query)?;
        self.send(self.client.get(url).bearer_auth(credential)).await
    }

    pub async fn share_link(
        &self,
        credential: &str,
        task_id: &str,
        expiration_days: u32,
    ) -> Result<ShareLink> {
        require_credential(credential)?;
        require_non_empty(task_id, "task id")?;
        let days = expiration_days.to_string();
        let url = self.endpoint_with_query(
            &["transcribe", "share"],
            &[("task_id", task_id), ("expiration_day", days.as_str())],
        )?;
        self.send(self.client.get(url).bearer_auth(credential)).await
    }

    /// Downloads an exported document. The body is returned whole.
    pub async fn export(
        &self,
        credential: &str,
        task_id: &str,
        kind: ExportKind,
        format: ExportFormat,
    ) -> Result<Vec<u8>> {
        require_credential(credential)?;
        require_non_empty(task_id, "task id")?;
        let url = self.endpoint_with_query(
            &["transcribe", "export"],
            &[
                ("task_id", task_id),
                ("type", kind.as_str()),
                ("format", format.as_str()),
            ],
        )?;

        let bytes = self.send_raw(self.client.get(url).bearer_auth(credential)).await?;
        info!("Exported {} {} for task {} ({} bytes)", kind, format, task_id, bytes.len());
        Ok(bytes)
    }

    pub async fn translate_transcript(
        &self,
        credential: &str,
        task_id: &str,
        lang: Language,
    ) -> Result<TranslationResult> {
        require_credential(credential)?;
        require_non_empty(task_id, "task id")?;
        let request = self.post_json(
            &["translate", "transcribe"],
            credential,
            &TranslateTranscriptRequest { task_id, lang },
        )?;
        self.send(request).await
    }

    pub async fn translate_utterances(
        &self,
        credential: &str,
        utterances: &[Utterance],
        lang: Language,
    ) -> Result<UtteranceTranslation> {
        require_credential(credential)?;
        if utterances.is_empty() {
            return Err(Error::InvalidArgument(
                "utterance list must not be empty".to_string(),
            ));
        }
        let request = self.post_json(
            &["translate", "utterances"],
            credential,
            &TranslateUtterancesRequest { utterances, lang },
        )?;
        self.send(request).await
    }

    pub async fn translate_text(
        &self,
        credential: &str,
        text: &str,
        lang: Language,
    ) -> Result<TextTranslation> {
        require_credential(credential)?;
        require_non_empty(text, "text")?;
        let request = self.post_json(
            &["translate", "text"],
            credential,
            &TranslateTextRequest { text, lang },
        )?;
        self.send(request).await
    }

    /// Starts a summary task over `utterances`
    pub async fn create_summary(
        &self,
        credential: &str,
        utterances: &[Utterance],
    ) -> Result<SummaryTask> {
        require_credential(credential)?;
        if utterances.is_empty() {
            return Err(Error::InvalidArgument(
                "utterance list must not be empty".to_string(),
            ));
        }
        let request = self.post_json(
            &["summary"],
            credential,
            &CreateSummaryRequest { utterances },
        )?;
        let task: SummaryTask = self.send(request).await?;
        info!("Summary task created: {}", task.task_id);
        Ok(task)
    }

    /// Forwards a task completion report to the callback endpoint
    pub async fn callback(
        &self,
        credential: &str,
        request: &CallbackRequest,
    ) -> Result<CallbackResponse> {
        require_credential(credential)?;
        require_non_empty(&request.task_id, "task id")?;
        let builder = self.post_json(&["transcribe", "callback"], credential, request)?;
        let response: CallbackResponse = self.send(builder).await?;
        debug!(
            "Callback for task {} acknowledged: {}",
            request.task_id, response.status
        );
        Ok(response)
    }
}

#[async_trait]
impl SessionApi for HttpApi {
    async fn create_session(&self, model: ModelType, credential: &str) -> Result<Session> {
        require_credential(credential)?;
        let request = self.post_json(
            &["realtime", "sessions"],
            credential,
            &CreateSessionRequest { model },
        )?;
        self.send(request).await
    }

    async fn close_session(
        &self,
        task_id: &str,
        credential: &str,
        grace_period: GracePeriod,
    ) -> Result<SessionCloseResult> {
        require_credential(credential)?;
        require_non_empty(task_id, "task id")?;

        let body = CloseSessionRequest {
            timeout: (!grace_period.is_none()).then_some(grace_period.as_secs()),
        };
        let request = self.post_json(
            &["realtime", "sessions", task_id, "close"],
            credential,
            &body,
        )?;
        self.send(request).await
    }
}
