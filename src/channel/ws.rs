use super::{Connection, EventStream, Frame, FrameSink, Transport};
use crate::error::{Error, Result};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket transport: one socket per session at `<base_url>/<session_id>`
///
/// Audio goes out as binary frames, control messages as text frames. Inbound text
/// frames are events; ping/pong and binary frames are skipped.
#[derive(Debug, Clone)]
pub struct WsTransport {
    base_url: Url,
    credential: Option<String>,
    connect_timeout: Duration,
}

impl WsTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::InvalidArgument(format!("invalid websocket url {base_url}: {e}")))?;
        if !matches!(base_url.scheme(), "ws" | "wss") {
            return Err(Error::InvalidArgument(format!(
                "websocket url must use ws:// or wss://, got {base_url}"
            )));
        }

        Ok(Self {
            base_url,
            credential: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    /// Sends `credential` as a bearer token in the handshake
    pub fn with_credential(mut self, credential: impl Into<String>) -> Self {
        let credential = credential.into();
        self.credential = (!credential.is_empty()).then_some(credential);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn session_url(&self, session_id: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidArgument(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .push(session_id);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl Transport for WsTransport {
    async fn connect(&self, session_id: &str) -> Result<Connection> {
        let url = self.session_url(session_id)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::InvalidArgument(format!("invalid websocket request: {e}")))?;

        if let Some(credential) = &self.credential {
            let value = HeaderValue::from_str(&format!("Bearer {credential}")).map_err(|_| {
                Error::InvalidCredential("credential is not a valid header value".to_string())
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        info!("Connecting websocket for session {}", session_id);

        let (stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| {
                Error::Transport(format!(
                    "timed out after {:?} connecting to {url}",
                    self.connect_timeout
                ))
            })?
            .map_err(|e| Error::Transport(format!("failed to connect to {url}: {e}")))?;

        let (sink, stream) = stream.split();

        Ok(Connection {
            sink: Box::new(WsSink { inner: sink }),
            events: Box::new(WsEvents { inner: stream }),
        })
    }

    fn name(&self) -> &str {
        "websocket"
    }
}

struct WsSink {
    inner: SplitSink<WsStream, Message>,
}

#[async_trait::async_trait]
impl FrameSink for WsSink {
    async fn send(&mut self, frame: Frame) -> Result<()> {
        let message = match frame {
            Frame::Audio(bytes) => Message::binary(bytes),
            Frame::Text(text) => Message::text(text),
        };
        self.inner
            .send(message)
            .await
            .map_err(|e| Error::Transport(format!("websocket send failed: {e}")))
    }

    async fn close(&mut self) -> Result<()> {
        self.inner
            .close()
            .await
            .map_err(|e| Error::Transport(format!("websocket close failed: {e}")))
    }
}

struct WsEvents {
    inner: SplitStream<WsStream>,
}

#[async_trait::async_trait]
impl EventStream for WsEvents {
    async fn next(&mut self) -> Result<Option<String>> {
        loop {
            match self.inner.next().await {
                None => return Ok(None),
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Close(frame))) => {
                    debug!("Websocket closed by peer: {:?}", frame);
                    return Ok(None);
                }
                Some(Ok(Message::Binary(bytes))) => {
                    debug!("Ignoring {} byte binary frame", bytes.len());
                }
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return Ok(None),
                Some(Err(e)) => {
                    return Err(Error::Transport(format!("websocket receive failed: {e}")))
                }
            }
        }
    }
}
