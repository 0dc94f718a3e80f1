// In-process stand-in for the transcription service
//
// Serves the HTTP API under /api/ and the real-time websocket under /realtime/,
// recording what clients send so tests can assert on the wire traffic.

#![allow(dead_code)]

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

pub const GOOD_KEY: &str = "good-key";

#[derive(Debug, Default)]
pub struct Recorded {
    pub created_models: Vec<String>,
    /// (task_id, request body) per close call
    pub close_requests: Vec<(String, Value)>,
    pub status_queries: Vec<HashMap<String, String>>,
    pub upload_fields: HashMap<String, String>,
    pub upload_file: Vec<u8>,
    pub callbacks: Vec<Value>,
    pub ws_sessions: Vec<String>,
    pub ws_auth: Vec<Option<String>>,
    pub ws_audio: Vec<Vec<u8>>,
    pub ws_texts: Vec<String>,
}

#[derive(Clone, Default)]
pub struct FakeState {
    pub recorded: Arc<Mutex<Recorded>>,
}

impl FakeState {
    pub fn snapshot<T>(&self, f: impl FnOnce(&Recorded) -> T) -> T {
        f(&self.recorded.lock().unwrap())
    }
}

pub struct FakeService {
    pub addr: SocketAddr,
    pub state: FakeState,
}

impl FakeService {
    pub async fn start() -> FakeService {
        let state = FakeState::default();
        let app = Router::new()
            .route("/api/realtime/sessions", post(create_session))
            .route("/api/realtime/sessions/:task_id/close", post(close_session))
            .route("/api/transcribe/upload", post(upload))
            .route("/api/transcribe/status", get(status))
            .route("/api/transcribe/export", get(export))
            .route("/api/transcribe/share", get(share_link))
            .route("/api/transcribe/callback", post(callback))
            .route("/api/translate/transcribe", post(translate_transcript))
            .route("/api/translate/utterances", post(translate_utterances))
            .route("/api/translate/text", post(translate_text))
            .route("/api/summary", post(create_summary))
            .route("/realtime/:session_id", get(realtime))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeService { addr, state }
    }

    pub fn api_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/realtime", self.addr)
    }
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {GOOD_KEY}"))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, "bad credential").into_response()
}

async fn create_session(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let model = body["model"].as_str().unwrap_or_default().to_string();
    state.recorded.lock().unwrap().created_models.push(model);

    Json(json!({
        "task_id": "task-1",
        "session_id": "sess-1",
        "usage_id": "usage-1",
        "max_time": 3600
    }))
    .into_response()
}

async fn close_session(
    State(state): State<FakeState>,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if task_id == "missing" {
        return (StatusCode::NOT_FOUND, "no such task").into_response();
    }
    state
        .recorded
        .lock()
        .unwrap()
        .close_requests
        .push((task_id, body));

    Json(json!({ "status": "ok", "duration": 12 })).into_response()
}

async fn upload(
    State(state): State<FakeState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }

    let mut short_mode = false;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let bytes = field.bytes().await.unwrap();
            state.recorded.lock().unwrap().upload_file = bytes.to_vec();
        } else {
            let value = field.text().await.unwrap();
            if name == "short_asr" && value == "true" {
                short_mode = true;
            }
            state.recorded.lock().unwrap().upload_fields.insert(name, value);
        }
    }

    if short_mode {
        Json(json!({ "status": "ok", "message": "done", "data": "hello there" })).into_response()
    } else {
        Json(json!({ "task_id": "upload-1" })).into_response()
    }
}

async fn status(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.recorded.lock().unwrap().status_queries.push(query.clone());

    if query.get("task_id").map(String::as_str) == Some("garbled") {
        return "not json".into_response();
    }

    Json(json!({
        "status": "done",
        "task_id": query.get("task_id"),
        "overview_md": "# Overview",
        "details": [
            { "start_time": 0.0, "end_time": 1.5, "speaker": 1, "text": "hello" }
        ],
        "keywords": ["greeting"],
        "callback_history": [
            { "timestamp": "2026-01-01T00:00:00Z", "status": "delivered", "code": 200 }
        ],
        "task_type": "normal_quality"
    }))
    .into_response()
}

async fn export(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let body = format!(
        "{}:{}:{}",
        query.get("task_id").cloned().unwrap_or_default(),
        query.get("type").cloned().unwrap_or_default(),
        query.get("format").cloned().unwrap_or_default()
    );
    body.into_bytes().into_response()
}

async fn share_link(headers: HeaderMap, Query(query): Query<HashMap<String, String>>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let task_id = query.get("task_id").cloned().unwrap_or_default();
    let days: i32 = query
        .get("expiration_day")
        .and_then(|days| days.parse().ok())
        .unwrap_or(0);
    Json(json!({
        "share_url": format!("https://share.example/{task_id}"),
        "expiration_day": days,
        "expired_at": "2026-12-31T00:00:00Z"
    }))
    .into_response()
}

async fn callback(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    state.recorded.lock().unwrap().callbacks.push(body);
    Json(json!({ "status": "received" })).into_response()
}

async fn translate_transcript(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    Json(json!({
        "task_type": "transcribe",
        "task_id": body["task_id"],
        "status": "done",
        "lang": body["lang"],
        "details": [{
            "utterance": { "start_time": 0.0, "end_time": 1.0, "speaker": 0, "text": "hello" },
            "translation": "bonjour"
        }]
    }))
    .into_response()
}

async fn translate_utterances(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let lang = body["lang"].as_str().unwrap_or_default().to_string();
    let details: Vec<Value> = body["utterances"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|mut utterance| {
            let text = utterance["text"].as_str().unwrap_or_default().to_string();
            utterance["text"] = Value::String(format!("[{lang}] {text}"));
            utterance
        })
        .collect();
    Json(json!({ "status": "ok", "lang": lang, "details": details })).into_response()
}

async fn translate_text(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let text = body["text"].as_str().unwrap_or_default();
    let lang = body["lang"].as_str().unwrap_or_default();
    Json(json!({ "status": "ok", "data": format!("[{lang}] {text}") })).into_response()
}

async fn create_summary(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let count = body["utterances"].as_array().map(Vec::len).unwrap_or(0);
    Json(json!({ "task_id": format!("summary-{count}") })).into_response()
}

async fn realtime(
    State(state): State<FakeState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    {
        let mut recorded = state.recorded.lock().unwrap();
        recorded.ws_sessions.push(session_id.clone());
        recorded.ws_auth.push(auth);
    }
    ws.on_upgrade(move |socket| serve_realtime(socket, session_id, state))
}

/// Greets, acknowledges each audio frame with a text event, and hangs up on "bye"
async fn serve_realtime(mut socket: WebSocket, session_id: String, state: FakeState) {
    let ready = json!({ "type": "ready", "session_id": session_id }).to_string();
    if socket.send(Message::Text(ready)).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Binary(bytes) => {
                let ack = json!({ "type": "ack", "bytes": bytes.len() }).to_string();
                state.recorded.lock().unwrap().ws_audio.push(bytes);
                if socket.send(Message::Text(ack)).await.is_err() {
                    return;
                }
            }
            Message::Text(text) => {
                let bye = text == "bye";
                state.recorded.lock().unwrap().ws_texts.push(text);
                if bye {
                    let _ = socket.send(Message::Close(None)).await;
                    return;
                }
            }
            Message::Close(_) => return,
            _ => {}
        }
    }
}
