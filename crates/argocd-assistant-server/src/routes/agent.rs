use crate::routes::ui_stream::{UiChunk, UiStreamEncoder, DONE_FRAME, UI_MESSAGE_STREAM_HEADER};
use crate::state::AppState;
use argocd_assistant::{
    agent::Agent,
    argocd::{ApplicationRef, ArgoCdClient},
    models::message::{Message, MessagePart, ToolCallPart, ToolCallState},
    providers::openai::OpenAiProvider,
    tools::ToolRegistry,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use serde::Deserialize;
use std::{
    convert::Infallible,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

const APPLICATION_HEADER: &str = "argocd-application-name";
const PROJECT_HEADER: &str = "argocd-project-name";

#[derive(Debug, Deserialize)]
struct ChatRequest {
    messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    #[serde(default)]
    id: Option<String>,
    role: String,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

/// UI message stream response
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
                (HeaderName::from_static(UI_MESSAGE_STREAM_HEADER), "v1"),
            ],
            body,
        )
            .into_response()
    }
}

fn message_with_id(role: fn() -> Message, id: Option<&str>) -> Message {
    match id {
        Some(id) => role().with_id(id),
        None => role(),
    }
}

/// Split one persisted assistant message into the model-facing shape: each step's
/// text and tool requests in an assistant message, followed by a tool message with
/// the results. Tool calls the UI never saw resolved are dropped.
fn split_assistant(id: Option<&str>, parts: Vec<MessagePart>, messages: &mut Vec<Message>) {
    let mut assistant = message_with_id(Message::assistant, id);
    let mut results = Message::tool();

    for part in parts {
        match part {
            MessagePart::ToolCall(call) if call.is_resolved() => {
                let request = ToolCallPart {
                    state: ToolCallState::InputReady,
                    output: None,
                    error_text: None,
                    ..call.clone()
                };
                assistant.parts.push(MessagePart::ToolCall(request));
                results.parts.push(MessagePart::ToolCall(call));
            }
            MessagePart::ToolCall(call) => {
                tracing::debug!(id = %call.tool_call_id, "dropping unresolved tool call");
            }
            MessagePart::Text(_) | MessagePart::Reasoning(_) => {
                if results.has_tool_calls() {
                    messages.push(std::mem::replace(&mut assistant, Message::assistant()));
                    messages.push(std::mem::replace(&mut results, Message::tool()));
                }
                assistant.parts.push(part);
            }
            MessagePart::Other => {}
        }
    }

    if !assistant.parts.is_empty() {
        messages.push(assistant);
    }
    if results.has_tool_calls() {
        messages.push(results);
    }
}

// Convert the UI conversation to the agent's message list
fn convert_messages(incoming: Vec<IncomingMessage>) -> Vec<Message> {
    let mut messages = Vec::new();

    for msg in incoming {
        match msg.role.as_str() {
            "user" => {
                let mut message = message_with_id(Message::user, msg.id.as_deref());
                message.parts = msg
                    .parts
                    .into_iter()
                    .filter(|part| matches!(part, MessagePart::Text(_)))
                    .collect();
                if !message.parts.is_empty() {
                    messages.push(message);
                }
            }
            "assistant" => split_assistant(msg.id.as_deref(), msg.parts, &mut messages),
            _ => {
                tracing::warn!("Unknown role: {}", msg.role);
            }
        }
    }

    messages
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn application_from_headers(headers: &HeaderMap) -> Result<(String, ApplicationRef), StatusCode> {
    let origin = header_value(headers, header::ORIGIN.as_str()).ok_or_else(|| {
        tracing::warn!("Request is missing the Origin header");
        StatusCode::BAD_REQUEST
    })?;

    let qualified = header_value(headers, APPLICATION_HEADER).ok_or_else(|| {
        tracing::warn!("Request is missing the {} header", APPLICATION_HEADER);
        StatusCode::BAD_REQUEST
    })?;
    let mut application = ApplicationRef::parse_qualified(qualified).ok_or_else(|| {
        tracing::warn!("Malformed application name: {}", qualified);
        StatusCode::BAD_REQUEST
    })?;

    if let Some(project) = header_value(headers, PROJECT_HEADER) {
        application = application.with_project(project);
    }

    Ok((origin.to_string(), application))
}

async fn send_chunks(tx: &mpsc::Sender<String>, chunks: Vec<UiChunk>) -> bool {
    for chunk in chunks {
        if tx.send(chunk.to_sse()).await.is_err() {
            return false;
        }
    }
    true
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<SseResponse, StatusCode> {
    let (origin, application) = application_from_headers(&headers)?;

    let client = ArgoCdClient::new(&origin, state.argocd_token.clone()).map_err(|e| {
        tracing::warn!("Rejecting origin {}: {}", origin, e);
        StatusCode::BAD_REQUEST
    })?;
    let registry = ToolRegistry::new(Arc::new(client), application.clone());

    let provider = OpenAiProvider::new(state.provider_config.clone()).map_err(|e| {
        tracing::error!("Failed to create the model provider: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    let agent = Agent::new(Box::new(provider), registry, &state.agent_config).map_err(|e| {
        tracing::error!("Failed to create the agent: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let messages = convert_messages(request.messages);
    tracing::info!(%application, messages = messages.len(), "starting agent");

    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    tokio::spawn(async move {
        let mut encoder = UiStreamEncoder::new(Uuid::new_v4().simple().to_string());
        if !send_chunks(&tx, vec![encoder.start()]).await {
            return;
        }

        let mut stream = agent.reply(&messages);
        loop {
            match timeout(Duration::from_millis(500), stream.next()).await {
                Ok(Some(Ok(event))) => {
                    if !send_chunks(&tx, encoder.encode(event)).await {
                        tracing::info!("Client disconnected, stopping the agent");
                        return;
                    }
                }
                Ok(Some(Err(e))) => {
                    tracing::error!("Error processing message: {}", e);
                    send_chunks(&tx, encoder.error(e.to_string())).await;
                    break;
                }
                Ok(None) => break,
                // Heartbeat, used to detect disconnected clients and then end running tools
                Err(_) => {
                    if tx.is_closed() {
                        tracing::info!("Client disconnected, stopping the agent");
                        return;
                    }
                }
            }
        }

        if send_chunks(&tx, encoder.finish()).await {
            let _ = tx.send(DONE_FRAME.to_string()).await;
        }
    });

    Ok(SseResponse::new(stream))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/agent", post(handler))
        .with_state(state)
}
