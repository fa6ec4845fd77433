use anyhow::{anyhow, Context, Result};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

use super::base::{Provider, ProviderEvent, ProviderStream, Usage};
use super::configs::OpenAiProviderConfig;
use super::sse::SseDecoder;
use super::utils::{
    messages_to_openai_spec, openai_error, tools_to_openai_spec, StreamChunk, StreamUsage,
    ToolCallAccumulator,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(usage: StreamUsage) -> Usage {
        let total_tokens = usage
            .total_tokens
            .or_else(|| match (usage.prompt_tokens, usage.completion_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });

        Usage::new(usage.prompt_tokens, usage.completion_tokens, total_tokens)
    }

    async fn post(&self, payload: Value) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let error = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.get("error").cloned());

        match (status, error) {
            // Quota and rate limit failures carry the provider's explanation
            (StatusCode::TOO_MANY_REQUESTS, error) => {
                let detail = error
                    .as_ref()
                    .and_then(|error| error.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or(body);
                Err(anyhow!("Rate limited: {}: {}", status, detail))
            }
            (status, _) if status.is_server_error() => Err(anyhow!("Server error: {}", status)),
            // Raise specific error if context length is exceeded
            (_, Some(error)) => Err(openai_error(&error)),
            (status, None) => Err(anyhow!("Request failed: {}: {}", status, body)),
        }
    }
}

/// Decode an OpenAI chat completion event stream into provider events
///
/// Text and reasoning are forwarded as they arrive. Tool calls are announced as soon as
/// their name is known and emitted complete, in index order, once the stream ends.
pub fn decode_stream<S, B, E>(body: S) -> ProviderStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    Box::pin(try_stream! {
        let mut body = Box::pin(body);
        let mut decoder = SseDecoder::new();
        let mut calls = ToolCallAccumulator::default();
        let mut done = false;

        while !done {
            let payloads = match body.next().await {
                Some(chunk) => {
                    let chunk = chunk.context("Failed to read the model response")?;
                    decoder.feed(chunk.as_ref())
                }
                None => {
                    done = true;
                    decoder.finish().into_iter().collect()
                }
            };

            for payload in payloads {
                if payload.trim() == "[DONE]" {
                    done = true;
                    break;
                }
                for event in chunk_events(&payload, &mut calls)? {
                    yield event;
                }
            }
        }

        for part in calls.finish() {
            yield ProviderEvent::ToolCall(part);
        }
    })
}

fn chunk_events(payload: &str, calls: &mut ToolCallAccumulator) -> Result<Vec<ProviderEvent>> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(Vec::new());
    }

    let chunk: StreamChunk = serde_json::from_str(payload)
        .map_err(|e| anyhow!("Failed to parse stream chunk: {}", e))?;
    if let Some(error) = chunk.error {
        return Err(openai_error(&error));
    }

    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(text) = choice.delta.reasoning_text() {
            events.push(ProviderEvent::ReasoningDelta(text));
        }
        if let Some(text) = choice.delta.content.filter(|text| !text.is_empty()) {
            events.push(ProviderEvent::TextDelta(text));
        }
        if let Some(deltas) = choice.delta.tool_calls {
            for (id, name) in calls.apply(deltas) {
                events.push(ProviderEvent::ToolInputStart { id, name });
            }
        }
    }
    if let Some(usage) = chunk.usage {
        events.push(ProviderEvent::Usage(OpenAiProvider::get_usage(usage)));
    }

    Ok(events)
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderStream> {
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let messages_spec = messages_to_openai_spec(messages);
        let tools_spec = tools_to_openai_spec(tools)?;

        let mut messages_array = vec![system_message];
        messages_array.extend(messages_spec);

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array,
            "stream": true,
            "stream_options": {"include_usage": true}
        });
        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }

        tracing::debug!(
            model = %self.config.model,
            messages = messages.len(),
            "starting model round"
        );
        let response = self.post(payload).await?;
        Ok(decode_stream(response.bytes_stream()))
    }
}
