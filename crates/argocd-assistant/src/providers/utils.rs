use anyhow::{anyhow, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::errors::AgentError;
use crate::models::message::{Message, ToolCallPart, ToolCallState};
use crate::models::role::Role;
use crate::models::tool::Tool;

const VALID_NAME_PATTERN: &str = "[a-zA-Z0-9_-]+";

lazy_static! {
    static ref INVALID_NAME_CHARS: Regex = Regex::new(r"[^a-zA-Z0-9_-]").unwrap();
    static ref VALID_NAME: Regex = Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap();
}

/// Convert the conversation to OpenAI's chat message specification
///
/// Reasoning is never sent back. Every resolved tool part becomes its own `tool` message;
/// errors are rendered as text so the model can react to them.
pub fn messages_to_openai_spec(messages: &[Message]) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        match message.role {
            Role::User => {
                let text = message.text();
                if !text.is_empty() {
                    messages_spec.push(json!({"role": "user", "content": text}));
                }
            }
            Role::Assistant => {
                let mut converted = json!({"role": "assistant"});
                let text = message.text();
                if !text.is_empty() {
                    converted["content"] = json!(text);
                }

                let tool_calls: Vec<Value> = message
                    .tool_calls()
                    .filter(|part| part.state != ToolCallState::PendingInput)
                    .map(|part| {
                        json!({
                            "id": part.tool_call_id,
                            "type": "function",
                            "function": {
                                "name": sanitize_function_name(&part.tool_name),
                                "arguments": part.input.to_string(),
                            }
                        })
                    })
                    .collect();
                if !tool_calls.is_empty() {
                    converted["tool_calls"] = json!(tool_calls);
                }

                if converted.get("content").is_some() || converted.get("tool_calls").is_some() {
                    messages_spec.push(converted);
                }
            }
            Role::Tool => {
                for part in message.tool_calls().filter(|part| part.is_resolved()) {
                    messages_spec.push(json!({
                        "role": "tool",
                        "content": tool_result_content(part),
                        "tool_call_id": part.tool_call_id,
                    }));
                }
            }
        }
    }

    messages_spec
}

fn tool_result_content(part: &ToolCallPart) -> String {
    match (&part.state, &part.output, &part.error_text) {
        (ToolCallState::OutputAvailable, Some(Value::String(text)), _) => text.clone(),
        (ToolCallState::OutputAvailable, Some(output), _) => output.to_string(),
        (ToolCallState::OutputAvailable, None, _) => "null".to_string(),
        (_, _, error) => format!(
            "The tool call returned the following error:\n{}",
            error.as_deref().unwrap_or("unknown error")
        ),
    }
}

/// Convert internal Tool format to OpenAI's API tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> Result<Vec<Value>> {
    let mut tool_names = std::collections::HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(anyhow!("Duplicate tool name: {}", tool.name));
        }

        result.push(json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.input_schema,
            }
        }));
    }

    Ok(result)
}

/// Turn a fully streamed tool call into a part, rejecting names and arguments the model
/// got wrong
pub fn tool_call_to_part(id: &str, function_name: &str, arguments: &str) -> ToolCallPart {
    if !is_valid_function_name(function_name) {
        let error = AgentError::ToolNotFound(format!(
            "The provided function name '{}' had invalid characters, it must match {}",
            function_name, VALID_NAME_PATTERN
        ));
        return ToolCallPart::invalid(id, function_name, json!({}), error.to_string());
    }

    // Some servers send no argument deltas at all for parameterless functions
    if arguments.trim().is_empty() {
        return ToolCallPart::input_ready(id, function_name, json!({}));
    }

    match serde_json::from_str::<Value>(arguments) {
        Ok(params) => ToolCallPart::input_ready(id, function_name, params),
        Err(e) => {
            let error = AgentError::InvalidParameters(format!(
                "Could not interpret tool use parameters for id {}: {}",
                id, e
            ));
            ToolCallPart::invalid(
                id,
                function_name,
                Value::String(arguments.to_string()),
                error.to_string(),
            )
        }
    }
}

fn sanitize_function_name(name: &str) -> String {
    INVALID_NAME_CHARS.replace_all(name, "_").to_string()
}

fn is_valid_function_name(name: &str) -> bool {
    VALID_NAME.is_match(name)
}

#[derive(Debug, thiserror::Error)]
#[error("Context length exceeded. Message: {0}")]
pub struct ContextLengthExceededError(String);

pub fn check_openai_context_length_error(error: &Value) -> Option<ContextLengthExceededError> {
    let code = error.get("code")?.as_str()?;
    if code == "context_length_exceeded" || code == "string_above_max_length" {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error")
            .to_string();
        Some(ContextLengthExceededError(message))
    } else {
        None
    }
}

/// Map an `error` object returned by the API to the most specific error available
pub fn openai_error(error: &Value) -> anyhow::Error {
    match check_openai_context_length_error(error) {
        Some(err) => err.into(),
        None => anyhow!("OpenAI API error: {}", error),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<StreamUsage>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub reasoning: Option<Value>,
    #[serde(default)]
    pub tool_calls: Option<Vec<StreamToolCallDelta>>,
}

impl StreamDelta {
    /// Reasoning text, whichever field the server uses for it
    pub fn reasoning_text(&self) -> Option<String> {
        let text = match (&self.reasoning_content, &self.reasoning) {
            (Some(text), _) => text.clone(),
            (None, Some(value)) => reasoning_text(value),
            (None, None) => return None,
        };
        Some(text).filter(|text| !text.is_empty())
    }
}

fn reasoning_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(reasoning_text).collect::<String>(),
        Value::Object(map) => match map.get("text").and_then(|text| text.as_str()) {
            Some(text) => text.to_string(),
            None => value.to_string(),
        },
        Value::Null => String::new(),
        _ => value.to_string(),
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamToolCallDelta {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamFunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamUsage {
    pub prompt_tokens: Option<i32>,
    pub completion_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

#[derive(Debug, Default)]
struct PendingToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
    announced: bool,
}

/// Reassembles tool calls whose id, name and arguments arrive spread over many deltas
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PendingToolCall>,
}

impl ToolCallAccumulator {
    /// Apply one batch of deltas; returns `(id, name)` for every call seen for the first
    /// time with a name
    pub fn apply(&mut self, deltas: Vec<StreamToolCallDelta>) -> Vec<(String, String)> {
        let mut started = Vec::new();

        for delta in deltas {
            let index = delta.index.unwrap_or(self.calls.len());
            let call = self.calls.entry(index).or_default();

            if let Some(id) = delta.id.filter(|id| !id.is_empty()) {
                if !call.announced {
                    call.id = Some(id);
                }
            }
            if let Some(function) = delta.function {
                if let Some(name) = function.name.filter(|name| !name.is_empty()) {
                    if call.name.is_empty() {
                        call.name = name;
                    } else if call.name != name && !call.name.ends_with(&name) {
                        call.name.push_str(&name);
                    }
                }
                if let Some(arguments) = function.arguments {
                    call.arguments.push_str(&arguments);
                }
            }

            if !call.announced && !call.name.is_empty() {
                call.announced = true;
                let id = call.id.get_or_insert_with(generated_call_id).clone();
                started.push((id, call.name.clone()));
            }
        }

        started
    }

    /// Complete calls in index order
    pub fn finish(self) -> Vec<ToolCallPart> {
        self.calls
            .into_values()
            .map(|call| {
                let id = call.id.unwrap_or_else(generated_call_id);
                tool_call_to_part(&id, &call.name, &call.arguments)
            })
            .collect()
    }
}

fn generated_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn delta(
        index: usize,
        id: Option<&str>,
        name: Option<&str>,
        arguments: &str,
    ) -> StreamToolCallDelta {
        StreamToolCallDelta {
            index: Some(index),
            id: id.map(str::to_string),
            function: Some(StreamFunctionDelta {
                name: name.map(str::to_string),
                arguments: Some(arguments.to_string()),
            }),
        }
    }

    fn stream_delta(value: Value) -> StreamDelta {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_messages_to_openai_spec() {
        let message = Message::user().with_text("Hello");
        let spec = messages_to_openai_spec(&[message]);

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], "Hello");
    }

    #[test]
    fn test_messages_to_openai_spec_tool_round() {
        let input = json!({"podName": "web-1"});
        let request = ToolCallPart::input_ready("call_1", "getPodLogs", input);
        let result = request.clone().with_output(json!(["panic: nil map"]));
        let messages = vec![
            Message::user().with_text("Why is web-1 crashing?"),
            Message::assistant()
                .with_reasoning("I should read the logs")
                .with_text("Let me check.")
                .with_tool_call(request),
            Message::tool().with_tool_call(result),
            Message::assistant().with_text("It panics on a nil map."),
        ];

        let spec = messages_to_openai_spec(&messages);

        assert_eq!(spec.len(), 4);
        assert_eq!(spec[1]["role"], "assistant");
        assert_eq!(spec[1]["content"], "Let me check.");
        assert_eq!(spec[1]["tool_calls"][0]["id"], "call_1");
        assert_eq!(spec[1]["tool_calls"][0]["function"]["name"], "getPodLogs");
        assert_eq!(
            spec[1]["tool_calls"][0]["function"]["arguments"],
            "{\"podName\":\"web-1\"}"
        );
        assert_eq!(spec[2]["role"], "tool");
        assert_eq!(spec[2]["tool_call_id"], "call_1");
        assert_eq!(spec[2]["content"], "[\"panic: nil map\"]");
        assert_eq!(spec[3]["content"], "It panics on a nil map.");
        let reasoning = "I should read the logs";
        assert!(spec.iter().all(|m| !m.to_string().contains(reasoning)));
    }

    #[test]
    fn test_tool_errors_are_sent_as_text() {
        let request = ToolCallPart::input_ready("call_9", "getPodLogs", json!({"podName": "gone"}));
        let error = "Tool execution failed: 404 Not Found";
        let failed = request.clone().with_error(error);
        let messages = vec![
            Message::assistant().with_tool_call(request),
            Message::tool().with_tool_call(failed),
        ];

        let spec = messages_to_openai_spec(&messages);
        assert_eq!(spec.len(), 2);
        assert_eq!(
            spec[1]["content"],
            "The tool call returned the following error:\nTool execution failed: 404 Not Found"
        );
    }

    #[test]
    fn test_pending_and_unresolved_parts_are_not_sent() {
        let mut pending = ToolCallPart::input_ready("call_2", "getApplication", json!({}));
        pending.state = ToolCallState::PendingInput;
        let unresolved = ToolCallPart::input_ready("call_3", "getApplication", json!({}));
        let messages = vec![
            Message::assistant().with_tool_call(pending),
            Message::tool().with_tool_call(unresolved),
        ];

        assert!(messages_to_openai_spec(&messages).is_empty());
    }

    #[test]
    fn test_tools_to_openai_spec() -> Result<()> {
        let tool = Tool::new(
            "getPodLogs",
            "Fetch logs for a pod",
            json!({
                "type": "object",
                "properties": {
                    "podName": {
                        "type": "string",
                        "description": "The name of the pod"
                    }
                },
                "required": ["podName"]
            }),
        );

        let spec = tools_to_openai_spec(&[tool])?;

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["type"], "function");
        assert_eq!(spec[0]["function"]["name"], "getPodLogs");
        let parameters = &spec[0]["function"]["parameters"];
        assert_eq!(parameters["required"], json!(["podName"]));
        Ok(())
    }

    #[test]
    fn test_tools_to_openai_spec_duplicate() {
        let tool = Tool::new("getApplication", "Fetch the app", json!({"type": "object"}));

        let result = tools_to_openai_spec(&[tool.clone(), tool]);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Duplicate tool name"));
    }

    #[test]
    fn test_sanitize_function_name() {
        assert_eq!(sanitize_function_name("hello-world"), "hello-world");
        assert_eq!(sanitize_function_name("hello world"), "hello_world");
        assert_eq!(sanitize_function_name("hello@world"), "hello_world");
    }

    #[test]
    fn test_is_valid_function_name() {
        assert!(is_valid_function_name("getApplication"));
        assert!(is_valid_function_name("hello_world"));
        assert!(!is_valid_function_name("hello world"));
        assert!(!is_valid_function_name(""));
    }

    #[test]
    fn test_tool_call_to_part() {
        let part = tool_call_to_part("call_1", "getPodLogs", "{\"podName\": \"web-1\"}");
        assert_eq!(part.state, ToolCallState::InputReady);
        assert_eq!(part.input, json!({"podName": "web-1"}));

        let part = tool_call_to_part("call_2", "getApplication", "");
        assert_eq!(part.state, ToolCallState::InputReady);
        assert_eq!(part.input, json!({}));
    }

    #[test]
    fn test_tool_call_to_part_invalid_name() {
        let part = tool_call_to_part("call_1", "get application", "{}");
        let expected = "The provided function name 'get application' had invalid characters";
        assert_eq!(part.state, ToolCallState::OutputError);
        assert!(part.error_text.unwrap().contains(expected));
    }

    #[test]
    fn test_tool_call_to_part_bad_arguments() {
        let part = tool_call_to_part("call_1", "getPodLogs", "invalid json {");
        assert_eq!(part.state, ToolCallState::OutputError);
        assert_eq!(part.input, json!("invalid json {"));
        let expected = "Could not interpret tool use parameters for id call_1";
        assert!(part.error_text.unwrap().contains(expected));
    }

    #[test]
    fn test_accumulator_reassembles_interleaved_calls() {
        let mut calls = ToolCallAccumulator::default();

        let started = calls.apply(vec![delta(0, Some("call_a"), Some("getPodLogs"), "")]);
        assert_eq!(
            started,
            vec![("call_a".to_string(), "getPodLogs".to_string())]
        );

        let started = calls.apply(vec![
            delta(1, Some("call_b"), Some("getApplicationEvents"), "{}"),
            delta(0, None, None, "{\"podName\":"),
        ]);
        assert_eq!(
            started,
            vec![("call_b".to_string(), "getApplicationEvents".to_string())]
        );

        let started = calls.apply(vec![delta(0, None, None, "\"web-1\"}")]);
        assert!(started.is_empty());

        let parts = calls.finish();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].tool_call_id, "call_a");
        assert_eq!(parts[0].input, json!({"podName": "web-1"}));
        assert_eq!(parts[1].tool_call_id, "call_b");
        assert_eq!(parts[1].tool_name, "getApplicationEvents");
    }

    #[test]
    fn test_accumulator_generates_missing_ids() {
        let mut calls = ToolCallAccumulator::default();
        let started = calls.apply(vec![delta(0, None, Some("getApplication"), "{}")]);
        assert!(started[0].0.starts_with("call_"));

        let parts = calls.finish();
        assert_eq!(parts[0].tool_call_id, started[0].0);
    }

    #[test]
    fn test_stream_delta_reasoning() {
        let delta = stream_delta(json!({"reasoning_content": "thinking"}));
        assert_eq!(delta.reasoning_text(), Some("thinking".to_string()));

        let delta = stream_delta(json!({"reasoning": [{"text": "a"}, "b"]}));
        assert_eq!(delta.reasoning_text(), Some("ab".to_string()));

        let delta = stream_delta(json!({"content": "hi"}));
        assert_eq!(delta.reasoning_text(), None);
    }

    #[test]
    fn test_check_openai_context_length_error() {
        let error = json!({
            "code": "context_length_exceeded",
            "message": "This message is too long"
        });

        let result = check_openai_context_length_error(&error);
        assert_eq!(
            result.unwrap().to_string(),
            "Context length exceeded. Message: This message is too long"
        );

        let error = json!({
            "code": "other_error",
            "message": "Some other error"
        });
        assert!(check_openai_context_length_error(&error).is_none());
        let message = openai_error(&error).to_string();
        assert!(message.starts_with("OpenAI API error"));
    }
}
