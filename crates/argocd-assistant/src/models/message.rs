use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::role::Role;
use super::tool::ToolCall;

fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Streaming state the UI attaches to text and reasoning parts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartState {
    Streaming,
    Done,
}

/// Lifecycle of a single tool call, named the way the chat UI names it on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolCallState {
    /// The model is still producing the input
    #[serde(rename = "input-streaming")]
    PendingInput,
    /// The input is complete and the call can be executed
    #[serde(rename = "input-available")]
    InputReady,
    #[serde(rename = "output-available")]
    OutputAvailable,
    #[serde(rename = "output-error")]
    OutputError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PartState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningPart {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PartState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolCallState,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl ToolCallPart {
    /// A complete tool call request, ready to be executed
    pub fn input_ready<I: Into<String>, N: Into<String>>(id: I, name: N, input: Value) -> Self {
        Self {
            tool_call_id: id.into(),
            tool_name: name.into(),
            state: ToolCallState::InputReady,
            input,
            output: None,
            error_text: None,
        }
    }

    /// A tool call the model produced but that can never be executed, e.g. because the
    /// arguments were not valid JSON
    pub fn invalid<I, N, E>(id: I, name: N, input: Value, error: E) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        E: Into<String>,
    {
        Self {
            tool_call_id: id.into(),
            tool_name: name.into(),
            state: ToolCallState::OutputError,
            input,
            output: None,
            error_text: Some(error.into()),
        }
    }

    pub fn with_output(mut self, output: Value) -> Self {
        self.state = ToolCallState::OutputAvailable;
        self.output = Some(output);
        self.error_text = None;
        self
    }

    pub fn with_error<E: Into<String>>(mut self, error: E) -> Self {
        self.state = ToolCallState::OutputError;
        self.output = None;
        self.error_text = Some(error.into());
        self
    }

    pub fn is_resolved(&self) -> bool {
        matches!(
            self.state,
            ToolCallState::OutputAvailable | ToolCallState::OutputError
        )
    }

    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall::new(&self.tool_name, self.input.clone())
    }
}

/// One typed fragment of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text(TextPart),
    Reasoning(ReasoningPart),
    #[serde(rename = "dynamic-tool")]
    ToolCall(ToolCallPart),
    /// Part kinds the UI may persist (step markers, files, sources) that the agent ignores
    #[serde(other)]
    Other,
}

impl MessagePart {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessagePart::Text(TextPart {
            text: text.into(),
            state: None,
        })
    }

    pub fn reasoning<S: Into<String>>(text: S) -> Self {
        MessagePart::Reasoning(ReasoningPart {
            text: text.into(),
            state: None,
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePart::Text(part) => Some(&part.text),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCallPart> {
        if let MessagePart::ToolCall(ref part) = self {
            Some(part)
        } else {
            None
        }
    }
}

/// A message in the conversation, shaped like the messages the chat UI persists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default = "generate_id")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl Message {
    pub fn new(role: Role) -> Self {
        Message {
            id: generate_id(),
            role,
            parts: Vec::new(),
        }
    }

    pub fn user() -> Self {
        Self::new(Role::User)
    }

    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    pub fn tool() -> Self {
        Self::new(Role::Tool)
    }

    pub fn with_id<S: Into<String>>(mut self, id: S) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_part(mut self, part: MessagePart) -> Self {
        self.parts.push(part);
        self
    }

    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_part(MessagePart::text(text))
    }

    pub fn with_reasoning<S: Into<String>>(self, text: S) -> Self {
        self.with_part(MessagePart::reasoning(text))
    }

    pub fn with_tool_call(self, part: ToolCallPart) -> Self {
        self.with_part(MessagePart::ToolCall(part))
    }

    /// Extend the trailing text part with a streamed delta, starting a new part if the
    /// last one is of another kind
    pub fn append_text(&mut self, delta: &str) {
        match self.parts.last_mut() {
            Some(MessagePart::Text(part)) => part.text.push_str(delta),
            _ => self.parts.push(MessagePart::text(delta)),
        }
    }

    pub fn append_reasoning(&mut self, delta: &str) {
        match self.parts.last_mut() {
            Some(MessagePart::Reasoning(part)) => part.text.push_str(delta),
            _ => self.parts.push(MessagePart::reasoning(delta)),
        }
    }

    /// All text parts joined together
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(MessagePart::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallPart> {
        self.parts.iter().filter_map(MessagePart::as_tool_call)
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls().next().is_some()
    }
}
