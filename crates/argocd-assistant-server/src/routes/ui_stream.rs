use argocd_assistant::agent::AgentEvent;
use argocd_assistant::models::message::{ToolCallPart, ToolCallState};
use serde::Serialize;
use serde_json::Value;

/// Header the chat UI checks before reading the body as a UI message stream
pub const UI_MESSAGE_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";

/// Final frame of every stream
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

/// One frame of the UI message stream protocol
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UiChunk {
    Start {
        message_id: String,
    },
    StartStep,
    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ReasoningEnd {
        id: String,
    },
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
        dynamic: bool,
    },
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
        dynamic: bool,
    },
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
        dynamic: bool,
    },
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
        dynamic: bool,
    },
    FinishStep,
    Error {
        error_text: String,
    },
    Finish,
}

impl UiChunk {
    pub fn to_sse(&self) -> String {
        let encoded = serde_json::to_string(self).unwrap_or_default();
        format!("data: {}\n\n", encoded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Reasoning,
}

/// Turns agent events into UI chunks, opening and closing text and reasoning blocks
/// as the content kind changes. At most one block is open at a time.
pub struct UiStreamEncoder {
    message_id: String,
    open_block: Option<(BlockKind, String)>,
    next_block: usize,
}

impl UiStreamEncoder {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            open_block: None,
            next_block: 0,
        }
    }

    pub fn start(&self) -> UiChunk {
        UiChunk::Start {
            message_id: self.message_id.clone(),
        }
    }

    pub fn encode(&mut self, event: AgentEvent) -> Vec<UiChunk> {
        let mut chunks = Vec::new();
        match event {
            AgentEvent::StepStart { .. } => chunks.push(UiChunk::StartStep),
            AgentEvent::ReasoningDelta(delta) => {
                let id = self.ensure_block(BlockKind::Reasoning, &mut chunks);
                chunks.push(UiChunk::ReasoningDelta { id, delta });
            }
            AgentEvent::TextDelta(delta) => {
                let id = self.ensure_block(BlockKind::Text, &mut chunks);
                chunks.push(UiChunk::TextDelta { id, delta });
            }
            AgentEvent::ToolInputStart { id, name } => {
                self.close_block(&mut chunks);
                chunks.push(UiChunk::ToolInputStart {
                    tool_call_id: id,
                    tool_name: name,
                    dynamic: true,
                });
            }
            AgentEvent::ToolCall(part) => {
                self.close_block(&mut chunks);
                chunks.push(UiChunk::ToolInputAvailable {
                    tool_call_id: part.tool_call_id,
                    tool_name: part.tool_name,
                    input: part.input,
                    dynamic: true,
                });
            }
            AgentEvent::ToolResult(part) => {
                self.close_block(&mut chunks);
                chunks.push(tool_result_chunk(part));
            }
            AgentEvent::Message(_) => {}
            AgentEvent::StepFinish { step, usage } => {
                tracing::debug!(step, ?usage, "step finished");
                self.close_block(&mut chunks);
                chunks.push(UiChunk::FinishStep);
            }
            AgentEvent::Finish(reason) => {
                tracing::debug!(?reason, "agent finished");
                self.close_block(&mut chunks);
            }
        }
        chunks
    }

    /// A terminal error, rendered by the UI as an error banner
    pub fn error(&mut self, error_text: impl Into<String>) -> Vec<UiChunk> {
        let mut chunks = Vec::new();
        self.close_block(&mut chunks);
        chunks.push(UiChunk::Error {
            error_text: error_text.into(),
        });
        chunks
    }

    pub fn finish(&mut self) -> Vec<UiChunk> {
        let mut chunks = Vec::new();
        self.close_block(&mut chunks);
        chunks.push(UiChunk::Finish);
        chunks
    }

    fn ensure_block(&mut self, kind: BlockKind, chunks: &mut Vec<UiChunk>) -> String {
        if let Some((open, id)) = &self.open_block {
            if *open == kind {
                return id.clone();
            }
        }
        self.close_block(chunks);

        let id = format!("{}-{}", self.message_id, self.next_block);
        self.next_block += 1;
        chunks.push(match kind {
            BlockKind::Text => UiChunk::TextStart { id: id.clone() },
            BlockKind::Reasoning => UiChunk::ReasoningStart { id: id.clone() },
        });
        self.open_block = Some((kind, id.clone()));
        id
    }

    fn close_block(&mut self, chunks: &mut Vec<UiChunk>) {
        if let Some((kind, id)) = self.open_block.take() {
            chunks.push(match kind {
                BlockKind::Text => UiChunk::TextEnd { id },
                BlockKind::Reasoning => UiChunk::ReasoningEnd { id },
            });
        }
    }
}

fn tool_result_chunk(part: ToolCallPart) -> UiChunk {
    match part.state {
        ToolCallState::OutputAvailable => UiChunk::ToolOutputAvailable {
            tool_call_id: part.tool_call_id,
            output: part.output.unwrap_or(Value::Null),
            dynamic: true,
        },
        _ => UiChunk::ToolOutputError {
            tool_call_id: part.tool_call_id,
            error_text: part
                .error_text
                .unwrap_or_else(|| "The tool call did not produce a result".to_string()),
            dynamic: true,
        },
    }
}
