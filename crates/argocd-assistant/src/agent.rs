use anyhow::Result;
use async_stream::try_stream;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde::Serialize;

use crate::argocd::ApplicationRef;
use crate::errors::{AgentError, AgentResult};
use crate::models::message::{Message, MessagePart, ToolCallPart, ToolCallState};
use crate::models::tool::Tool;
use crate::prompt_template::{load_embedded_prompt, SYSTEM_PROMPT};
use crate::providers::base::{Provider, ProviderEvent, Usage};
use crate::tools::ToolRegistry;

/// Model rounds allowed per request unless configured otherwise
pub const DEFAULT_MAX_STEPS: usize = 10;

/// Settings shared by every conversation, fixed at startup
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Upper bound on model rounds per request, at least 1
    pub max_steps: usize,
    /// Custom system prompt used verbatim in place of the embedded one
    pub instructions: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            instructions: None,
        }
    }
}

impl AgentConfig {
    pub fn new(max_steps: usize, instructions: Option<String>) -> AgentResult<Self> {
        if max_steps == 0 {
            return Err(AgentError::InvalidConfig(
                "max_steps must be at least 1".to_string(),
            ));
        }
        if matches!(&instructions, Some(text) if text.trim().is_empty()) {
            return Err(AgentError::InvalidConfig(
                "the custom system prompt is empty".to_string(),
            ));
        }

        Ok(Self {
            max_steps,
            instructions,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The model answered without requesting more tools
    Answered,
    /// The step budget ran out
    StepLimit,
}

/// Everything that happens while the agent works on one request, in order
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    StepStart { step: usize },
    ReasoningDelta(String),
    TextDelta(String),
    ToolInputStart {
        id: String,
        name: String,
    },
    ToolCall(ToolCallPart),
    /// A tool call resolved to an output or an error
    ToolResult(ToolCallPart),
    /// A completed assistant or tool message, as appended to the conversation
    Message(Message),
    StepFinish {
        step: usize,
        usage: Option<Usage>,
    },
    Finish(FinishReason),
}

#[derive(Serialize)]
struct SystemContext<'a> {
    application: &'a ApplicationRef,
    tools: Vec<Tool>,
}

/// Agent drives the model through rounds of tool calls against one application
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
    system_prompt: String,
    max_steps: usize,
}

impl Agent {
    pub fn new(
        provider: Box<dyn Provider>,
        registry: ToolRegistry,
        config: &AgentConfig,
    ) -> AgentResult<Self> {
        let system_prompt = match &config.instructions {
            Some(text) => text.clone(),
            None => {
                let context = SystemContext {
                    application: registry.application(),
                    tools: registry.tools(),
                };
                load_embedded_prompt(SYSTEM_PROMPT, &context)
                    .map_err(|e| AgentError::Internal(e.to_string()))?
            }
        };

        Ok(Self {
            provider,
            registry,
            system_prompt,
            max_steps: config.max_steps.max(1),
        })
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Resolve a single tool call; failures become an output-error part
    async fn dispatch_tool_call(&self, request: &ToolCallPart) -> ToolCallPart {
        if request.state == ToolCallState::OutputError {
            return request.clone();
        }

        tracing::debug!(tool = %request.tool_name, id = %request.tool_call_id, "calling tool");
        match self.registry.call(&request.to_tool_call()).await {
            Ok(output) => request.clone().with_output(output),
            Err(err) => {
                tracing::warn!(tool = %request.tool_name, error = %err, "tool call failed");
                request.clone().with_error(err.to_string())
            }
        }
    }

    /// Create a stream of everything the agent does while answering the conversation
    ///
    /// Each round streams one model response. If it requests tools they all run
    /// concurrently, their results are appended, and the next round starts, until the
    /// model answers or the step budget is spent.
    pub fn reply(&self, messages: &[Message]) -> BoxStream<'_, Result<AgentEvent>> {
        let mut messages = messages.to_vec();
        let tools = self.registry.tools();

        Box::pin(try_stream! {
            let mut step = 0;
            loop {
                step += 1;
                yield AgentEvent::StepStart { step };

                let mut stream = self
                    .provider
                    .stream(&self.system_prompt, &messages, &tools)
                    .await?;

                let mut response = Message::assistant();
                let mut requests = Vec::new();
                let mut usage = None;
                while let Some(event) = stream.try_next().await? {
                    match event {
                        ProviderEvent::ReasoningDelta(delta) => {
                            response.append_reasoning(&delta);
                            yield AgentEvent::ReasoningDelta(delta);
                        }
                        ProviderEvent::TextDelta(delta) => {
                            response.append_text(&delta);
                            yield AgentEvent::TextDelta(delta);
                        }
                        ProviderEvent::ToolInputStart { id, name } => {
                            yield AgentEvent::ToolInputStart { id, name };
                        }
                        ProviderEvent::ToolCall(part) => {
                            response.parts.push(MessagePart::ToolCall(part.clone()));
                            requests.push(part.clone());
                            yield AgentEvent::ToolCall(part);
                        }
                        ProviderEvent::Usage(round_usage) => usage = Some(round_usage),
                    }
                }

                messages.push(response.clone());
                yield AgentEvent::Message(response);

                if requests.is_empty() {
                    yield AgentEvent::StepFinish { step, usage };
                    yield AgentEvent::Finish(FinishReason::Answered);
                    break;
                }

                // Run every call of the round, results keep the request order
                let futures: Vec<_> = requests
                    .iter()
                    .map(|request| self.dispatch_tool_call(request))
                    .collect();
                let results = futures::future::join_all(futures).await;

                let mut tool_message = Message::tool();
                for result in results {
                    tool_message.parts.push(MessagePart::ToolCall(result.clone()));
                    yield AgentEvent::ToolResult(result);
                }
                messages.push(tool_message.clone());
                yield AgentEvent::Message(tool_message);
                yield AgentEvent::StepFinish { step, usage };

                if step >= self.max_steps {
                    tracing::info!(steps = step, "step budget exhausted");
                    yield AgentEvent::Finish(FinishReason::StepLimit);
                    break;
                }
            }
        })
    }
}
