use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::models::message::{Message, ToolCallPart};
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// One increment of a streamed model response
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    ReasoningDelta(String),
    TextDelta(String),
    /// The model started producing a tool call; its input is not complete yet
    ToolInputStart {
        id: String,
        name: String,
    },
    /// A complete tool call. Calls the model got wrong arrive already in the
    /// output-error state.
    ToolCall(ToolCallPart),
    Usage(Usage),
}

pub type ProviderStream = BoxStream<'static, Result<ProviderEvent>>;

/// Base trait for model providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Start one model round and stream its response
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<ProviderStream>;
}
