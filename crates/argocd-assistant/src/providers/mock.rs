use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::models::message::{Message, MessagePart};
use crate::models::tool::Tool;
use crate::providers::base::{Provider, ProviderEvent, ProviderStream, Usage};

/// One scripted model round
pub enum MockTurn {
    Reply(Message),
    /// The request itself fails
    Fail(String),
    /// The reply streams, then the connection breaks
    FailAfter(Message, String),
}

/// A mock provider that plays back pre-configured rounds for testing
#[derive(Clone)]
pub struct MockProvider {
    turns: Arc<Mutex<Vec<MockTurn>>>,
    calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self::scripted(responses.into_iter().map(MockTurn::Reply).collect())
    }

    pub fn scripted(turns: Vec<MockTurn>) -> Self {
        Self {
            turns: Arc::new(Mutex::new(turns)),
            calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of model rounds started so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The conversation sent on each round
    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().unwrap().clone()
    }

    fn events(message: &Message) -> Vec<Result<ProviderEvent>> {
        let mut events = Vec::new();
        for part in &message.parts {
            match part {
                MessagePart::Reasoning(part) => {
                    events.push(Ok(ProviderEvent::ReasoningDelta(part.text.clone())))
                }
                MessagePart::Text(part) => {
                    events.push(Ok(ProviderEvent::TextDelta(part.text.clone())))
                }
                MessagePart::ToolCall(part) => {
                    events.push(Ok(ProviderEvent::ToolInputStart {
                        id: part.tool_call_id.clone(),
                        name: part.tool_name.clone(),
                    }));
                    events.push(Ok(ProviderEvent::ToolCall(part.clone())));
                }
                MessagePart::Other => {}
            }
        }
        events.push(Ok(ProviderEvent::Usage(Usage::default())));
        events
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn stream(
        &self,
        _system: &str,
        messages: &[Message],
        _tools: &[Tool],
    ) -> Result<ProviderStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());

        let turn = {
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                // Return empty response if no more pre-configured responses
                MockTurn::Reply(Message::assistant().with_text(""))
            } else {
                turns.remove(0)
            }
        };

        let events = match turn {
            MockTurn::Reply(message) => Self::events(&message),
            MockTurn::Fail(error) => return Err(anyhow!(error)),
            MockTurn::FailAfter(message, error) => {
                let mut events = Self::events(&message);
                events.push(Err(anyhow!(error)));
                events
            }
        };
        Ok(Box::pin(futures::stream::iter(events)))
    }
}
