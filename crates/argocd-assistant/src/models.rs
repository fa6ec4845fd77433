//! These models represent the objects passed around by the agent
//!
//! There are several different related formats we need to interact with:
//! - chat UI messages, sent from the Argo CD extension to the server and persisted by it
//! - UI message stream chunks, sent from the server to the extension
//! - openai messages/tools, sent from the agent to the LLM
//! - tool calls, sent from the agent to the Argo CD inspection tools
//!
//! The internal [`message::Message`] mirrors the UI shape closely so that a conversation
//! reloaded from the browser can be fed straight back into the agent. Everything else is
//! converted at the edges with to/from helpers.
pub mod message;
pub mod role;
pub mod tool;
