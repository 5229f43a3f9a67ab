//! Backend abstraction: the two request shapes the tutor sends to a hosted
//! generative model, and the trait every provider implements.
//!
//! - **Chat**: `GenerativeBackend::stream_chat` sends the system instruction
//!   plus the whole conversation and yields incremental [`Fragment`]s.
//! - **Structured**: `GenerativeBackend::generate_structured` sends one prompt
//!   with a response schema and returns the raw JSON text.

use std::fmt::Debug;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;

use crate::error::AIError;
use crate::models::Role;
use crate::streaming::Fragment;

/// Type alias for raw byte streams from AI providers
pub type RawByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, AIError>> + Send>>;

/// Fragments decoded from a provider stream, faults included
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, AIError>> + Send>>;

/// One turn of conversation history
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

/// Generation knobs attached to every chat request of a session
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub thinking_budget: Option<u32>,
    pub web_grounding: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            temperature: 0.5,
            thinking_budget: Some(32768),
            web_grounding: true,
        }
    }
}

/// A conversational request: the backend is stateless, so the full history
/// (ending with the new user turn) travels with every call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system_instruction: String,
    pub contents: Vec<Turn>,
    pub generation: GenerationSettings,
}

impl ChatRequest {
    /// Text of the final user turn, if any
    pub fn latest_user_text(&self) -> Option<&str> {
        self.contents
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.text.as_str())
    }
}

/// A one-shot request whose reply must be JSON matching `response_schema`
#[derive(Debug, Clone, PartialEq)]
pub struct StructuredRequest {
    pub prompt: String,
    pub response_schema: serde_json::Value,
}

/// Low-level model client abstraction.
///
/// Implementors only move requests and bytes; prompting, folding and
/// fallback policy live in the session client and quiz generator.
#[async_trait]
pub trait GenerativeBackend: Send + Sync + Debug {
    /// Open a streamed chat completion
    async fn stream_chat(&self, request: ChatRequest) -> Result<FragmentStream, AIError>;

    /// Run a structured completion and return the raw reply text
    async fn generate_structured(&self, request: StructuredRequest) -> Result<String, AIError>;

    /// Clone this client into a boxed trait object
    fn clone_box(&self) -> Box<dyn GenerativeBackend>;
}

impl Clone for Box<dyn GenerativeBackend> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

#[async_trait]
impl GenerativeBackend for Box<dyn GenerativeBackend> {
    async fn stream_chat(&self, request: ChatRequest) -> Result<FragmentStream, AIError> {
        self.as_ref().stream_chat(request).await
    }

    async fn generate_structured(&self, request: StructuredRequest) -> Result<String, AIError> {
        self.as_ref().generate_structured(request).await
    }

    fn clone_box(&self) -> Box<dyn GenerativeBackend> {
        self.as_ref().clone_box()
    }
}
