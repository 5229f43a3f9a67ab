use crate::core::{ChatRequest, FragmentStream, GenerativeBackend, StructuredRequest};
use crate::error::{AIError, ConfigError};
use async_trait::async_trait;
use std::env;
use std::sync::Arc;

/// Backend selection for the binary and for tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    #[cfg(feature = "gemini")]
    Gemini,
    Mock,
}

impl Default for ClientType {
    /// Gemini when an API key is configured, otherwise the mock
    fn default() -> Self {
        #[cfg(feature = "gemini")]
        {
            let _ = dotenvy::dotenv();
            if env::var("GEMINI_API_KEY").is_ok() {
                return Self::Gemini;
            }
        }
        Self::Mock
    }
}

impl ClientType {
    /// Parse client type from string (case insensitive)
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            #[cfg(feature = "gemini")]
            "gemini" => Ok(Self::Gemini),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown client type: '{}'. Supported: gemini, mock", s)),
        }
    }

    /// `LUMINA_CLIENT` if set and valid, otherwise [`ClientType::default`]
    pub fn from_env() -> Self {
        env::var("LUMINA_CLIENT")
            .ok()
            .and_then(|s| Self::from_str(&s).ok())
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "gemini")]
            ClientType::Gemini => write!(f, "Gemini"),
            ClientType::Mock => write!(f, "Mock"),
        }
    }
}

/// Flexible client that wraps any GenerativeBackend chosen at runtime
#[derive(Debug, Clone)]
pub struct FlexibleClient {
    inner: Arc<dyn GenerativeBackend>,
}

impl FlexibleClient {
    pub fn new(client: Box<dyn GenerativeBackend>) -> Self {
        Self { inner: Arc::from(client) }
    }

    /// Build the backend for `client_type`; Gemini prompts for a missing key
    pub fn from_type(client_type: ClientType) -> Result<Self, ConfigError> {
        match client_type {
            #[cfg(feature = "gemini")]
            ClientType::Gemini => Ok(Self::gemini(super::gemini::GeminiClient::interactive()?)),
            ClientType::Mock => Ok(Self::mock().0),
        }
    }

    #[cfg(feature = "gemini")]
    pub fn gemini(client: super::gemini::GeminiClient) -> Self {
        Self::new(Box::new(client))
    }

    /// Create a FlexibleClient with a mock and return the handle for configuration
    pub fn mock() -> (Self, Arc<super::mock::MockHandle>) {
        let (mock_client, handle) = super::mock::MockClient::new();
        (Self::new(Box::new(mock_client)), handle)
    }
}

#[async_trait]
impl GenerativeBackend for FlexibleClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<FragmentStream, AIError> {
        self.inner.stream_chat(request).await
    }

    async fn generate_structured(&self, request: StructuredRequest) -> Result<String, AIError> {
        self.inner.generate_structured(request).await
    }

    fn clone_box(&self) -> Box<dyn GenerativeBackend> {
        Box::new(self.clone())
    }
}
