pub mod models;

use crate::config::KeyFromEnv;
use crate::core::{ChatRequest, FragmentStream, GenerativeBackend, StructuredRequest};
use crate::error::{AIError, ConfigError, GeminiError};
use crate::streaming::sse_data_events;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, Response};
use tracing::{debug, error, info, instrument, warn};

pub use models::GeminiModel;
use models::{GenerateContentRequest, GenerateContentResponse};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for Gemini client
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: GeminiModel,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: GeminiModel::default(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

impl KeyFromEnv for GeminiClient {
    const KEY_NAME: &'static str = "GEMINI_API_KEY";
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        info!(model = %config.model.id(), "Creating new Gemini client");
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Client keyed from `GEMINI_API_KEY` (environment or `.env`), prompting
    /// on the terminal when the key is missing
    pub fn interactive() -> Result<Self, ConfigError> {
        let api_key = Self::find_key_with_user()?;
        Ok(Self::new(GeminiConfig { api_key, ..GeminiConfig::default() }))
    }

    pub fn with_model(mut self, model: GeminiModel) -> Self {
        info!(model = %model.id(), "Setting Gemini model");
        self.config.model = model;
        self
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model.id(),
            method
        )
    }

    async fn post(&self, url: String, body: &GenerateContentRequest) -> Result<Response, AIError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP request failed");
                AIError::Gemini(GeminiError::Http(e.to_string()))
            })?;

        debug!(status = %response.status(), "Received response from Gemini API");

        if response.status() == 429 {
            warn!("Gemini API rate limit exceeded");
            return Err(AIError::Gemini(GeminiError::RateLimit));
        }

        if response.status() == 401 || response.status() == 403 {
            error!("Gemini API authentication failed");
            return Err(AIError::Gemini(GeminiError::Authentication));
        }

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, "Gemini API error");
            return Err(AIError::Gemini(GeminiError::Api(error_text)));
        }

        Ok(response)
    }
}

/// Decode one SSE payload of `streamGenerateContent` into a fragment.
pub fn fragment_from_event(payload: &str) -> Result<crate::streaming::Fragment, AIError> {
    let chunk: GenerateContentResponse = serde_json::from_str(payload)
        .map_err(|e| AIError::Gemini(GeminiError::Stream(format!("{}: {}", e, payload))))?;
    if let Some(err) = &chunk.error {
        return Err(AIError::Gemini(GeminiError::Api(format!("{} {}", err.code, err.message))));
    }
    Ok(chunk.into_fragment())
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    #[instrument(skip(self, request), fields(turns = request.contents.len(), model = %self.config.model.id()))]
    async fn stream_chat(&self, request: ChatRequest) -> Result<FragmentStream, AIError> {
        let body = GenerateContentRequest::from(&request);
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        debug!(turns = body.contents.len(), "Opening Gemini chat stream");

        let response = self.post(url, &body).await?;
        let bytes = response
            .bytes_stream()
            .map(|r| r.map_err(|e| AIError::Gemini(GeminiError::Http(e.to_string()))));

        info!("Gemini chat stream opened");
        let fragments = sse_data_events(Box::pin(bytes))
            .map(|event| event.and_then(|payload| fragment_from_event(&payload)));
        Ok(Box::pin(fragments))
    }

    #[instrument(skip(self, request), fields(prompt_len = request.prompt.len(), model = %self.config.model.id()))]
    async fn generate_structured(&self, request: StructuredRequest) -> Result<String, AIError> {
        let body = GenerateContentRequest::from(&request);
        let response = self.post(self.endpoint("generateContent"), &body).await?;

        let parsed: GenerateContentResponse = response.json().await.map_err(|e| {
            error!(error = %e, "Failed to parse Gemini response JSON");
            AIError::Gemini(GeminiError::Http(e.to_string()))
        })?;

        let text = parsed.text();
        info!(response_len = text.len(), "Successfully received Gemini structured response");
        Ok(text)
    }

    fn clone_box(&self) -> Box<dyn GenerativeBackend> {
        Box::new(self.clone())
    }
}
