use serde::{Deserialize, Serialize};

use crate::core::{ChatRequest, StructuredRequest, Turn};
use crate::models::{GroundingSource, Role};
use crate::streaming::Fragment;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GeminiModel {
    #[default]
    Pro3Preview,
    Pro25,
    Flash25,
    Override(String),
}

impl GeminiModel {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Pro3Preview => "gemini-3-pro-preview",
            Self::Pro25 => "gemini-2.5-pro",
            Self::Flash25 => "gemini-2.5-flash",
            Self::Override(s) => s.as_str(),
        }
    }

    /// Known ids map to their variant, anything else is passed through.
    #[must_use]
    pub fn from_id(id: &str) -> Self {
        match id {
            "gemini-3-pro-preview" => Self::Pro3Preview,
            "gemini-2.5-pro" => Self::Pro25,
            "gemini-2.5-flash" => Self::Flash25,
            other => Self::Override(other.to_string()),
        }
    }
}

// ---- request wire format ----

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part { text: Some(text.to_string()), thought: false }],
        }
    }
}

impl From<&Turn> for Content {
    fn from(turn: &Turn) -> Self {
        let role = match turn.role {
            Role::User => "user",
            Role::Model => "model",
        };
        Self::text(Some(role), &turn.text)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub thought: bool,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThinkingConfig {
    pub thinking_budget: u32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    pub google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct GoogleSearch {}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

impl From<&ChatRequest> for GenerateContentRequest {
    fn from(request: &ChatRequest) -> Self {
        let generation = &request.generation;
        let tools = if generation.web_grounding {
            vec![Tool { google_search: GoogleSearch::default() }]
        } else {
            Vec::new()
        };
        Self {
            system_instruction: Some(Content::text(None, &request.system_instruction)),
            contents: request.contents.iter().map(Content::from).collect(),
            generation_config: Some(GenerationConfig {
                temperature: Some(generation.temperature),
                thinking_config: generation
                    .thinking_budget
                    .map(|thinking_budget| ThinkingConfig { thinking_budget }),
                ..Default::default()
            }),
            tools,
        }
    }
}

impl From<&StructuredRequest> for GenerateContentRequest {
    fn from(request: &StructuredRequest) -> Self {
        Self {
            system_instruction: None,
            contents: vec![Content::text(Some("user"), &request.prompt)],
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                response_schema: Some(request.response_schema.clone()),
                ..Default::default()
            }),
            tools: Vec::new(),
        }
    }
}

// ---- response wire format ----

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub grounding_metadata: Option<GroundingMetadata>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GroundingMetadata {
    #[serde(default)]
    pub grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroundingChunk {
    pub web: Option<WebChunk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebChunk {
    pub uri: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl GenerateContentResponse {
    /// Non-thought text of the first candidate
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text.as_deref())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Web citations of the first candidate; chunks without a uri are dropped
    pub fn sources(&self) -> Vec<GroundingSource> {
        self.candidates
            .first()
            .and_then(|c| c.grounding_metadata.as_ref())
            .map(|meta| {
                meta.grounding_chunks
                    .iter()
                    .filter_map(|chunk| chunk.web.as_ref())
                    .filter_map(|web| {
                        web.uri.as_ref().map(|uri| GroundingSource {
                            uri: uri.clone(),
                            title: web.title.clone().unwrap_or_default(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn into_fragment(self) -> Fragment {
        Fragment::with_sources(self.text(), self.sources())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::GenerationSettings;

    #[test]
    fn chat_request_carries_reasoning_and_search_tool() {
        let request = ChatRequest {
            system_instruction: "Be Socratic".to_string(),
            contents: vec![Turn::user("hi"), Turn::model("hello"), Turn::user("explain")],
            generation: GenerationSettings::default(),
        };
        let body = serde_json::to_value(GenerateContentRequest::from(&request)).unwrap();

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be Socratic");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["thinkingConfig"]["thinkingBudget"], 32768);
        assert_eq!(body["tools"][0]["googleSearch"], serde_json::json!({}));
    }

    #[test]
    fn thought_parts_are_not_part_of_the_text() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[
            {"text":"planning...","thought":true},{"text":"Hello "},{"text":"there"}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.text(), "Hello there");
    }
}
