//! Quiz generator: one structured request per question, typed decode, and the
//! fixed fallback question when the reply cannot be used.

use std::sync::Arc;

use schemars::schema_for;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

use crate::core::{GenerativeBackend, StructuredRequest};
use crate::error::{AIError, QuizDecodeError};
use crate::interceptors::Interceptor;
use crate::json_utils::extract_first;
use crate::models::{AdminSettings, GradeLevel, Language, QuizQuestion, Subject, QUIZ_OPTION_COUNT};
use crate::prompts;

/// Wire shape of a quiz reply before validation. The index is signed so a
/// negative value is reported as out of range rather than as a parse failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuizQuestion {
    question: String,
    options: Vec<String>,
    correct_answer_index: i64,
    explanation: String,
}

/// Response schema in the Gemini `responseSchema` dialect.
pub fn response_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "question": { "type": "STRING" },
            "options": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "minItems": QUIZ_OPTION_COUNT,
                "maxItems": QUIZ_OPTION_COUNT
            },
            "correctAnswerIndex": { "type": "INTEGER" },
            "explanation": { "type": "STRING" }
        },
        "required": ["question", "options", "correctAnswerIndex", "explanation"]
    })
}

/// Append JSON schema guidance for `QuizQuestion` to a prompt
fn add_schema_guidance(prompt: String) -> String {
    let schema = schema_for!(QuizQuestion);
    let schema_json = serde_json::to_string_pretty(&schema)
        .unwrap_or_else(|_| "Schema serialization failed".to_string());

    format!(
        "{}\n\n## Response Format\nRespond with only a JSON object matching this schema:\n```json\n{}\n```",
        prompt, schema_json
    )
}

/// Decode and validate a structured quiz reply.
///
/// Accepts bare JSON or JSON embedded in surrounding text/code fences.
pub fn decode_question(raw: &str) -> Result<QuizQuestion, QuizDecodeError> {
    let parsed: RawQuizQuestion = extract_first(raw).ok_or_else(|| {
        let preview: String = raw.chars().take(200).collect();
        QuizDecodeError::NoQuestionFound(preview)
    })?;

    if parsed.options.len() != QUIZ_OPTION_COUNT {
        return Err(QuizDecodeError::OptionCount {
            expected: QUIZ_OPTION_COUNT,
            actual: parsed.options.len(),
        });
    }

    let index = usize::try_from(parsed.correct_answer_index)
        .ok()
        .filter(|i| *i < parsed.options.len())
        .ok_or(QuizDecodeError::AnswerIndexOutOfRange {
            index: parsed.correct_answer_index,
            options: parsed.options.len(),
        })?;

    Ok(QuizQuestion {
        question: parsed.question,
        options: parsed.options,
        correct_answer_index: index,
        explanation: parsed.explanation,
    })
}

/// The decoded question, or [`QuizQuestion::fallback`] when decoding fails.
pub fn question_or_fallback(raw: &str) -> QuizQuestion {
    match decode_question(raw) {
        Ok(question) => question,
        Err(e) => {
            warn!(target: "lumina_tutor::quiz", error = %e, "Malformed quiz reply, serving fallback question");
            QuizQuestion::fallback()
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuizGenerator<B: GenerativeBackend> {
    backend: B,
    settings: AdminSettings,
    interceptor: Option<Arc<dyn Interceptor>>,
}

impl<B: GenerativeBackend> QuizGenerator<B> {
    pub fn new(backend: B, settings: AdminSettings) -> Self {
        Self { backend, settings, interceptor: None }
    }

    /// Record every prompt/reply exchange through `interceptor`
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptor = Some(interceptor);
        self
    }

    pub fn set_admin_settings(&mut self, settings: AdminSettings) {
        self.settings = settings;
    }

    /// Ask for one question about `recent_context`.
    ///
    /// Transport failures are returned; unusable replies are not, they become
    /// the fallback question. One attempt, no retry.
    #[instrument(target = "lumina_tutor::quiz", skip(self, recent_context), fields(context_len = recent_context.len()))]
    pub async fn generate_question(
        &self,
        grade: GradeLevel,
        subject: Subject,
        language: Language,
        recent_context: &str,
    ) -> Result<QuizQuestion, AIError> {
        let prompt = add_schema_guidance(prompts::quiz_prompt(
            grade,
            subject,
            language,
            recent_context,
            &self.settings.ai_modifier,
        ));

        let raw = self
            .backend
            .generate_structured(StructuredRequest {
                prompt: prompt.clone(),
                response_schema: response_schema(),
            })
            .await?;

        if let Some(interceptor) = &self.interceptor {
            if let Err(e) = interceptor.save(&prompt, &raw).await {
                warn!(target: "lumina_tutor::quiz", error = %e, "Failed to record quiz exchange");
            }
        }

        let question = question_or_fallback(&raw);
        info!(target: "lumina_tutor::quiz", options = question.options.len(), "Quiz question ready");
        Ok(question)
    }
}
