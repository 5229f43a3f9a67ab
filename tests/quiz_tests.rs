mod test_utils;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lumina_tutor::clients::mock::{MockClient, MockResponse};
use lumina_tutor::error::AIError;
use lumina_tutor::interceptors::Interceptor;
use lumina_tutor::models::{AdminSettings, GradeLevel, Language, QuizQuestion, Subject};
use lumina_tutor::quiz::{question_or_fallback, response_schema, QuizGenerator};

use crate::test_utils::{init_test_logging, quiz_json};

#[derive(Debug, Default)]
struct RecordingInterceptor {
    exchanges: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Interceptor for RecordingInterceptor {
    async fn save(&self, prompt: &str, response: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.exchanges.lock().unwrap().push((prompt.to_string(), response.to_string()));
        Ok(())
    }
}

fn quiz_generator(responses: Vec<MockResponse>, modifier: &str) -> (QuizGenerator<MockClient>, Arc<lumina_tutor::clients::mock::MockHandle>) {
    init_test_logging();
    let (backend, handle) = MockClient::with_responses(responses);
    let settings = AdminSettings { global_announcement: String::new(), ai_modifier: modifier.to_string() };
    (QuizGenerator::new(backend, settings), handle)
}

async fn ask(generator: &QuizGenerator<MockClient>) -> Result<QuizQuestion, AIError> {
    generator
        .generate_question(GradeLevel::University, Subject::Economics, Language::English, "supply and demand")
        .await
}

#[test]
fn unusable_replies_all_yield_the_same_fallback() {
    let replies = [
        "",
        "I'd rather not.",
        "{\"question\": \"unterminated",
        r#"{"question":"q","options":["a","b","c"],"correctAnswerIndex":0,"explanation":"e"}"#,
        r#"{"question":"q","options":["a","b","c","d"],"correctAnswerIndex":4,"explanation":"e"}"#,
        r#"{"question":"q","options":["a","b","c","d"],"explanation":"e"}"#,
    ];
    for reply in replies {
        assert_eq!(question_or_fallback(reply), QuizQuestion::fallback(), "reply: {}", reply);
    }
}

#[tokio::test]
async fn valid_reply_is_returned_as_is() {
    let (generator, _handle) = quiz_generator(vec![MockResponse::Structured(quiz_json("Elasticity?", 2))], "");

    let question = ask(&generator).await.unwrap();

    assert_eq!(question.question, "Elasticity?");
    assert_eq!(question.options, ["A", "B", "C", "D"]);
    assert_eq!(question.correct_answer_index, 2);
}

#[tokio::test]
async fn transport_error_is_not_masked_by_fallback() {
    let (generator, handle) = quiz_generator(vec![MockResponse::StructuredFailure("timeout".into())], "");

    let result = ask(&generator).await;

    assert!(matches!(result, Err(AIError::Mock(message)) if message == "timeout"));
    assert_eq!(handle.structured_requests().len(), 1);
}

#[tokio::test]
async fn request_carries_schema_context_and_modifier() {
    let (generator, handle) = quiz_generator(Vec::new(), "Use cricket examples");

    ask(&generator).await.unwrap();

    let request = &handle.structured_requests()[0];
    assert_eq!(request.response_schema, response_schema());
    assert_eq!(request.response_schema["properties"]["options"]["maxItems"], 4);
    assert!(request.prompt.contains("Context: supply and demand."));
    assert!(request.prompt.contains("Level: University"));
    assert!(request.prompt.contains("PLATFORM MODIFIER: Use cricket examples"));
    assert!(request.prompt.contains("## Response Format"));
}

#[tokio::test]
async fn modifier_changes_apply_to_the_next_question() {
    let (mut generator, handle) = quiz_generator(Vec::new(), "");
    ask(&generator).await.unwrap();

    generator.set_admin_settings(AdminSettings { global_announcement: String::new(), ai_modifier: "Be brief".into() });
    ask(&generator).await.unwrap();

    let requests = handle.structured_requests();
    assert!(requests[0].prompt.contains("PLATFORM MODIFIER: None"));
    assert!(requests[1].prompt.contains("PLATFORM MODIFIER: Be brief"));
}

#[tokio::test]
async fn interceptor_sees_the_raw_exchange() {
    let recorder = Arc::new(RecordingInterceptor::default());
    let (generator, _handle) = quiz_generator(vec![MockResponse::Structured("not json".into())], "");
    let generator = generator.with_interceptor(recorder.clone());

    let question = ask(&generator).await.unwrap();

    assert_eq!(question, QuizQuestion::fallback());
    let exchanges = recorder.exchanges.lock().unwrap();
    assert_eq!(exchanges.len(), 1);
    assert!(exchanges[0].0.contains("supply and demand"));
    assert_eq!(exchanges[0].1, "not json");
}
