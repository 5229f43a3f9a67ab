#![allow(dead_code)]

use std::sync::{Arc, Once};
use std::time::Duration;

use lumina_tutor::clients::mock::{MockClient, MockHandle, MockResponse};
use lumina_tutor::config::TutorConfig;
use lumina_tutor::controller::{OnboardingForm, TranscriptObserver, TutorController};
use lumina_tutor::models::{GradeLevel, Message, Subject, ADMIN_EMAIL};
use lumina_tutor::store::SettingsStore;
use lumina_tutor::streaming::Fragment;

static INIT: Once = Once::new();

/// Route library logs to the test harness (`RUST_LOG=lumina_tutor=debug`)
pub fn init_test_logging() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Defaults with the quiz floor kept, so paused-clock tests can observe it
pub fn test_config() -> TutorConfig {
    TutorConfig::default()
}

/// Config without the quiz floor, for tests that don't care about timing
pub fn fast_config() -> TutorConfig {
    TutorConfig { quiz_min_display: Duration::ZERO, ..TutorConfig::default() }
}

pub fn quiz_json(question: &str, correct: usize) -> String {
    serde_json::json!({
        "question": question,
        "options": ["A", "B", "C", "D"],
        "correctAnswerIndex": correct,
        "explanation": "Because.",
    })
    .to_string()
}

pub fn student_form() -> OnboardingForm {
    OnboardingForm {
        name: "Thandi".to_string(),
        email: "thandi@example.com".to_string(),
        country: "South Africa".to_string(),
        grade: GradeLevel::Grade9To10,
        subject: Subject::Physics,
        topic: "Newton's laws".to_string(),
    }
}

pub fn admin_form() -> OnboardingForm {
    OnboardingForm {
        name: "Admin".to_string(),
        email: ADMIN_EMAIL.to_uppercase(),
        ..student_form()
    }
}

pub fn mock_controller(
    responses: Vec<MockResponse>,
    store: SettingsStore,
    config: TutorConfig,
) -> (TutorController<MockClient>, Arc<MockHandle>) {
    init_test_logging();
    let (client, handle) = MockClient::with_responses(responses);
    (TutorController::new(client, store, config), handle)
}

/// Controller already past onboarding; the welcome reply is "Welcome!"
pub async fn studying_controller(
    form: OnboardingForm,
    config: TutorConfig,
) -> (TutorController<MockClient>, Arc<MockHandle>) {
    let (mut controller, handle) = mock_controller(
        vec![MockResponse::Stream(vec![Fragment::text("Welcome!")])],
        SettingsStore::in_memory(),
        config,
    );
    controller
        .submit_onboarding(form, &mut ())
        .await
        .expect("onboarding should succeed");
    (controller, handle)
}

/// Records what the controller reports while folding a reply
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub fragments: Vec<String>,
    /// `is_thinking` of the folded message at each fragment
    pub thinking: Vec<bool>,
    pub ended: Vec<Message>,
}

impl TranscriptObserver for RecordingObserver {
    fn on_fragment(&mut self, message: &Message, fragment: &Fragment) {
        self.fragments.push(fragment.text.clone());
        self.thinking.push(message.is_thinking);
    }

    fn on_stream_end(&mut self, message: &Message) {
        self.ended.push(message.clone());
    }
}
