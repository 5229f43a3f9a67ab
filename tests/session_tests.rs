mod test_utils;

use lumina_tutor::clients::mock::{MockClient, MockResponse};
use lumina_tutor::config::TutorConfig;
use lumina_tutor::core::Turn;
use lumina_tutor::error::TutorError;
use lumina_tutor::models::{AdminSettings, GradeLevel, Language, Role, Subject};
use lumina_tutor::session::TutorClient;
use lumina_tutor::streaming::{collect_fragments, Fragment, APOLOGY_TEXT};

use crate::test_utils::init_test_logging;

fn client_with(responses: Vec<MockResponse>) -> (TutorClient<MockClient>, std::sync::Arc<lumina_tutor::clients::mock::MockHandle>) {
    init_test_logging();
    let (backend, handle) = MockClient::with_responses(responses);
    (TutorClient::new(backend, AdminSettings::default(), &TutorConfig::default()), handle)
}

fn start(client: &mut TutorClient<MockClient>) -> lumina_tutor::session::TutorStream {
    client.start_session(GradeLevel::Grade11To12, Subject::Chemistry, Language::English, "Canada", "redox")
}

#[tokio::test]
async fn message_before_session_is_rejected() {
    let (mut client, handle) = client_with(Vec::new());

    assert!(matches!(client.send_message("hello"), Err(TutorError::SessionNotStarted)));
    assert!(!client.has_session());
    assert!(handle.chat_requests().is_empty());
}

#[tokio::test]
async fn failure_to_open_yields_single_apology() {
    let (mut client, _handle) = client_with(vec![MockResponse::OpenFailure("quota".into())]);

    let reply = collect_fragments(start(&mut client)).await;

    assert_eq!(reply.content(), APOLOGY_TEXT);
    assert!(client.history().is_empty());
}

#[tokio::test]
async fn history_grows_only_with_completed_turns() {
    let (mut client, handle) = client_with(vec![
        MockResponse::Stream(vec![Fragment::text("Welcome to redox.")]),
        MockResponse::Stream(vec![Fragment::text("Electrons move.")]),
    ]);

    collect_fragments(start(&mut client)).await;
    let reply = collect_fragments(client.send_message("What is oxidation?").unwrap()).await;
    assert_eq!(reply.content(), "Electrons move.");

    let requests = handle.chat_requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1].contents;
    assert_eq!(second.len(), 3);
    assert_eq!(second[1], Turn::model("Welcome to redox."));
    assert_eq!(second[2], Turn::user("What is oxidation?"));

    let history = client.history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[3].role, Role::Model);
}

#[tokio::test]
async fn faulted_turn_is_not_committed() {
    let (mut client, _handle) = client_with(vec![
        MockResponse::Stream(vec![Fragment::text("Hi")]),
        MockResponse::StreamThenFail(vec![Fragment::text("Half")], "reset".into()),
    ]);
    collect_fragments(start(&mut client)).await;

    let reply = collect_fragments(client.send_message("More?").unwrap()).await;

    assert_eq!(reply.content(), format!("Half{}", APOLOGY_TEXT));
    assert_eq!(client.history().len(), 2);
}

#[tokio::test]
async fn cancelled_stream_ends_without_apology_or_history() {
    let (mut client, _handle) = client_with(vec![MockResponse::Stream(vec![Fragment::text("never seen")])]);

    let stream = start(&mut client);
    stream.cancel();
    let reply = collect_fragments(stream).await;

    assert_eq!(reply.content(), "");
    assert!(client.history().is_empty());
}

#[tokio::test]
async fn new_request_cancels_the_previous_stream() {
    let (mut client, _handle) = client_with(vec![
        MockResponse::Stream(vec![Fragment::text("Hi")]),
        MockResponse::Stream(vec![Fragment::text("first")]),
        MockResponse::Stream(vec![Fragment::text("second")]),
    ]);
    collect_fragments(start(&mut client)).await;

    let stale = client.send_message("one").unwrap();
    let fresh = client.send_message("two").unwrap();

    assert_eq!(collect_fragments(stale).await.content(), "");
    assert_eq!(collect_fragments(fresh).await.content(), "first");
}

#[tokio::test]
async fn dropping_a_stream_cancels_it() {
    let (mut client, _handle) = client_with(Vec::new());
    let stream = start(&mut client);
    let token = stream.cancellation_token();

    drop(stream);

    assert!(token.is_cancelled());
}

#[tokio::test]
async fn modifier_applies_to_sessions_started_after_the_change() {
    let (mut client, handle) = client_with(Vec::new());
    collect_fragments(start(&mut client)).await;

    client.set_admin_settings(AdminSettings {
        global_announcement: String::new(),
        ai_modifier: "Keep answers under 50 words".into(),
    });
    collect_fragments(start(&mut client)).await;

    let requests = handle.chat_requests();
    assert!(requests[0].system_instruction.contains("(STRICTLY FOLLOW THIS): None"));
    assert!(requests[1].system_instruction.contains("(STRICTLY FOLLOW THIS): Keep answers under 50 words"));
    // a new session starts from empty history
    assert_eq!(requests[1].contents.len(), 1);
}

#[tokio::test]
async fn generation_settings_come_from_config() {
    init_test_logging();
    let (backend, handle) = MockClient::new();
    let config = TutorConfig { thinking_budget: None, web_grounding: false, temperature: 0.2, ..TutorConfig::default() };
    let mut client = TutorClient::new(backend, AdminSettings::default(), &config);

    collect_fragments(start(&mut client)).await;

    let generation = &handle.chat_requests()[0].generation;
    assert_eq!(generation.thinking_budget, None);
    assert!(!generation.web_grounding);
    assert!((generation.temperature - 0.2).abs() < f32::EPSILON);
}
