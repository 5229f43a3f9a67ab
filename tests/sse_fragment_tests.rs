#![cfg(feature = "gemini")]

use bytes::Bytes;
use futures_util::StreamExt;
use lumina_tutor::clients::gemini::fragment_from_event;
use lumina_tutor::core::RawByteStream;
use lumina_tutor::error::{AIError, GeminiError};
use lumina_tutor::models::GroundingSource;
use lumina_tutor::streaming::{sse_data_events, Fragment};
use serde_json::json;

fn event(text: &str) -> String {
    let payload = json!({
        "candidates": [ { "content": { "role": "model", "parts": [ { "text": text } ] } } ]
    });
    format!("data: {}\n\n", payload)
}

fn byte_stream(chunks: Vec<Vec<u8>>) -> RawByteStream {
    Box::pin(futures_util::stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c)))))
}

async fn decode(chunks: Vec<Vec<u8>>) -> Vec<Result<Fragment, AIError>> {
    sse_data_events(byte_stream(chunks))
        .map(|event| event.and_then(|payload| fragment_from_event(&payload)))
        .collect()
        .await
}

fn texts(items: Vec<Result<Fragment, AIError>>) -> Vec<String> {
    items.into_iter().map(|r| r.unwrap().text).collect()
}

#[tokio::test]
async fn frames_split_across_chunks_decode_identically() {
    let body = format!("{}{}{}", event("Photo"), event("synthesis "), event("makes sugár."));
    let whole = texts(decode(vec![body.clone().into_bytes()]).await);

    for size in [1, 3, 7, 64] {
        let chunks = body.as_bytes().chunks(size).map(<[u8]>::to_vec).collect();
        assert_eq!(texts(decode(chunks).await), whole, "chunk size {}", size);
    }
    assert_eq!(whole, ["Photo", "synthesis ", "makes sugár."]);
}

#[tokio::test]
async fn thought_parts_are_not_shown() {
    let payload = json!({
        "candidates": [ { "content": { "parts": [
            { "text": "Let me reason privately", "thought": true },
            { "text": "Here is a hint." }
        ] } } ]
    });
    let body = format!("data: {}\n\n", payload);

    assert_eq!(texts(decode(vec![body.into_bytes()]).await), ["Here is a hint."]);
}

#[tokio::test]
async fn grounding_chunks_become_sources() {
    let payload = json!({
        "candidates": [ {
            "content": { "parts": [ { "text": "See NASA." } ] },
            "groundingMetadata": { "groundingChunks": [
                { "web": { "uri": "https://nasa.gov", "title": "NASA" } },
                { "web": { "title": "no uri" } },
                { "retrievedContext": {} }
            ] }
        } ]
    });

    let fragment = fragment_from_event(&payload.to_string()).unwrap();

    assert_eq!(
        fragment.sources,
        vec![GroundingSource { uri: "https://nasa.gov".into(), title: "NASA".into() }]
    );
}

#[tokio::test]
async fn comments_other_fields_and_missing_final_blank_line_are_handled() {
    let body = format!(": keep-alive\nevent: message\n{}data: {}", event("one"), json!({"candidates": []}));

    let items = texts(decode(vec![body.into_bytes()]).await);

    assert_eq!(items, ["one", ""]);
}

#[tokio::test]
async fn error_payloads_and_garbage_are_stream_errors() {
    let api_error = fragment_from_event(&json!({"error": {"code": 500, "message": "internal"}}).to_string());
    assert!(matches!(api_error, Err(AIError::Gemini(GeminiError::Api(m))) if m.contains("internal")));

    let garbage = fragment_from_event("{not json");
    assert!(matches!(garbage, Err(AIError::Gemini(GeminiError::Stream(_)))));
}

#[tokio::test]
async fn transport_error_ends_the_event_stream() {
    let chunks: RawByteStream = Box::pin(futures_util::stream::iter(vec![
        Ok(Bytes::from(event("before"))),
        Err(AIError::Gemini(GeminiError::Http("connection reset".into()))),
    ]));

    let items: Vec<_> = sse_data_events(chunks).collect().await;

    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], Ok(payload) if payload.contains("before")));
    assert!(matches!(&items[1], Err(AIError::Gemini(GeminiError::Stream(_)))));
}
