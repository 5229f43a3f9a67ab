use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream;
use tracing::debug;

use crate::core::{ChatRequest, FragmentStream, GenerativeBackend, StructuredRequest};
use crate::error::AIError;
use crate::streaming::Fragment;

/// One scripted reply, consumed in order by either request shape.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Stream these fragments, then close
    Stream(Vec<Fragment>),
    /// Stream these fragments, then fault with the message
    StreamThenFail(Vec<Fragment>, String),
    /// Fail to open the stream at all
    OpenFailure(String),
    /// Structured reply text
    Structured(String),
    /// Structured reply text, delivered after a delay
    StructuredAfter(String, Duration),
    /// Structured request fails in transport
    StructuredFailure(String),
}

/// Shared control surface for a [`MockClient`]: queue replies and inspect
/// what the client was asked.
#[derive(Debug, Default)]
pub struct MockHandle {
    responses: Mutex<VecDeque<MockResponse>>,
    chat_requests: Mutex<Vec<ChatRequest>>,
    structured_requests: Mutex<Vec<StructuredRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockHandle {
    pub fn push(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    pub fn chat_requests(&self) -> Vec<ChatRequest> {
        lock(&self.chat_requests).clone()
    }

    pub fn structured_requests(&self) -> Vec<StructuredRequest> {
        lock(&self.structured_requests).clone()
    }

    fn next(&self) -> Option<MockResponse> {
        lock(&self.responses).pop_front()
    }
}

/// Scripted backend for tests and the `--client mock` demo mode.
///
/// With an empty script, chat echoes the last user turn and structured
/// requests return `{}`.
#[derive(Debug, Clone)]
pub struct MockClient {
    handle: Arc<MockHandle>,
}

impl MockClient {
    pub fn new() -> (Self, Arc<MockHandle>) {
        Self::with_responses(Vec::new())
    }

    pub fn with_responses(responses: Vec<MockResponse>) -> (Self, Arc<MockHandle>) {
        let handle = Arc::new(MockHandle::default());
        for response in responses {
            handle.push(response);
        }
        (Self { handle: handle.clone() }, handle)
    }
}

#[async_trait]
impl GenerativeBackend for MockClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<FragmentStream, AIError> {
        let echo = format!(
            "(mock tutor) You said: {}",
            request.latest_user_text().unwrap_or_default()
        );
        lock(&self.handle.chat_requests).push(request);

        let items: Vec<Result<Fragment, AIError>> = match self.handle.next() {
            None => vec![Ok(Fragment::text(echo))],
            Some(MockResponse::Stream(fragments)) => fragments.into_iter().map(Ok).collect(),
            Some(MockResponse::StreamThenFail(fragments, message)) => fragments
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(AIError::Mock(message))))
                .collect(),
            Some(MockResponse::OpenFailure(message)) => return Err(AIError::Mock(message)),
            Some(other) => {
                return Err(AIError::Mock(format!("unexpected chat request, next scripted reply is {:?}", other)))
            }
        };

        debug!(items = items.len(), "Mock chat stream");
        Ok(Box::pin(stream::iter(items)))
    }

    async fn generate_structured(&self, request: StructuredRequest) -> Result<String, AIError> {
        lock(&self.handle.structured_requests).push(request);

        match self.handle.next() {
            None => Ok("{}".to_string()),
            Some(MockResponse::Structured(text)) => Ok(text),
            Some(MockResponse::StructuredAfter(text, delay)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Some(MockResponse::StructuredFailure(message)) => Err(AIError::Mock(message)),
            Some(other) => Err(AIError::Mock(format!(
                "unexpected structured request, next scripted reply is {:?}",
                other
            ))),
        }
    }

    fn clone_box(&self) -> Box<dyn GenerativeBackend> {
        Box::new(self.clone())
    }
}
