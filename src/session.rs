//! Tutor session client: owns the conversational session with the backend
//! and hands out fault-tolerant, cancellable fragment streams.

use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use async_stream::stream;
use futures_core::Stream;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::TutorConfig;
use crate::core::{ChatRequest, GenerationSettings, GenerativeBackend, Turn};
use crate::error::TutorError;
use crate::models::{AdminSettings, GradeLevel, Language, Subject};
use crate::prompts;
use crate::streaming::Fragment;

/// Lazy, single-pass stream of reply fragments.
///
/// Faults never surface as items: they end the stream with one apology
/// fragment. Cancelling (or dropping) the stream stops the producer at its
/// next suspension point without an apology.
pub struct TutorStream {
    inner: Pin<Box<dyn Stream<Item = Fragment> + Send>>,
    cancel: CancellationToken,
}

impl TutorStream {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Stream for TutorStream {
    type Item = Fragment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Fragment>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl Drop for TutorStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for TutorStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TutorStream")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// One conversation: its system instruction, generation settings and the
/// history committed so far.
#[derive(Debug)]
struct ChatSession {
    system_instruction: String,
    generation: GenerationSettings,
    history: Arc<Mutex<Vec<Turn>>>,
}

impl ChatSession {
    fn history_snapshot(&self) -> Vec<Turn> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Wraps a [`GenerativeBackend`] with the tutoring session lifecycle.
#[derive(Debug)]
pub struct TutorClient<B: GenerativeBackend + Clone + 'static> {
    backend: B,
    settings: AdminSettings,
    generation: GenerationSettings,
    session: Option<ChatSession>,
    active: Option<CancellationToken>,
}

impl<B: GenerativeBackend + Clone + 'static> TutorClient<B> {
    pub fn new(backend: B, settings: AdminSettings, config: &TutorConfig) -> Self {
        Self {
            backend,
            settings,
            generation: GenerationSettings {
                temperature: config.temperature,
                thinking_budget: config.thinking_budget,
                web_grounding: config.web_grounding,
            },
            session: None,
            active: None,
        }
    }

    /// Replace the admin settings used by future system instructions
    pub fn set_admin_settings(&mut self, settings: AdminSettings) {
        self.settings = settings;
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Turns committed to the current session's history
    pub fn history(&self) -> Vec<Turn> {
        self.session.as_ref().map(ChatSession::history_snapshot).unwrap_or_default()
    }

    /// Open a fresh session (discarding any previous one) and stream the welcome reply.
    #[instrument(target = "lumina_tutor::session", skip(self, topic), fields(grade = %grade, subject = %subject))]
    pub fn start_session(
        &mut self,
        grade: GradeLevel,
        subject: Subject,
        language: Language,
        country: &str,
        topic: &str,
    ) -> TutorStream {
        self.cancel_active();

        let system_instruction = prompts::system_instruction(
            grade,
            subject,
            language,
            country,
            &self.settings.ai_modifier,
        );
        info!(target: "lumina_tutor::session", instruction_len = system_instruction.len(), "Starting new tutoring session");

        self.session = Some(ChatSession {
            system_instruction,
            generation: self.generation.clone(),
            history: Arc::new(Mutex::new(Vec::new())),
        });
        self.stream_turn(prompts::welcome_prompt(topic))
    }

    /// Continue the current session with a student message.
    #[instrument(target = "lumina_tutor::session", skip(self, text), fields(len = text.len()))]
    pub fn send_message(&mut self, text: &str) -> Result<TutorStream, TutorError> {
        if self.session.is_none() {
            warn!(target: "lumina_tutor::session", "send_message called before start_session");
            return Err(TutorError::SessionNotStarted);
        }
        self.cancel_active();
        Ok(self.stream_turn(text.to_string()))
    }

    /// Cancel the stream handed out most recently, if it is still running
    pub fn cancel_active(&mut self) {
        if let Some(token) = self.active.take() {
            if !token.is_cancelled() {
                debug!(target: "lumina_tutor::session", "Cancelling in-flight stream");
                token.cancel();
            }
        }
    }

    fn stream_turn(&mut self, text: String) -> TutorStream {
        let cancel = CancellationToken::new();
        self.active = Some(cancel.clone());

        let Some(session) = self.session.as_ref() else {
            // start_session/send_message guarantee a session
            return TutorStream { inner: Box::pin(futures_util::stream::empty()), cancel };
        };

        let user_turn = Turn::user(text);
        let mut contents = session.history_snapshot();
        contents.push(user_turn.clone());
        let request = ChatRequest {
            system_instruction: session.system_instruction.clone(),
            contents,
            generation: session.generation.clone(),
        };

        let inner = guarded_fragments(
            self.backend.clone(),
            request,
            session.history.clone(),
            user_turn,
            cancel.clone(),
        );
        TutorStream { inner: Box::pin(inner), cancel }
    }
}

enum Step {
    Cancelled,
    Item(Option<Result<Fragment, crate::error::AIError>>),
}

/// Drive one backend stream, converting faults into the apology fragment.
/// The user turn and the full reply are committed to `history` only when the
/// backend stream closes cleanly.
fn guarded_fragments<B: GenerativeBackend + 'static>(
    backend: B,
    request: ChatRequest,
    history: Arc<Mutex<Vec<Turn>>>,
    user_turn: Turn,
    cancel: CancellationToken,
) -> impl Stream<Item = Fragment> + Send {
    stream! {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = backend.stream_chat(request) => Some(result),
        };

        match opened {
            None => debug!(target: "lumina_tutor::session", "Stream cancelled before it opened"),
            Some(Err(e)) => {
                warn!(target: "lumina_tutor::session", error = %e, "Failed to open tutor stream");
                yield Fragment::apology();
            }
            Some(Ok(mut fragments)) => {
                let mut reply = String::new();
                let mut count = 0usize;
                loop {
                    let step = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Step::Cancelled,
                        next = fragments.next() => Step::Item(next),
                    };
                    match step {
                        Step::Cancelled => {
                            debug!(target: "lumina_tutor::session", fragments = count, "Stream cancelled");
                            break;
                        }
                        Step::Item(Some(Ok(fragment))) => {
                            count += 1;
                            reply.push_str(&fragment.text);
                            yield fragment;
                        }
                        Step::Item(Some(Err(e))) => {
                            warn!(target: "lumina_tutor::session", error = %e, fragments = count, "Tutor stream faulted");
                            yield Fragment::apology();
                            break;
                        }
                        Step::Item(None) => {
                            let mut turns = history.lock().unwrap_or_else(PoisonError::into_inner);
                            turns.push(user_turn.clone());
                            turns.push(Turn::model(std::mem::take(&mut reply)));
                            info!(target: "lumina_tutor::session", fragments = count, turns = turns.len(), "Tutor reply complete");
                            break;
                        }
                    }
                }
            }
        }
    }
}
