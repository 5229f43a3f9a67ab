//! Conversation/quiz state controller.
//!
//! Owns everything a view renders (mode, transcript, typing flag, quiz round
//! and score) and drives the session client and quiz generator. Views feed it
//! user actions and observe streamed fragments through [`TranscriptObserver`].

use std::sync::Arc;

use futures_util::StreamExt;
use tracing::{debug, info, instrument, warn};

use crate::config::TutorConfig;
use crate::core::GenerativeBackend;
use crate::error::TutorError;
use crate::interceptors::Interceptor;
use crate::models::{
    AdminSettings, AppMode, GradeLevel, Message, QuizQuestion, QuizStats, Role, Subject, UserProfile,
};
use crate::quiz::QuizGenerator;
use crate::session::{TutorClient, TutorStream};
use crate::store::SettingsStore;
use crate::streaming::{Fragment, ResponseAccumulator};

/// Words that turn chat input into a quiz request (matched as substrings,
/// case-insensitively). `toets` is Afrikaans for test.
pub const QUIZ_TRIGGER_WORDS: [&str; 3] = ["test", "toets", "quiz"];

pub fn is_quiz_trigger(input: &str) -> bool {
    let lower = input.to_lowercase();
    QUIZ_TRIGGER_WORDS.iter().any(|word| lower.contains(word))
}

/// Transcript snapshot for quiz generation: message contents joined by
/// newlines, keeping only the last `max_chars` characters.
pub fn recent_context(messages: &[Message], max_chars: usize) -> String {
    let joined = messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let count = joined.chars().count();
    if count <= max_chars {
        joined
    } else {
        joined.chars().skip(count - max_chars).collect()
    }
}

/// Receives the transcript as it streams
pub trait TranscriptObserver {
    /// Called after `fragment` has been folded into `message`
    fn on_fragment(&mut self, _message: &Message, _fragment: &Fragment) {}

    /// Called once the reply stream has ended
    fn on_stream_end(&mut self, _message: &Message) {}
}

impl TranscriptObserver for () {}

/// Everything collected by the onboarding screens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingForm {
    pub name: String,
    pub email: String,
    pub country: String,
    pub grade: GradeLevel,
    pub subject: Subject,
    pub topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// Blank input, input while a reply is streaming, or not in study mode
    Ignored,
    /// Sent to the tutor and the reply folded into the transcript
    Sent,
    /// Routed to quiz generation instead of the tutor
    QuizStarted,
}

/// One quiz question and the student's (single) answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRound {
    question: QuizQuestion,
    selected: Option<usize>,
}

impl QuizRound {
    fn new(question: QuizQuestion) -> Self {
        Self { question, selected: None }
    }

    pub fn question(&self) -> &QuizQuestion {
        &self.question
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn is_answered(&self) -> bool {
        self.selected.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub selected: usize,
    pub correct_index: usize,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryShare {
    pub country: String,
    pub users: usize,
    pub percent: u32,
}

/// What the admin dashboard shows about the user base
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminOverview {
    pub users: Vec<UserProfile>,
    /// First three distinct countries in registration order
    pub top_countries: Vec<CountryShare>,
    pub south_africa_users: usize,
}

impl AdminOverview {
    fn from_users(users: Vec<UserProfile>) -> Self {
        let mut countries: Vec<&str> = Vec::new();
        for user in &users {
            if !countries.contains(&user.country.as_str()) {
                countries.push(&user.country);
            }
        }

        let total = users.len();
        let top_countries = countries
            .into_iter()
            .take(3)
            .map(|country| {
                let count = users.iter().filter(|u| u.country == country).count();
                let percent = ((count as f64 / total as f64) * 100.0).round() as u32;
                CountryShare { country: country.to_string(), users: count, percent }
            })
            .collect();
        let south_africa_users = users.iter().filter(|u| u.country == "South Africa").count();

        Self { users, top_countries, south_africa_users }
    }
}

pub struct TutorController<B: GenerativeBackend + Clone + 'static> {
    mode: AppMode,
    grade: Option<GradeLevel>,
    subject: Option<Subject>,
    profile: Option<UserProfile>,
    messages: Vec<Message>,
    is_typing: bool,
    settings: AdminSettings,
    current_quiz: Option<QuizRound>,
    is_generating_quiz: bool,
    quiz_stats: QuizStats,
    store: SettingsStore,
    client: TutorClient<B>,
    quiz: QuizGenerator<B>,
    config: TutorConfig,
}

impl<B: GenerativeBackend + Clone + 'static> TutorController<B> {
    /// Load admin settings from `store` and wire both clients to `backend`.
    pub fn new(backend: B, store: SettingsStore, config: TutorConfig) -> Self {
        let settings = store.load();
        info!(
            target: "lumina_tutor::controller",
            has_announcement = !settings.global_announcement.is_empty(),
            has_modifier = !settings.ai_modifier.is_empty(),
            "Controller ready"
        );
        Self {
            mode: AppMode::Onboarding,
            grade: None,
            subject: None,
            profile: None,
            messages: Vec::new(),
            is_typing: false,
            client: TutorClient::new(backend.clone(), settings.clone(), &config),
            quiz: QuizGenerator::new(backend, settings.clone()),
            settings,
            current_quiz: None,
            is_generating_quiz: false,
            quiz_stats: QuizStats::default(),
            store,
            config,
        }
    }

    pub fn with_quiz_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.quiz = self.quiz.with_interceptor(interceptor);
        self
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_typing(&self) -> bool {
        self.is_typing
    }

    pub fn is_generating_quiz(&self) -> bool {
        self.is_generating_quiz
    }

    pub fn current_quiz(&self) -> Option<&QuizRound> {
        self.current_quiz.as_ref()
    }

    pub fn quiz_stats(&self) -> QuizStats {
        self.quiz_stats
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn settings(&self) -> &AdminSettings {
        &self.settings
    }

    pub fn subject(&self) -> Option<Subject> {
        self.subject
    }

    pub fn grade(&self) -> Option<GradeLevel> {
        self.grade
    }

    pub fn client(&self) -> &TutorClient<B> {
        &self.client
    }

    pub fn header_title(&self) -> String {
        match (self.mode, self.subject) {
            (AppMode::Onboarding, _) | (_, None) => "Lumina Study Tutor".to_string(),
            (_, Some(subject)) => format!("{} Mentor", subject),
        }
    }

    /// The broadcast banner, shown everywhere except onboarding
    pub fn announcement(&self) -> Option<&str> {
        let text = self.settings.global_announcement.as_str();
        (self.mode != AppMode::Onboarding && !text.is_empty()).then_some(text)
    }

    /// Whether the admin control path is offered at all
    pub fn can_open_admin(&self) -> bool {
        self.mode == AppMode::Studying && self.is_admin()
    }

    fn is_admin(&self) -> bool {
        self.profile.as_ref().map_or(false, |p| p.is_admin)
    }

    fn require_admin(&self) -> Result<(), TutorError> {
        if self.is_admin() {
            Ok(())
        } else {
            let who = self.profile.as_ref().map_or("anonymous", |p| p.email.as_str());
            warn!(target: "lumina_tutor::controller", user = who, "Admin access denied");
            Err(TutorError::AdminAccessDenied(who.to_string()))
        }
    }

    fn transition(&mut self, expected: AppMode, to: AppMode) -> Result<(), TutorError> {
        if self.mode != expected {
            return Err(TutorError::InvalidTransition { from: self.mode, to });
        }
        debug!(target: "lumina_tutor::controller", from = ?self.mode, to = ?to, "Mode change");
        self.mode = to;
        Ok(())
    }

    /// Finish onboarding: log the profile, open a session and stream the welcome.
    #[instrument(target = "lumina_tutor::controller", skip_all, fields(grade = %form.grade, subject = %form.subject))]
    pub async fn submit_onboarding<O: TranscriptObserver>(
        &mut self,
        form: OnboardingForm,
        observer: &mut O,
    ) -> Result<(), TutorError> {
        if self.mode != AppMode::Onboarding {
            return Err(TutorError::InvalidTransition { from: self.mode, to: AppMode::Studying });
        }
        if !form.email.contains('@') {
            return Err(TutorError::InvalidOnboarding("email must contain '@'".to_string()));
        }
        if form.name.trim().is_empty() {
            return Err(TutorError::InvalidOnboarding("name is required".to_string()));
        }
        if form.topic.trim().is_empty() {
            return Err(TutorError::InvalidOnboarding("topic is required".to_string()));
        }

        let profile = UserProfile::new(form.name.trim(), form.email, form.country);
        if let Err(e) = self.store.append_user_if_absent(&profile) {
            warn!(target: "lumina_tutor::controller", error = %e, "Could not record user");
        }

        self.grade = Some(form.grade);
        self.subject = Some(form.subject);
        self.transition(AppMode::Onboarding, AppMode::Studying)?;
        self.is_typing = true;

        let stream = self.client.start_session(
            form.grade,
            form.subject,
            profile.language,
            &profile.country,
            &form.topic,
        );
        info!(target: "lumina_tutor::controller", admin = profile.is_admin, "Student onboarded");
        self.profile = Some(profile);
        self.messages = vec![Message::model_placeholder()];
        self.fold_reply(stream, observer).await;
        Ok(())
    }

    /// Route typed chat input: quiz trigger, tutor message, or nothing.
    #[instrument(target = "lumina_tutor::controller", skip_all, fields(len = input.len()))]
    pub async fn handle_input<O: TranscriptObserver>(
        &mut self,
        input: &str,
        observer: &mut O,
    ) -> Result<InputOutcome, TutorError> {
        if self.mode != AppMode::Studying || input.trim().is_empty() || self.is_typing {
            return Ok(InputOutcome::Ignored);
        }

        if is_quiz_trigger(input) {
            debug!(target: "lumina_tutor::controller", "Input routed to quiz");
            self.start_quiz().await;
            return Ok(InputOutcome::QuizStarted);
        }

        self.messages.push(Message::user(input));
        self.is_typing = true;

        let stream = match self.client.send_message(input) {
            Ok(stream) => stream,
            Err(e) => {
                self.is_typing = false;
                return Err(e);
            }
        };
        self.messages.push(Message::model_placeholder());
        self.fold_reply(stream, observer).await;
        Ok(InputOutcome::Sent)
    }

    /// Fold a reply stream into the last message. Text is appended in arrival
    /// order; sources are merged by uri and attached to model messages only.
    async fn fold_reply<O: TranscriptObserver>(&mut self, mut stream: TutorStream, observer: &mut O) {
        let mut accumulator = ResponseAccumulator::new();

        while let Some(fragment) = stream.next().await {
            accumulator.push(&fragment);
            if let Some(last) = self.messages.last_mut() {
                last.content.push_str(&fragment.text);
                last.is_thinking = false;
                if last.role == Role::Model {
                    last.sources = accumulator.sources_if_any();
                }
                observer.on_fragment(last, &fragment);
            }
        }

        if let Some(last) = self.messages.last_mut() {
            last.is_thinking = false;
            observer.on_stream_end(last);
        }
        self.is_typing = false;
        debug!(target: "lumina_tutor::controller", chars = accumulator.content().len(), "Reply folded");
    }

    /// Generate a quiz question from the recent transcript.
    ///
    /// The question is never presented before `quiz_min_display` has passed.
    /// A generation error returns to study mode. Returns whether a question
    /// is now on screen.
    #[instrument(target = "lumina_tutor::controller", skip_all)]
    pub async fn start_quiz(&mut self) -> bool {
        if !matches!(self.mode, AppMode::Studying | AppMode::Quizzing) {
            return false;
        }
        let (Some(grade), Some(subject), Some(language)) =
            (self.grade, self.subject, self.profile.as_ref().map(|p| p.language))
        else {
            return false;
        };

        self.mode = AppMode::Quizzing;
        self.is_generating_quiz = true;
        self.current_quiz = None;

        let context = recent_context(&self.messages, self.config.quiz_context_chars);
        let (result, ()) = tokio::join!(
            self.quiz.generate_question(grade, subject, language, &context),
            tokio::time::sleep(self.config.quiz_min_display),
        );

        let presented = match result {
            Ok(question) => {
                self.current_quiz = Some(QuizRound::new(question));
                true
            }
            Err(e) => {
                warn!(target: "lumina_tutor::controller", error = %e, "Quiz generation failed, back to studying");
                self.mode = AppMode::Studying;
                false
            }
        };
        self.is_generating_quiz = false;
        presented
    }

    /// Another question with a fresh context snapshot
    pub async fn next_question(&mut self) -> bool {
        if self.mode != AppMode::Quizzing {
            return false;
        }
        self.start_quiz().await
    }

    /// Answer the current question. Only the first valid selection of a round counts.
    pub fn select_answer(&mut self, index: usize) -> Option<AnswerOutcome> {
        if self.mode != AppMode::Quizzing || self.is_generating_quiz {
            return None;
        }
        let round = self.current_quiz.as_mut()?;
        if round.is_answered() || index >= round.question.options.len() {
            return None;
        }

        round.selected = Some(index);
        let correct = round.question.is_correct(index);
        self.quiz_stats.record(correct);
        info!(
            target: "lumina_tutor::controller",
            correct,
            score = self.quiz_stats.correct,
            total = self.quiz_stats.total,
            "Quiz answer recorded"
        );
        Some(AnswerOutcome {
            selected: index,
            correct_index: round.question.correct_answer_index,
            correct,
        })
    }

    /// Leave the quiz; the current round is discarded
    pub fn back_to_study(&mut self) -> Result<(), TutorError> {
        self.transition(AppMode::Quizzing, AppMode::Studying)?;
        self.current_quiz = None;
        Ok(())
    }

    pub fn open_admin(&mut self) -> Result<(), TutorError> {
        self.require_admin()?;
        self.transition(AppMode::Studying, AppMode::AdminDashboard)
    }

    pub fn close_admin(&mut self) -> Result<(), TutorError> {
        self.transition(AppMode::AdminDashboard, AppMode::Studying)
    }

    /// Persist new admin settings and apply them to future prompts.
    pub fn update_admin_settings(&mut self, settings: AdminSettings) -> Result<(), TutorError> {
        self.require_admin()?;
        if self.mode != AppMode::AdminDashboard {
            return Err(TutorError::InvalidTransition { from: self.mode, to: AppMode::AdminDashboard });
        }

        self.store.save(&settings)?;
        self.client.set_admin_settings(settings.clone());
        self.quiz.set_admin_settings(settings.clone());
        self.settings = settings;
        info!(target: "lumina_tutor::controller", "Admin settings updated");
        Ok(())
    }

    pub fn admin_overview(&self) -> Result<AdminOverview, TutorError> {
        self.require_admin()?;
        Ok(AdminOverview::from_users(self.store.users()))
    }
}
