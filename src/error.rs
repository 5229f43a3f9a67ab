use thiserror::Error;

use crate::models::AppMode;

#[derive(Error, Debug)]
pub enum TutorError {
    #[error("Cannot switch from {from:?} to {to:?}")]
    InvalidTransition { from: AppMode, to: AppMode },
    #[error("AI error: {0}")]
    Ai(#[from] AIError),
    #[error("Session not started")]
    SessionNotStarted,
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
    #[error("Admin access denied for {0}")]
    AdminAccessDenied(String),
    #[error("Invalid onboarding input: {0}")]
    InvalidOnboarding(String),
}

#[derive(Error, Debug)]
pub enum AIError {
    #[error("Gemini API error: {0}")]
    Gemini(#[from] GeminiError),
    #[error("Mock error: {0}")]
    Mock(String),
}

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("API error: {0}")]
    Api(String),
    #[error("Rate limit exceeded")]
    RateLimit,
    #[error("Authentication failed")]
    Authentication,
    #[error("Stream error: {0}")]
    Stream(String),
}

/// Why a structured quiz reply could not be turned into a `QuizQuestion`.
#[derive(Error, Debug)]
pub enum QuizDecodeError {
    #[error("No quiz question found in response: {0}")]
    NoQuestionFound(String),
    #[error("Expected {expected} options, got {actual}")]
    OptionCount { expected: usize, actual: usize },
    #[error("Answer index {index} out of range for {options} options")]
    AnswerIndexOutOfRange { index: i64, options: usize },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Timeout waiting for {0} input")]
    PromptTimeout(&'static str),
    #[error("Terminal IO error: {0}")]
    Io(#[from] std::io::Error),
}
