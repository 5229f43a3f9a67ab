pub mod clients;
pub mod config;
pub mod controller;
pub mod core;
pub mod error;
pub mod interceptors;
pub mod json_utils;
pub mod models;
pub mod prompts;
pub mod quiz;
pub mod session;
pub mod store;
pub mod streaming;

// Convenient re-exports
pub use controller::{InputOutcome, OnboardingForm, TranscriptObserver, TutorController};
pub use error::{AIError, TutorError};
pub use quiz::QuizGenerator;
pub use session::{TutorClient, TutorStream};
pub use store::SettingsStore;
