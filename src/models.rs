//! Domain types shared by the session client, quiz generator and controller.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The one email address that unlocks the admin dashboard.
///
/// This is a client-side string check, not authentication.
pub const ADMIN_EMAIL: &str = "imibuku2012@gmail.com";

/// Number of options every quiz question carries.
pub const QUIZ_OPTION_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeLevel {
    #[serde(rename = "Grade 6-8")]
    Grade6To8,
    #[serde(rename = "Grade 9-10")]
    Grade9To10,
    #[serde(rename = "Grade 11-12")]
    Grade11To12,
    University,
}

impl GradeLevel {
    pub const ALL: [GradeLevel; 4] = [
        Self::Grade6To8,
        Self::Grade9To10,
        Self::Grade11To12,
        Self::University,
    ];

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Grade6To8 => "Grade 6-8",
            Self::Grade9To10 => "Grade 9-10",
            Self::Grade11To12 => "Grade 11-12",
            Self::University => "University",
        }
    }

    /// Middle school students get analogy-first tutoring.
    #[must_use]
    pub fn is_middle_school(&self) -> bool {
        matches!(self, Self::Grade6To8)
    }
}

impl fmt::Display for GradeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Subject {
    Mathematics,
    Calculus,
    Physics,
    Chemistry,
    Biology,
    History,
    Languages,
    Afrikaans,
    #[serde(rename = "Computer Science")]
    ComputerScience,
    Economics,
    Other,
}

impl Subject {
    pub const ALL: [Subject; 11] = [
        Self::Mathematics,
        Self::Calculus,
        Self::Physics,
        Self::Chemistry,
        Self::Biology,
        Self::History,
        Self::Languages,
        Self::Afrikaans,
        Self::ComputerScience,
        Self::Economics,
        Self::Other,
    ];

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Mathematics => "Mathematics",
            Self::Calculus => "Calculus",
            Self::Physics => "Physics",
            Self::Chemistry => "Chemistry",
            Self::Biology => "Biology",
            Self::History => "History",
            Self::Languages => "Languages",
            Self::Afrikaans => "Afrikaans",
            Self::ComputerScience => "Computer Science",
            Self::Economics => "Economics",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Teaching language. Only English is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::English => f.write_str("English"),
        }
    }
}

/// Countries offered by the onboarding form.
pub const COUNTRIES: [&str; 6] = [
    "South Africa",
    "United Kingdom",
    "United States",
    "Canada",
    "Australia",
    "Other",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub country: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub is_admin: bool,
}

impl UserProfile {
    /// Build a profile, deriving the admin flag from the email.
    pub fn new(name: impl Into<String>, email: impl Into<String>, country: impl Into<String>) -> Self {
        let email = email.into();
        let is_admin = is_admin_email(&email);
        Self {
            name: name.into(),
            email,
            country: country.into(),
            language: Language::English,
            is_admin,
        }
    }
}

/// Admin check used at onboarding: the entered email is lower-cased and
/// compared with [`ADMIN_EMAIL`].
#[must_use]
pub fn is_admin_email(email: &str) -> bool {
    email.to_lowercase() == ADMIN_EMAIL
}

/// Platform-wide controls edited from the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminSettings {
    pub global_announcement: String,
    pub ai_modifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub uri: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<GroundingSource>>,
    #[serde(default)]
    pub is_thinking: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Utc::now(),
            sources: None,
            is_thinking: false,
        }
    }

    /// Empty model message that streamed fragments are written into.
    pub fn model_placeholder() -> Self {
        Self {
            role: Role::Model,
            content: String::new(),
            timestamp: Utc::now(),
            sources: None,
            is_thinking: true,
        }
    }
}

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
#[schemars(title = "Quiz Question", description = "One multiple choice question for the student")]
pub struct QuizQuestion {
    /// Question text, LaTeX allowed
    pub question: String,
    /// Exactly four answer options
    pub options: Vec<String>,
    /// 0-based index of the correct option
    pub correct_answer_index: usize,
    /// Explanation shown after the student answers
    pub explanation: String,
}

impl QuizQuestion {
    /// The question served whenever the model reply cannot be decoded.
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            question: "What is $12 + 15$?".to_string(),
            options: ["25", "27", "30", "22"].iter().map(|s| s.to_string()).collect(),
            correct_answer_index: 1,
            explanation: "Correct! $12 + 15 = 27$.".to_string(),
        }
    }

    #[must_use]
    pub fn is_correct(&self, index: usize) -> bool {
        index == self.correct_answer_index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct QuizStats {
    pub correct: u32,
    pub total: u32,
}

impl QuizStats {
    pub fn record(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Onboarding,
    Studying,
    Quizzing,
    AdminDashboard,
}
