//! Quiz domain types: requests, questions, scoring, and the category catalog.
//!
//! Everything here is ephemeral: a [`QuizRequest`] is issued once the user has
//! picked a category and a difficulty, one successful generation call yields
//! the [`Question`] set, and a [`QuizResult`] is computed once the last
//! question has been answered. Nothing is persisted.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod catalog;
pub mod feedback;
pub mod score;

pub use catalog::{CATEGORIES, CategoryInfo};
pub use feedback::{Feedback, FeedbackRequest, LearnMore};
pub use score::{QuizResult, ScoreBand, Scorecard};

/// Upper bound on the number of questions a single quiz may ask for.
pub const MAX_QUESTIONS: usize = 20;

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;

/// Errors raised while building a [`QuizRequest`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("category must not be empty")]
    EmptyCategory,

    #[error("question count {count} is outside 1..=20")]
    CountOutOfRange { count: usize },

    #[error("unknown difficulty {0:?} (expected easy, medium, or hard)")]
    UnknownDifficulty(String),
}

/// How hard the generated questions should be.
///
/// # Examples
///
/// ```
/// use quizgen::quiz::Difficulty;
///
/// let d: Difficulty = "Medium".parse().unwrap();
/// assert_eq!(d, Difficulty::Medium);
/// assert_eq!(d.as_str(), "medium");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Returns the lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Difficulty {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(QuizError::UnknownDifficulty(s.to_owned())),
        }
    }
}

/// A validated request for one batch of questions.
///
/// The category is free text; when it names an entry of the built-in
/// [`catalog`] the entry's display name is used in prompts.
///
/// # Examples
///
/// ```
/// use quizgen::quiz::{Difficulty, QuizRequest};
///
/// let req = QuizRequest::new("space-astronomy", Difficulty::Hard, 5).unwrap();
/// assert_eq!(req.count(), 5);
/// assert_eq!(req.topic(), "Space & Astronomy");
///
/// assert!(QuizRequest::new("history", Difficulty::Easy, 0).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizRequest {
    category: String,
    difficulty: Difficulty,
    count: usize,
}

impl QuizRequest {
    /// Builds a request, rejecting an empty category and counts outside `1..=20`.
    pub fn new(
        category: impl Into<String>,
        difficulty: Difficulty,
        count: usize,
    ) -> Result<Self, QuizError> {
        let category = category.into().trim().to_owned();
        if category.is_empty() {
            return Err(QuizError::EmptyCategory);
        }
        if !(1..=MAX_QUESTIONS).contains(&count) {
            return Err(QuizError::CountOutOfRange { count });
        }
        Ok(Self {
            category,
            difficulty,
            count,
        })
    }

    /// The category exactly as the user supplied it (trimmed).
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Number of questions requested.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Human-readable topic used in prompts.
    pub fn topic(&self) -> &str {
        catalog::display_name(&self.category)
    }
}

/// A single multiple-choice question.
///
/// Instances handed out by the generation client always satisfy the
/// invariant that `options` holds exactly four distinct entries, one of which
/// is `correct_answer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "question")]
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
}

impl Question {
    /// Returns `true` if `answer` is exactly (case-sensitively) the correct option.
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer == answer
    }
}
