//! Post-quiz feedback types.

use serde::{Deserialize, Serialize};

use super::{Difficulty, QuizRequest, Scorecard};

/// Summary of a finished attempt, sent once per completed quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub score_percent: u8,
    pub category: String,
    pub difficulty: Difficulty,
    pub total_questions: usize,
    pub correct_answers: usize,
}

impl FeedbackRequest {
    pub fn new(request: &QuizRequest, scorecard: &Scorecard) -> Self {
        Self {
            score_percent: scorecard.score_percent,
            category: request.category().to_owned(),
            difficulty: request.difficulty(),
            total_questions: scorecard.total,
            correct_answers: scorecard.correct_count,
        }
    }
}

/// A short learning plan attached to feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnMore {
    pub title: String,
    pub summary: String,
    pub action_steps: Vec<String>,
}

/// Generated feedback for a completed quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(rename = "feedback")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learn_more: Option<LearnMore>,
}

impl Feedback {
    /// Canned feedback served when generation fails and the caller still
    /// wants to show something on the results screen.
    pub fn fallback(category: &str) -> Self {
        Self {
            text: "Great job on completing the quiz! Keep practicing to improve your score."
                .to_owned(),
            learn_more: Some(LearnMore {
                title: "How to improve".to_owned(),
                summary: "Here are some general tips to help you improve:".to_owned(),
                action_steps: vec![
                    "Review the questions you got wrong".to_owned(),
                    format!("Explore more about {category}"),
                    "Take the quiz again to reinforce your knowledge".to_owned(),
                ],
            }),
        }
    }
}
