//! Client-side grading of a finished quiz.

use serde::Serialize;

use super::{Feedback, Question};

/// Counts and percentage for one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scorecard {
    pub correct_count: usize,
    pub total: usize,
    pub score_percent: u8,
}

impl Scorecard {
    /// Grades `answers` against `questions` index by index.
    ///
    /// Comparison is exact string equality. An index with no answer counts
    /// as wrong; extra answers are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use quizgen::quiz::{Question, Scorecard};
    ///
    /// let q = |a: &str| Question {
    ///     prompt: "?".into(),
    ///     options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
    ///     correct_answer: a.into(),
    ///     explanation: String::new(),
    /// };
    /// let questions = [q("a"), q("b"), q("c")];
    /// let answers = ["a".to_string(), "c".to_string()];
    ///
    /// let card = Scorecard::grade(&questions, &answers);
    /// assert_eq!(card.correct_count, 1);
    /// assert_eq!(card.score_percent, 33);
    /// ```
    pub fn grade<A: AsRef<str>>(questions: &[Question], answers: &[A]) -> Self {
        let correct_count = questions
            .iter()
            .zip(answers)
            .filter(|(q, a)| q.is_correct(a.as_ref()))
            .count();
        let total = questions.len();
        let score_percent = if total == 0 {
            0
        } else {
            (correct_count as f64 / total as f64 * 100.0).round() as u8
        };
        Self {
            correct_count,
            total,
            score_percent,
        }
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::of(self.score_percent)
    }
}

/// Coarse classification of a score, as shown on the results screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreBand {
    /// 80% and above.
    Excellent,
    /// 60–79%.
    Fair,
    NeedsWork,
}

impl ScoreBand {
    pub fn of(score_percent: u8) -> Self {
        match score_percent {
            80.. => Self::Excellent,
            60..=79 => Self::Fair,
            _ => Self::NeedsWork,
        }
    }
}

/// Outcome of a completed quiz: the grade plus the feedback generated for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    #[serde(flatten)]
    pub scorecard: Scorecard,
    #[serde(flatten)]
    pub feedback: Feedback,
}

impl QuizResult {
    pub fn new(scorecard: Scorecard, feedback: Feedback) -> Self {
        Self { scorecard, feedback }
    }

    pub fn band(&self) -> ScoreBand {
        self.scorecard.band()
    }
}
