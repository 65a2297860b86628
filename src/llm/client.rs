//! The generation client: prompt → remote call (with retries) → parse → validate.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::backend::{CompletionBackend, CompletionRequest, CompletionResponse};
use super::parse::extract_json;
use super::prompt;
use super::retry::{Cancellation, RetryPolicy};
use super::GenerationError;
use crate::quiz::{
    Feedback, FeedbackRequest, LearnMore, OPTION_COUNT, Question, QuizRequest, QuizResult, Scorecard,
};

/// Which feedback shape the model must return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackContract {
    /// Only `feedback` is required; a malformed `learnMore` is dropped.
    Basic,
    /// `feedback` and a well-formed `learnMore` are both required.
    #[default]
    WithLearnMore,
}

/// Client for quiz and feedback generation.
///
/// Holds only configuration and a shared backend; cloning is cheap and no
/// state carries over between calls.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use quizgen::config::ApiKey;
/// use quizgen::llm::{GeminiBackend, GenerationClient};
/// use quizgen::quiz::{Difficulty, QuizRequest};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = GeminiBackend::new(ApiKey::new("my-key"))?;
/// let client = GenerationClient::new(Arc::new(backend));
///
/// let request = QuizRequest::new("history", Difficulty::Easy, 5)?;
/// let questions = client.generate_quiz(&request).await?;
/// assert_eq!(questions.len(), 5);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GenerationClient {
    backend: Arc<dyn CompletionBackend>,
    retry: RetryPolicy,
    feedback_contract: FeedbackContract,
}

impl GenerationClient {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            retry: RetryPolicy::default(),
            feedback_contract: FeedbackContract::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_feedback_contract(mut self, contract: FeedbackContract) -> Self {
        self.feedback_contract = contract;
        self
    }

    pub fn feedback_contract(&self) -> FeedbackContract {
        self.feedback_contract
    }

    /// Generates exactly `request.count()` validated questions.
    pub async fn generate_quiz(&self, request: &QuizRequest) -> Result<Vec<Question>, GenerationError> {
        self.generate_quiz_with(request, &Cancellation::never()).await
    }

    /// [`generate_quiz`](Self::generate_quiz) with a cancellation handle.
    ///
    /// # Errors
    ///
    /// - [`GenerationError::Transient`] / [`GenerationError::Request`] from the endpoint.
    /// - [`GenerationError::Parse`] if no JSON could be extracted.
    /// - [`GenerationError::Validation`] if any question breaks the contract or
    ///   fewer than `count` questions came back.
    /// - [`GenerationError::Cancelled`] if `cancel` fired first.
    pub async fn generate_quiz_with(
        &self,
        request: &QuizRequest,
        cancel: &Cancellation,
    ) -> Result<Vec<Question>, GenerationError> {
        info!(
            backend = self.backend.name(),
            category = request.category(),
            difficulty = %request.difficulty(),
            count = request.count(),
            "generating quiz"
        );
        let completion = prompt::quiz_request(request, self.backend.supports_structured_output());
        let response = self.call(&completion, cancel).await?;
        let payload = extract_json(&response)?;
        let questions = decode_questions(&payload, request.count())?;
        debug!(count = questions.len(), "quiz validated");
        Ok(questions)
    }

    /// Generates feedback for a finished attempt under the configured contract.
    pub async fn generate_feedback(&self, summary: &FeedbackRequest) -> Result<Feedback, GenerationError> {
        self.generate_feedback_with(summary, &Cancellation::never()).await
    }

    /// [`generate_feedback`](Self::generate_feedback) with a cancellation handle.
    ///
    /// # Errors
    ///
    /// As for [`generate_quiz_with`](Self::generate_quiz_with), except that
    /// contract violations surface as [`GenerationError::Format`].
    pub async fn generate_feedback_with(
        &self,
        summary: &FeedbackRequest,
        cancel: &Cancellation,
    ) -> Result<Feedback, GenerationError> {
        info!(
            backend = self.backend.name(),
            category = %summary.category,
            score = summary.score_percent,
            "generating feedback"
        );
        let completion = prompt::feedback_request(
            summary,
            self.feedback_contract,
            self.backend.supports_structured_output(),
        );
        let response = self.call(&completion, cancel).await?;
        let payload = extract_json(&response)?;
        decode_feedback(&payload, self.feedback_contract)
    }

    /// Grades a finished attempt and pairs the grade with feedback generated
    /// for it. Called once per completed quiz.
    ///
    /// # Errors
    ///
    /// As for [`generate_feedback_with`](Self::generate_feedback_with).
    pub async fn complete_quiz<A: AsRef<str> + Sync>(
        &self,
        request: &QuizRequest,
        questions: &[Question],
        answers: &[A],
    ) -> Result<QuizResult, GenerationError> {
        let scorecard = Scorecard::grade(questions, answers);
        let summary = FeedbackRequest::new(request, &scorecard);
        let feedback = self.generate_feedback(&summary).await?;
        Ok(QuizResult::new(scorecard, feedback))
    }

    async fn call(
        &self,
        request: &CompletionRequest,
        cancel: &Cancellation,
    ) -> Result<CompletionResponse, GenerationError> {
        let backend: &dyn CompletionBackend = self.backend.as_ref();
        self.retry
            .run(cancel, move |attempt| {
                debug!(attempt = attempt + 1, model = backend.model(), "completion attempt");
                backend.complete(request)
            })
            .await
    }
}

// Element shape as returned by the model. Either `answer` or `correctAnswer`
// may carry the correct option; `answer` wins when both are non-empty.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuestion {
    #[serde(default)]
    question: String,
    #[serde(default)]
    options: Vec<Value>,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    correct_answer: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

impl RawQuestion {
    fn take_answer(&mut self) -> String {
        let answer = self.answer.take().filter(|a| !a.is_empty());
        answer.or_else(|| self.correct_answer.take()).unwrap_or_default()
    }
}

fn option_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Validates a question array all-or-nothing and truncates it to `count`.
pub fn decode_questions(payload: &Value, count: usize) -> Result<Vec<Question>, GenerationError> {
    let items = payload
        .as_array()
        .ok_or_else(|| GenerationError::Validation("expected a JSON array of questions".into()))?;

    if items.len() < count {
        return Err(GenerationError::Validation(format!(
            "expected {count} questions, got {}",
            items.len()
        )));
    }

    items
        .iter()
        .take(count)
        .enumerate()
        .map(|(index, item)| decode_question(index, item))
        .collect()
}

fn decode_question(index: usize, item: &Value) -> Result<Question, GenerationError> {
    let invalid = |reason: &str| GenerationError::Validation(format!("question {index}: {reason}"));

    let mut raw = RawQuestion::deserialize(item).map_err(|e| invalid(&e.to_string()))?;
    let answer = raw.take_answer();
    let options: Vec<String> = raw.options.iter().map(option_text).collect();

    if raw.question.trim().is_empty() {
        return Err(invalid("empty prompt"));
    }
    if options.len() != OPTION_COUNT {
        return Err(invalid(&format!(
            "expected {OPTION_COUNT} options, got {}",
            options.len()
        )));
    }
    if options.iter().collect::<HashSet<_>>().len() != OPTION_COUNT {
        return Err(invalid("options are not distinct"));
    }
    if answer.is_empty() {
        return Err(invalid("empty answer"));
    }
    if !options.contains(&answer) {
        return Err(invalid("answer is not one of the options"));
    }

    Ok(Question {
        prompt: raw.question,
        options,
        correct_answer: answer,
        explanation: raw.explanation.unwrap_or_default(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLearnMore {
    title: String,
    summary: String,
    action_steps: Vec<String>,
}

fn decode_learn_more(value: &Value) -> Result<LearnMore, String> {
    let raw = RawLearnMore::deserialize(value).map_err(|e| e.to_string())?;
    if raw.title.trim().is_empty() {
        return Err("learnMore.title is empty".into());
    }
    if !(2..=3).contains(&raw.action_steps.len()) {
        return Err(format!(
            "learnMore.actionSteps must have 2-3 entries, got {}",
            raw.action_steps.len()
        ));
    }
    if raw.action_steps.iter().any(|s| s.trim().is_empty()) {
        return Err("learnMore.actionSteps contains an empty step".into());
    }
    Ok(LearnMore {
        title: raw.title,
        summary: raw.summary,
        action_steps: raw.action_steps,
    })
}

/// Validates a feedback object under `contract`. Fails closed.
pub fn decode_feedback(payload: &Value, contract: FeedbackContract) -> Result<Feedback, GenerationError> {
    let text = payload
        .get("feedback")
        .and_then(Value::as_str)
        .ok_or_else(|| GenerationError::Format("missing string field `feedback`".into()))?
        .to_owned();

    let learn_more = match (payload.get("learnMore").filter(|v| !v.is_null()), contract) {
        (Some(value), FeedbackContract::WithLearnMore) => {
            Some(decode_learn_more(value).map_err(GenerationError::Format)?)
        }
        (None, FeedbackContract::WithLearnMore) => {
            return Err(GenerationError::Format("missing object field `learnMore`".into()));
        }
        (Some(value), FeedbackContract::Basic) => decode_learn_more(value).ok(),
        (None, FeedbackContract::Basic) => None,
    };

    Ok(Feedback { text, learn_more })
}
