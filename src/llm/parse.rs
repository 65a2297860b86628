//! Extracting a JSON payload from a completion response.
//!
//! Endpoints and models disagree on where the JSON ends up, so extraction is
//! an ordered list of [`ParseStrategy`] values tried in sequence. The first
//! one that yields valid JSON wins.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{CompletionResponse, GenerationError};

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:json)?\s*(.*?)\s*```").expect("fence pattern is a valid regex")
});

/// One place a JSON payload may be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    /// A structured value the endpoint already decoded.
    RawField,
    /// JSON text nested in a `response` envelope.
    NestedText,
    /// A ```` ```json ``` ```` block inside free text.
    FencedBlock,
    /// The first candidate's text, taken as-is.
    CandidateText,
}

impl ParseStrategy {
    /// All strategies, in the order they are attempted.
    pub const ORDER: [ParseStrategy; 4] = [
        ParseStrategy::RawField,
        ParseStrategy::NestedText,
        ParseStrategy::FencedBlock,
        ParseStrategy::CandidateText,
    ];

    /// Attempts this strategy, returning why it failed if it did.
    pub fn apply(self, response: &CompletionResponse) -> Result<Value, String> {
        match self {
            Self::RawField => response.parsed.clone().ok_or_else(|| "no structured field".to_owned()),
            Self::NestedText => {
                let text = response
                    .response_text
                    .as_deref()
                    .ok_or_else(|| "no nested response text".to_owned())?;
                decode(text)
            }
            Self::FencedBlock => {
                let text = response.text.as_deref().ok_or_else(|| "no free text".to_owned())?;
                let block = FENCED_BLOCK
                    .captures(text)
                    .and_then(|c| c.get(1))
                    .ok_or_else(|| "no fenced code block".to_owned())?;
                decode(block.as_str())
            }
            Self::CandidateText => {
                let text = response
                    .candidates
                    .first()
                    .ok_or_else(|| "no candidates".to_owned())?;
                decode(text.trim())
            }
        }
    }
}

fn decode(text: &str) -> Result<Value, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}

/// Runs every strategy in [`ParseStrategy::ORDER`] and returns the first success.
///
/// # Errors
///
/// [`GenerationError::Parse`] listing why each strategy failed.
///
/// # Examples
///
/// ```
/// use quizgen::llm::{CompletionResponse, extract_json};
///
/// let fenced = CompletionResponse::from_text("Sure!\n```json\n[1, 2]\n```");
/// let bare = CompletionResponse::from_text("[1, 2]");
/// assert_eq!(extract_json(&fenced).unwrap(), extract_json(&bare).unwrap());
/// ```
pub fn extract_json(response: &CompletionResponse) -> Result<Value, GenerationError> {
    let mut reasons = Vec::with_capacity(ParseStrategy::ORDER.len());
    for strategy in ParseStrategy::ORDER {
        match strategy.apply(response) {
            Ok(value) => {
                tracing::trace!(?strategy, "extracted JSON");
                return Ok(value);
            }
            Err(reason) => reasons.push(format!("{strategy:?}: {reason}")),
        }
    }
    Err(GenerationError::Parse(reasons.join("; ")))
}
