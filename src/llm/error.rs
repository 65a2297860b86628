//! Error taxonomy for the generation client.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::config::ConfigError;

// HTTP statuses that always mean "try again later".
const TRANSIENT_STATUSES: [u16; 3] = [429, 503, 504];

// Text indicators of a failure expected to clear on retry.
static TRANSIENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b503\b|unavailable|overloaded|time[d]?\s?out|rate[\s_-]?limit|resource[\s_-]?exhausted|deadline[\s_-]?exceeded|too many requests",
    )
    .expect("transient pattern is a valid regex")
});

/// Returns `true` if `message` looks like a transient service failure.
///
/// # Examples
///
/// ```
/// use quizgen::llm::is_transient_message;
///
/// assert!(is_transient_message("HTTP 503: model is overloaded"));
/// assert!(is_transient_message("Rate limit exceeded"));
/// assert!(!is_transient_message("API key not valid"));
/// ```
pub fn is_transient_message(message: &str) -> bool {
    TRANSIENT_PATTERN.is_match(message)
}

/// Every way a generation call can fail.
///
/// The client never swallows errors: a call either returns a fully valid
/// result or exactly one of these.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Missing or malformed configuration. Never retried.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Overload, rate limit, timeout, or 503-class failure. Retried.
    #[error("transient service failure: {message}")]
    Transient {
        status: Option<u16>,
        message: String,
    },

    /// The endpoint rejected the request (bad request, auth failure, ...). Never retried.
    #[error("completion request failed: {message}")]
    Request {
        status: Option<u16>,
        message: String,
    },

    /// No parse strategy produced JSON from the response.
    #[error("could not parse JSON from model response: {0}")]
    Parse(String),

    /// The JSON does not satisfy the question contract.
    #[error("quiz validation failed: {0}")]
    Validation(String),

    /// The JSON does not satisfy the feedback contract.
    #[error("invalid feedback format: {0}")]
    Format(String),

    /// The caller cancelled the call.
    #[error("generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Builds an upstream failure, classifying it as transient or permanent
    /// by its HTTP status and then by its message text.
    pub fn upstream(status: Option<u16>, message: impl Into<String>) -> Self {
        let message = message.into();
        let transient_status = status.is_some_and(|s| TRANSIENT_STATUSES.contains(&s));
        if transient_status || is_transient_message(&message) {
            Self::Transient { status, message }
        } else {
            Self::Request { status, message }
        }
    }

    /// Returns `true` if the retry loop should try again after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        if err.is_timeout() {
            return Self::Transient {
                status,
                message: format!("request timeout: {err}"),
            };
        }
        if err.is_connect() {
            return Self::Transient {
                status,
                message: format!("service unavailable: {err}"),
            };
        }
        Self::upstream(status, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_indicators() {
        for msg in [
            "HTTP 503: Service Unavailable",
            "UNAVAILABLE: try again later",
            "The model is overloaded.",
            "request timeout",
            "deadline exceeded: timed out",
            "rate_limit_exceeded",
            "Rate-limit reached for requests",
            "RESOURCE_EXHAUSTED",
            "Resource has been exhausted (e.g. check quota).",
            "DEADLINE_EXCEEDED",
            "HTTP 429 Too Many Requests",
        ] {
            assert!(is_transient_message(msg), "{msg}");
        }
    }

    #[test]
    fn permanent_failures() {
        for msg in [
            "invalid request: unknown field",
            "API key not valid. Please pass a valid API key.",
            "HTTP 400: could not generate content",
            "HTTP 5030 weird code",
        ] {
            assert!(!is_transient_message(msg), "{msg}");
        }
    }

    #[test]
    fn upstream_classification() {
        assert!(GenerationError::upstream(Some(503), "HTTP 503: overloaded").is_transient());
        assert!(!GenerationError::upstream(Some(401), "HTTP 401: unauthorized").is_transient());
        assert!(GenerationError::upstream(Some(429), "HTTP 429: quota").is_transient());
        assert!(GenerationError::upstream(Some(504), "HTTP 504: gateway").is_transient());
        assert!(!GenerationError::upstream(Some(500), "HTTP 500: internal").is_transient());
        assert!(!GenerationError::Parse("x".into()).is_transient());
        assert!(!GenerationError::Cancelled.is_transient());
    }
}
