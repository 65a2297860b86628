//! The seam between the generation client and a concrete completion endpoint.

use std::future::Future;
use std::pin::Pin;

use serde::Serialize;
use serde_json::Value;

use super::GenerationError;

/// A boxed, `Send` future borrowed from the backend for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Author of a message in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A role-tagged instruction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// Sampling and output-format options.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

impl GenerationConfig {
    /// Schema-constrained JSON output.
    pub fn json(temperature: f32, schema: Value) -> Self {
        Self {
            temperature,
            response_mime_type: Some("application/json".to_owned()),
            response_schema: Some(schema),
        }
    }
}

/// One outbound completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub config: GenerationConfig,
}

/// The parts of a completion response the parse chain knows how to read.
///
/// Backends fill in whichever fields their wire format provides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    /// Already-structured output, when the endpoint returns one.
    pub parsed: Option<Value>,
    /// Text nested under a `response` envelope.
    pub response_text: Option<String>,
    /// Free text of the whole answer.
    pub text: Option<String>,
    /// Raw text of each candidate, in order.
    pub candidates: Vec<String>,
}

impl CompletionResponse {
    /// A response carrying a single plain-text answer.
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            parsed: None,
            response_text: None,
            text: Some(text.clone()),
            candidates: vec![text],
        }
    }
}

/// A remote service that turns role-tagged messages into generated text.
///
/// Implementations must be shareable across tasks; the generation client
/// holds one behind an `Arc` and issues at most one call at a time per
/// operation.
pub trait CompletionBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Model identifier sent with every request.
    fn model(&self) -> &str;

    /// Whether `GenerationConfig::response_schema` is enforced by the endpoint.
    ///
    /// When `false` the client folds the schema into the system instruction.
    fn supports_structured_output(&self) -> bool;

    /// Issues one request. No retries happen at this layer.
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<CompletionResponse, GenerationError>>;
}

/// Converts a non-2xx reply into an error, preferring the endpoint's own
/// `error.message` over the raw body. A symbolic `error.status` such as
/// `RESOURCE_EXHAUSTED` is kept in the message.
pub(crate) fn upstream_error(status: u16, body: &str) -> GenerationError {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let error = parsed.as_ref().map(|v| &v["error"]);
    let detail = error
        .and_then(|e| e["message"].as_str())
        .map_or_else(|| body.trim().to_owned(), str::to_owned);
    let message = match error.and_then(|e| e["status"].as_str()) {
        Some(code) => format!("HTTP {status} {code}: {detail}"),
        None => format!("HTTP {status}: {detail}"),
    };
    GenerationError::upstream(Some(status), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_error_prefers_error_message() {
        let body = r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#;
        let err = upstream_error(503, body);
        assert!(err.is_transient());
        assert_eq!(
            err.to_string(),
            "transient service failure: HTTP 503 UNAVAILABLE: The model is overloaded."
        );
    }

    #[test]
    fn quota_exhaustion_is_transient() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted (e.g. check quota).","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = upstream_error(429, body);
        assert!(err.is_transient(), "{err:?}");
        assert!(err.to_string().contains("RESOURCE_EXHAUSTED"));
    }

    #[test]
    fn gateway_deadline_is_transient() {
        let body = r#"{"error":{"code":504,"message":"Deadline expired before operation could complete.","status":"DEADLINE_EXCEEDED"}}"#;
        assert!(upstream_error(504, body).is_transient());
        assert!(upstream_error(504, "<html>Gateway Timeout</html>").is_transient());
    }

    #[test]
    fn auth_failure_is_permanent() {
        let body = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        let err = upstream_error(400, body);
        assert!(!err.is_transient());
        assert_eq!(
            err.to_string(),
            "completion request failed: HTTP 400 INVALID_ARGUMENT: API key not valid. Please pass a valid API key."
        );
    }

    #[test]
    fn upstream_error_falls_back_to_body() {
        let err = upstream_error(400, "bad things\n");
        assert!(matches!(
            err,
            GenerationError::Request { status: Some(400), ref message } if message == "HTTP 400: bad things"
        ));
    }

    #[test]
    fn text_response_fills_text_and_candidate() {
        let resp = CompletionResponse::from_text("[]");
        assert_eq!(resp.text.as_deref(), Some("[]"));
        assert_eq!(resp.candidates, vec!["[]".to_string()]);
        assert!(resp.parsed.is_none());
    }
}
