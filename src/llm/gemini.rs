//! Google Gemini `generateContent` backend.

use serde_json::{Value, json};
use tracing::debug;

use super::backend::{
    BoxFuture, CompletionBackend, CompletionRequest, CompletionResponse, Role, upstream_error,
};
use super::GenerationError;
use crate::config::ApiKey;

/// Model used for every Gemini request.
pub const GEMINI_MODEL: &str = "gemini-2.5-pro";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini REST backend with native schema-constrained output.
pub struct GeminiBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl GeminiBackend {
    /// Creates a backend against the public Gemini endpoint.
    pub fn new(api_key: ApiKey) -> Result<Self, GenerationError> {
        Ok(Self {
            http: super::http_client()?,
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key,
        })
    }

    /// Points the backend at a different host (proxies, local stubs).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, GEMINI_MODEL
        )
    }

    /// Builds the JSON body. System messages become `systemInstruction`;
    /// everything else goes to `contents` as user turns.
    pub fn payload(request: &CompletionRequest) -> Value {
        let system: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| json!({ "text": m.text }))
            .collect();
        let contents: Vec<Value> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| json!({ "role": "user", "parts": [{ "text": m.text }] }))
            .collect();

        let mut payload = json!({
            "contents": contents,
            "generationConfig": request.config,
        });
        if !system.is_empty() {
            payload["systemInstruction"] = json!({ "parts": system });
        }
        payload
    }

    /// Maps a `generateContent` reply onto the fields the parse chain reads.
    pub fn response_from_body(body: &Value) -> CompletionResponse {
        let candidate_text = |candidate: &Value| -> Option<String> {
            let parts = candidate["content"]["parts"].as_array()?;
            let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
            Some(text)
        };
        let candidates: Vec<String> = body["candidates"]
            .as_array()
            .map(|cs| cs.iter().filter_map(candidate_text).collect())
            .unwrap_or_default();

        CompletionResponse {
            parsed: body.get("parsed").filter(|v| !v.is_null()).cloned(),
            response_text: body["response"]["text"].as_str().map(str::to_owned),
            text: body["text"]
                .as_str()
                .map(str::to_owned)
                .or_else(|| candidates.first().cloned()),
            candidates,
        }
    }
}

impl CompletionBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        GEMINI_MODEL
    }

    fn supports_structured_output(&self) -> bool {
        true
    }

    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<CompletionResponse, GenerationError>> {
        Box::pin(async move {
            let response = self
                .http
                .post(self.endpoint())
                .header("x-goog-api-key", self.api_key.expose())
                .json(&Self::payload(request))
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;
            debug!(status = status.as_u16(), bytes = text.len(), "gemini response");

            if !status.is_success() {
                return Err(upstream_error(status.as_u16(), &text));
            }

            let body: Value = serde_json::from_str(&text)
                .map_err(|e| GenerationError::Parse(format!("response body is not JSON: {e}")))?;
            if let Some(message) = body["error"]["message"].as_str() {
                let message = match body["error"]["status"].as_str() {
                    Some(code) => format!("{code}: {message}"),
                    None => message.to_owned(),
                };
                return Err(GenerationError::upstream(None, message));
            }
            Ok(Self::response_from_body(&body))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::backend::{GenerationConfig, Message};

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![Message::system("rules"), Message::user("ask")],
            config: GenerationConfig::json(0.7, json!({ "type": "array" })),
        }
    }

    #[test]
    fn payload_splits_system_and_user() {
        let payload = GeminiBackend::payload(&request());
        assert_eq!(payload["systemInstruction"]["parts"][0]["text"], "rules");
        let contents = payload["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0]["role"], "user");
        assert_eq!(contents[0]["parts"][0]["text"], "ask");
    }

    #[test]
    fn payload_carries_generation_config() {
        let payload = GeminiBackend::payload(&request());
        let cfg = &payload["generationConfig"];
        assert_eq!(cfg["responseMimeType"], "application/json");
        assert_eq!(cfg["responseSchema"]["type"], "array");
        assert!((cfg["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[test]
    fn payload_without_system_message() {
        let req = CompletionRequest {
            messages: vec![Message::user("only")],
            config: GenerationConfig::json(0.1, json!({})),
        };
        assert!(GeminiBackend::payload(&req).get("systemInstruction").is_none());
    }

    #[test]
    fn candidate_parts_are_joined() {
        let body = json!({
            "candidates": [
                { "content": { "parts": [{ "text": "[{\"a\":" }, { "text": "1}]" }] } },
                { "content": { "parts": [{ "text": "second" }] } }
            ]
        });
        let resp = GeminiBackend::response_from_body(&body);
        assert_eq!(resp.candidates, vec!["[{\"a\":1}]".to_string(), "second".to_string()]);
        assert_eq!(resp.text.as_deref(), Some("[{\"a\":1}]"));
        assert!(resp.parsed.is_none());
        assert!(resp.response_text.is_none());
    }

    #[test]
    fn envelope_fields_are_picked_up() {
        let body = json!({
            "parsed": [1, 2],
            "response": { "text": "[3]" },
            "text": "free"
        });
        let resp = GeminiBackend::response_from_body(&body);
        assert_eq!(resp.parsed, Some(json!([1, 2])));
        assert_eq!(resp.response_text.as_deref(), Some("[3]"));
        assert_eq!(resp.text.as_deref(), Some("free"));
        assert!(resp.candidates.is_empty());
    }

    #[test]
    fn base_url_override_trims_slash() {
        let backend = GeminiBackend::new(ApiKey::new("k"))
            .unwrap()
            .with_base_url("http://127.0.0.1:9999/");
        assert_eq!(
            backend.endpoint(),
            "http://127.0.0.1:9999/v1beta/models/gemini-2.5-pro:generateContent"
        );
    }
}
