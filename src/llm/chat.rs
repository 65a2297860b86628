//! OpenAI-compatible chat-completions backend (AI gateways, proxies).
//!
//! The gateway only guarantees a JSON object or free text back, not a
//! schema, so [`CompletionBackend::supports_structured_output`] is `false`.

use serde_json::{Value, json};
use tracing::debug;

use super::backend::{
    BoxFuture, CompletionBackend, CompletionRequest, CompletionResponse, upstream_error,
};
use super::GenerationError;
use crate::config::ApiKey;

/// Model requested from the gateway.
pub const CHAT_MODEL: &str = "google/gemini-2.5-flash";

const DEFAULT_BASE_URL: &str = "https://ai.gateway.lovable.dev/v1";

pub struct ChatCompletionsBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl ChatCompletionsBackend {
    pub fn new(api_key: ApiKey) -> Result<Self, GenerationError> {
        Ok(Self {
            http: super::http_client()?,
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn payload(request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| json!({ "role": m.role, "content": m.text }))
            .collect();
        let mut payload = json!({
            "model": CHAT_MODEL,
            "messages": messages,
            "temperature": request.config.temperature,
        });
        if request.config.response_mime_type.as_deref() == Some("application/json") {
            payload["response_format"] = json!({ "type": "json_object" });
        }
        payload
    }

    /// Collects `choices[*].message.content` as candidates.
    pub fn response_from_body(body: &Value) -> CompletionResponse {
        let candidates: Vec<String> = body["choices"]
            .as_array()
            .map(|choices| {
                choices
                    .iter()
                    .filter_map(|c| c["message"]["content"].as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default();
        CompletionResponse {
            text: candidates.first().cloned(),
            candidates,
            ..CompletionResponse::default()
        }
    }
}

impl CompletionBackend for ChatCompletionsBackend {
    fn name(&self) -> &str {
        "chat-completions"
    }

    fn model(&self) -> &str {
        CHAT_MODEL
    }

    fn supports_structured_output(&self) -> bool {
        false
    }

    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<CompletionResponse, GenerationError>> {
        Box::pin(async move {
            let response = self
                .http
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(self.api_key.expose())
                .json(&Self::payload(request))
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;
            debug!(status = status.as_u16(), bytes = text.len(), "gateway response");

            if !status.is_success() {
                return Err(upstream_error(status.as_u16(), &text));
            }

            let body: Value = serde_json::from_str(&text)
                .map_err(|e| GenerationError::Parse(format!("response body is not JSON: {e}")))?;
            Ok(Self::response_from_body(&body))
        })
    }
}
