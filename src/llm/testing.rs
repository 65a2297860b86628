//! A scripted in-memory backend for exercising the client without a network.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use super::backend::{BoxFuture, CompletionBackend, CompletionRequest, CompletionResponse};
use super::GenerationError;

#[derive(Default)]
struct Script {
    replies: VecDeque<Result<CompletionResponse, GenerationError>>,
    requests: Vec<CompletionRequest>,
    call_times: Vec<Instant>,
}

/// Replays queued replies in order and records every request it receives.
///
/// When the queue runs dry further calls fail with a non-transient
/// [`GenerationError::Request`].
///
/// ```
/// use std::sync::Arc;
/// use quizgen::llm::{GenerationClient, testing::ScriptedBackend};
///
/// let backend = Arc::new(ScriptedBackend::new().reply_text("[]"));
/// let client = GenerationClient::new(backend.clone());
/// assert_eq!(backend.calls(), 0);
/// ```
pub struct ScriptedBackend {
    script: Mutex<Script>,
    structured: bool,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::default()),
            structured: true,
        }
    }

    /// Behave like an endpoint that cannot enforce a response schema.
    #[must_use]
    pub fn without_structured_output(mut self) -> Self {
        self.structured = false;
        self
    }

    #[must_use]
    pub fn reply(self, response: CompletionResponse) -> Self {
        self.lock().replies.push_back(Ok(response));
        self
    }

    #[must_use]
    pub fn reply_text(self, text: impl Into<String>) -> Self {
        self.reply(CompletionResponse::from_text(text))
    }

    #[must_use]
    pub fn fail(self, error: GenerationError) -> Self {
        self.lock().replies.push_back(Err(error));
        self
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.lock().requests.len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.lock().requests.last().cloned()
    }

    /// Elapsed time between consecutive calls.
    pub fn call_gaps(&self) -> Vec<Duration> {
        self.lock()
            .call_times
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        // Ignore poisoning from a panicked test.
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CompletionBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    fn supports_structured_output(&self) -> bool {
        self.structured
    }

    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<CompletionResponse, GenerationError>> {
        let next = {
            let mut script = self.lock();
            script.requests.push(request.clone());
            script.call_times.push(Instant::now());
            script.replies.pop_front()
        };
        Box::pin(async move {
            next.unwrap_or_else(|| {
                Err(GenerationError::Request {
                    status: None,
                    message: "scripted backend has no replies left".into(),
                })
            })
        })
    }
}
