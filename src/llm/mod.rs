//! LLM integration: prompts, completion backends, response parsing, retries.
//!
//! ## Layers
//!
//! - [`GenerationClient`] builds the prompt, calls the backend under a
//!   [`RetryPolicy`], extracts JSON, and validates it.
//! - [`CompletionBackend`] is one remote endpoint: [`GeminiBackend`] or
//!   [`ChatCompletionsBackend`].
//! - [`extract_json`] walks the [`ParseStrategy`] chain.
//!
//! Every layer reports failures as a [`GenerationError`].

mod backend;
mod chat;
mod client;
mod error;
mod gemini;
mod parse;
pub mod prompt;
mod retry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use std::time::Duration;

pub use backend::{
    BoxFuture, CompletionBackend, CompletionRequest, CompletionResponse, GenerationConfig,
    Message, Role,
};
pub use chat::{CHAT_MODEL, ChatCompletionsBackend};
pub use client::{FeedbackContract, GenerationClient, decode_feedback, decode_questions};
pub use error::{GenerationError, is_transient_message};
pub use gemini::{GEMINI_MODEL, GeminiBackend};
pub use parse::{ParseStrategy, extract_json};
pub use retry::{Cancellation, Canceller, RetryPolicy};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared HTTP client settings for the remote backends.
pub(crate) fn http_client() -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("quizgen/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GenerationError::Request {
            status: None,
            message: format!("failed to build HTTP client: {e}"),
        })
}
