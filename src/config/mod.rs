//! Configuration: credential resolution and service settings from the environment.
//!
//! All lookups go through [`EnvSource`] so tests can supply a plain map instead
//! of mutating the process environment.
//!
//! | Variable                     | Meaning                            | Default          |
//! |------------------------------|------------------------------------|------------------|
//! | `GEMINI_API_KEY`             | Gemini credential                  | none             |
//! | `VITE_GEMINI_API_KEY`        | Gemini credential (fallback)       | none             |
//! | `AI_GATEWAY_API_KEY`         | chat-completions credential        | none             |
//! | `LOVABLE_API_KEY`            | chat-completions credential (fallback) | none         |
//! | `QUIZGEN_BACKEND`            | `gemini` or `chat`                 | `gemini`         |
//! | `QUIZGEN_BIND`               | listen address                     | `127.0.0.1:8080` |
//! | `QUIZGEN_TIMEOUT_SECS`       | per-attempt timeout, `0` disables  | `30`             |
//! | `QUIZGEN_FEEDBACK_CONTRACT`  | `basic` or `learn-more`            | `learn-more`     |
//! | `QUIZGEN_ALLOWED_ORIGINS`    | comma-separated CORS origins       | `*`              |
//! | `QUIZGEN_BASE_URL`           | backend base URL override          | backend default  |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::llm::{
    ChatCompletionsBackend, CompletionBackend, FeedbackContract, GeminiBackend, GenerationError,
    RetryPolicy,
};

/// Credential sources for the Gemini backend, in priority order.
pub const GEMINI_KEY_VARS: &[&str] = &["GEMINI_API_KEY", "VITE_GEMINI_API_KEY"];

/// Credential sources for the chat-completions gateway, in priority order.
pub const GATEWAY_KEY_VARS: &[&str] = &["AI_GATEWAY_API_KEY", "LOVABLE_API_KEY"];

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration errors. Always fatal; raised before any network traffic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing API key: set one of {}", .sources.join(" / "))]
    MissingCredential { sources: &'static [&'static str] },

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// A read-only view of environment variables.
pub trait EnvSource {
    /// Returns the value of `key`, treating unset and empty values alike.
    fn var(&self, key: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|v| !v.trim().is_empty()).cloned()
    }
}

/// An API key. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Returns the raw key for placing into a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Reads the first non-empty variable from `sources`.
///
/// # Errors
///
/// [`ConfigError::MissingCredential`] if none of the sources is set.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use quizgen::config::{GEMINI_KEY_VARS, resolve_api_key};
///
/// let mut env = HashMap::new();
/// env.insert("VITE_GEMINI_API_KEY".to_string(), "k2".to_string());
/// assert_eq!(resolve_api_key(&env, GEMINI_KEY_VARS).unwrap().expose(), "k2");
/// ```
pub fn resolve_api_key(
    env: &impl EnvSource,
    sources: &'static [&'static str],
) -> Result<ApiKey, ConfigError> {
    sources
        .iter()
        .find_map(|key| env.var(key))
        .map(ApiKey)
        .ok_or(ConfigError::MissingCredential { sources })
}

/// Which completion endpoint the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Gemini,
    ChatCompletions,
}

impl BackendKind {
    /// Credential variables consulted for this backend.
    pub fn key_sources(self) -> &'static [&'static str] {
        match self {
            Self::Gemini => GEMINI_KEY_VARS,
            Self::ChatCompletions => GATEWAY_KEY_VARS,
        }
    }
}

/// Everything the binary needs to start serving.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub backend: BackendKind,
    pub api_key: ApiKey,
    pub base_url: Option<String>,
    pub attempt_timeout: Option<Duration>,
    pub feedback_contract: FeedbackContract,
    pub allowed_origins: Vec<String>,
}

impl ServiceConfig {
    /// Loads the configuration, failing fast on a missing credential or a
    /// malformed value.
    pub fn from_env(env: &impl EnvSource) -> Result<Self, ConfigError> {
        let backend = match env.var("QUIZGEN_BACKEND").as_deref() {
            None | Some("gemini") => BackendKind::Gemini,
            Some("chat") => BackendKind::ChatCompletions,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "QUIZGEN_BACKEND",
                    value: other.to_owned(),
                    reason: "expected `gemini` or `chat`",
                });
            }
        };

        let api_key = resolve_api_key(env, backend.key_sources())?;

        let attempt_timeout = match env.var("QUIZGEN_TIMEOUT_SECS") {
            None => Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => None,
                Ok(secs) => Some(Duration::from_secs(secs)),
                Err(_) => {
                    return Err(ConfigError::Invalid {
                        key: "QUIZGEN_TIMEOUT_SECS",
                        value: raw,
                        reason: "expected a whole number of seconds",
                    });
                }
            },
        };

        let feedback_contract = match env.var("QUIZGEN_FEEDBACK_CONTRACT").as_deref() {
            None | Some("learn-more") => FeedbackContract::WithLearnMore,
            Some("basic") => FeedbackContract::Basic,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "QUIZGEN_FEEDBACK_CONTRACT",
                    value: other.to_owned(),
                    reason: "expected `basic` or `learn-more`",
                });
            }
        };

        let allowed_origins = env
            .var("QUIZGEN_ALLOWED_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_else(|| vec!["*".to_owned()]);

        Ok(Self {
            bind_addr: env.var("QUIZGEN_BIND").unwrap_or_else(|| DEFAULT_BIND.to_owned()),
            backend,
            api_key,
            base_url: env.var("QUIZGEN_BASE_URL"),
            attempt_timeout,
            feedback_contract,
            allowed_origins,
        })
    }

    /// Retry policy with this configuration's per-attempt timeout.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempt_timeout: self.attempt_timeout,
            ..RetryPolicy::default()
        }
    }

    /// Constructs the configured completion backend.
    pub fn build_backend(&self) -> Result<Arc<dyn CompletionBackend>, GenerationError> {
        Ok(match self.backend {
            BackendKind::Gemini => {
                let mut backend = GeminiBackend::new(self.api_key.clone())?;
                if let Some(url) = &self.base_url {
                    backend = backend.with_base_url(url);
                }
                Arc::new(backend)
            }
            BackendKind::ChatCompletions => {
                let mut backend = ChatCompletionsBackend::new(self.api_key.clone())?;
                if let Some(url) = &self.base_url {
                    backend = backend.with_base_url(url);
                }
                Arc::new(backend)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn primary_key_wins() {
        let e = env(&[("GEMINI_API_KEY", "primary"), ("VITE_GEMINI_API_KEY", "fallback")]);
        assert_eq!(resolve_api_key(&e, GEMINI_KEY_VARS).unwrap().expose(), "primary");
    }

    #[test]
    fn empty_primary_falls_through() {
        let e = env(&[("GEMINI_API_KEY", "  "), ("VITE_GEMINI_API_KEY", "fallback")]);
        assert_eq!(resolve_api_key(&e, GEMINI_KEY_VARS).unwrap().expose(), "fallback");
    }

    #[test]
    fn missing_key_is_config_error() {
        let err = resolve_api_key(&env(&[]), GEMINI_KEY_VARS).unwrap_err();
        assert_eq!(
            err,
            ConfigError::MissingCredential {
                sources: GEMINI_KEY_VARS
            }
        );
        assert!(err.to_string().contains("GEMINI_API_KEY / VITE_GEMINI_API_KEY"));
    }

    #[test]
    fn api_key_debug_is_redacted() {
        let key = ApiKey::new("sk-secret");
        assert!(!format!("{key:?}").contains("sk-secret"));
    }

    #[test]
    fn defaults() {
        let cfg = ServiceConfig::from_env(&env(&[("GEMINI_API_KEY", "k")])).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.backend, BackendKind::Gemini);
        assert_eq!(cfg.attempt_timeout, Some(Duration::from_secs(30)));
        assert_eq!(cfg.feedback_contract, FeedbackContract::WithLearnMore);
        assert_eq!(cfg.allowed_origins, vec!["*"]);
        assert_eq!(cfg.retry_policy().max_retries, 3);
    }

    #[test]
    fn chat_backend_uses_gateway_key() {
        let e = env(&[
            ("QUIZGEN_BACKEND", "chat"),
            ("GEMINI_API_KEY", "ignored"),
            ("LOVABLE_API_KEY", "gw"),
        ]);
        let cfg = ServiceConfig::from_env(&e).unwrap();
        assert_eq!(cfg.backend, BackendKind::ChatCompletions);
        assert_eq!(cfg.api_key.expose(), "gw");
    }

    #[test]
    fn overrides() {
        let e = env(&[
            ("GEMINI_API_KEY", "k"),
            ("QUIZGEN_TIMEOUT_SECS", "0"),
            ("QUIZGEN_FEEDBACK_CONTRACT", "basic"),
            ("QUIZGEN_ALLOWED_ORIGINS", "https://a.example, https://b.example,"),
            ("QUIZGEN_BIND", "0.0.0.0:9000"),
        ]);
        let cfg = ServiceConfig::from_env(&e).unwrap();
        assert_eq!(cfg.attempt_timeout, None);
        assert_eq!(cfg.feedback_contract, FeedbackContract::Basic);
        assert_eq!(cfg.allowed_origins, vec!["https://a.example", "https://b.example"]);
        assert_eq!(cfg.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn malformed_values_are_rejected() {
        let e = env(&[("GEMINI_API_KEY", "k"), ("QUIZGEN_TIMEOUT_SECS", "soon")]);
        assert!(matches!(
            ServiceConfig::from_env(&e),
            Err(ConfigError::Invalid { key: "QUIZGEN_TIMEOUT_SECS", .. })
        ));

        let e = env(&[("GEMINI_API_KEY", "k"), ("QUIZGEN_BACKEND", "llama")]);
        assert!(matches!(
            ServiceConfig::from_env(&e),
            Err(ConfigError::Invalid { key: "QUIZGEN_BACKEND", .. })
        ));
    }
}
