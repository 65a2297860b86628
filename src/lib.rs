//! # quizgen
//!
//! Trivia quiz generation backed by a large language model, served over a
//! small async HTTP/1.1 stack.
//!
//! - [`llm::GenerationClient`] turns a [`quiz::QuizRequest`] into validated
//!   [`quiz::Question`]s, and a finished attempt into [`quiz::Feedback`].
//! - [`service`] exposes that client as `POST /generate-quiz` plus the
//!   category catalog.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quizgen::config::{ProcessEnv, ServiceConfig};
//! use quizgen::llm::GenerationClient;
//! use quizgen::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServiceConfig::from_env(&ProcessEnv)?;
//!     let client = GenerationClient::new(config.build_backend()?)
//!         .with_retry_policy(config.retry_policy());
//!     let pipeline = quizgen::service::pipeline(client, config.allowed_origins.clone());
//!
//!     let server = Server::bind(&config.bind_addr).await?;
//!     server
//!         .run(move |req| {
//!             let pipeline = pipeline.clone();
//!             async move { pipeline.handle(req).await }
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod http;
pub mod llm;
pub mod middleware;
pub mod quiz;
pub mod router;
pub mod security;
pub mod server;
pub mod service;

pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
