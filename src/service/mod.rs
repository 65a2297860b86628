//! The quiz HTTP endpoints.
//!
//! | Route                    | Answer                                          |
//! |--------------------------|-------------------------------------------------|
//! | `POST /generate-quiz`    | `{questions}` or, with `type: "feedback"`, feedback |
//! | `GET /categories`        | the built-in category catalog                   |
//! | `GET /categories/:id`    | one catalog entry, or 404                       |
//! | `GET /health`            | `{status: "ok"}`                                |

use std::sync::Arc;

use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use crate::context::Context;
use crate::llm::GenerationClient;
use crate::middleware::{LoggerMiddleware, Pipeline};
use crate::quiz::{self, CATEGORIES, Difficulty, Feedback, FeedbackRequest, QuizError, QuizRequest};
use crate::security::CorsMiddleware;
use crate::{Response, Router, StatusCode};

/// Questions generated when the body names no `count`.
pub const DEFAULT_QUESTION_COUNT: usize = 5;

/// Body of `POST /generate-quiz`. Field names follow the browser client.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    #[serde(default)]
    category: String,
    #[serde(default)]
    difficulty: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    count: Option<usize>,
    score: Option<f64>,
    #[serde(default)]
    total_questions: usize,
    #[serde(default)]
    correct_answers: usize,
}

impl GenerateBody {
    fn is_feedback(&self) -> bool {
        self.kind.as_deref() == Some("feedback")
    }

    fn difficulty(&self) -> Result<Difficulty, QuizError> {
        self.difficulty.parse()
    }

    fn quiz_request(&self) -> Result<QuizRequest, QuizError> {
        QuizRequest::new(
            self.category.as_str(),
            self.difficulty()?,
            self.count.unwrap_or(DEFAULT_QUESTION_COUNT),
        )
    }

    fn feedback_request(&self) -> Result<FeedbackRequest, String> {
        let category = self.category.trim();
        if category.is_empty() {
            return Err(QuizError::EmptyCategory.to_string());
        }
        if self.correct_answers > self.total_questions {
            return Err(format!(
                "correctAnswers ({}) exceeds totalQuestions ({})",
                self.correct_answers, self.total_questions
            ));
        }
        let score_percent = match self.score {
            Some(score) if score.is_finite() => score.round().clamp(0.0, 100.0) as u8,
            Some(_) => return Err("score must be a finite number".to_owned()),
            None if self.total_questions == 0 => 0,
            None => {
                (self.correct_answers as f64 / self.total_questions as f64 * 100.0).round() as u8
            }
        };
        Ok(FeedbackRequest {
            score_percent,
            category: category.to_owned(),
            difficulty: self.difficulty().map_err(|e| e.to_string())?,
            total_questions: self.total_questions,
            correct_answers: self.correct_answers,
        })
    }
}

struct QuizService {
    client: GenerationClient,
}

impl QuizService {
    async fn generate(&self, ctx: Context) -> Response {
        let body: GenerateBody = match ctx.json() {
            Ok(body) => body,
            Err(e) => {
                return Response::error(StatusCode::BadRequest, format!("invalid request body: {e}"));
            }
        };

        if body.is_feedback() {
            return self.feedback(&body).await;
        }

        let request = match body.quiz_request() {
            Ok(request) => request,
            Err(e) => return Response::error(StatusCode::BadRequest, e.to_string()),
        };
        match self.client.generate_quiz(&request).await {
            Ok(questions) => Response::json(StatusCode::Ok, &json!({ "questions": questions })),
            Err(e) => {
                error!(error = %e, category = request.category(), "quiz generation failed");
                Response::error(StatusCode::InternalServerError, e.to_string())
            }
        }
    }

    /// Feedback never fails the request once the input is valid: a failed
    /// generation is answered with [`Feedback::fallback`].
    async fn feedback(&self, body: &GenerateBody) -> Response {
        let summary = match body.feedback_request() {
            Ok(summary) => summary,
            Err(reason) => return Response::error(StatusCode::BadRequest, reason),
        };
        let feedback = match self.client.generate_feedback(&summary).await {
            Ok(feedback) => feedback,
            Err(e) => {
                warn!(error = %e, category = %summary.category, "feedback generation failed, serving fallback");
                Feedback::fallback(quiz::catalog::display_name(&summary.category))
            }
        };
        Response::json(StatusCode::Ok, &feedback)
    }
}

/// Registers every route against `client`.
pub fn router(client: GenerationClient) -> Router {
    let service = Arc::new(QuizService { client });
    let mut router = Router::new();

    router.post("/generate-quiz", move |ctx: Context| {
        let service = Arc::clone(&service);
        async move { service.generate(ctx).await }
    });
    router.get("/categories", |_ctx: Context| async {
        Response::json(StatusCode::Ok, CATEGORIES)
    });
    router.get("/categories/:id", |ctx: Context| async move {
        match ctx.params().get("id").and_then(quiz::catalog::find) {
            Some(category) => Response::json(StatusCode::Ok, category),
            None => Response::error(StatusCode::NotFound, "Unknown category"),
        }
    });
    router.get("/health", |_ctx: Context| async {
        Response::json(StatusCode::Ok, &json!({ "status": "ok" }))
    });

    router
}

/// The full request pipeline: logging, then CORS, then the routes.
pub fn pipeline<I, S>(client: GenerationClient, allowed_origins: I) -> Pipeline
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Pipeline::new(router(client))
        .layer(LoggerMiddleware)
        .layer(CorsMiddleware::new().with_origins(allowed_origins))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn body(value: Value) -> GenerateBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn count_defaults_to_five() {
        let req = body(json!({ "category": "science", "difficulty": "easy" }))
            .quiz_request()
            .unwrap();
        assert_eq!(req.count(), DEFAULT_QUESTION_COUNT);
    }

    #[test]
    fn quiz_request_validation() {
        let missing_category = body(json!({ "difficulty": "easy" })).quiz_request();
        assert_eq!(missing_category.unwrap_err(), QuizError::EmptyCategory);

        let bad_difficulty = body(json!({ "category": "science", "difficulty": "brutal" }));
        assert!(matches!(
            bad_difficulty.quiz_request(),
            Err(QuizError::UnknownDifficulty(_))
        ));

        let too_many = body(json!({ "category": "science", "difficulty": "hard", "count": 21 }));
        assert_eq!(
            too_many.quiz_request().unwrap_err(),
            QuizError::CountOutOfRange { count: 21 }
        );
    }

    #[test]
    fn feedback_score_is_taken_or_derived() {
        let explicit = body(json!({
            "type": "feedback", "category": "history", "difficulty": "medium",
            "score": 59.6, "totalQuestions": 5, "correctAnswers": 3
        }));
        assert!(explicit.is_feedback());
        assert_eq!(explicit.feedback_request().unwrap().score_percent, 60);

        let derived = body(json!({
            "type": "feedback", "category": "history", "difficulty": "medium",
            "totalQuestions": 8, "correctAnswers": 1
        }));
        assert_eq!(derived.feedback_request().unwrap().score_percent, 13);
    }

    #[test]
    fn feedback_request_rejects_inconsistent_counts() {
        let b = body(json!({
            "type": "feedback", "category": "history", "difficulty": "easy",
            "totalQuestions": 2, "correctAnswers": 3
        }));
        assert!(b.feedback_request().unwrap_err().contains("exceeds"));
    }
}
