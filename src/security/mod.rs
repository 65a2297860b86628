//! Cross-origin resource sharing.

use crate::context::Context;
use crate::middleware::{BoxResponse, Middleware, Next};
use crate::{Method, Response, StatusCode};

/// Headers browsers may send on a quiz request.
pub const DEFAULT_ALLOWED_HEADERS: &[&str] = &["authorization", "x-client-info", "apikey", "content-type"];

const DEFAULT_ALLOWED_METHODS: &[&str] = &["POST", "OPTIONS", "GET"];

/// CORS layer.
///
/// - `OPTIONS` from an allowed origin is answered with `204` and never
///   reaches the router.
/// - Other responses to an allowed origin get `Access-Control-*` headers.
/// - With the wildcard origin the headers are sent even when the request
///   carries no `Origin`.
/// - A specific, echoed origin also sets `Vary: Origin`.
///
/// ```
/// use quizgen::security::CorsMiddleware;
///
/// let cors = CorsMiddleware::new().with_origins(["https://quiz.example"]);
/// assert!(cors.allows("https://quiz.example"));
/// assert!(!cors.allows("https://elsewhere.example"));
/// ```
#[derive(Debug, Clone)]
pub struct CorsMiddleware {
    allowed_origins: Vec<String>,
    allowed_methods: String,
    allowed_headers: String,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl CorsMiddleware {
    /// Any origin, `POST, OPTIONS, GET`, and the default headers.
    pub fn new() -> Self {
        Self {
            allowed_origins: vec!["*".to_owned()],
            allowed_methods: DEFAULT_ALLOWED_METHODS.join(", "),
            allowed_headers: DEFAULT_ALLOWED_HEADERS.join(", "),
        }
    }

    /// Replaces the origin allow-list. `"*"` admits every origin.
    #[must_use]
    pub fn with_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = origins.into_iter().map(Into::into).collect();
        self
    }

    fn is_wildcard(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.is_wildcard() || self.allowed_origins.iter().any(|o| o == origin)
    }

    // `Access-Control-Allow-Origin` value for this request, if any.
    fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.is_wildcard() {
            return Some("*".to_owned());
        }
        origin.filter(|o| self.allows(o)).map(str::to_owned)
    }

    fn decorate(&self, response: &mut Response, allow_origin: &str) {
        response.add_header("Access-Control-Allow-Origin", allow_origin);
        response.add_header("Access-Control-Allow-Methods", &self.allowed_methods);
        response.add_header("Access-Control-Allow-Headers", &self.allowed_headers);
        if allow_origin != "*" {
            response.add_header("Vary", "Origin");
        }
    }
}

impl Middleware for CorsMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
        let cors = self.clone();
        Box::pin(async move {
            let origin = ctx.request().headers().get("origin").map(str::to_owned);
            let Some(allow_origin) = cors.allow_origin(origin.as_deref()) else {
                return next.run(ctx).await;
            };

            if ctx.request().method() == &Method::Options {
                let mut preflight =
                    Response::new(StatusCode::NoContent).header("Access-Control-Max-Age", "86400");
                cors.decorate(&mut preflight, &allow_origin);
                return preflight;
            }

            let mut response = next.run(ctx).await;
            cors.decorate(&mut response, &allow_origin);
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Pipeline;
    use crate::{Request, Router};

    fn request(method: &str, origin: Option<&str>) -> Request {
        let origin = origin.map(|o| format!("Origin: {o}\r\n")).unwrap_or_default();
        let raw = format!("{method} /generate-quiz HTTP/1.1\r\n{origin}\r\n");
        Request::parse(raw.as_bytes()).unwrap().unwrap().0
    }

    fn pipeline(cors: CorsMiddleware) -> Pipeline {
        let mut router = Router::new();
        router.post("/generate-quiz", |_ctx: Context| async {
            Response::json(StatusCode::Ok, &serde_json::json!({ "questions": [] }))
        });
        Pipeline::new(router).layer(cors)
    }

    #[tokio::test]
    async fn preflight_short_circuits() {
        let res = pipeline(CorsMiddleware::new())
            .handle(request("OPTIONS", Some("https://quiz.example")))
            .await;
        assert_eq!(res.status(), StatusCode::NoContent);
        assert_eq!(res.headers().get("access-control-allow-origin"), Some("*"));
        assert_eq!(
            res.headers().get("access-control-allow-headers"),
            Some("authorization, x-client-info, apikey, content-type")
        );
        assert_eq!(
            res.headers().get("access-control-allow-methods"),
            Some("POST, OPTIONS, GET")
        );
        assert!(!res.headers().contains("vary"));
    }

    #[tokio::test]
    async fn wildcard_decorates_without_origin() {
        let res = pipeline(CorsMiddleware::new()).handle(request("POST", None)).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.headers().get("access-control-allow-origin"), Some("*"));
    }

    #[tokio::test]
    async fn specific_origin_is_echoed_with_vary() {
        let cors = CorsMiddleware::new().with_origins(["https://quiz.example"]);
        let res = pipeline(cors)
            .handle(request("POST", Some("https://quiz.example")))
            .await;
        assert_eq!(
            res.headers().get("access-control-allow-origin"),
            Some("https://quiz.example")
        );
        assert_eq!(res.headers().get("vary"), Some("Origin"));
    }

    #[tokio::test]
    async fn foreign_origin_passes_through_undecorated() {
        let cors = CorsMiddleware::new().with_origins(["https://quiz.example"]);
        let res = pipeline(cors)
            .handle(request("OPTIONS", Some("https://evil.example")))
            .await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
        assert!(!res.headers().contains("access-control-allow-origin"));
    }
}
