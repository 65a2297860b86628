//! Method + path dispatch.
//!
//! Two pattern styles are supported:
//!
//! | Pattern              | Example match          | Captured params   |
//! |----------------------|------------------------|-------------------|
//! | `/categories`        | `/categories`          | *(none)*          |
//! | `/categories/:id`    | `/categories/history`  | `id → "history"`  |
//!
//! A trailing slash is ignored on both sides. Routes are tried in
//! registration order. When the path matches some route but no route for the
//! request's method, the router answers `405` instead of `404`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased async route handler.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Any `Fn(Context) -> impl Future<Output = Response>` usable as a route.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Static(String),
    Param(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Pattern {
    segments: Vec<Segment>,
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

impl Pattern {
    fn parse(pattern: &str) -> Self {
        let segments = split_path(pattern)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_owned()),
                None => Segment::Static(s.to_owned()),
            })
            .collect();
        Self { segments }
    }

    fn matches(&self, path: &str) -> Option<PathParams> {
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(s) if s == part => {}
                Segment::Static(_) => return None,
                Segment::Param(name) => params.insert(name.as_str(), part),
            }
        }
        Some(params)
    }
}

struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// Dispatches a [`Context`] to the first route whose method and path match.
///
/// ```rust,no_run
/// use quizgen::{Response, Router, StatusCode};
/// use quizgen::context::Context;
///
/// let mut router = Router::new();
/// router.get("/health", |_ctx: Context| async { Response::new(StatusCode::Ok) });
/// router.get("/categories/:id", |ctx: Context| async move {
///     let id = ctx.params().get("id").unwrap_or_default().to_owned();
///     Response::new(StatusCode::Ok).body(id)
/// });
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    pub fn post(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Post, path, handler);
    }

    pub fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(path),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes a bare request.
    pub async fn route(&self, request: Request) -> Response {
        self.dispatch(Context::new(request)).await
    }

    /// Routes a context, filling in its path parameters.
    pub async fn dispatch(&self, mut ctx: Context) -> Response {
        let mut path_known = false;

        for route in &self.routes {
            let Some(params) = route.pattern.matches(ctx.request().path()) else {
                continue;
            };
            if &route.method != ctx.request().method() {
                path_known = true;
                continue;
            }
            ctx.set_params(params);
            return (route.handler)(ctx).await;
        }

        if path_known {
            Response::error(StatusCode::MethodNotAllowed, "Method not allowed")
        } else {
            Response::error(StatusCode::NotFound, "Not found")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().unwrap().0
    }

    fn ok(_ctx: Context) -> impl Future<Output = Response> {
        async { Response::new(StatusCode::Ok) }
    }

    #[test]
    fn pattern_parsing() {
        assert!(Pattern::parse("/").segments.is_empty());
        assert_eq!(
            Pattern::parse("/categories/:id/").segments,
            vec![
                Segment::Static("categories".into()),
                Segment::Param("id".into())
            ]
        );
    }

    #[test]
    fn pattern_matching() {
        let p = Pattern::parse("/categories/:id");
        let params = p.matches("/categories/space-astronomy").unwrap();
        assert_eq!(params.get("id"), Some("space-astronomy"));
        assert!(p.matches("/categories/").is_none());
        assert!(p.matches("/categories/a/b").is_none());
        assert!(p.matches("/quizzes/a").is_none());

        let exact = Pattern::parse("/health");
        assert!(exact.matches("/health/").is_some());
        assert!(Pattern::parse("/").matches("/").is_some());
    }

    #[tokio::test]
    async fn unknown_path_is_404() {
        let mut router = Router::new();
        router.get("/health", ok);
        let res = router.route(request("GET", "/nope")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn wrong_method_on_known_path_is_405() {
        let mut router = Router::new();
        router.post("/generate-quiz", ok);
        let res = router.route(request("PUT", "/generate-quiz")).await;
        assert_eq!(res.status(), StatusCode::MethodNotAllowed);
        assert_eq!(res.body_slice(), br#"{"error":"Method not allowed"}"#);
    }

    #[tokio::test]
    async fn first_match_wins_and_receives_params() {
        let mut router = Router::new();
        router.get("/categories/:id", |ctx: Context| async move {
            let id = ctx.params().get("id").unwrap_or_default().to_owned();
            Response::new(StatusCode::Ok).body(id)
        });
        router.get("/categories/:other", |_ctx: Context| async {
            Response::new(StatusCode::NoContent)
        });
        assert_eq!(router.len(), 2);

        let res = router.route(request("GET", "/categories/history")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(res.body_slice(), b"history");
    }
}
