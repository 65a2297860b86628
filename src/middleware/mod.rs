//! Middleware: ordered layers wrapped around the [`Router`].
//!
//! A [`Pipeline`] owns the layers and the router. Each layer receives the
//! [`Context`] and a [`Next`] cursor; calling [`Next::run`] forwards to the
//! following layer, and the router is reached once the layers run out.
//! A layer may also answer on its own without calling `next`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::info;

use crate::context::Context;
use crate::router::Router;
use crate::{Request, Response};

pub type BoxResponse = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A request/response layer. Shared across tasks, hence `Send + Sync`.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse;
}

/// Cursor into the rest of a pipeline for one request.
pub struct Next {
    layers: Arc<[Arc<dyn Middleware>]>,
    index: usize,
    router: Arc<Router>,
}

impl Next {
    /// Runs the next layer, or the router if no layers remain.
    pub async fn run(mut self, ctx: Context) -> Response {
        match self.layers.get(self.index).cloned() {
            Some(layer) => {
                self.index += 1;
                layer.handle(ctx, self).await
            }
            None => self.router.dispatch(ctx).await,
        }
    }
}

/// Layers plus the router they wrap. Layers run in the order they were added.
///
/// ```rust,no_run
/// use quizgen::middleware::{LoggerMiddleware, Pipeline};
/// use quizgen::security::CorsMiddleware;
/// use quizgen::Router;
///
/// let pipeline = Pipeline::new(Router::new())
///     .layer(LoggerMiddleware)
///     .layer(CorsMiddleware::new());
/// ```
#[derive(Clone)]
pub struct Pipeline {
    layers: Arc<[Arc<dyn Middleware>]>,
    router: Arc<Router>,
}

impl Pipeline {
    pub fn new(router: Router) -> Self {
        Self {
            layers: Arc::from(Vec::new()),
            router: Arc::new(router),
        }
    }

    #[must_use]
    pub fn layer(self, middleware: impl Middleware + 'static) -> Self {
        let mut layers: Vec<Arc<dyn Middleware>> = self.layers.iter().cloned().collect();
        layers.push(Arc::new(middleware));
        Self {
            layers: layers.into(),
            router: self.router,
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        let next = Next {
            layers: Arc::clone(&self.layers),
            index: 0,
            router: Arc::clone(&self.router),
        };
        next.run(Context::new(request)).await
    }
}

/// Logs `METHOD /path - STATUS (duration)` once the response is ready.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().to_string();
            let path = ctx.request().path().to_owned();

            let response = next.run(ctx).await;

            let status = response.status().as_u16();
            let elapsed = start.elapsed();
            info!(%method, %path, status, ?elapsed, "{method} {path} - {status} ({elapsed:?})");
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::StatusCode;

    struct Tag {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Middleware for Tag {
        fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
            let name = self.name;
            let log = Arc::clone(&self.log);
            Box::pin(async move {
                log.lock().unwrap().push(name);
                let mut response = next.run(ctx).await;
                response.add_header("X-Layer", name);
                response
            })
        }
    }

    struct Reject;

    impl Middleware for Reject {
        fn handle(&self, _ctx: Context, _next: Next) -> BoxResponse {
            Box::pin(async { Response::new(StatusCode::BadRequest) })
        }
    }

    fn request(path: &str) -> Request {
        let raw = format!("GET {path} HTTP/1.1\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().unwrap().0
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.get("/health", |_ctx: Context| async { Response::new(StatusCode::Ok) });
        router
    }

    #[tokio::test]
    async fn layers_run_in_order_then_router() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(router())
            .layer(LoggerMiddleware)
            .layer(Tag { name: "outer", log: Arc::clone(&log) })
            .layer(Tag { name: "inner", log: Arc::clone(&log) });

        let response = pipeline.handle(request("/health")).await;
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(*log.lock().unwrap(), vec!["outer", "inner"]);
        let layers: Vec<_> = response
            .headers()
            .iter()
            .filter(|(k, _)| *k == "X-Layer")
            .map(|(_, v)| v)
            .collect();
        assert_eq!(layers, vec!["inner", "outer"]);
    }

    #[tokio::test]
    async fn layer_can_short_circuit() {
        let pipeline = Pipeline::new(router()).layer(Reject);
        let response = pipeline.handle(request("/health")).await;
        assert_eq!(response.status(), StatusCode::BadRequest);
    }

    #[tokio::test]
    async fn empty_pipeline_is_the_router() {
        let pipeline = Pipeline::new(router());
        assert_eq!(pipeline.handle(request("/missing")).await.status(), StatusCode::NotFound);
    }
}
