//! Tokio TCP accept loop speaking HTTP/1.1 with keep-alive.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::http::request::{Request, RequestError};
use crate::http::{Response, StatusCode};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Largest request buffered before answering 413 (1 MiB).
const MAX_REQUEST_SIZE: usize = 1024 * 1024;

const INITIAL_BUF_SIZE: usize = 4096;

/// A bound listener.
///
/// ```rust,no_run
/// use quizgen::server::Server;
/// use quizgen::http::{Request, Response, StatusCode};
///
/// # async fn demo() -> Result<(), quizgen::server::ServerError> {
/// let server = Server::bind("127.0.0.1:0").await?;
/// server
///     .run_until(
///         |_req: Request| async { Response::new(StatusCode::Ok) },
///         async { let _ = tokio::signal::ctrl_c().await; },
///     )
///     .await
/// # }
/// ```
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// # Errors
    ///
    /// [`ServerError::Bind`] if the address cannot be bound.
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self, ServerError> {
        let addr = addr.as_ref();
        let listener = TcpListener::bind(addr).await.map_err(|e| ServerError::Bind {
            addr: addr.to_owned(),
            source: e,
        })?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until the process ends.
    pub async fn run<H, F>(self, handler: H) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
    {
        self.run_until(handler, std::future::pending()).await
    }

    /// Serves until `shutdown` resolves, then stops accepting.
    ///
    /// Connections already being served finish their current request on
    /// their own tasks.
    pub async fn run_until<H, F, S>(self, handler: H, shutdown: S) -> Result<(), ServerError>
    where
        H: Fn(Request) -> F + Send + Sync + 'static,
        F: Future<Output = Response> + Send + 'static,
        S: Future<Output = ()>,
    {
        let handler = Arc::new(handler);
        info!(address = %self.local_addr, "quizgen listening");
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "failed to accept connection");
                        continue;
                    }
                },
            };

            debug!(%peer, "connection accepted");
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, peer, handler).await {
                    warn!(%peer, error = %e, "connection closed with error");
                }
            });
        }
    }
}

async fn reject(stream: &mut TcpStream, response: Response) -> std::io::Result<()> {
    stream.write_all(&response.keep_alive(false).into_bytes()).await?;
    stream.flush().await
}

/// Reads requests off one connection until the peer closes it or asks to.
async fn serve_connection<H, F>(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<H>,
) -> std::io::Result<()>
where
    H: Fn(Request) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUF_SIZE);

    loop {
        // Pipelined requests may already be buffered.
        let parsed = if buf.is_empty() {
            Err(RequestError::Incomplete)
        } else {
            Request::parse(&buf)
        };

        let (request, consumed) = match parsed {
            Ok(Some(pair)) => pair,
            Ok(None) | Err(RequestError::Incomplete) => {
                if buf.len() > MAX_REQUEST_SIZE {
                    warn!(%peer, "request too large, sending 413");
                    return reject(
                        &mut stream,
                        Response::error(StatusCode::PayloadTooLarge, "Request too large"),
                    )
                    .await;
                }
                if stream.read_buf(&mut buf).await? == 0 {
                    debug!(%peer, "connection closed by peer");
                    return Ok(());
                }
                continue;
            }
            Err(e) => {
                warn!(%peer, error = %e, "malformed request, sending 400");
                return reject(
                    &mut stream,
                    Response::error(StatusCode::BadRequest, format!("Bad Request: {e}")),
                )
                .await;
            }
        };

        let _ = buf.split_to(consumed);
        let keep_alive = request.is_keep_alive();
        debug!(%peer, method = %request.method(), path = request.path(), "dispatching");

        let response = handler(request).await.keep_alive(keep_alive);
        stream.write_all(&response.into_bytes()).await?;
        stream.flush().await?;

        if !keep_alive {
            return Ok(());
        }
    }
}
