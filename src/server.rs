//! HTTP server.
//!
//! Every connection runs on its own task. Each request is matched against
//! the router, buffered, and pushed through the middleware stack. Whatever
//! failure comes back out of the stack is the server's to answer, with a
//! `500`.
//!
//! # Stopping
//!
//! Once the shutdown signal fires the accept loop ends and no further
//! connections are accepted. Connections already open keep running until
//! they finish; [`Server::serve`] returns after the last one.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use http::StatusCode;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::middleware::Next;
use crate::request::Request;
use crate::response::Response;
use crate::router::{Route, Router, Service};

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use rebound::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr }
    }

    /// Starts accepting connections and dispatching them through `router`
    /// and its middleware stack.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops accepting connections when
    /// `signal` resolves instead of on SIGTERM / Ctrl-C.
    pub async fn serve_with_shutdown<F>(self, router: Router, signal: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.addr).await?;

        // Routes and middleware are read-only from here on.
        let service = Arc::new(router.into_service());

        info!(addr = %self.addr, "rebound listening");

        // Open connections, awaited on shutdown.
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown wins over a pending accept.
                biased;

                () = &mut signal => {
                    info!(open = tasks.len(), "stopping, waiting for open connections");
                    break;
                }

                res = listener.accept() => {
                    let Ok((stream, remote_addr)) =
                        res.inspect_err(|e| error!(error = %e, "accept failed"))
                    else {
                        continue;
                    };

                    let service = Arc::clone(&service);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let service = Arc::clone(&service);
                            async move { dispatch(&service, req, remote_addr).await }
                        });

                        // HTTP/1.1 or HTTP/2, whichever the client speaks.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, error = %e, "connection closed with error");
                        }
                    });
                }

                // Reap finished connections.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("rebound stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Routes one request and answers it. Unknown routes, unreadable bodies,
/// and escaped failures are answered too, so hyper never sees an error.
async fn dispatch(
    service: &Service,
    req: hyper::Request<hyper::body::Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<http_body_util::Full<bytes::Bytes>>, std::convert::Infallible> {
    let (next, params) = match service.lookup(req.method(), req.uri().path()) {
        Route::Found { next, params } => (next, params),
        Route::MethodNotAllowed => {
            return Ok(Response::status(StatusCode::METHOD_NOT_ALLOWED).into_inner());
        }
        Route::NotFound => return Ok(Response::status(StatusCode::NOT_FOUND).into_inner()),
    };

    let request = match Request::from_hyper(req, params).await {
        Ok(request) => request,
        Err(e) => {
            debug!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    Ok(respond(&next, request).await.into_inner())
}

/// Runs the middleware stack and handler. A failure that escaped every
/// middleware is logged and answered with `500 Internal Server Error`.
async fn respond(next: &Next, request: Request) -> Response {
    let method = request.method().to_owned();
    let path = request.path().to_owned();

    match next.handle(request).await {
        Ok(response) => response,
        Err(failure) => {
            error!(
                %method,
                %path,
                category = %failure.category(),
                "unhandled failure: {}",
                failure.message()
            );
            Response::status(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
                return;
            }
            Err(e) => error!(error = %e, "cannot listen for SIGTERM"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal to wait for, only the process being killed stops us.
        error!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::{HandlerSlot, Recovery};
    use crate::{Failure, Router};

    fn request(uri: &str) -> Request {
        Request::from(http::Request::builder().uri(uri).body(bytes::Bytes::new()).unwrap())
    }

    async fn broken(_req: Request) -> Result<Response, Failure> {
        Err(Failure::recoverable("bad input"))
    }

    fn next_for(router: Router, path: &str) -> Next {
        match router.into_service().lookup(&http::Method::GET, path) {
            Route::Found { next, .. } => next,
            _ => panic!("expected a match"),
        }
    }

    #[tokio::test]
    async fn escaped_failures_become_500() {
        let next = next_for(Router::new().get("/broken", broken), "/broken");

        let res = respond(&next, request("/broken")).await;

        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(res.body().is_empty());
    }

    #[tokio::test]
    async fn recovery_layer_answers_before_the_server_does() {
        let recovery = Recovery::new(
            HandlerSlot::callable(|_req: Request, _next: Next| async {
                Response::status(StatusCode::BAD_REQUEST)
            }),
            HandlerSlot::Empty,
        )
        .unwrap();
        let next = next_for(Router::new().layer(recovery).get("/broken", broken), "/broken");

        let res = respond(&next, request("/broken")).await;

        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
    }
}
