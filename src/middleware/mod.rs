//! Middleware layer.
//!
//! A [`Middleware`] receives a request and the rest of the stack as a
//! [`Next`], and produces an [`Outcome`]. It may call `next.handle(req)`
//! once, several times, or not at all. The router runs its middleware in
//! registration order: the first layer added is the outermost.
//!
//! ```text
//! request → layer 0 → layer 1 → … → route handler
//!                                        ↓
//! outcome ← layer 0 ← layer 1 ← … ←──────┘
//! ```
//!
//! Built-in middleware:
//! - [`Recovery`] routes handler failures to a recoverable or a fatal
//!   recovery handler, by [`Category`](crate::Category).
//!
//! Plain async closures become middleware through [`from_fn`]:
//!
//! ```rust
//! use rebound::middleware::{self, Next};
//! use rebound::Request;
//!
//! let timing = middleware::from_fn(|req: Request, next: Next| async move {
//!     let start = std::time::Instant::now();
//!     let outcome = next.handle(req).await;
//!     tracing::debug!(elapsed = ?start.elapsed(), "request finished");
//!     outcome
//! });
//! ```

mod recovery;
mod slot;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, Handler};
use crate::request::Request;
use crate::response::{IntoOutcome, Outcome};

pub use recovery::{Classifier, Recovery};
pub use slot::HandlerSlot;

/// A unit of request processing that wraps everything downstream of it.
pub trait Middleware: Send + Sync + 'static {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome>;
}

/// A shared middleware. Layer an `Arc<Recovery>` on a router and keep a
/// clone to read [`Recovery::last_failure`] while serving.
impl<M: Middleware + ?Sized> Middleware for Arc<M> {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome> {
        (**self).process(req, next)
    }
}

/// A type-erased middleware shared across concurrent requests.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// A type-erased `(Request, Next)` callable, as stored by plugin registries
/// and handed to [`HandlerSlot::dynamic`].
pub type BoxedCallable = Box<dyn Fn(Request, Next) -> BoxFuture<'static, Outcome> + Send + Sync>;

// ── Next ──────────────────────────────────────────────────────────────────────

/// The downstream part of the stack: the remaining middleware followed by
/// the route handler.
///
/// Cloning is two `Arc` increments. A `Next` can be invoked more than once;
/// each call runs the remaining stack from the same position.
#[derive(Clone)]
pub struct Next {
    stack: Arc<[BoxedMiddleware]>,
    position: usize,
    endpoint: BoxedHandler,
}

impl Next {
    /// A stack consisting of `middleware`, outermost first, in front of
    /// `handler`.
    pub fn chain(middleware: impl Into<Arc<[BoxedMiddleware]>>, handler: impl Handler) -> Self {
        Self::new(middleware.into(), handler.into_boxed_handler())
    }

    /// A stack with no middleware in front of `handler`.
    pub fn endpoint(handler: impl Handler) -> Self {
        Self::new(Arc::from(Vec::new()), handler.into_boxed_handler())
    }

    pub(crate) fn new(stack: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { stack, position: 0, endpoint }
    }

    /// Runs the rest of the stack.
    pub fn handle(&self, req: Request) -> BoxFuture<'static, Outcome> {
        match self.stack.get(self.position) {
            Some(middleware) => {
                let middleware = Arc::clone(middleware);
                let rest = Self {
                    stack: Arc::clone(&self.stack),
                    position: self.position + 1,
                    endpoint: Arc::clone(&self.endpoint),
                };
                Box::pin(async move { middleware.process(req, rest).await })
            }
            None => self.endpoint.call(req),
        }
    }
}

// ── Callable adapter ──────────────────────────────────────────────────────────

/// Adapts an async `(Request, Next)` callable into a [`Middleware`].
///
/// `process` forwards both arguments verbatim and passes the callable's
/// outcome through unmodified.
pub struct CallableMiddleware<F> {
    f: F,
}

impl<F> CallableMiddleware<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut, R> Middleware for CallableMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome> {
        let fut = (self.f)(req, next);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

/// Wraps an async closure as middleware.
pub fn from_fn<F, Fut, R>(f: F) -> CallableMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    CallableMiddleware::new(f)
}
