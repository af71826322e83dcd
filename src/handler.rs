//! Route handlers.
//!
//! A route handler is any `Fn(Request) -> impl Future` whose output converts
//! into an [`Outcome`]: a [`Response`](crate::Response) on success, or a
//! [`Failure`](crate::Failure) that travels back up through the middleware
//! stack until a [`Recovery`](crate::middleware::Recovery) layer, or the
//! server, answers it.
//!
//! Registration erases the concrete type: the router stores every handler
//! as an `Arc<dyn ErasedHandler>`, and each call boxes the handler's future
//! after mapping its output with [`IntoOutcome`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::{IntoOutcome, Outcome};

/// A boxed future that may move between runtime worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe form of [`Handler`]. Public only because
/// `Handler::into_boxed_handler` names it.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome>;
}

/// A registered handler, shared by every request routed to it.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Anything the router accepts as a route handler.
///
/// Sealed. Satisfied by `async fn name(req: Request) -> impl IntoOutcome`
/// and by closures of the same shape.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<'static, Outcome> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_outcome() })
    }
}
