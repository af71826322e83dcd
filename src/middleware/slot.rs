//! Configuration values for [`Recovery`](super::Recovery)'s handler slots.

use std::any::{Any, type_name};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::{IntoOutcome, Outcome};

use super::{BoxedCallable, BoxedMiddleware, CallableMiddleware, Middleware, Next};

/// What a recovery handler slot can be configured with.
///
/// Every variant is resolved once, at configuration time, into either an
/// empty slot or a [`BoxedMiddleware`]. `Dynamic` is for values whose shape
/// is only known at runtime, such as handlers looked up in a plugin
/// registry; it is the one variant that can be rejected.
#[derive(Default)]
pub enum HandlerSlot {
    #[default]
    Empty,
    Middleware(BoxedMiddleware),
    Callable(BoxedCallable),
    Dynamic {
        value: Box<dyn Any + Send + Sync>,
        type_name: &'static str,
    },
}

impl HandlerSlot {
    pub fn middleware(middleware: impl Middleware) -> Self {
        Self::Middleware(Arc::new(middleware))
    }

    /// An async `(Request, Next)` closure, adapted with
    /// [`CallableMiddleware`] when the slot is filled.
    pub fn callable<F, Fut, R>(f: F) -> Self
    where
        F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome + Send + 'static,
    {
        Self::Callable(Box::new(move |req: Request, next: Next| -> BoxFuture<'static, Outcome> {
            let fut = f(req, next);
            Box::pin(async move { fut.await.into_outcome() })
        }))
    }

    /// A value of any type. Accepted if it is a [`BoxedMiddleware`] or a
    /// [`BoxedCallable`]; anything else fails when the slot is filled.
    pub fn dynamic<T: Any + Send + Sync>(value: T) -> Self {
        Self::Dynamic { value: Box::new(value), type_name: type_name::<T>() }
    }

    /// Resolves the slot into what [`Recovery`](super::Recovery) stores.
    pub(crate) fn normalize(self) -> Result<Option<BoxedMiddleware>, Error> {
        match self {
            Self::Empty => Ok(None),
            Self::Middleware(middleware) => Ok(Some(middleware)),
            Self::Callable(f) => Ok(Some(Arc::new(CallableMiddleware::new(f)))),
            Self::Dynamic { value, type_name } => {
                let value = match value.downcast::<BoxedMiddleware>() {
                    Ok(middleware) => return Ok(Some(*middleware)),
                    Err(value) => value,
                };
                match value.downcast::<BoxedCallable>() {
                    Ok(f) => Ok(Some(Arc::new(CallableMiddleware::new(*f)))),
                    Err(_) => Err(Error::InvalidConfiguration {
                        expected: "Middleware",
                        actual: type_name,
                    }),
                }
            }
        }
    }
}

impl<M: Middleware> From<Option<M>> for HandlerSlot {
    fn from(middleware: Option<M>) -> Self {
        middleware.map_or(Self::Empty, Self::middleware)
    }
}

impl From<BoxedMiddleware> for HandlerSlot {
    fn from(middleware: BoxedMiddleware) -> Self {
        Self::Middleware(middleware)
    }
}

impl fmt::Debug for HandlerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Middleware(_) => f.write_str("Middleware(..)"),
            Self::Callable(_) => f.write_str("Callable(..)"),
            Self::Dynamic { type_name, .. } => write!(f, "Dynamic({type_name})"),
        }
    }
}
