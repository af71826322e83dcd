//! Failure routing middleware.
//!
//! [`Recovery`] runs everything downstream of it and, when that fails, hands
//! the failure to one of two recovery handlers picked by category:
//!
//! | Category | Slot | Slot empty |
//! |---|---|---|
//! | [`Recoverable`](Category::Recoverable) | recoverable handler | failure re-raised |
//! | [`Fatal`](Category::Fatal) | fatal handler | failure re-raised |
//! | [`Unclassified`](Category::Unclassified) | none | failure re-raised |
//!
//! A recovery handler is itself a middleware. It receives the original
//! request with one extra attribute, `error`, bound to the failure
//! (read it with [`Request::error`]), plus the same downstream [`Next`].
//! `Recovery` never builds a response of its own: a failure nobody was
//! configured to handle keeps travelling up the stack unchanged.
//!
//! ```rust
//! use rebound::middleware::{HandlerSlot, Next, Recovery};
//! use rebound::{Request, Response, StatusCode};
//!
//! let recovery = Recovery::new(
//!     HandlerSlot::callable(|req: Request, _next: Next| async move {
//!         let message = req.error().map(|e| e.message()).unwrap_or_default();
//!         Response::builder()
//!             .status(StatusCode::UNPROCESSABLE_ENTITY)
//!             .text(message)
//!     }),
//!     HandlerSlot::Empty,
//! )
//! .expect("valid handlers");
//! ```
//!
//! # Sharing
//!
//! The routing itself holds no per-request state, so one `Recovery` can serve
//! every connection. [`Recovery::last_failure`] is the exception: it is a
//! single slot overwritten by whichever request failed most recently, with
//! no ordering between concurrent requests. Use [`Request::error`] inside
//! the recovery handler when you need the failure of *this* request.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Error;
use crate::failure::{Category, Failure};
use crate::handler::BoxFuture;
use crate::request::{ERROR_ATTRIBUTE, Request};
use crate::response::Outcome;

use super::{BoxedMiddleware, HandlerSlot, Middleware, Next};

/// Maps a failure to the category `Recovery` routes it by.
pub type Classifier = Arc<dyn Fn(&Failure) -> Category + Send + Sync>;

/// Routes downstream failures to a recoverable or a fatal recovery handler.
pub struct Recovery {
    recoverable: Option<BoxedMiddleware>,
    fatal: Option<BoxedMiddleware>,
    classify: Classifier,
    catch_panics: bool,
    last_failure: Mutex<Option<Failure>>,
}

impl Recovery {
    /// Builds the middleware, normalizing both slots.
    ///
    /// Fails with [`Error::InvalidConfiguration`] if either slot holds a
    /// value that is not a middleware.
    pub fn new(recoverable: HandlerSlot, fatal: HandlerSlot) -> Result<Self, Error> {
        Ok(Self {
            recoverable: recoverable.normalize()?,
            fatal: fatal.normalize()?,
            ..Self::default()
        })
    }

    /// Replaces the handler for [`Category::Recoverable`] failures.
    ///
    /// On error the previous handler is kept.
    pub fn set_recoverable_handler(&mut self, slot: HandlerSlot) -> Result<(), Error> {
        self.recoverable = slot.normalize()?;
        Ok(())
    }

    /// Replaces the handler for [`Category::Fatal`] failures.
    ///
    /// On error the previous handler is kept.
    pub fn set_fatal_handler(&mut self, slot: HandlerSlot) -> Result<(), Error> {
        self.fatal = slot.normalize()?;
        Ok(())
    }

    /// Replaces the default classification, which trusts the category the
    /// failure was raised with.
    pub fn with_classifier<F>(mut self, classify: F) -> Self
    where
        F: Fn(&Failure) -> Category + Send + Sync + 'static,
    {
        self.classify = Arc::new(classify);
        self
    }

    /// When enabled, a panic while running the downstream stack is caught
    /// and routed as a [`Category::Fatal`] failure. Panics raised by a
    /// recovery handler still unwind.
    pub fn catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }

    /// The failure most recently handed to a recovery handler.
    ///
    /// Failures that were re-raised are not recorded. Under concurrent
    /// requests this may belong to a different request than the caller's.
    pub fn last_failure(&self) -> Option<Failure> {
        self.last_failure.lock().clone()
    }

    fn slot_for(&self, category: Category) -> Option<&BoxedMiddleware> {
        match category {
            Category::Recoverable  => self.recoverable.as_ref(),
            Category::Fatal        => self.fatal.as_ref(),
            Category::Unclassified => None,
        }
    }

    async fn run_downstream(&self, req: Request, next: &Next) -> Outcome {
        if !self.catch_panics {
            return next.handle(req).await;
        }
        match AssertUnwindSafe(async { next.handle(req).await }).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Err(Failure::from_panic(payload)),
        }
    }

    async fn dispatch(&self, req: Request, next: Next) -> Outcome {
        let failure = match self.run_downstream(req.clone(), &next).await {
            Ok(response) => return Ok(response),
            Err(failure) => failure,
        };

        let category = (self.classify)(&failure);
        let Some(handler) = self.slot_for(category) else {
            debug!(%category, error = %failure, "no recovery handler configured, re-raising");
            return Err(failure);
        };

        debug!(%category, error = %failure, "routing failure to recovery handler");
        *self.last_failure.lock() = Some(failure.clone());
        handler.process(req.with_attribute(ERROR_ATTRIBUTE, failure), next).await
    }
}

impl Default for Recovery {
    /// A `Recovery` with both slots empty: every failure is re-raised.
    fn default() -> Self {
        Self {
            recoverable: None,
            fatal: None,
            classify: Arc::new(Failure::category),
            catch_panics: false,
            last_failure: Mutex::new(None),
        }
    }
}

impl Middleware for Recovery {
    fn process(&self, req: Request, next: Next) -> BoxFuture<'_, Outcome> {
        Box::pin(self.dispatch(req, next))
    }
}
