//! Failures raised by handlers and the categories they fall into.
//!
//! A handler that cannot produce a response returns `Err(Failure)`. Whoever
//! raises the failure decides its [`Category`]: a validation error or a
//! missing record is [`Category::Recoverable`], a broken invariant is
//! [`Category::Fatal`]. The [`Recovery`](crate::middleware::Recovery)
//! middleware routes on that tag.
//!
//! ```rust
//! use rebound::{Category, Failure};
//!
//! let failure = Failure::recoverable("bad input");
//! assert_eq!(failure.category(), Category::Recoverable);
//! assert_eq!(failure.message(), "bad input");
//! ```

use std::any::Any;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// A boxed, thread-safe error. Anything convertible into one (including
/// `&str` and `String`) can become a [`Failure`].
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The category a failure belongs to.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Category {
    /// An anticipated failure: bad input, missing resource, business rule.
    Recoverable,
    /// A defect-class fault: broken invariant, impossible state, panic.
    Fatal,
    /// Anything else. Never intercepted by [`Recovery`](crate::middleware::Recovery).
    Unclassified,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recoverable  => "recoverable",
            Self::Fatal        => "fatal",
            Self::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A categorised handler failure.
///
/// Cloning is one atomic increment; clones share identity, which
/// [`Failure::ptr_eq`] observes. The failure a recovery handler sees in
/// [`Request::error`](crate::Request::error) is the very one the downstream
/// handler raised.
#[derive(Clone)]
pub struct Failure {
    category: Category,
    source: Arc<dyn StdError + Send + Sync + 'static>,
}

impl Failure {
    pub fn new(category: Category, err: impl Into<BoxError>) -> Self {
        let err: BoxError = err.into();
        Self { category, source: Arc::from(err) }
    }

    pub fn recoverable(err: impl Into<BoxError>) -> Self {
        Self::new(Category::Recoverable, err)
    }

    pub fn fatal(err: impl Into<BoxError>) -> Self {
        Self::new(Category::Fatal, err)
    }

    pub fn unclassified(err: impl Into<BoxError>) -> Self {
        Self::new(Category::Unclassified, err)
    }

    /// Builds a fatal failure from the payload of a caught panic.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_owned()
        };
        Self::fatal(Panicked(message))
    }

    /// The category assigned when the failure was raised.
    pub fn category(&self) -> Category {
        self.category
    }

    /// The display text of the underlying error.
    pub fn message(&self) -> String {
        self.source.to_string()
    }

    pub fn get_ref(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.source
    }

    /// Attempts to view the underlying error as a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.source.downcast_ref::<E>()
    }

    /// `true` when both values are clones of the same raised failure.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.source).cast::<()>(),
            Arc::as_ptr(&other.source).cast::<()>(),
        )
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("category", &self.category)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failure: {}", self.category, self.source)
    }
}

impl StdError for Failure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.source)
    }
}

/// The error carried by a failure built from a caught panic.
#[derive(Debug, thiserror::Error)]
#[error("panicked: {0}")]
pub struct Panicked(pub String);
