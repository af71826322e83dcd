//! Unified error type.

/// The error type returned by rebound's fallible operations.
///
/// Application-level failures raised by handlers are [`Failure`](crate::Failure)
/// values, not `Error`s. This type surfaces infrastructure and wiring
/// problems: binding to a port, accepting a connection, or configuring a
/// middleware slot with something that is not a middleware.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// A handler slot was given a value that is neither empty, a
    /// [`Middleware`](crate::middleware::Middleware), nor a callable of shape
    /// `(Request, Next) -> outcome`.
    #[error("invalid middleware provided; must be an instance of {expected}, received {actual}")]
    InvalidConfiguration {
        expected: &'static str,
        actual: &'static str,
    },
}
