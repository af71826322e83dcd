//! # rebound
//!
//! A minimal HTTP framework for Rust services behind a reverse proxy, built
//! around one idea: handlers that fail should say *how* they failed, and a
//! single middleware decides who turns that into a response.
//!
//! ## The contract
//!
//! A handler returns a [`Response`] or a [`Failure`]. A failure carries a
//! [`Category`]:
//!
//! - **Recoverable** — bad input, missing record, business rule said no.
//! - **Fatal** — broken invariant, impossible state, caught panic.
//! - **Unclassified** — anything you would rather let through untouched.
//!
//! The [`Recovery`](middleware::Recovery) middleware routes recoverable and
//! fatal failures to handlers you configure. It never invents a response:
//! a failure with no handler keeps travelling up, and the server answers it
//! with a bare `500`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use rebound::middleware::{HandlerSlot, Next, Recovery};
//! use rebound::{Failure, Request, Response, Router, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let recovery = Recovery::new(
//!         HandlerSlot::callable(|req: Request, _next: Next| async move {
//!             let message = req.error().map(|e| e.message()).unwrap_or_default();
//!             Response::builder()
//!                 .status(StatusCode::BAD_REQUEST)
//!                 .text(message)
//!         }),
//!         HandlerSlot::Empty,
//!     )
//!     .unwrap();
//!
//!     let app = Router::new()
//!         .layer(recovery)
//!         .get("/users/{id}", get_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(req: Request) -> Result<Response, Failure> {
//!     let id: u64 = req.param("id")
//!         .and_then(|id| id.parse().ok())
//!         .ok_or_else(|| Failure::recoverable("id must be numeric"))?;
//!     Ok(Response::json(format!(r#"{{"id":{id}}}"#).into_bytes()))
//! }
//! ```

mod error;
mod failure;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use error::Error;
pub use failure::{BoxError, Category, Failure, Panicked};
pub use handler::{BoxFuture, Handler};
pub use http::{Method, StatusCode};
pub use request::{ERROR_ATTRIBUTE, Request};
pub use response::{ContentType, IntoOutcome, IntoResponse, Outcome, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
