//! Minimal rebound example — JSON endpoints with category-routed recovery.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:3000/users/42
//!   curl -i http://localhost:3000/users/abc          # recoverable → 400
//!   curl -i http://localhost:3000/users/0            # fatal → 500 with body
//!   curl -i -X POST http://localhost:3000/users      # recoverable → 400
//!   curl -i http://localhost:3000/panic              # panic → fatal → 500

use rebound::middleware::{HandlerSlot, Next, Recovery};
use rebound::{Failure, Request, Response, Router, Server, StatusCode};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let recovery = Recovery::new(
        HandlerSlot::callable(client_error),
        HandlerSlot::callable(server_error),
    )
    .expect("recovery handlers")
    .catch_panics(true);

    let app = Router::new()
        .layer(recovery)
        .get("/users/{id}", get_user)
        .post("/users",     create_user)
        .get("/panic",      explode);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// Recoverable failures: tell the client what they got wrong.
async fn client_error(req: Request, _next: Next) -> Response {
    let message = req.error().map(Failure::message).unwrap_or_default();
    Response::builder()
        .status(StatusCode::BAD_REQUEST)
        .json(format!(r#"{{"error":{message:?}}}"#).into_bytes())
}

// Fatal failures: keep the details in the logs.
async fn server_error(req: Request, _next: Next) -> Response {
    if let Some(failure) = req.error() {
        tracing::error!(path = req.path(), "{failure}");
    }
    Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .json(br#"{"error":"internal error"}"#.to_vec())
}

// GET /users/{id}
async fn get_user(req: Request) -> Result<Response, Failure> {
    let id: u64 = req.param("id")
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| Failure::recoverable("id must be numeric"))?;
    if id == 0 {
        return Err(Failure::fatal("user 0 is reserved and must never be looked up"));
    }
    Ok(Response::json(format!(r#"{{"id":{id},"name":"alice"}}"#).into_bytes()))
}

// POST /users
async fn create_user(req: Request) -> Result<Response, Failure> {
    if req.body().is_empty() {
        return Err(Failure::recoverable("request body is required"));
    }
    Ok(Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(br#"{"id":99,"name":"new_user"}"#.to_vec()))
}

// GET /panic
async fn explode(_req: Request) -> Response {
    let empty: Vec<u8> = Vec::new();
    Response::text(format!("{}", empty[0]))
}
