//! Radix-tree request router with a middleware stack.
//!
//! One tree per HTTP method. O(path-length) lookup. Every matched request
//! runs through the router's middleware, in registration order, before it
//! reaches the handler.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{BoxedMiddleware, Middleware, Next};

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Each registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    middleware: Vec<BoxedMiddleware>,
}

/// The result of a lookup.
pub(crate) enum Route {
    Found { next: Next, params: HashMap<String, String> },
    MethodNotAllowed,
    NotFound,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), middleware: Vec::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use `{name}` syntax — `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use rebound::{Method, Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// # async fn delete_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::DELETE, "/users/{id}", delete_user)
    ///     .on(Method::GET,    "/users/{id}", get_user)
    ///     .on(Method::POST,   "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Appends a middleware to the stack. The first layer added is the
    /// outermost: it sees the request first and the outcome last.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Freezes the middleware stack for serving.
    pub(crate) fn into_service(self) -> Service {
        Service { routes: self.routes, middleware: self.middleware.into() }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// A [`Router`] whose middleware stack is shared by every request.
pub(crate) struct Service {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    middleware: Arc<[BoxedMiddleware]>,
}

impl Service {
    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Route {
        let matched = self.routes.get(method).and_then(|tree| tree.at(path).ok());
        let Some(matched) = matched else {
            let other_method = self.routes.iter()
                .any(|(m, tree)| m != method && tree.at(path).is_ok());
            return if other_method { Route::MethodNotAllowed } else { Route::NotFound };
        };

        let next = Next::new(Arc::clone(&self.middleware), Arc::clone(matched.value));
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Route::Found { next, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, Response};

    async fn ok(_req: Request) -> Response {
        Response::text("ok")
    }

    #[test]
    fn lookup_extracts_params() {
        let service = Router::new().get("/users/{id}", ok).into_service();

        match service.lookup(&Method::GET, "/users/42") {
            Route::Found { params, .. } => assert_eq!(params["id"], "42"),
            _ => panic!("expected a match"),
        }
    }

    #[test]
    fn lookup_distinguishes_wrong_method_from_missing_path() {
        let service = Router::new().post("/users", ok).into_service();

        assert!(matches!(service.lookup(&Method::GET, "/users"), Route::MethodNotAllowed));
        assert!(matches!(service.lookup(&Method::GET, "/nope"), Route::NotFound));
    }

    #[tokio::test]
    async fn shared_layers_stay_readable_after_install() {
        use crate::middleware::{HandlerSlot, Recovery};
        use crate::{Failure, StatusCode};

        async fn broken(_req: Request) -> Result<Response, Failure> {
            Err(Failure::recoverable("bad input"))
        }

        let recovery = Arc::new(
            Recovery::new(
                HandlerSlot::callable(|_req: Request, _next: Next| async { StatusCode::BAD_REQUEST }),
                HandlerSlot::Empty,
            )
            .unwrap(),
        );
        let service = Router::new()
            .layer(Arc::clone(&recovery))
            .get("/broken", broken)
            .into_service();

        let Route::Found { next, .. } = service.lookup(&Method::GET, "/broken") else {
            panic!("expected a match");
        };
        let res = next.handle(Request::from(
            http::Request::builder().uri("/broken").body(bytes::Bytes::new()).unwrap(),
        ))
        .await
        .unwrap();

        assert_eq!(res.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(recovery.last_failure().unwrap().message(), "bad input");
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic() {
        let _ = Router::new().get("/users/{id}", ok).get("/users/{id}", ok);
    }
}
