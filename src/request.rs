//! Incoming HTTP request type.
//!
//! A [`Request`] is an immutable value. Cloning shares the head, body, and
//! attribute map behind `Arc`s, so middleware can hold on to the original
//! while handing a copy downstream. [`Request::with_attribute`] returns a new
//! request and leaves the one it was called on untouched.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::HeaderMap;
use http::request::Parts;
use http_body_util::BodyExt;

use crate::failure::Failure;

/// Name of the attribute [`Recovery`](crate::middleware::Recovery) binds the
/// intercepted [`Failure`] to.
pub const ERROR_ATTRIBUTE: &str = "error";

type Attributes = HashMap<String, Arc<dyn Any + Send + Sync>>;

/// An incoming HTTP request.
#[derive(Clone)]
pub struct Request {
    head: Arc<Parts>,
    body: Bytes,
    params: Arc<HashMap<String, String>>,
    attributes: Arc<Attributes>,
}

impl Request {
    pub(crate) fn new(head: Parts, body: Bytes, params: HashMap<String, String>) -> Self {
        Self {
            head: Arc::new(head),
            body,
            params: Arc::new(params),
            attributes: Arc::default(),
        }
    }

    /// Buffers the body of a hyper request.
    pub(crate) async fn from_hyper(
        req: hyper::Request<hyper::body::Incoming>,
        params: HashMap<String, String>,
    ) -> Result<Self, hyper::Error> {
        let (head, body) = req.into_parts();
        let body = body.collect().await?.to_bytes();
        Ok(Self::new(head, body, params))
    }

    pub fn method(&self) -> &str { self.head.method.as_str() }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Header lookup. Names are case-insensitive; values that are not
    /// visible ASCII are treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name)?.to_str().ok()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Returns a copy of this request with one more named attribute.
    ///
    /// An existing attribute of the same name is shadowed in the copy only.
    pub fn with_attribute<T>(&self, name: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        let mut next = self.clone();
        Arc::make_mut(&mut next.attributes).insert(name.into(), Arc::new(value));
        next
    }

    /// Returns the attribute `name` if it is present and of type `T`.
    pub fn attribute<T: Any>(&self, name: &str) -> Option<&T> {
        self.attributes.get(name)?.downcast_ref::<T>()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// The failure a recovery handler is being asked to handle, if any.
    pub fn error(&self) -> Option<&Failure> {
        self.attribute::<Failure>(ERROR_ATTRIBUTE)
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (head, body) = req.into_parts();
        Self::new(head, body, HashMap::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request {
        Request::from(
            http::Request::builder()
                .method("POST")
                .uri(uri)
                .header("X-Request-Id", "abc")
                .body(Bytes::from_static(b"{}"))
                .unwrap(),
        )
    }

    #[test]
    fn exposes_head_and_body() {
        let req = request("/users?active=1");
        assert_eq!(req.method(), "POST");
        assert_eq!(req.path(), "/users");
        assert_eq!(req.header("x-request-id"), Some("abc"));
        assert_eq!(req.header("missing"), None);
        assert_eq!(req.body(), b"{}");
        assert_eq!(req.param("id"), None);
    }

    #[test]
    fn with_attribute_leaves_the_original_untouched() {
        let original = request("/");
        let augmented = original.with_attribute("tenant", 7_u32);

        assert!(!original.has_attribute("tenant"));
        assert_eq!(augmented.attribute::<u32>("tenant"), Some(&7));
        assert_eq!(augmented.path(), original.path());
    }

    #[test]
    fn attribute_requires_matching_type() {
        let req = request("/").with_attribute("tenant", 7_u32);
        assert_eq!(req.attribute::<String>("tenant"), None);
    }

    #[test]
    fn error_reads_the_bound_failure() {
        let failure = Failure::recoverable("bad input");
        let req = request("/").with_attribute(ERROR_ATTRIBUTE, failure.clone());

        let seen = req.error().expect("error attribute");
        assert!(seen.ptr_eq(&failure));
        assert!(request("/").error().is_none());
    }
}
