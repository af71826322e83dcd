//! Outgoing HTTP response type, and the [`IntoResponse`] / [`IntoOutcome`]
//! conversion traits.
//!
//! Build a [`Response`] in your handler and return it. If the handler cannot,
//! return a [`Failure`] instead and let a recovery middleware decide what the
//! client sees.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;

use crate::failure::Failure;

/// Body types accepted by [`ResponseBuilder::bytes`].
pub enum ContentType {
    EventStream,
    Html,
    Json,
    OctetStream,
    Text,
    Xml,
}

impl ContentType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::EventStream => "text/event-stream",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

/// A response ready to be written by the server.
///
/// `json`, `text`, and `status` cover the common cases; anything with a
/// non-200 status plus a body, or extra headers, goes through
/// [`Response::builder`].
///
/// ```rust
/// use rebound::{ContentType, Response, StatusCode};
///
/// let ok = Response::text("pong");
/// assert_eq!(ok.status_code(), StatusCode::OK);
///
/// let rejected = Response::builder()
///     .status(StatusCode::UNPROCESSABLE_ENTITY)
///     .header("x-failure-category", "recoverable")
///     .bytes(ContentType::Json, br#"{"error":"bad input"}"#.to_vec());
/// assert_eq!(rejected.header("content-type"), Some("application/json"));
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Response {
    pub(crate) body: Vec<u8>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: StatusCode,
}

impl Response {
    /// `200 OK` with an `application/json` body. The bytes are sent as-is.
    pub fn json(body: Vec<u8>) -> Self {
        Self::bytes_raw("application/json", body)
    }

    /// `200 OK` with a UTF-8 plain-text body.
    pub fn text(body: impl Into<String>) -> Self {
        Self::bytes_raw("text/plain; charset=utf-8", body.into().into_bytes())
    }

    /// An empty response with the given status.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Vec::new(), headers: Vec::new(), status: code }
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: StatusCode::OK }
    }

    fn bytes_raw(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            body,
            headers: vec![("content-type".to_owned(), content_type.to_owned())],
            status: StatusCode::OK,
        }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Converts into the hyper response the server writes to the wire.
    ///
    /// Headers whose name or value is not valid HTTP are dropped.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status;
        let headers = res.headers_mut();
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) =
                (HeaderName::try_from(name), HeaderValue::try_from(value))
            {
                headers.append(name, value);
            }
        }
        res
    }
}

/// Builder returned by [`Response::builder`]. Starts at `200 OK`; finished
/// by one of the body methods, which also set `content-type`.
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn json(self, body: Vec<u8>) -> Response {
        self.finish("application/json", body)
    }

    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish("text/plain; charset=utf-8", body.into().into_bytes())
    }

    pub fn bytes(self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.finish(content_type.as_str(), body)
    }

    /// Finishes without a body or `content-type`, for redirects and `204`.
    pub fn no_body(self) -> Response {
        Response { body: Vec::new(), headers: self.headers, status: self.status }
    }

    fn finish(self, content_type: &str, body: Vec<u8>) -> Response {
        let mut headers = vec![("content-type".to_owned(), content_type.to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}

/// Types a handler can answer with.
///
/// Implement it for your own types and return them inside a `Result` (see
/// [`IntoOutcome`]):
///
/// ```rust
/// use rebound::{Failure, IntoResponse, Request, Response, StatusCode};
///
/// struct Created(String);
///
/// impl IntoResponse for Created {
///     fn into_response(self) -> Response {
///         Response::builder()
///             .status(StatusCode::CREATED)
///             .header("location", &self.0)
///             .no_body()
///     }
/// }
///
/// async fn create_order(_req: Request) -> Result<Created, Failure> {
///     Ok(Created("/orders/7".to_owned()))
/// }
/// ```
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// An empty response with that status.
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

/// What a handler or middleware produces: a response, or a failure for some
/// middleware further up the stack to deal with.
pub type Outcome = Result<Response, Failure>;

/// Conversion into an [`Outcome`].
///
/// Handlers may return anything that implements [`IntoResponse`] directly,
/// or a `Result` whose error converts into a [`Failure`]:
///
/// ```rust
/// use rebound::{Failure, Request, Response};
///
/// async fn get_user(req: Request) -> Result<Response, Failure> {
///     let id = req.param("id").ok_or_else(|| Failure::recoverable("missing id"))?;
///     Ok(Response::text(format!("user {id}")))
/// }
/// ```
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for Response {
    fn into_outcome(self) -> Outcome { Ok(self) }
}

impl IntoOutcome for &'static str {
    fn into_outcome(self) -> Outcome { Ok(self.into_response()) }
}

impl IntoOutcome for String {
    fn into_outcome(self) -> Outcome { Ok(self.into_response()) }
}

impl IntoOutcome for StatusCode {
    fn into_outcome(self) -> Outcome { Ok(self.into_response()) }
}

/// The error is passed through as-is when it already is a [`Failure`].
impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoResponse,
    E: Into<Failure>,
{
    fn into_outcome(self) -> Outcome {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}
