//! Error types.
//!
//! Three families, never mixed:
//!
//! - [`HttpError`]: a request-level fault with an HTTP status. Handlers
//!   return it; the terminal [`ErrorHandler`](crate::middleware::ErrorHandler)
//!   turns it into a `{status, error, message, detail?}` body.
//! - [`ConfigError`]: a setup-time fault (missing dependency, unknown
//!   controller method, bad environment). Never routed through a request.
//! - [`Error`]: infrastructure failures from the server itself.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::response::Response;
use crate::status::reason_phrase;

// ── Error name derivation ─────────────────────────────────────────────────────

/// Derives the display name of an error from its status code.
///
/// `404` becomes `"NotFoundError"`, `500` becomes `"InternalServerError"`.
/// Codes outside `400..=511`, and codes inside the range with no registered
/// reason phrase, yield the generic `"HttpError"`.
pub fn derive_error_name(status: u16) -> String {
    const GENERIC: &str = "HttpError";

    if !(400..=511).contains(&status) {
        return GENERIC.to_owned();
    }
    let Some(phrase) = reason_phrase(status) else {
        return GENERIC.to_owned();
    };

    let lowered = phrase.to_lowercase().replace('_', " ");
    let mut name: String = lowered.split_whitespace().map(title_case).collect();
    if !name.ends_with("Error") {
        name.push_str("Error");
    }
    name
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Message ───────────────────────────────────────────────────────────────────

/// An error message: one string, or an ordered list of strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Message {
    Text(String),
    List(Vec<String>),
}

impl From<&str> for Message {
    fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Message {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<Vec<String>> for Message {
    fn from(v: Vec<String>) -> Self { Self::List(v) }
}

impl From<Vec<&str>> for Message {
    fn from(v: Vec<&str>) -> Self {
        Self::List(v.into_iter().map(str::to_owned).collect())
    }
}

// ── ErrorKind ─────────────────────────────────────────────────────────────────

/// The member of the taxonomy an [`HttpError`] belongs to.
///
/// Every named kind pins exactly one status; [`ErrorKind::Http`] carries
/// whatever status it was built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    InternalServerError,
    Http,
}

impl ErrorKind {
    /// The fixed status of a named kind. `None` for [`ErrorKind::Http`].
    pub fn status(self) -> Option<u16> {
        match self {
            Self::BadRequest          => Some(400),
            Self::Unauthorized        => Some(401),
            Self::Forbidden           => Some(403),
            Self::NotFound            => Some(404),
            Self::Conflict            => Some(409),
            Self::InternalServerError => Some(500),
            Self::Http                => None,
        }
    }
}

// ── HttpError ─────────────────────────────────────────────────────────────────

/// A request-level HTTP fault.
///
/// ```rust
/// use courier::HttpError;
/// use serde_json::json;
///
/// let err = HttpError::not_found("user 42 does not exist")
///     .with_detail(json!({ "id": 42 }));
///
/// assert_eq!(err.status(), 404);
/// assert_eq!(err.name(), "NotFoundError");
/// assert_eq!(err.to_json()["error"], "NotFoundError");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct HttpError {
    kind: ErrorKind,
    status: u16,
    message: Message,
    detail: Option<Value>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: u16,
    error: String,
    message: &'a Message,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a Value>,
}

impl HttpError {
    /// A generic error with the default status, `500`.
    pub fn from_message(message: impl Into<Message>) -> Self {
        Self::new(message, 500)
    }

    /// A generic error with an arbitrary status.
    pub fn new(message: impl Into<Message>, status: u16) -> Self {
        Self { kind: ErrorKind::Http, status, message: message.into(), detail: None }
    }

    fn of(kind: ErrorKind, message: impl Into<Message>) -> Self {
        let status = kind.status().unwrap_or(500);
        Self { kind, status, message: message.into(), detail: None }
    }

    /// `400`, `BadRequestError`.
    pub fn bad_request(message: impl Into<Message>) -> Self {
        Self::of(ErrorKind::BadRequest, message)
    }

    /// `401`, `UnauthorizedError`.
    pub fn unauthorized(message: impl Into<Message>) -> Self {
        Self::of(ErrorKind::Unauthorized, message)
    }

    /// `403`, `ForbiddenError`.
    pub fn forbidden(message: impl Into<Message>) -> Self {
        Self::of(ErrorKind::Forbidden, message)
    }

    /// `404`, `NotFoundError`.
    pub fn not_found(message: impl Into<Message>) -> Self {
        Self::of(ErrorKind::NotFound, message)
    }

    /// `409`, `ConflictError`.
    pub fn conflict(message: impl Into<Message>) -> Self {
        Self::of(ErrorKind::Conflict, message)
    }

    /// `500`, `InternalServerError`.
    pub fn internal(message: impl Into<Message>) -> Self {
        Self::of(ErrorKind::InternalServerError, message)
    }

    /// Attaches structured detail, emitted as the `detail` key.
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn kind(&self) -> ErrorKind { self.kind }
    pub fn status(&self) -> u16 { self.status }
    pub fn message(&self) -> &Message { &self.message }
    pub fn detail(&self) -> Option<&Value> { self.detail.as_ref() }

    /// Derived from the status; always ends in `"Error"`.
    pub fn name(&self) -> String {
        derive_error_name(self.status)
    }

    /// `{status, error, message, detail?}` in that key order.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.body()).unwrap_or(Value::Null)
    }

    fn body(&self) -> ErrorBody<'_> {
        ErrorBody {
            status: self.status,
            error: self.name(),
            message: &self.message,
            detail: self.detail.as_ref(),
        }
    }

    /// Renders the error as a JSON response carrying its own status.
    pub fn to_response(&self) -> Response {
        let body = serde_json::to_vec(&self.body()).unwrap_or_default();
        Response::builder().status(self.status).json(body)
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Message::Text(text) => f.write_str(text),
            Message::List(_) => f.write_str(&self.name()),
        }
    }
}

impl std::error::Error for HttpError {}

// ── ConfigError ───────────────────────────────────────────────────────────────

/// Unrecoverable setup-time faults.
///
/// These surface while the router is being assembled, before any request
/// is served. Pass them to [`fatal`](crate::config::fatal) or bubble them out of `main`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("dependency `{type_name}` is not registered in the container")]
    MissingDependency { type_name: &'static str },

    #[error("controller `{controller}` has no method `{method}`")]
    MissingMethod { method: String, controller: &'static str },

    #[error("invalid socket address `{value}`: {source}")]
    InvalidAddress {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("invalid value `{value}` for {key}")]
    InvalidEnv { key: &'static str, value: String },
}

// ── Error ─────────────────────────────────────────────────────────────────────

/// The error type returned by the server's fallible operations.
///
/// Application-level errors are [`HttpError`] values, not `Error`s. This type
/// surfaces infrastructure failures: binding to a port or accepting a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_names_follow_reason_phrases() {
        assert_eq!(derive_error_name(400), "BadRequestError");
        assert_eq!(derive_error_name(404), "NotFoundError");
        assert_eq!(derive_error_name(409), "ConflictError");
        assert_eq!(derive_error_name(422), "UnprocessableContentError");
        assert_eq!(derive_error_name(500), "InternalServerError");
        assert_eq!(derive_error_name(505), "HttpVersionNotSupportedError");
    }

    #[test]
    fn every_registered_error_status_yields_a_clean_name() {
        for status in 400..=511 {
            if reason_phrase(status).is_none() {
                continue;
            }
            let name = derive_error_name(status);
            assert!(name.ends_with("Error"), "{status} -> {name}");
            assert!(!name.contains(' ') && !name.contains('_'), "{status} -> {name}");
        }
    }

    #[test]
    fn out_of_range_statuses_are_generic() {
        for status in [0, 200, 302, 399, 512, 600] {
            assert_eq!(derive_error_name(status), "HttpError");
        }
        assert_eq!(derive_error_name(419), "HttpError");
    }

    #[test]
    fn named_kinds_pin_their_status() {
        assert_eq!(HttpError::bad_request("x").status(), 400);
        assert_eq!(HttpError::unauthorized("x").status(), 401);
        assert_eq!(HttpError::forbidden("x").status(), 403);
        assert_eq!(HttpError::not_found("x").status(), 404);
        assert_eq!(HttpError::conflict("x").status(), 409);
        assert_eq!(HttpError::internal("x").status(), 500);
        assert_eq!(HttpError::new("x", 418).kind(), ErrorKind::Http);
    }

    #[test]
    fn generic_errors_default_to_500() {
        let err = HttpError::from_message("upstream timed out");
        assert_eq!(err.status(), 500);
        assert_eq!(err.kind(), ErrorKind::Http);
        assert_eq!(err.name(), "InternalServerError");
    }

    #[test]
    fn list_messages_display_as_the_name() {
        let err = HttpError::bad_request(vec!["name is required", "age must be positive"]);
        assert_eq!(err.to_string(), "BadRequestError");
        assert_eq!(
            err.to_json()["message"],
            json!(["name is required", "age must be positive"])
        );

        assert_eq!(HttpError::conflict("taken").to_string(), "taken");
    }

    #[test]
    fn detail_key_only_present_when_set() {
        let bare = HttpError::forbidden("nope").to_json();
        assert_eq!(bare, json!({ "status": 403, "error": "ForbiddenError", "message": "nope" }));
        assert!(bare.get("detail").is_none());

        let detailed = HttpError::forbidden("nope").with_detail(json!({ "role": "guest" }));
        assert_eq!(detailed.to_json()["detail"], json!({ "role": "guest" }));
    }

    #[test]
    fn json_keys_keep_wire_order() {
        let err = HttpError::new("boom", 503).with_detail(json!({}));
        let keys: Vec<_> = err.to_json().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["status", "error", "message", "detail"]);
    }

    #[test]
    fn responses_carry_the_error_status() {
        let response = HttpError::unauthorized("token expired").to_response();
        assert_eq!(response.status_code(), 401);
        assert_eq!(response.header("content-type"), Some("application/json"));
    }

    #[test]
    fn config_errors_name_what_is_missing() {
        let err = ConfigError::MissingMethod { method: "list".into(), controller: "UserController" };
        assert_eq!(err.to_string(), "controller `UserController` has no method `list`");
    }
}
