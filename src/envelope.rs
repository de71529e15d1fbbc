//! Uniform success envelope: `{status, message, result}`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::response::Response;
use crate::status::Status;

/// A success payload with its status and a human-readable message.
///
/// Returned from a handler, the adapter sends `status` as the response status
/// and [`to_json`](Envelope::to_json) as the body.
///
/// ```rust
/// use courier::Envelope;
/// use serde_json::json;
///
/// let env = Envelope::created(json!({ "id": 7 }));
/// assert_eq!(
///     env.to_json().unwrap(),
///     json!({ "status": 201, "message": "resource created successfully", "result": { "id": 7 } }),
/// );
/// ```
#[derive(Clone, Debug, Serialize)]
pub struct Envelope<T> {
    status: u16,
    message: String,
    result: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn create(result: T, status: impl Into<u16>, message: impl Into<String>) -> Self {
        Self { status: status.into(), message: message.into(), result }
    }

    /// `200` with the message `"success"`.
    pub fn ok(result: T) -> Self {
        Self::ok_with(result, "success")
    }

    pub fn ok_with(result: T, message: impl Into<String>) -> Self {
        Self::create(result, Status::Ok, message)
    }

    /// `201` with the message `"resource created successfully"`.
    pub fn created(result: T) -> Self {
        Self::created_with(result, "resource created successfully")
    }

    pub fn created_with(result: T, message: impl Into<String>) -> Self {
        Self::create(result, Status::Created, message)
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn message(&self) -> &str { &self.message }
    pub fn result(&self) -> &T { &self.result }

    /// `{status, message, result}` in that key order.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub(crate) fn try_into_response(self) -> Result<Response, serde_json::Error> {
        let body = serde_json::to_vec(&self)?;
        Ok(Response::builder().status(self.status).json(body))
    }
}

/// The `result` of a paginated envelope: the meta fields, then `data`.
#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    #[serde(flatten)]
    meta: Map<String, Value>,
    data: T,
}

impl<T: Serialize> Envelope<Page<T>> {
    /// `200` with `meta` merged alongside a `data` field.
    ///
    /// A `data` key inside `meta` is dropped in favour of `data`.
    pub fn paginated(data: T, mut meta: Map<String, Value>, message: impl Into<String>) -> Self {
        meta.remove("data");
        Self::ok_with(Page { meta, data }, message)
    }
}
