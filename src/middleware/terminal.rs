//! Terminal handlers: forwarded faults and unmatched routes.

use http::Method;
use serde_json::json;
use tracing::{debug, error};

use crate::adapter::{Fault, Handler};
use crate::error::HttpError;
use crate::request::Request;
use crate::response::Response;

/// Converts any [`Fault`] into the JSON error body. Always responds.
#[derive(Clone, Copy, Debug)]
pub struct ErrorHandler {
    dev: bool,
}

/// Builds the terminal fault handler.
///
/// With `dev` set, non-taxonomy faults are logged and carry their stack under
/// `detail.stack`: the panic-site trace for a panic, the cause chain for a
/// foreign error. Without it, nothing beyond the message leaves the process.
pub fn error_handler(dev: bool) -> ErrorHandler {
    ErrorHandler { dev }
}

impl Default for ErrorHandler {
    fn default() -> Self { error_handler(true) }
}

impl ErrorHandler {
    pub fn is_dev(&self) -> bool { self.dev }

    pub fn handle(&self, fault: Fault) -> Response {
        self.coerce(fault).to_response()
    }

    fn coerce(&self, fault: Fault) -> HttpError {
        match fault {
            Fault::Http(err) => {
                if err.status() >= 500 {
                    error!(status = err.status(), error = %err.name(), "{err}");
                } else {
                    debug!(status = err.status(), error = %err.name(), "{err}");
                }
                err
            }
            other => {
                let internal = HttpError::internal(other.to_string());
                if !self.dev {
                    return internal;
                }
                error!(fault = ?other, "unhandled fault");
                match other.stack() {
                    Some(stack) => internal.with_detail(json!({ "stack": stack })),
                    None => internal,
                }
            }
        }
    }
}

/// The fault for a request that matched no route.
///
/// `404` naming the method and path, with both repeated in `detail`.
pub fn not_found(method: &Method, path: &str) -> HttpError {
    HttpError::not_found(format!("route {method} {path} not found"))
        .with_detail(json!({ "method": method.as_str(), "path": path }))
}

/// The default router fallback. Forwards [`not_found`] to the error handler.
pub fn not_found_handler() -> impl Handler {
    |req: Request| async move { not_found(req.method(), req.path()) }
}
