//! Schema validation of a single request part.

use serde_json::Value;

use crate::request::{self, Part, Request};
use crate::validate::{Issue, Schema};

use super::{Middleware, Next};

/// Middleware returned by [`validate`].
#[derive(Debug)]
pub struct Validate<S> {
    part: Part,
    schema: S,
}

/// Validates `part` against `schema`.
///
/// On success the part is replaced by the schema's normalized output and the
/// chain continues. On failure the chain stops with a `400 BadRequestError`
/// whose `detail` is the list of issues.
pub fn validate<S: Schema>(part: Part, schema: S) -> Validate<S> {
    Validate { part, schema }
}

impl<S: Schema> Middleware for Validate<S> {
    fn call(&self, mut req: Request) -> Next {
        match self.check(&req) {
            Ok(normalized) => {
                req.replace_part(self.part, normalized);
                Next::Continue(req)
            }
            Err(issues) => {
                tracing::debug!(part = %self.part, issues = issues.len(), "request rejected by schema");
                Next::Halt(request::rejection(self.part, &issues).to_response())
            }
        }
    }
}

impl<S: Schema> Validate<S> {
    fn check(&self, req: &Request) -> Result<Value, Vec<Issue>> {
        let raw = req.part(self.part)?;
        let output = self.schema.safe_parse(&raw)?;
        serde_json::to_value(output).map_err(|e| vec![Issue::new("unserializable", e.to_string())])
    }
}
