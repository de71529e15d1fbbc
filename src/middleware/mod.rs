//! Middleware layer.
//!
//! A [`Middleware`] runs before a handler and either passes the request on or
//! answers it. [`guard`] attaches one to a handler; the result is a handler
//! again, so guards nest and run outermost first:
//!
//! ```rust
//! use courier::middleware::{guard, validate};
//! use courier::validate::Typed;
//! use courier::{Envelope, Method, Part, Request, Router};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize, Serialize)]
//! struct NewUser { name: String }
//!
//! #[derive(Deserialize, Serialize)]
//! struct Notify { notify: Option<bool> }
//!
//! async fn create_user(req: Request) -> Result<Envelope<NewUser>, courier::HttpError> {
//!     Ok(Envelope::created(req.parse(Part::Body)?))
//! }
//!
//! let app = Router::new().on(
//!     Method::POST,
//!     "/users",
//!     guard(
//!         validate(Part::Query, Typed::<Notify>::new()),
//!         guard(validate(Part::Body, Typed::<NewUser>::new()), create_user),
//!     ),
//! );
//! ```
//!
//! The terminal handlers live here too: [`error_handler`] for forwarded
//! faults and [`not_found_handler`] for unmatched routes.

mod terminal;
mod validation;

use std::sync::Arc;

use crate::adapter::Handler;
use crate::request::Request;
use crate::response::Response;

pub use terminal::{ErrorHandler, error_handler, not_found, not_found_handler};
pub use validation::{Validate, validate};

/// What a middleware decided.
#[derive(Debug)]
pub enum Next {
    /// Hand the (possibly rewritten) request to the next step.
    Continue(Request),
    /// Answer now; nothing further in the chain runs.
    Halt(Response),
}

/// A step that runs strictly before the handler it guards.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request) -> Next;
}

/// Runs `middleware` before `handler`.
///
/// On [`Next::Halt`] the handler is never invoked.
pub fn guard(middleware: impl Middleware, handler: impl Handler) -> impl Handler {
    let middleware = Arc::new(middleware);
    let handler = handler.into_boxed_handler();

    move |req: Request| {
        let middleware = Arc::clone(&middleware);
        let handler = Arc::clone(&handler);
        async move {
            match middleware.call(req) {
                Next::Continue(req) => handler.call(req).await,
                Next::Halt(response) => Ok(response),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;

    use crate::adapter::wrap;

    struct Deny;

    impl Middleware for Deny {
        fn call(&self, _req: Request) -> Next {
            Next::Halt(Response::status(403u16))
        }
    }

    struct Tag(&'static str);

    impl Middleware for Tag {
        fn call(&self, mut req: Request) -> Next {
            let seen = req.part(crate::Part::Body).unwrap_or_default();
            let mut trail = seen.as_array().cloned().unwrap_or_default();
            trail.push(self.0.into());
            req.replace_part(crate::Part::Body, trail.into());
            Next::Continue(req)
        }
    }

    fn request() -> Request {
        Request::from_http(http::Request::new(Bytes::new()))
    }

    #[tokio::test]
    async fn halting_middleware_skips_the_handler() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        async fn counted(_req: Request) -> &'static str {
            CALLS.fetch_add(1, Ordering::SeqCst);
            "ran"
        }

        let response = wrap(guard(Deny, counted)).call(request()).await.unwrap();
        assert_eq!(response.status_code(), 403);
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn nested_guards_run_outermost_first() {
        async fn echo(req: Request) -> String {
            String::from_utf8_lossy(req.body()).into_owned()
        }

        let handler = wrap(guard(Tag("outer"), guard(Tag("inner"), echo)));
        let response = handler.call(request()).await.unwrap();
        assert_eq!(response.body(), br#"["outer","inner"]"#);
    }
}
