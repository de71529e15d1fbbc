//! Radix-tree request router with terminal fault handling.
//!
//! One tree per HTTP method. O(path-length) lookup. A matched handler runs;
//! its faults go to the error handler exactly once. Anything unmatched goes to
//! the fallback, whose faults take the same route.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use matchit::Router as MatchitRouter;
use tracing::debug;

use crate::adapter::{BoxedHandler, Handler};
use crate::middleware::{ErrorHandler, error_handler, not_found_handler};
use crate::request::Request;
use crate::response::Response;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every builder method returns `self` so registrations chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    fallback: BoxedHandler,
    errors: ErrorHandler,
}

impl Router {
    /// An empty router answering `404` to everything.
    ///
    /// Faults are rendered by `error_handler(true)` until
    /// [`on_error`](Router::on_error) says otherwise.
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            fallback: not_found_handler().into_boxed_handler(),
            errors: error_handler(true),
        }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them:
    ///
    /// ```rust,no_run
    /// # use courier::{Method, Request, Response, Router};
    /// # async fn get_user(_: Request) -> Response { Response::text("") }
    /// # async fn create_user(_: Request) -> Response { Response::text("") }
    /// Router::new()
    ///     .on(Method::GET,  "/users/{id}", get_user)
    ///     .on(Method::POST, "/users",      create_user);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `path` conflicts with an already registered route or is not
    /// a valid route pattern. Routes are fixed at startup.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Replaces the handler used when no route matches.
    pub fn fallback(mut self, handler: impl Handler) -> Self {
        self.fallback = handler.into_boxed_handler();
        self
    }

    /// Replaces the terminal fault handler.
    pub fn on_error(mut self, errors: ErrorHandler) -> Self {
        self.errors = errors;
        self
    }

    /// Routes one buffered request and produces one response.
    pub async fn handle(&self, req: http::Request<Bytes>) -> Response {
        let req = Request::from_http(req);
        let (handler, params) = self.lookup(req.method(), req.path())
            .unwrap_or_else(|| (Arc::clone(&self.fallback), HashMap::new()));

        debug!(method = %req.method(), path = req.path(), "dispatch");

        match handler.call(req.with_params(params)).await {
            Ok(response) => response,
            Err(fault) => self.errors.handle(fault),
        }
    }

    fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
