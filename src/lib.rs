//! # courier
//!
//! The conventions layer for HTTP services: one success shape, one error
//! shape, and handlers that never have to think about either.
//!
//! ## Shapes on the wire
//!
//! ```text
//! success  {"status": 200, "message": "success", "result": …}
//! error    {"status": 404, "error": "NotFoundError", "message": "…", "detail": …}
//! ```
//!
//! - [`Envelope`] builds the success shape (`ok`, `created`, `paginated`).
//! - [`HttpError`] builds the error shape; its `error` name is derived from
//!   the status (`409` → `ConflictError`).
//! - Handlers return either, or `Result` of both. Any fault (an `Err`, a
//!   foreign error through `?`, a panic) reaches the router's
//!   [`ErrorHandler`](middleware::ErrorHandler) exactly once.
//! - [`middleware::validate`] checks a request part against a schema before
//!   the handler runs; [`controller`] binds controller methods to routes.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use courier::middleware::{error_handler, guard, validate};
//! use courier::validate::Typed;
//! use courier::{Config, Envelope, HttpError, Method, Part, Request, Router, Server};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Deserialize, Serialize)]
//! struct NewUser { name: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), courier::Error> {
//!     let config = Config::from_env()?;
//!
//!     let app = Router::new()
//!         .on(Method::GET,  "/users/{id}", get_user)
//!         .on(Method::POST, "/users",      guard(validate(Part::Body, Typed::<NewUser>::new()), create_user))
//!         .on_error(error_handler(config.dev));
//!
//!     Server::from_config(&config).serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Result<Envelope<String>, HttpError> {
//!     match req.param("id") {
//!         Some("1") => Ok(Envelope::ok("alice".to_owned())),
//!         _ => Err(HttpError::not_found("no such user")),
//!     }
//! }
//!
//! async fn create_user(req: Request) -> Result<Envelope<NewUser>, HttpError> {
//!     Ok(Envelope::created(req.parse(Part::Body)?))
//! }
//! ```

mod envelope;
mod error;
mod request;
mod response;
mod router;
mod server;

pub mod adapter;
pub mod config;
pub mod controller;
pub mod middleware;
pub mod status;
pub mod validate;

pub use adapter::{Fault, Handler, Respond, wrap};
pub use config::Config;
pub use envelope::{Envelope, Page};
pub use error::{ConfigError, Error, ErrorKind, HttpError, Message, derive_error_name};
pub use http::Method;
pub use request::{Part, Request};
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use status::Status;
