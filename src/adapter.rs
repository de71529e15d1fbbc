//! Handler trait, type erasure and fault normalization.
//!
//! # From user handler to outcome
//!
//! ```text
//! async fn get_user(req: Request) -> Result<Envelope<User>, HttpError>   ← user writes this
//!        ↓ router.on(Method::GET, "/users/{id}", get_user)
//! get_user.into_boxed_handler()                    ← Handler blanket impl
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req) at request time                ← one vtable dispatch
//!        ↓
//! Result<Response, Fault>                          ← Ok: send it; Err: forward to the error handler
//! ```
//!
//! Whatever the handler does (returns a value, returns `Err`, or panics while
//! being invoked or polled), the call resolves exactly once. Either there is a
//! response, or there is a [`Fault`] for the terminal error handler.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::{Arc, Once};

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::envelope::Envelope;
use crate::error::HttpError;
use crate::request::Request;
use crate::response::{IntoResponse, Json, Response};
use crate::status::Status;

// ── Fault ─────────────────────────────────────────────────────────────────────

/// A failure forwarded from a handler to terminal error handling.
pub enum Fault {
    /// A taxonomy member. Sent as-is by the error handler.
    Http(HttpError),
    /// Any other error. Coerced to `500` by the error handler.
    Other(anyhow::Error),
    /// The handler panicked. Carries the panic message and the stack at the
    /// point of the panic.
    Panic { message: String, backtrace: Backtrace },
}

impl Fault {
    /// Wraps any foreign error.
    pub fn other(err: impl Into<anyhow::Error>) -> Self {
        Self::Other(err.into())
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "handler panicked".to_owned()
        };
        let backtrace = PANIC_TRACE.take().unwrap_or_else(Backtrace::capture);
        Self::Panic { message, backtrace }
    }

    /// The stack attached to a non-taxonomy fault.
    ///
    /// For a panic this is the trace recorded at the panic site. For a foreign
    /// error it is the `anyhow` report: the cause chain, followed by the
    /// backtrace when `RUST_BACKTRACE` enabled one.
    pub fn stack(&self) -> Option<String> {
        match self {
            Self::Http(_) => None,
            Self::Other(err) => Some(format!("{err:?}")),
            Self::Panic { backtrace, .. } => {
                (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string())
            }
        }
    }
}

thread_local! {
    /// Trace of the most recent panic on this thread, taken by [`Fault::from_panic`].
    static PANIC_TRACE: Cell<Option<Backtrace>> = const { Cell::new(None) };
}

/// Chains a hook in front of the current panic hook that records the stack
/// before unwinding starts. `catch_unwind` only sees the stack afterwards.
fn install_panic_hook() {
    static HOOK: Once = Once::new();

    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            PANIC_TRACE.set(Some(Backtrace::force_capture()));
            previous(info);
        }));
    });
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => fmt::Display::fmt(err, f),
            Self::Other(err) => fmt::Display::fmt(err, f),
            Self::Panic { message, .. } => f.write_str(message),
        }
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(err) => f.debug_tuple("Http").field(err).finish(),
            Self::Other(err) => f.debug_tuple("Other").field(err).finish(),
            Self::Panic { message, .. } => f.debug_struct("Panic").field("message", message).finish(),
        }
    }
}

impl From<HttpError> for Fault {
    fn from(err: HttpError) -> Self { Self::Http(err) }
}

impl From<anyhow::Error> for Fault {
    fn from(err: anyhow::Error) -> Self { Self::Other(err) }
}

impl From<std::io::Error> for Fault {
    fn from(err: std::io::Error) -> Self { Self::other(err) }
}

impl From<serde_json::Error> for Fault {
    fn from(err: serde_json::Error) -> Self { Self::other(err) }
}

/// What every adapted handler resolves to.
pub type Outcome = Result<Response, Fault>;

// ── Respond ───────────────────────────────────────────────────────────────────

/// The result-dispatch step: turns a handler's return value into an [`Outcome`].
///
/// - [`Envelope`] → its status, its JSON.
/// - [`Json`], `serde_json::Value`, strings → the body, default `200`.
/// - [`Response`] → the handler wrote the reply itself; passed through untouched.
/// - `()` → nothing written; an empty `200`.
/// - `Result<T, E>` → `Ok` dispatches `T`, `Err` forwards to the error handler.
pub trait Respond {
    fn respond(self) -> Outcome;
}

macro_rules! respond_via_into_response {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Respond for $ty {
                fn respond(self) -> Outcome { Ok(self.into_response()) }
            }
        )+
    };
}

respond_via_into_response!(Response, &'static str, String, Status, ());

impl<T: Serialize> Respond for Json<T> {
    fn respond(self) -> Outcome {
        self.try_into_response().map_err(Fault::from)
    }
}

impl Respond for Value {
    fn respond(self) -> Outcome {
        Json(self).respond()
    }
}

impl<T: Serialize> Respond for Envelope<T> {
    fn respond(self) -> Outcome {
        self.try_into_response().map_err(Fault::from)
    }
}

impl Respond for HttpError {
    fn respond(self) -> Outcome { Err(Fault::Http(self)) }
}

impl<T, E> Respond for Result<T, E>
where
    T: Respond,
    E: Into<Fault>,
{
    fn respond(self) -> Outcome {
        match self {
            Ok(value) => value.respond(),
            Err(err) => Err(err.into()),
        }
    }
}

// ── Type erasure ──────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future that resolves to an [`Outcome`].
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = Outcome> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any function with
/// the signature:
///
/// ```text
/// async fn name(req: Request) -> impl Respond
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Respond + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Respond + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        install_panic_hook();
        Arc::new(FnHandler(self))
    }
}

struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: Respond + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture {
        // Invoking the function can panic before any future exists.
        let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| (self.0)(req))) {
            Ok(fut) => fut,
            Err(payload) => {
                let fault = Fault::from_panic(payload);
                return Box::pin(async move { Err(fault) });
            }
        };
        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(value) => value.respond(),
                Err(payload) => Err(Fault::from_panic(payload)),
            }
        })
    }
}

// ── wrap ──────────────────────────────────────────────────────────────────────

/// An adapted handler, callable outside a router.
#[derive(Clone)]
pub struct Wrapped(BoxedHandler);

impl Wrapped {
    /// Runs the handler; resolves once to a response or a fault.
    pub async fn call(&self, req: Request) -> Outcome {
        self.0.call(req).await
    }

    pub(crate) fn into_inner(self) -> BoxedHandler {
        self.0
    }
}

impl fmt::Debug for Wrapped {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Wrapped(..)")
    }
}

/// Adapts `handler` so that every return value and every failure is
/// normalized into an [`Outcome`].
pub fn wrap(handler: impl Handler) -> Wrapped {
    Wrapped(handler.into_boxed_handler())
}
