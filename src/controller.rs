//! Controllers and the dependency container they are resolved from.
//!
//! A controller is a plain struct whose async methods serve routes. It names
//! its routable methods explicitly through [`Controller::methods`]; there is no
//! lookup by reflection. A [`ControllerRef`] pairs one instance with that
//! table and hands out adapted handlers:
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use courier::controller::{Container, Controller, ControllerRef, MethodTable};
//! use courier::{Envelope, HttpError, Method, Request, Router};
//!
//! struct Greeter;
//!
//! struct GreetController { greeter: Arc<Greeter> }
//!
//! impl GreetController {
//!     async fn hello(self: Arc<Self>, req: Request) -> Result<Envelope<String>, HttpError> {
//!         let name = req.param("name").ok_or_else(|| HttpError::bad_request("name required"))?;
//!         Ok(Envelope::ok(format!("hello {name}")))
//!     }
//! }
//!
//! impl Controller for GreetController {
//!     fn methods() -> MethodTable<Self> {
//!         MethodTable::new().method("hello", Self::hello)
//!     }
//! }
//!
//! # fn main() -> Result<(), courier::ConfigError> {
//! let mut container = Container::new();
//! container.register(Arc::new(Greeter));
//! container.register_factory(|c| Ok(GreetController { greeter: c.resolve_required()? }));
//!
//! let greet = ControllerRef::<GreetController>::from_container(&container)?;
//! let app = Router::new().on(Method::GET, "/hello/{name}", greet.get_method("hello")?);
//! # Ok(())
//! # }
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::adapter::{BoxFuture, Handler, Respond};
use crate::error::ConfigError;
use crate::request::Request;

// ── Container ─────────────────────────────────────────────────────────────────

type Shared = Arc<dyn Any + Send + Sync>;
type Factory = Box<dyn Fn(&Container) -> Result<Shared, ConfigError> + Send + Sync>;

enum Entry {
    Instance(Shared),
    Factory(Factory),
}

/// A registry of services keyed by type.
///
/// Instances are shared as registered. Factories run on every resolution and
/// may resolve their own dependencies from the same container.
#[derive(Default)]
pub struct Container {
    entries: HashMap<TypeId, Entry>,
}

impl Container {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    /// Registers a shared instance. Replaces any earlier registration of `T`.
    pub fn register<T: Send + Sync + 'static>(&mut self, service: Arc<T>) {
        self.entries.insert(TypeId::of::<T>(), Entry::Instance(service));
    }

    /// Registers a factory building a fresh `T` per resolution.
    pub fn register_factory<T, F>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Container) -> Result<T, ConfigError> + Send + Sync + 'static,
    {
        let erased: Factory = Box::new(move |c: &Container| factory(c).map(|t| Arc::new(t) as Shared));
        self.entries.insert(TypeId::of::<T>(), Entry::Factory(erased));
    }

    /// Resolves `T`, failing if it or anything its factory needs is missing.
    pub fn resolve_required<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ConfigError> {
        let missing = || ConfigError::MissingDependency { type_name: type_name::<T>() };

        let shared = match self.entries.get(&TypeId::of::<T>()).ok_or_else(missing)? {
            Entry::Instance(shared) => Arc::clone(shared),
            Entry::Factory(factory) => factory(self)?,
        };
        shared.downcast::<T>().map_err(|_| missing())
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("service_count", &self.entries.len())
            .finish()
    }
}

// ── Method table ──────────────────────────────────────────────────────────────

type Method<C> = Arc<dyn Fn(Arc<C>, Request) -> BoxFuture + Send + Sync>;

/// The routable methods of a controller, by name.
pub struct MethodTable<C> {
    methods: HashMap<&'static str, Method<C>>,
}

impl<C: Send + Sync + 'static> MethodTable<C> {
    pub fn new() -> Self {
        Self { methods: HashMap::new() }
    }

    /// Adds `method` under `name`.
    ///
    /// Any `async fn(self: Arc<Self>, req: Request) -> impl Respond` fits.
    pub fn method<F, Fut, R>(mut self, name: &'static str, method: F) -> Self
    where
        F: Fn(Arc<C>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: Respond + Send + 'static,
    {
        let erased: Method<C> = Arc::new(move |controller: Arc<C>, req: Request| -> BoxFuture {
            let fut = method(controller, req);
            Box::pin(async move { fut.await.respond() })
        });
        self.methods.insert(name, erased);
        self
    }
}

impl<C: Send + Sync + 'static> Default for MethodTable<C> {
    fn default() -> Self { Self::new() }
}

/// A type whose methods serve routes.
pub trait Controller: Send + Sync + Sized + 'static {
    fn methods() -> MethodTable<Self>;
}

// ── ControllerRef ─────────────────────────────────────────────────────────────

/// One controller instance plus its method table.
///
/// Holds a shared reference; the instance is owned by whoever built it.
pub struct ControllerRef<C> {
    instance: Arc<C>,
    methods: MethodTable<C>,
}

impl<C: Controller> ControllerRef<C> {
    /// Obtains the instance from `container`.
    pub fn from_container(container: &Container) -> Result<Self, ConfigError> {
        Ok(Self::from_instance(container.resolve_required::<C>()?))
    }

    /// Builds the instance directly, bypassing any container.
    pub fn construct() -> Self
    where
        C: Default,
    {
        Self::from_instance(Arc::new(C::default()))
    }

    pub fn from_instance(instance: Arc<C>) -> Self {
        Self { instance, methods: C::methods() }
    }

    /// The adapted handler for the method registered as `name`.
    pub fn get_method(&self, name: &str) -> Result<impl Handler + use<C>, ConfigError> {
        let method = self.methods.methods.get(name).cloned().ok_or_else(|| {
            ConfigError::MissingMethod { method: name.to_owned(), controller: short_name::<C>() }
        })?;
        let instance = Arc::clone(&self.instance);

        Ok(move |req: Request| method(Arc::clone(&instance), req))
    }
}

impl<C> fmt::Debug for ControllerRef<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerRef")
            .field("controller", &short_name::<C>())
            .field("methods", &self.methods.methods.len())
            .finish()
    }
}

/// `my_app::users::UserController` → `UserController`.
fn short_name<C>() -> &'static str {
    let full = type_name::<C>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;

    use crate::adapter::{Fault, wrap};
    use crate::envelope::Envelope;
    use crate::error::HttpError;

    #[derive(Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    #[derive(Default)]
    struct CounterController {
        counter: Arc<Counter>,
    }

    impl CounterController {
        async fn hit(self: Arc<Self>, _req: Request) -> Envelope<usize> {
            Envelope::ok(self.counter.hits.fetch_add(1, Ordering::SeqCst) + 1)
        }

        async fn fail(self: Arc<Self>, _req: Request) -> Result<Envelope<()>, HttpError> {
            Err(HttpError::unauthorized("no token"))
        }
    }

    impl Controller for CounterController {
        fn methods() -> MethodTable<Self> {
            MethodTable::new()
                .method("hit", Self::hit)
                .method("fail", Self::fail)
        }
    }

    fn request() -> Request {
        Request::from_http(http::Request::new(Bytes::new()))
    }

    #[test]
    fn unregistered_dependency_is_a_config_error() {
        let err = ControllerRef::<CounterController>::from_container(&Container::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDependency { type_name } if type_name.ends_with("CounterController")));
    }

    #[test]
    fn factories_propagate_missing_dependencies() {
        let mut container = Container::new();
        container.register_factory(|c| Ok(CounterController { counter: c.resolve_required()? }));

        let err = ControllerRef::<CounterController>::from_container(&container).unwrap_err();
        assert!(matches!(err, ConfigError::MissingDependency { type_name } if type_name.ends_with("Counter")));
    }

    #[tokio::test]
    async fn container_instances_share_state() {
        let counter = Arc::new(Counter::default());
        let mut container = Container::new();
        container.register(Arc::clone(&counter));
        container.register_factory(|c| Ok(CounterController { counter: c.resolve_required()? }));

        let first = ControllerRef::<CounterController>::from_container(&container).unwrap();
        let second = ControllerRef::<CounterController>::from_container(&container).unwrap();

        wrap(first.get_method("hit").unwrap()).call(request()).await.unwrap();
        wrap(second.get_method("hit").unwrap()).call(request()).await.unwrap();
        assert_eq!(counter.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn bound_methods_run_against_the_instance() {
        let controller = ControllerRef::<CounterController>::construct();
        let hit = wrap(controller.get_method("hit").unwrap());

        hit.call(request()).await.unwrap();
        let response = hit.call(request()).await.unwrap();
        assert_eq!(response.body(), br#"{"status":200,"message":"success","result":2}"#);
    }

    #[tokio::test]
    async fn method_faults_are_forwarded() {
        let controller = ControllerRef::<CounterController>::construct();
        let fault = wrap(controller.get_method("fail").unwrap()).call(request()).await.unwrap_err();
        assert!(matches!(fault, Fault::Http(err) if err.status() == 401));
    }

    #[test]
    fn unknown_method_names_method_and_controller() {
        let controller = ControllerRef::<CounterController>::construct();
        let err = controller.get_method("delete").err().unwrap();
        assert_eq!(err.to_string(), "controller `CounterController` has no method `delete`");
    }
}
