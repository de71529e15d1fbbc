//! A small user service: a controller resolved from a container, body and
//! query validation, and both terminal handlers.
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users
//!   curl 'http://localhost:3000/users?page=2&per_page=1'
//!   curl http://localhost:3000/users/1
//!   curl http://localhost:3000/users/99
//!   curl -X POST http://localhost:3000/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"carol"}'
//!   curl -X POST http://localhost:3000/users -d '{"name":""}'
//!   curl http://localhost:3000/nowhere

use std::sync::{Arc, Mutex};

use courier::config::fatal;
use courier::controller::{Container, Controller, ControllerRef, MethodTable};
use courier::middleware::{error_handler, guard, validate};
use courier::validate::{Issue, Typed};
use courier::{Config, Envelope, HttpError, Method, Page, Part, Request, Router, Server};
use serde::{Deserialize, Serialize};
use serde_json::{Map, json};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Deserialize, Serialize)]
struct User {
    id: u64,
    name: String,
}

#[derive(Deserialize, Serialize)]
struct NewUser {
    name: String,
}

#[derive(Deserialize, Serialize)]
struct Paging {
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_per_page")]
    per_page: usize,
}

fn default_page() -> usize { 1 }
fn default_per_page() -> usize { 20 }

#[tokio::main]
async fn main() -> Result<(), courier::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().unwrap_or_else(|e| fatal(e));

    let mut container = Container::new();
    container.register(Arc::new(UserStore::seeded()));
    container.register_factory(|c| Ok(UserController { store: c.resolve_required()? }));

    let users = ControllerRef::<UserController>::from_container(&container)
        .unwrap_or_else(|e| fatal(e));
    let method = |name| users.get_method(name).unwrap_or_else(|e| fatal(e));

    let new_user = Typed::<NewUser>::new().check(|u| {
        if u.name.trim().is_empty() {
            vec![Issue::at("name", "too_small", "name must not be blank")]
        } else {
            vec![]
        }
    });

    let app = Router::new()
        .on(Method::GET,  "/users",      guard(validate(Part::Query, query_paging), method("list")))
        .on(Method::GET,  "/users/{id}", method("show"))
        .on(Method::POST, "/users",      guard(validate(Part::Body, new_user), method("create")))
        .on_error(error_handler(config.dev));

    Server::from_config(&config).serve(app).await
}

/// Query values arrive as strings; coerce them before the typed parse.
fn query_paging(raw: &serde_json::Value) -> Result<Paging, Vec<Issue>> {
    let mut coerced = Map::new();
    for key in ["page", "per_page"] {
        if let Some(value) = raw.get(key).and_then(|v| v.as_str()) {
            let number: usize = value.parse().map_err(|_| {
                vec![Issue::at(key, "invalid_type", format!("{key} must be a positive integer"))]
            })?;
            coerced.insert(key.to_owned(), json!(number));
        }
    }
    serde_json::from_value(coerced.into())
        .map_err(|e| vec![Issue::new("invalid_type", e.to_string())])
}

// ── Storage ───────────────────────────────────────────────────────────────────

struct UserStore {
    users: Mutex<Vec<User>>,
}

impl UserStore {
    fn seeded() -> Self {
        let users = vec![
            User { id: 1, name: "alice".into() },
            User { id: 2, name: "bob".into() },
        ];
        Self { users: Mutex::new(users) }
    }
}

// ── Controller ────────────────────────────────────────────────────────────────

struct UserController {
    store: Arc<UserStore>,
}

impl UserController {
    fn users(&self) -> Result<std::sync::MutexGuard<'_, Vec<User>>, HttpError> {
        self.store.users.lock().map_err(|_| HttpError::internal("user store poisoned"))
    }

    async fn list(self: Arc<Self>, req: Request) -> Result<Envelope<Page<Vec<User>>>, HttpError> {
        let paging: Paging = req.parse(Part::Query)?;
        let users = self.users()?;

        let data = users.iter()
            .skip(paging.page.saturating_sub(1) * paging.per_page)
            .take(paging.per_page)
            .cloned()
            .collect();
        let meta = json!({ "page": paging.page, "per_page": paging.per_page, "total": users.len() });

        Ok(Envelope::paginated(data, meta.as_object().cloned().unwrap_or_default(), "users fetched"))
    }

    async fn show(self: Arc<Self>, req: Request) -> Result<Envelope<User>, HttpError> {
        let id: u64 = req.param("id")
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| HttpError::bad_request("id must be numeric"))?;

        self.users()?
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .map(Envelope::ok)
            .ok_or_else(|| HttpError::not_found(format!("user {id} does not exist")))
    }

    async fn create(self: Arc<Self>, req: Request) -> Result<Envelope<User>, HttpError> {
        let input: NewUser = req.parse(Part::Body)?;
        let mut users = self.users()?;

        if users.iter().any(|u| u.name == input.name) {
            return Err(HttpError::conflict(format!("user {} already exists", input.name)));
        }
        let user = User { id: users.len() as u64 + 1, name: input.name };
        users.push(user.clone());
        Ok(Envelope::created(user))
    }
}

impl Controller for UserController {
    fn methods() -> MethodTable<Self> {
        MethodTable::new()
            .method("list", Self::list)
            .method("show", Self::show)
            .method("create", Self::create)
    }
}
