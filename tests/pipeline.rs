//! End-to-end request handling through a `Router`, without a socket.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use courier::controller::{Container, Controller, ControllerRef, MethodTable};
use courier::middleware::{error_handler, guard, validate};
use courier::validate::{Issue, Typed};
use courier::{Envelope, Fault, HttpError, Json, Method, Part, Request, Response, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Deserialize, Serialize)]
struct Signup {
    email: String,
    #[serde(default)]
    newsletter: bool,
}

fn request(method: Method, uri: &str, body: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Bytes::from(body.to_owned()))
        .unwrap()
}

fn json_body(response: &Response) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

#[tokio::test]
async fn validated_body_reaches_handler_normalized() {
    async fn signup(req: Request) -> Result<Envelope<Signup>, HttpError> {
        Ok(Envelope::created(req.parse(Part::Body)?))
    }

    let app = Router::new().on(
        Method::POST,
        "/signup",
        guard(validate(Part::Body, Typed::<Signup>::new()), signup),
    );

    let response = app.handle(request(Method::POST, "/signup", r#"{"email":"a@b.c"}"#)).await;
    assert_eq!(response.status_code(), 201);
    assert_eq!(
        json_body(&response),
        json!({
            "status": 201,
            "message": "resource created successfully",
            "result": { "email": "a@b.c", "newsletter": false },
        })
    );
}

#[tokio::test]
async fn rejected_input_never_reaches_the_guarded_handler() {
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    async fn signup(_req: Request) -> &'static str {
        CALLS.fetch_add(1, Ordering::SeqCst);
        "welcome"
    }

    let schema = Typed::<Signup>::new().check(|s| {
        if s.email.contains('@') {
            vec![]
        } else {
            vec![Issue::at("email", "invalid_string", "email must contain @")]
        }
    });
    let app = Router::new().on(Method::POST, "/signup", guard(validate(Part::Body, schema), signup));

    let response = app.handle(request(Method::POST, "/signup", r#"{"email":"nope"}"#)).await;

    assert_eq!(response.status_code(), 400);
    let body = json_body(&response);
    assert_eq!(body["error"], "BadRequestError");
    assert_eq!(body["message"], "req.body fields validation error");
    assert_eq!(
        body["detail"],
        json!([{ "path": ["email"], "message": "email must contain @", "code": "invalid_string" }])
    );
    assert_eq!(CALLS.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn plain_objects_are_sent_with_default_status() {
    async fn info(_req: Request) -> Json<Value> {
        Json(json!({ "name": "courier" }))
    }

    let app = Router::new().on(Method::GET, "/info", info);
    let response = app.handle(request(Method::GET, "/info", "")).await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(json_body(&response), json!({ "name": "courier" }));
}

#[tokio::test]
async fn panics_are_coerced_to_internal_errors() {
    async fn crash(_req: Request) -> Envelope<()> {
        panic!("index out of range")
    }

    let app = Router::new().on(Method::GET, "/crash", crash).on_error(error_handler(false));
    let response = app.handle(request(Method::GET, "/crash", "")).await;

    assert_eq!(response.status_code(), 500);
    assert_eq!(
        json_body(&response),
        json!({ "status": 500, "error": "InternalServerError", "message": "index out of range" })
    );
}

#[tokio::test]
async fn foreign_errors_keep_their_message() {
    async fn read_config(_req: Request) -> Result<Value, Fault> {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "settings.toml missing");
        Err(missing.into())
    }

    let app = Router::new().on(Method::GET, "/config", read_config).on_error(error_handler(false));
    let body = json_body(&app.handle(request(Method::GET, "/config", "")).await);

    assert_eq!(body["error"], "InternalServerError");
    assert_eq!(body["message"], "settings.toml missing");
}

#[tokio::test]
async fn unknown_routes_report_method_and_path() {
    let app = Router::new();
    let response = app.handle(request(Method::GET, "/x", "")).await;

    assert_eq!(response.status_code(), 404);
    let body = json_body(&response);
    assert_eq!(body["error"], "NotFoundError");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("GET"));
    assert!(message.contains("/x"));
    assert_eq!(body["detail"], json!({ "method": "GET", "path": "/x" }));
}

#[tokio::test]
async fn validated_params_reach_the_param_accessor() {
    async fn show(req: Request) -> String {
        format!("user {}", req.param("id").unwrap_or("?"))
    }

    let strip_zeros = |v: &Value| -> Result<Value, Vec<Issue>> {
        let id = v["id"].as_str().unwrap_or_default().trim_start_matches('0');
        if id.is_empty() {
            return Err(vec![Issue::at("id", "too_small", "id must be positive")]);
        }
        Ok(json!({ "id": id }))
    };
    let app = Router::new().on(Method::GET, "/u/{id}", guard(validate(Part::Params, strip_zeros), show));

    let response = app.handle(request(Method::GET, "/u/007", "")).await;
    assert_eq!(response.body(), b"user 7");

    let rejected = app.handle(request(Method::GET, "/u/000", "")).await;
    assert_eq!(json_body(&rejected)["message"], "req.params fields validation error");
}

#[tokio::test]
async fn validated_query_reaches_the_query_accessor() {
    async fn search(req: Request) -> String {
        req.query().unwrap_or_default().to_owned()
    }

    let trimmed = |v: &Value| -> Result<Value, Vec<Issue>> {
        Ok(json!({ "q": v["q"].as_str().unwrap_or_default().trim() }))
    };
    let app = Router::new().on(Method::GET, "/search", guard(validate(Part::Query, trimmed), search));

    let response = app.handle(request(Method::GET, "/search?q=%20ale%20", "")).await;
    assert_eq!(response.body(), b"q=ale");
}

#[inline(never)]
fn decode_ledger_row() -> Envelope<()> {
    panic!("ledger row truncated")
}

#[tokio::test]
async fn dev_mode_reports_the_panic_site() {
    async fn crash(_req: Request) -> Envelope<()> {
        decode_ledger_row()
    }

    let app = Router::new().on(Method::GET, "/crash", crash).on_error(error_handler(true));
    let body = json_body(&app.handle(request(Method::GET, "/crash", "")).await);

    assert_eq!(body["message"], "ledger row truncated");
    let stack = body["detail"]["stack"].as_str().unwrap();
    assert!(stack.contains("decode_ledger_row"), "{stack}");
}

#[tokio::test]
async fn dev_mode_reports_foreign_fault_causes() {
    async fn sync(_req: Request) -> Result<Value, Fault> {
        Err(anyhow::anyhow!("db down").context("syncing ledger").into())
    }

    let app = Router::new().on(Method::POST, "/sync", sync).on_error(error_handler(true));
    let body = json_body(&app.handle(request(Method::POST, "/sync", "")).await);

    assert_eq!(body["error"], "InternalServerError");
    assert!(body["detail"]["stack"].as_str().unwrap().contains("db down"));
}

// ── Controllers ───────────────────────────────────────────────────────────────

struct Catalog {
    items: Vec<&'static str>,
}

struct CatalogController {
    catalog: Arc<Catalog>,
}

impl CatalogController {
    async fn list(self: Arc<Self>, req: Request) -> Result<Envelope<courier::Page<Vec<&'static str>>>, HttpError> {
        let page: usize = req.query()
            .and_then(|q| q.strip_prefix("page="))
            .and_then(|p| p.parse().ok())
            .unwrap_or(1);
        let meta = json!({ "page": page, "total": self.catalog.items.len() });
        let data = self.catalog.items.iter().skip(page.saturating_sub(1) * 2).take(2).copied().collect();
        Ok(Envelope::paginated(data, meta.as_object().cloned().unwrap(), "catalog"))
    }

    async fn item(self: Arc<Self>, req: Request) -> Result<Envelope<&'static str>, HttpError> {
        let index: usize = req.param("index")
            .and_then(|i| i.parse().ok())
            .ok_or_else(|| HttpError::bad_request("index must be a number"))?;
        self.catalog.items.get(index)
            .map(|item| Envelope::ok(*item))
            .ok_or_else(|| HttpError::not_found(format!("no item at {index}")))
    }
}

impl Controller for CatalogController {
    fn methods() -> MethodTable<Self> {
        MethodTable::new()
            .method("list", Self::list)
            .method("item", Self::item)
    }
}

fn catalog_app() -> Router {
    let mut container = Container::new();
    container.register(Arc::new(Catalog { items: vec!["ale", "bock", "cider"] }));
    container.register_factory(|c| Ok(CatalogController { catalog: c.resolve_required()? }));

    let catalog = ControllerRef::<CatalogController>::from_container(&container).unwrap();
    Router::new()
        .on(Method::GET, "/items", catalog.get_method("list").unwrap())
        .on(Method::GET, "/items/{index}", catalog.get_method("item").unwrap())
}

#[tokio::test]
async fn controller_methods_serve_routes() {
    let app = catalog_app();

    let page = json_body(&app.handle(request(Method::GET, "/items?page=2", "")).await);
    assert_eq!(page["result"], json!({ "page": 2, "total": 3, "data": ["cider"] }));

    let item = json_body(&app.handle(request(Method::GET, "/items/1", "")).await);
    assert_eq!(item, json!({ "status": 200, "message": "success", "result": "bock" }));
}

#[tokio::test]
async fn controller_faults_go_to_the_error_handler() {
    let app = catalog_app();
    let response = app.handle(request(Method::GET, "/items/9", "")).await;

    assert_eq!(response.status_code(), 404);
    assert_eq!(json_body(&response)["message"], "no item at 9");
}
