//! Incoming HTTP request type.

use std::collections::HashMap;
use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::HttpError;
use crate::validate::Issue;

/// The part of a request a schema validates.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Part {
    Body,
    Query,
    Params,
}

impl Part {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Body   => "body",
            Self::Query  => "query",
            Self::Params => "params",
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An incoming HTTP request with its body fully read.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    params: HashMap<String, String>,
    replaced: HashMap<Part, Value>,
}

impl Request {
    /// Builds a request from an `http::Request` whose body is already buffered.
    ///
    /// The server does this for every connection; tests use it to drive a
    /// [`Router`](crate::Router) in-process.
    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self {
            method: parts.method,
            path: parts.uri.path().to_owned(),
            query: parts.uri.query().map(str::to_owned),
            headers: parts.headers,
            body,
            params: HashMap::new(),
            replaced: HashMap::new(),
        }
    }

    pub(crate) fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn query(&self) -> Option<&str> { self.query.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Header lookup. Values that are not visible ASCII read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The current JSON view of a request part.
    ///
    /// A value stored by [`replace_part`](Request::replace_part) takes
    /// precedence. Otherwise the body is parsed as JSON (`null` when empty),
    /// the query string becomes an object of strings, and path parameters
    /// become an object of strings.
    pub fn part(&self, part: Part) -> Result<Value, Vec<Issue>> {
        if let Some(value) = self.replaced.get(&part) {
            return Ok(value.clone());
        }
        match part {
            Part::Body if self.body.is_empty() => Ok(Value::Null),
            Part::Body => serde_json::from_slice(&self.body)
                .map_err(|e| vec![Issue::new("invalid_json", e.to_string())]),
            Part::Query => {
                let pairs: Vec<(String, String)> =
                    serde_urlencoded::from_str(self.query.as_deref().unwrap_or(""))
                        .map_err(|e| vec![Issue::new("invalid_query", e.to_string())])?;
                Ok(strings_object(pairs))
            }
            Part::Params => Ok(strings_object(
                self.params.iter().map(|(k, v)| (k.clone(), v.clone())),
            )),
        }
    }

    /// Replaces a part with its normalized value.
    ///
    /// The raw view is rewritten too, so [`body`](Request::body),
    /// [`query`](Request::query) and [`param`](Request::param) agree with
    /// [`part`](Request::part) afterwards. Query and params stay string maps on
    /// the wire: non-string values are written in their JSON form, `null`
    /// fields are dropped, and a non-object value leaves them untouched.
    pub fn replace_part(&mut self, part: Part, value: Value) {
        match part {
            Part::Body => {
                self.body = serde_json::to_vec(&value).map(Bytes::from).unwrap_or_default();
            }
            Part::Query => {
                if let Some(pairs) = string_pairs(&value) {
                    match serde_urlencoded::to_string(&pairs) {
                        Ok(encoded) => self.query = (!encoded.is_empty()).then_some(encoded),
                        Err(e) => tracing::warn!("normalized query is not encodable: {e}"),
                    }
                }
            }
            Part::Params => {
                if let Some(pairs) = string_pairs(&value) {
                    self.params = pairs.into_iter().collect();
                }
            }
        }
        self.replaced.insert(part, value);
    }

    /// Deserializes the current view of a part into `T`.
    ///
    /// Failures come back as a `400` so a handler can `?` them straight out.
    pub fn parse<T: DeserializeOwned>(&self, part: Part) -> Result<T, HttpError> {
        let value = self.part(part).map_err(|issues| rejection(part, &issues))?;
        serde_json::from_value(value)
            .map_err(|e| rejection(part, &[Issue::new("invalid_type", e.to_string())]))
    }
}

/// The `400` produced when a request part fails validation.
pub(crate) fn rejection(part: Part, issues: &[Issue]) -> HttpError {
    HttpError::bad_request(format!("req.{part} fields validation error"))
        .with_detail(serde_json::to_value(issues).unwrap_or(Value::Null))
}

fn string_pairs(value: &Value) -> Option<Vec<(String, String)>> {
    let object = value.as_object()?;
    let pairs = object.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect();
    Some(pairs)
}

fn strings_object(pairs: impl IntoIterator<Item = (String, String)>) -> Value {
    let map: Map<String, Value> = pairs.into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();
    Value::Object(map)
}
