//! Schema contract consumed by the validation middleware.
//!
//! A [`Schema`] never panics or errors out-of-band: [`safe_parse`](Schema::safe_parse)
//! returns the normalized output or the list of [`Issue`]s that made the input
//! unacceptable. [`Typed`] covers the common case of "deserialize into this
//! struct, then check a few rules"; any `Fn(&Value) -> Result<T, Vec<Issue>>`
//! is a schema too.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// One reason a value failed validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Field path from the root of the validated part. Empty for the root.
    pub path: Vec<String>,
    pub message: String,
    pub code: String,
}

impl Issue {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: Vec::new(), message: message.into(), code: code.into() }
    }

    /// Issue at a single top-level field.
    pub fn at(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: vec![field.into()], ..Self::new(code, message) }
    }
}

/// Non-throwing parse contract.
pub trait Schema: Send + Sync + 'static {
    /// The normalized value that replaces the raw input on success.
    type Output: Serialize;

    fn safe_parse(&self, value: &Value) -> Result<Self::Output, Vec<Issue>>;
}

impl<F, T> Schema for F
where
    F: Fn(&Value) -> Result<T, Vec<Issue>> + Send + Sync + 'static,
    T: Serialize,
{
    type Output = T;

    fn safe_parse(&self, value: &Value) -> Result<T, Vec<Issue>> {
        self(value)
    }
}

type Check<T> = Box<dyn Fn(&T) -> Vec<Issue> + Send + Sync>;

/// Schema backed by a serde type, with optional extra checks.
///
/// ```rust
/// use courier::validate::{Issue, Schema, Typed};
/// use serde::{Deserialize, Serialize};
/// use serde_json::json;
///
/// #[derive(Deserialize, Serialize)]
/// struct NewUser { name: String }
///
/// let schema = Typed::<NewUser>::new().check(|u| {
///     if u.name.trim().is_empty() {
///         vec![Issue::at("name", "too_small", "name must not be blank")]
///     } else {
///         vec![]
///     }
/// });
///
/// assert!(schema.safe_parse(&json!({ "name": "ada" })).is_ok());
/// assert!(schema.safe_parse(&json!({ "name": " " })).is_err());
/// assert!(schema.safe_parse(&json!({})).is_err());
/// ```
pub struct Typed<T> {
    checks: Vec<Check<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Typed<T> {
    pub fn new() -> Self {
        Self { checks: Vec::new(), _marker: PhantomData }
    }

    /// Adds a rule run after deserialization succeeds. Issues from every
    /// rule are collected; any issue fails the parse.
    pub fn check(mut self, rule: impl Fn(&T) -> Vec<Issue> + Send + Sync + 'static) -> Self {
        self.checks.push(Box::new(rule));
        self
    }
}

impl<T> Default for Typed<T> {
    fn default() -> Self { Self::new() }
}

impl<T> fmt::Debug for Typed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Typed")
            .field("type", &std::any::type_name::<T>())
            .field("checks", &self.checks.len())
            .finish()
    }
}

impl<T> Schema for Typed<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    type Output = T;

    fn safe_parse(&self, value: &Value) -> Result<T, Vec<Issue>> {
        let parsed: T = serde_json::from_value(value.clone())
            .map_err(|e| vec![Issue::new("invalid_type", e.to_string())])?;

        let issues: Vec<Issue> = self.checks.iter().flat_map(|rule| rule(&parsed)).collect();
        if issues.is_empty() { Ok(parsed) } else { Err(issues) }
    }
}
