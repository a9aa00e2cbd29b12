//! Composite Store
//!
//! A store is a record of named fields built once from a shape:
//!
//! - state fields become independent [`ReactiveCell`]s (no shared fan-out:
//!   writing one field notifies only that field's subscribers)
//! - method fields become bound methods that receive the finished store as
//!   their first argument
//!
//! Methods resolve everything through the store they are handed, not through
//! values captured at construction time, so a method can call another
//! method or read and write any field.
//!
//! The kind of each field is fixed when the store is built.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::cell::ReactiveCell;
use super::subscriber::Unsubscribe;

/// A bound store method.
pub type Method = Arc<dyn Fn(&Store, &[Value]) -> Value + Send + Sync>;

/// Errors raised when a field is used as the wrong kind or is missing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store has no field `{0}`")]
    UnknownField(String),

    #[error("store field `{0}` is a method, not state")]
    NotState(String),

    #[error("store field `{0}` is state, not a method")]
    NotMethod(String),
}

enum FieldInit {
    State(Value),
    Method(Method),
}

/// The initial shape a store is built from.
#[derive(Default)]
pub struct StoreShape {
    fields: IndexMap<String, FieldInit>,
}

impl StoreShape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state field.
    pub fn state(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), FieldInit::State(value.into()));
        self
    }

    /// Add a method field.
    pub fn method<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Store, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.fields
            .insert(name.into(), FieldInit::Method(Arc::new(f)));
        self
    }

    /// Every key of a JSON object becomes a state field. Non-objects yield
    /// an empty shape.
    pub fn from_json(value: Value) -> Self {
        let mut shape = Self::new();
        match value {
            Value::Object(map) => {
                for (name, value) in map {
                    shape = shape.state(name, value);
                }
            }
            other => warn!(shape = %other, "store shape is not an object"),
        }
        shape
    }

    /// Build the store.
    pub fn build(self) -> Store {
        Store::build(self)
    }
}

enum Field {
    State(ReactiveCell<Value>),
    Method(Method),
}

/// A record of reactive state fields plus bound methods.
///
/// # Example
///
/// ```rust
/// use serde_json::{json, Value};
/// use ultra_core::reactive::{Store, StoreShape};
///
/// let store = Store::build(
///     StoreShape::new()
///         .state("count", 0)
///         .method("increment", |store: &Store, _args: &[Value]| {
///             let next = store.get("count").unwrap().as_i64().unwrap_or(0) + 1;
///             store.set("count", json!(next)).unwrap();
///             json!(next)
///         }),
/// );
///
/// store.call("increment", &[]).unwrap();
/// assert_eq!(store.get("count").unwrap(), json!(1));
/// ```
#[derive(Clone)]
pub struct Store {
    fields: Arc<IndexMap<String, Field>>,
}

impl Store {
    /// Partition `shape` into state cells and bound methods.
    pub fn build(shape: StoreShape) -> Self {
        let fields = shape
            .fields
            .into_iter()
            .map(|(name, init)| {
                let field = match init {
                    FieldInit::State(value) => {
                        if value.is_null() {
                            warn!(field = %name, "store field has no initial value");
                        }
                        Field::State(ReactiveCell::new(value))
                    }
                    FieldInit::Method(method) => Field::Method(method),
                };
                (name, field)
            })
            .collect();

        Self {
            fields: Arc::new(fields),
        }
    }

    /// The cell behind a state field (`get` / `set` / `subscribe`).
    pub fn field(&self, name: &str) -> Result<&ReactiveCell<Value>, StoreError> {
        match self.fields.get(name) {
            Some(Field::State(cell)) => Ok(cell),
            Some(Field::Method(_)) => Err(StoreError::NotState(name.to_string())),
            None => Err(StoreError::UnknownField(name.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> Result<Value, StoreError> {
        self.field(name).map(ReactiveCell::get)
    }

    pub fn set(&self, name: &str, value: Value) -> Result<bool, StoreError> {
        self.field(name).map(|cell| cell.set(value))
    }

    pub fn subscribe<F>(&self, name: &str, notify: F) -> Result<Unsubscribe, StoreError>
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.field(name).map(|cell| cell.subscribe(notify))
    }

    /// Invoke a bound method with this store prepended.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, StoreError> {
        match self.fields.get(name) {
            Some(Field::Method(method)) => Ok(method(self, args)),
            Some(Field::State(_)) => Err(StoreError::NotMethod(name.to_string())),
            None => Err(StoreError::UnknownField(name.to_string())),
        }
    }

    pub fn is_state(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(Field::State(_)))
    }

    pub fn is_method(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Some(Field::Method(_)))
    }

    /// Field names in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, field) in self.fields.iter() {
            match field {
                Field::State(cell) => map.entry(name, &cell.get()),
                Field::Method(_) => map.entry(name, &"<method>"),
            };
        }
        map.finish()
    }
}
