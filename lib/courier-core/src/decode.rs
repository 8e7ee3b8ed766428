//! Decode intents and JSON envelope extraction.
//!
//! A [`DecodeIntent`] tells the decode stage where the payload lives inside
//! a JSON envelope (a dotted key path such as `data.rows`) and, optionally,
//! which Rust type it should be deserialized into.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use derive_more::{Display, Error};
use serde_json::Value;

/// Payload decoding failure, with the JSON path of the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("JSON deserialization error at '{path}': {message}")]
pub struct DecodeError {
    #[error(not(source))]
    path: String,
    #[error(not(source))]
    message: String,
}

impl DecodeError {
    /// Create a decode error.
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Path to the field that failed (empty for syntax errors).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Underlying deserializer message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_path_to_error::Error<serde_json::Error>> for DecodeError {
    fn from(err: serde_path_to_error::Error<serde_json::Error>) -> Self {
        Self::new(err.path().to_string(), err.inner().to_string())
    }
}

/// Decoded payload attached to a [`Response`](crate::Response).
#[derive(Clone)]
pub enum Model {
    /// Raw JSON value (no target type was declared).
    Json(Value),
    /// Value of the declared target type.
    Typed(Arc<dyn Any + Send + Sync>),
}

impl Model {
    /// The raw JSON value, if no target type was declared.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Typed(_) => None,
        }
    }

    /// The typed value, if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match self {
            Self::Typed(value) => value.downcast_ref(),
            Self::Json(_) => None,
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Typed(_) => f.debug_tuple("Typed").finish_non_exhaustive(),
        }
    }
}

type Decoder = dyn Fn(Value) -> Result<Arc<dyn Any + Send + Sync>, DecodeError> + Send + Sync;

/// Type tag for the decode target.
#[derive(Clone)]
pub struct DecodeTarget {
    type_name: &'static str,
    decode: Arc<Decoder>,
}

impl DecodeTarget {
    /// Target the type `T`.
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        Self {
            type_name: std::any::type_name::<T>(),
            decode: Arc::new(|value| {
                let decoded: T = serde_path_to_error::deserialize(value)?;
                Ok(Arc::new(decoded))
            }),
        }
    }

    /// Name of the target type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Deserialize `value` into the target type.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` does not match the target type.
    pub fn decode(&self, value: Value) -> Result<Model, DecodeError> {
        (self.decode)(value).map(Model::Typed)
    }
}

impl fmt::Debug for DecodeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DecodeTarget").field(&self.type_name).finish()
    }
}

/// Caller-declared decode rules.
#[derive(Debug, Clone, Default)]
pub struct DecodeIntent {
    key_path: Option<String>,
    target: Option<DecodeTarget>,
}

impl DecodeIntent {
    /// Decode the whole document as raw JSON.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode into `T`.
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: serde::de::DeserializeOwned + Send + Sync + 'static,
    {
        Self {
            key_path: None,
            target: Some(DecodeTarget::of::<T>()),
        }
    }

    /// Locate the payload at a dotted key path, e.g. `data.rows`.
    #[must_use]
    pub fn at(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = Some(key_path.into());
        self
    }

    /// The key path, if any.
    #[must_use]
    pub fn key_path(&self) -> Option<&str> {
        self.key_path.as_deref()
    }

    /// The target type, if any.
    #[must_use]
    pub fn target(&self) -> Option<&DecodeTarget> {
        self.target.as_ref()
    }

    /// Extract and decode the payload from a parsed document.
    ///
    /// # Errors
    ///
    /// Returns an error if a target type is declared and the payload does not match it.
    pub fn decode(&self, document: Value) -> Result<Model, DecodeError> {
        let payload = match self.key_path.as_deref() {
            Some(key_path) => extract(document, key_path),
            None => document,
        };
        match &self.target {
            Some(target) => target.decode(payload),
            None => Ok(Model::Json(payload)),
        }
    }
}

/// Locate the value at `key_path` in `document`.
///
/// A literal top-level key equal to `key_path` wins; otherwise the path is
/// split on `.` and followed through nested objects. Any missing segment
/// yields the whole document.
#[must_use]
pub fn locate<'a>(document: &'a Value, key_path: &str) -> &'a Value {
    if let Some(value) = document.get(key_path) {
        return value;
    }

    let mut current = document;
    for key in key_path.split('.') {
        match current.as_object().and_then(|object| object.get(key)) {
            Some(next) => current = next,
            None => return document,
        }
    }
    current
}

fn extract(document: Value, key_path: &str) -> Value {
    let located = locate(&document, key_path);
    if std::ptr::eq(located, &document) {
        document
    } else {
        located.clone()
    }
}
