//! Request parameters and body serialization utilities.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::Result;

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// JSON content type (`application/json`).
    Json,
    /// Plain text content type (`text/plain; charset=utf-8`).
    PlainText,
    /// Binary content type (`application/octet-stream`).
    OctetStream,
}

impl ContentType {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::PlainText => "text/plain; charset=utf-8",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Encoder = dyn Fn() -> serde_json::Result<Vec<u8>> + Send + Sync;

/// A JSON-serializable value, serialized when the request is prepared.
#[derive(Clone)]
pub struct JsonParams {
    encode: Arc<Encoder>,
}

impl JsonParams {
    /// Capture `value` for later serialization.
    pub fn new<T>(value: T) -> Self
    where
        T: serde::Serialize + Send + Sync + 'static,
    {
        let value = Arc::new(value);
        Self {
            encode: Arc::new(move || serde_json::to_vec(value.as_ref())),
        }
    }

    /// Serialize the captured value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be represented as JSON.
    pub fn to_bytes(&self) -> Result<Bytes> {
        (self.encode)().map(Bytes::from).map_err(Into::into)
    }
}

impl fmt::Debug for JsonParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonParams").finish_non_exhaustive()
    }
}

/// Request parameters: exactly one representation per request.
#[derive(Debug, Clone)]
pub enum Parameters {
    /// Raw text body.
    Text(String),
    /// Raw binary body.
    Bytes(Bytes),
    /// JSON body, serialized during preparation.
    Json(JsonParams),
}

impl Parameters {
    /// JSON parameters from any serializable value.
    pub fn json<T>(value: T) -> Self
    where
        T: serde::Serialize + Send + Sync + 'static,
    {
        Self::Json(JsonParams::new(value))
    }

    /// Default content type for this representation.
    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        match self {
            Self::Text(_) => ContentType::PlainText,
            Self::Bytes(_) => ContentType::OctetStream,
            Self::Json(_) => ContentType::Json,
        }
    }

    /// Encode into body bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_bytes(&self) -> Result<Bytes> {
        match self {
            Self::Text(text) => Ok(Bytes::from(text.clone())),
            Self::Bytes(bytes) => Ok(bytes.clone()),
            Self::Json(json) => json.to_bytes(),
        }
    }
}

impl From<String> for Parameters {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Parameters {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Bytes> for Parameters {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Parameters {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<serde_json::Value> for Parameters {
    fn from(value: serde_json::Value) -> Self {
        Self::json(value)
    }
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use courier_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { name: String }
///
/// let user = User { name: "Alice".to_string() };
/// let bytes = to_json(&user).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"Alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Serialize a value to a query string.
///
/// Uses `serde_html_form`, so `Vec<T>` fields become repeated parameters.
///
/// # Errors
///
/// Returns an error if query serialization fails.
///
/// # Example
///
/// ```
/// use courier_core::to_query_string;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Search {
///     q: String,
///     #[serde(skip_serializing_if = "Option::is_none")]
///     page: Option<u32>,
/// }
///
/// let search = Search { q: "rust".to_string(), page: Some(1) };
/// assert_eq!(to_query_string(&search).expect("serialize"), "q=rust&page=1");
/// ```
pub fn to_query_string<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_html_form::to_string(value).map_err(Into::into)
}

/// Deserialize JSON bytes with path-aware error messages.
///
/// # Errors
///
/// Returns [`Error::InvalidResponse`](crate::Error::InvalidResponse) with the
/// failing JSON path (e.g. `user.address.city`) if the body does not match `T`.
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::invalid_response(crate::DecodeError::from(e).to_string())
    })
}
