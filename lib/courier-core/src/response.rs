//! HTTP response handling.
//!
//! A [`Transport`](crate::Transport) yields a [`RawResponse`]; the pipeline
//! wraps it into a [`Response`] tied to its originating request before the
//! response stages run.
//!
//! # Example
//!
//! ```ignore
//! let response = manager.execute(request).await?;
//! if response.succeed() {
//!     let user: User = response.json()?;
//! }
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::request::find_header;
use crate::{Model, Request};

/// Status, headers and body as returned by a transport.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
}

impl RawResponse {
    /// Creates a new raw response.
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, String>, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Consume into (status, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (u16, HashMap<String, String>, Bytes) {
        (self.status, self.headers, self.body)
    }
}

/// HTTP response bound to the request that produced it.
#[derive(Debug, Clone)]
pub struct Response {
    request: Arc<Request>,
    status: u16,
    headers: HashMap<String, String>,
    body: Bytes,
    duration: Duration,
    model: Option<Model>,
}

impl Response {
    /// Creates a new response for a dispatched request.
    #[must_use]
    pub fn new(request: Arc<Request>, raw: RawResponse) -> Self {
        let duration = request.duration();
        let (status, headers, body) = raw.into_parts();
        Self {
            request,
            status,
            headers,
            body,
            duration,
            model: None,
        }
    }

    /// The originating request, frozen at dispatch.
    #[must_use]
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Status is in `[200, 300)`.
    #[must_use]
    pub const fn succeed(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Mutable access to headers.
    #[must_use]
    pub fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    /// Header value by name, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replace the response body.
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        self.body = body.into();
    }

    /// Time between dispatch start and end.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Decoded model, if the decode stage produced one.
    #[must_use]
    pub const fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    /// Decoded model as a `T`.
    #[must_use]
    pub fn model_as<T: Any>(&self) -> Option<&T> {
        self.model.as_ref().and_then(Model::downcast_ref)
    }

    /// Decoded model as raw JSON.
    #[must_use]
    pub fn model_json(&self) -> Option<&serde_json::Value> {
        self.model.as_ref().and_then(Model::as_json)
    }

    /// Attach a decoded model.
    pub fn set_model(&mut self, model: Model) {
        self.model = Some(model);
    }

    /// Deserialize the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> crate::Result<T> {
        crate::from_json(&self.body)
    }

    /// Body as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn text(&self) -> crate::Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| crate::Error::invalid_response(format!("invalid UTF-8: {e}")))
    }
}
