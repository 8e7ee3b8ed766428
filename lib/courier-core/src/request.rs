//! Logical request description.
//!
//! Use [`Request::builder`] to describe a call: path, parameters, headers,
//! query, timeouts and decode rules. The pipeline turns it into a
//! [`PreparedRequest`] right before dispatch.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use courier_core::{DecodeIntent, Method, Request};
//!
//! let request = Request::builder(Method::Post, "/v1/users")
//!     .header("Accept", "application/json")
//!     .query("dry_run", "true")
//!     .json(serde_json::json!({"name": "Alice"}))
//!     .timeout(Duration::from_secs(3))
//!     .decode(DecodeIntent::new().at("data"))
//!     .build();
//!
//! assert_eq!(request.header("accept"), Some("application/json"));
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::{DecodeIntent, Method, Parameters, Part, PreparedRequest};

/// A logical HTTP request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    path: String,
    method: Method,
    params: Option<Parameters>,
    headers: HashMap<String, String>,
    query: Vec<(String, String)>,
    timeout: Option<Duration>,
    resource_timeout: Option<Duration>,
    decode: Option<DecodeIntent>,
    parts: Vec<Part>,
    log_enabled: Option<bool>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    prepared: Option<PreparedRequest>,
}

impl Request {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, path)
    }

    /// Absolute URL or path relative to the base URL.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Request parameters.
    #[must_use]
    pub const fn params(&self) -> Option<&Parameters> {
        self.params.as_ref()
    }

    /// Replace the request parameters.
    pub fn set_params(&mut self, params: impl Into<Parameters>) {
        self.params = Some(params.into());
    }

    /// Request headers, as set by the caller and the request stages.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Header value by name, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Set a header, replacing any value stored under the same name in another case.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        insert_header(&mut self.headers, name.into(), value.into());
    }

    /// Remove a header, ignoring case.
    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        let key = self
            .headers
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()?;
        self.headers.remove(&key)
    }

    /// Query pairs appended to the URL.
    #[must_use]
    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    /// Append a query pair.
    pub fn push_query(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.query.push((name.into(), value.into()));
    }

    /// Per-request timeout override.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Per-request resource timeout override.
    #[must_use]
    pub const fn resource_timeout(&self) -> Option<Duration> {
        self.resource_timeout
    }

    /// Decode rules for the response body.
    #[must_use]
    pub const fn decode(&self) -> Option<&DecodeIntent> {
        self.decode.as_ref()
    }

    /// Multipart parts.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// Log flag override. Resolved against the manager default by the pipeline.
    #[must_use]
    pub const fn log_enabled(&self) -> Option<bool> {
        self.log_enabled
    }

    /// Effective log flag, `false` when unset.
    #[must_use]
    pub fn is_log_enabled(&self) -> bool {
        self.log_enabled.unwrap_or(false)
    }

    /// When dispatch started.
    #[must_use]
    pub const fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// When dispatch finished.
    #[must_use]
    pub const fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }

    /// Resolved wire form, available once the request has been prepared.
    #[must_use]
    pub const fn prepared(&self) -> Option<&PreparedRequest> {
        self.prepared.as_ref()
    }

    /// Time spent in dispatch, zero if it never started or finished.
    #[must_use]
    pub fn duration(&self) -> Duration {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    pub(crate) fn resolve_log_enabled(&mut self, default: bool) {
        self.log_enabled.get_or_insert(default);
    }

    pub(crate) fn mark_started(&mut self, prepared: PreparedRequest) {
        self.prepared = Some(prepared);
        self.started_at = Some(Instant::now());
    }

    pub(crate) fn mark_finished(&mut self) {
        self.finished_at = Some(Instant::now());
    }
}

/// Builder for constructing [`Request`] instances.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request: Request {
                path: path.into(),
                method,
                ..Request::default()
            },
        }
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.set_header(name, value);
        self
    }

    /// Sets multiple headers.
    #[must_use]
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        for (name, value) in headers {
            self.request.set_header(name, value);
        }
        self
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.request.push_query(name, value);
        self
    }

    /// Appends the fields of a serializable value as query parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized as a query string.
    pub fn query_params<T: serde::Serialize>(mut self, value: &T) -> crate::Result<Self> {
        let encoded = crate::to_query_string(value)?;
        self.request.query.extend(
            url::form_urlencoded::parse(encoded.as_bytes())
                .map(|(name, value)| (name.into_owned(), value.into_owned())),
        );
        Ok(self)
    }

    /// Sets the request parameters.
    #[must_use]
    pub fn params(mut self, params: impl Into<Parameters>) -> Self {
        self.request.set_params(params);
        self
    }

    /// Sets a JSON body, serialized during preparation.
    #[must_use]
    pub fn json<T>(self, value: T) -> Self
    where
        T: serde::Serialize + Send + Sync + 'static,
    {
        self.params(Parameters::json(value))
    }

    /// Adds a multipart part.
    #[must_use]
    pub fn part(mut self, part: Part) -> Self {
        self.request.parts.push(part);
        self
    }

    /// Overrides the manager timeout for this request.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.request.timeout = Some(timeout);
        self
    }

    /// Overrides the manager resource timeout for this request.
    #[must_use]
    pub const fn resource_timeout(mut self, timeout: Duration) -> Self {
        self.request.resource_timeout = Some(timeout);
        self
    }

    /// Declares how the response body should be decoded.
    #[must_use]
    pub fn decode(mut self, intent: DecodeIntent) -> Self {
        self.request.decode = Some(intent);
        self
    }

    /// Overrides the manager log flag for this request.
    #[must_use]
    pub const fn log(mut self, enabled: bool) -> Self {
        self.request.log_enabled = Some(enabled);
        self
    }

    /// Builds the [`Request`].
    #[must_use]
    pub fn build(self) -> Request {
        self.request
    }
}

pub(crate) fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

pub(crate) fn insert_header(headers: &mut HashMap<String, String>, name: String, value: String) {
    headers.retain(|key, _| !key.eq_ignore_ascii_case(&name));
    headers.insert(name, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_basic() {
        let request = Request::builder(Method::Get, "/users")
            .header("Accept", "application/json")
            .build();

        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.path(), "/users");
        assert_eq!(request.header("accept"), Some("application/json"));
        assert!(request.params().is_none());
        assert!(request.prepared().is_none());
        assert!(request.log_enabled().is_none());
    }

    #[test]
    fn headers_ignore_case() {
        let mut request = Request::builder(Method::Get, "/")
            .header("X-Token", "a")
            .header("x-token", "b")
            .build();

        assert_eq!(request.headers().len(), 1);
        assert_eq!(request.header("X-TOKEN"), Some("b"));

        assert_eq!(request.remove_header("X-Token"), Some("b".to_string()));
        assert!(request.headers().is_empty());
    }

    #[test]
    fn query_pairs_keep_order() {
        #[derive(serde::Serialize)]
        struct Filter {
            tags: Vec<&'static str>,
        }

        let request = Request::builder(Method::Get, "/items")
            .query("page", "1")
            .query_params(&Filter {
                tags: vec!["a", "b"],
            })
            .expect("query")
            .build();

        let pairs: Vec<_> = request
            .query()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(pairs, [("page", "1"), ("tags", "a"), ("tags", "b")]);
    }

    #[test]
    fn overrides() {
        let request = Request::builder(Method::Put, "/")
            .timeout(Duration::from_secs(1))
            .resource_timeout(Duration::from_secs(2))
            .log(true)
            .part(Part::text("a", "b"))
            .build();

        assert_eq!(request.timeout(), Some(Duration::from_secs(1)));
        assert_eq!(request.resource_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(request.log_enabled(), Some(true));
        assert_eq!(request.parts().len(), 1);
    }

    #[test]
    fn resolve_log_keeps_override() {
        let mut request = Request::builder(Method::Get, "/").log(false).build();
        request.resolve_log_enabled(true);
        assert!(!request.is_log_enabled());

        let mut request = Request::builder(Method::Get, "/").build();
        request.resolve_log_enabled(true);
        assert!(request.is_log_enabled());
    }

    #[test]
    fn duration_without_dispatch_is_zero() {
        let request = Request::builder(Method::Get, "/").build();
        assert_eq!(request.duration(), Duration::ZERO);
    }
}
