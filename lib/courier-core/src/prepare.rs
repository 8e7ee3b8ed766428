//! Request preparation: the logical request turned into its wire form.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use url::Url;

use crate::request::{find_header, insert_header};
use crate::{Error, ManagerConfig, Method, Multipart, Request, Result};

/// Resolved wire form of a [`Request`].
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    method: Method,
    url: Url,
    headers: HashMap<String, String>,
    body: Option<Bytes>,
    timeout: Duration,
    resource_timeout: Duration,
}

impl PreparedRequest {
    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Final URL, query included.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Merged headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Header value by name, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Encoded body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Time allowed until the response head arrives.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Time allowed for the whole exchange.
    #[must_use]
    pub const fn resource_timeout(&self) -> Duration {
        self.resource_timeout
    }
}

/// Resolve `path` against `base_url`.
///
/// Paths starting with `http` are used verbatim. Otherwise trailing `/` are
/// dropped from the base, leading `/` from the path, and the two are joined
/// with a single `/`.
///
/// # Errors
///
/// Returns [`Error::InvalidUrl`] if the result is not an absolute URL.
///
/// # Example
///
/// ```
/// use courier_core::resolve_url;
///
/// let url = resolve_url("https://h/", "/v1/x").expect("valid");
/// assert_eq!(url.as_str(), "https://h/v1/x");
/// ```
pub fn resolve_url(base_url: &str, path: &str) -> Result<Url> {
    let joined = if path.starts_with("http") {
        path.to_string()
    } else {
        let base = base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    };

    Url::parse(&joined).map_err(|source| Error::InvalidUrl {
        url: joined,
        source,
    })
}

/// Overlay `overrides` on `defaults`, matching names without regard to case.
#[must_use]
pub fn merge_headers(
    defaults: &HashMap<String, String>,
    overrides: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = defaults.clone();
    for (name, value) in overrides {
        insert_header(&mut merged, name.clone(), value.clone());
    }
    merged
}

/// Compute the wire form of `request` under `config`.
///
/// # Errors
///
/// Returns a preparation error if the URL is invalid or the JSON body
/// cannot be serialized.
pub fn prepare(request: &Request, config: &ManagerConfig) -> Result<PreparedRequest> {
    let mut url = resolve_url(&config.base_url, request.path())?;
    if !request.query().is_empty() {
        url.query_pairs_mut().extend_pairs(request.query());
    }

    let mut headers = merge_headers(&config.headers, request.headers());

    let (body, content_type) = if let Some(params) = request.params() {
        (
            Some(params.to_bytes()?),
            Some(params.content_type().as_str().to_string()),
        )
    } else if request.parts().is_empty() {
        (None, None)
    } else {
        let multipart = Multipart::encode(request.parts());
        let content_type = multipart.content_type();
        (Some(multipart.into_body()), Some(content_type))
    };

    if let Some(content_type) = content_type
        && find_header(&headers, "content-type").is_none()
    {
        headers.insert("Content-Type".to_string(), content_type);
    }

    Ok(PreparedRequest {
        method: request.method(),
        url,
        headers,
        body,
        timeout: request.timeout().unwrap_or(config.timeout),
        resource_timeout: request
            .resource_timeout()
            .unwrap_or(config.resource_timeout),
    })
}
