//! Manager configuration types.

use std::collections::HashMap;
use std::time::Duration;

/// Defaults applied to every request executed by a manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Base URL prepended to relative request paths.
    pub base_url: String,
    /// Request timeout, until the response head is received.
    pub timeout: Duration,
    /// Resource timeout, for the whole exchange including the body.
    pub resource_timeout: Duration,
    /// Whether the log stage emits output when a request does not say.
    pub log_enabled: bool,
    /// Headers sent with every request; request headers win on conflict.
    pub headers: HashMap<String, String>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(10),
            resource_timeout: Duration::from_secs(60),
            log_enabled: false,
            headers: HashMap::new(),
        }
    }
}

impl ManagerConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::default()
    }

    /// Default header value by name, ignoring case.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        crate::request::find_header(&self.headers, name)
    }
}

/// Builder for [`ManagerConfig`].
#[derive(Debug, Clone, Default)]
pub struct ManagerConfigBuilder {
    base_url: Option<String>,
    timeout: Option<Duration>,
    resource_timeout: Option<Duration>,
    log_enabled: Option<bool>,
    headers: HashMap<String, String>,
}

impl ManagerConfigBuilder {
    /// Set the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the default request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the default resource timeout.
    #[must_use]
    pub const fn resource_timeout(mut self, timeout: Duration) -> Self {
        self.resource_timeout = Some(timeout);
        self
    }

    /// Set the default log flag.
    #[must_use]
    pub const fn log_enabled(mut self, enabled: bool) -> Self {
        self.log_enabled = Some(enabled);
        self
    }

    /// Add a default header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        crate::request::insert_header(&mut self.headers, name.into(), value.into());
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ManagerConfig {
        let defaults = ManagerConfig::default();
        ManagerConfig {
            base_url: self.base_url.unwrap_or(defaults.base_url),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            resource_timeout: self.resource_timeout.unwrap_or(defaults.resource_timeout),
            log_enabled: self.log_enabled.unwrap_or(defaults.log_enabled),
            headers: self.headers,
        }
    }
}
