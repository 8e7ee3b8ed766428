//! HTTP transport implementation using hyper-util.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tower::Layer;
use tower::limit::ConcurrencyLimitLayer;
use tower::util::BoxCloneService;
use tower_service::Service;
use tracing::{debug, trace};

use crate::config::{TransportConfig, TransportConfigBuilder};
use crate::tls::{find_pinning_denial, https_connector, is_tls_error};
use crate::{Error, PinningPolicy, PreparedRequest, RawResponse, Result, ServerTrust, Transport};

// ============================================================================
// Type-Erased Service for Layer Composition
// ============================================================================

/// Type-erased transport service for layer composition.
pub type BoxedService = BoxCloneService<PreparedRequest, RawResponse, Error>;

/// Future type for the tower `Service` implementation.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<RawResponse>> + Send + 'static>>;

/// Makes `BoxedService` shareable between concurrent calls.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: PreparedRequest) -> ServiceFuture {
        // Clone under the lock, call outside it
        let service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(async move {
            use tower::ServiceExt;
            service.oneshot(request).await
        })
    }
}

// ============================================================================
// Raw Transport
// ============================================================================

#[derive(Clone)]
struct RawHyperTransport {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl RawHyperTransport {
    fn new(config: &TransportConfig, trust: Option<Arc<dyn ServerTrust>>) -> Result<Self> {
        let connector = https_connector(config, trust)?;

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(connector);

        Ok(Self { inner })
    }

    fn build_hyper_request(request: &PreparedRequest) -> Result<http::Request<Full<Bytes>>> {
        let mut builder = http::Request::builder()
            .method(http::Method::from(request.method()))
            .uri(request.url().as_str());

        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let body = request.body().cloned().map_or_else(Full::default, Full::new);
        builder
            .body(body)
            .map_err(|e| Error::invalid_request(e.to_string()))
    }

    fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect()
    }

    async fn execute(self, request: PreparedRequest) -> Result<RawResponse> {
        let resource_timeout = request.resource_timeout();
        tokio::time::timeout(resource_timeout, self.exchange(request))
            .await
            .map_err(|_| Error::Timeout)?
    }

    async fn exchange(&self, request: PreparedRequest) -> Result<RawResponse> {
        let hyper_request = Self::build_hyper_request(&request)?;
        trace!(method = %request.method(), url = %request.url(), "sending request");

        let response = tokio::time::timeout(request.timeout(), self.inner.request(hyper_request))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(Self::map_hyper_error)?;

        let status = response.status().as_u16();
        let headers = Self::extract_headers(response.headers());

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::connection(e.to_string()))?
            .to_bytes();

        trace!(status, bytes = body.len(), "response body received");
        Ok(RawResponse::new(status, headers, body))
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        if let Some(denied) = find_pinning_denial(&err) {
            return Error::PinningDenied(denied);
        }

        let msg = error_chain_message(&err);
        if is_tls_error(&err) {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

fn error_chain_message(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

impl Service<PreparedRequest> for RawHyperTransport {
    type Response = RawResponse;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: PreparedRequest) -> Self::Future {
        Box::pin(self.clone().execute(request))
    }
}

// ============================================================================
// Public Transport
// ============================================================================

/// HTTP transport using hyper-util with connection pooling, TLS pinning and
/// tower layers.
///
/// # Example
///
/// ```ignore
/// use courier::{HyperTransport, PinningPolicy};
///
/// let policy = PinningPolicy::from_json(include_str!("pins.json"))?;
/// let transport = HyperTransport::builder()
///     .pinning(policy)
///     .with_concurrency_limit(8)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    service: SyncService,
    config: TransportConfig,
    pinned: bool,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .field("pinned", &self.pinned)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a transport with default configuration and no pinning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the TLS configuration cannot be built.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// Create a new transport builder.
    #[must_use]
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::default()
    }

    /// Transport configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Returns `true` if handshakes go through a trust hook.
    #[must_use]
    pub const fn is_pinned(&self) -> bool {
        self.pinned
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: PreparedRequest) -> impl Future<Output = Result<RawResponse>> + Send {
        debug!(method = %request.method(), url = %request.url(), "transport send");
        self.service.call(request)
    }
}

impl Service<PreparedRequest> for HyperTransport {
    type Response = RawResponse;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: PreparedRequest) -> Self::Future {
        self.service.call(request)
    }
}

type LayerFn = Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>;

/// Builder for [`HyperTransport`].
#[derive(Default)]
pub struct HyperTransportBuilder {
    config: TransportConfigBuilder,
    trust: Option<Arc<dyn ServerTrust>>,
    layers: Vec<LayerFn>,
}

impl std::fmt::Debug for HyperTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransportBuilder")
            .field("config", &self.config)
            .field("trust", &self.trust)
            .field("layers_count", &self.layers.len())
            .finish()
    }
}

impl HyperTransportBuilder {
    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config = self.config.pool_idle_per_host(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.pool_idle_timeout(timeout);
        self
    }

    /// Replace the whole connection configuration.
    #[must_use]
    pub fn config(mut self, config: &TransportConfig) -> Self {
        self.config = TransportConfig::builder()
            .connect_timeout(config.connect_timeout)
            .pool_idle_per_host(config.pool_idle_per_host)
            .pool_idle_timeout(config.pool_idle_timeout);
        self
    }

    /// Pin server certificates. An empty policy keeps plain webpki validation.
    #[must_use]
    pub fn pinning(mut self, policy: PinningPolicy) -> Self {
        self.trust = if policy.is_empty() {
            None
        } else {
            Some(Arc::new(policy))
        };
        self
    }

    /// Consult a custom trust hook on every handshake.
    #[must_use]
    pub fn server_trust(mut self, trust: Arc<dyn ServerTrust>) -> Self {
        self.trust = Some(trust);
        self
    }

    /// Add a tower layer around the transport.
    ///
    /// Each layer wraps the ones added before it: the last added sees the
    /// request first.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<PreparedRequest, Response = RawResponse, Error = Error>
            + Clone
            + Send
            + 'static,
        <L::Service as Service<PreparedRequest>>::Future: Send,
    {
        self.layers.push(Arc::new(move |service| {
            BoxCloneService::new(layer.layer(service))
        }));
        self
    }

    /// Limit the number of requests in flight.
    #[must_use]
    pub fn with_concurrency_limit(self, max: usize) -> Self {
        self.layer(ConcurrencyLimitLayer::new(max))
    }

    /// Build the transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`] if the TLS configuration cannot be built.
    pub fn build(self) -> Result<HyperTransport> {
        let config = self.config.build();
        let pinned = self.trust.is_some();
        let raw = RawHyperTransport::new(&config, self.trust)?;

        let mut service: BoxedService = BoxCloneService::new(raw);
        for layer_fn in self.layers {
            service = layer_fn(service);
        }

        Ok(HyperTransport {
            service: SyncService::new(service),
            config,
            pinned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PinningRule, fingerprint};

    #[tokio::test]
    async fn transport_default() {
        let transport = HyperTransport::new().expect("transport");
        assert_eq!(transport.config().pool_idle_per_host, 32);
        assert!(!transport.is_pinned());
    }

    #[tokio::test]
    async fn transport_builder() {
        let policy = PinningPolicy::new(vec![PinningRule::new("h", [fingerprint(b"x")])]);
        let transport = HyperTransport::builder()
            .pool_idle_per_host(16)
            .connect_timeout(Duration::from_secs(1))
            .pinning(policy)
            .with_concurrency_limit(4)
            .build()
            .expect("transport");

        assert_eq!(transport.config().pool_idle_per_host, 16);
        assert_eq!(transport.config().connect_timeout, Duration::from_secs(1));
        assert!(transport.is_pinned());
    }

    #[tokio::test]
    async fn empty_policy_is_not_pinned() {
        let transport = HyperTransport::builder()
            .pinning(PinningPolicy::default())
            .build()
            .expect("transport");
        assert!(!transport.is_pinned());
    }

    #[tokio::test]
    async fn transport_is_debug() {
        let transport = HyperTransport::new().expect("transport");
        let debug = format!("{transport:?}");
        assert!(debug.contains("HyperTransport"));
    }

    #[test]
    fn error_chain_message_joins_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(error_chain_message(&inner), "refused");
    }
}
