//! The request manager: configuration, stages and transport in one handle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::TransportConfig;
use crate::stage::{DecodeStage, LogStage};
use crate::transport::{HyperTransport, HyperTransportBuilder};
use crate::{
    ManagerConfig, ManagerConfigBuilder, PinningPolicy, Pipeline, PipelineBuilder, Request,
    RequestStage, Response, ResponseStage, Result, ServerTrust, Transport,
};

/// Executes requests through a fixed stage pipeline and transport.
///
/// A manager is cheap to clone and safe to share between tasks: the
/// configuration and the stage chains are immutable once built.
///
/// # Example
///
/// ```ignore
/// use courier::prelude::*;
///
/// let manager = Manager::builder()
///     .base_url("https://api.example.com")
///     .with_defaults()
///     .build()?;
///
/// let request = Request::builder(Method::Get, "/v1/users")
///     .decode(DecodeIntent::of::<Vec<User>>().at("data.rows"))
///     .build();
/// let response = manager.execute(request).await?;
/// let users = response.model_as::<Vec<User>>();
/// ```
#[derive(Debug, Clone)]
pub struct Manager<T = HyperTransport> {
    config: Arc<ManagerConfig>,
    pipeline: Pipeline,
    transport: T,
}

impl Manager {
    /// Create a new manager builder.
    #[must_use]
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::default()
    }
}

impl<T: Transport> Manager<T> {
    /// Run `request` through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step, as rewritten by the
    /// response stages.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.pipeline
            .execute(&self.transport, &self.config, request)
            .await
    }

    /// Run `request`, failing with [`Error::Cancelled`](crate::Error::Cancelled)
    /// if `cancel` completes during dispatch.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn execute_with_cancel<C>(&self, request: Request, cancel: C) -> Result<Response>
    where
        C: Future<Output = ()> + Send,
    {
        self.pipeline
            .execute_with_cancel(&self.transport, &self.config, request, cancel)
            .await
    }

    /// Manager defaults.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Stage chains.
    #[must_use]
    pub const fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }
}

/// Builder for [`Manager`].
#[derive(Debug, Default)]
pub struct ManagerBuilder {
    config: ManagerConfigBuilder,
    pipeline: PipelineBuilder,
    transport: HyperTransportBuilder,
    use_defaults: bool,
}

impl ManagerBuilder {
    /// Set the base URL prepended to relative paths.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config = self.config.base_url(base_url);
        self
    }

    /// Set the default request timeout (10 s if unset).
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Set the default resource timeout (60 s if unset).
    #[must_use]
    pub fn resource_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.resource_timeout(timeout);
        self
    }

    /// Set the default log flag (off if unset).
    #[must_use]
    pub fn log_enabled(mut self, enabled: bool) -> Self {
        self.config = self.config.log_enabled(enabled);
        self
    }

    /// Add a header sent with every request.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.header(name, value);
        self
    }

    /// Append a request stage.
    #[must_use]
    pub fn request_stage<S: RequestStage + 'static>(mut self, stage: S) -> Self {
        self.pipeline = self.pipeline.request_stage(stage);
        self
    }

    /// Append a response stage.
    #[must_use]
    pub fn response_stage<S: ResponseStage + 'static>(mut self, stage: S) -> Self {
        self.pipeline = self.pipeline.response_stage(stage);
        self
    }

    /// Register [`LogStage`] and [`DecodeStage`] ahead of the other response stages.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.use_defaults = true;
        self
    }

    /// Pin server certificates.
    #[must_use]
    pub fn pinning(mut self, policy: PinningPolicy) -> Self {
        self.transport = self.transport.pinning(policy);
        self
    }

    /// Consult a custom trust hook on every handshake.
    #[must_use]
    pub fn server_trust(mut self, trust: Arc<dyn ServerTrust>) -> Self {
        self.transport = self.transport.server_trust(trust);
        self
    }

    /// Set connection pool settings.
    #[must_use]
    pub fn transport_config(mut self, config: &TransportConfig) -> Self {
        self.transport = self.transport.config(config);
        self
    }

    /// Customize the transport (layers, pool settings).
    #[must_use]
    pub fn transport(
        mut self,
        f: impl FnOnce(HyperTransportBuilder) -> HyperTransportBuilder,
    ) -> Self {
        self.transport = f(self.transport);
        self
    }

    /// Build a manager over a [`HyperTransport`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tls`](crate::Error::Tls) if the TLS configuration cannot be built.
    pub fn build(self) -> Result<Manager> {
        let transport = self.transport.build()?;
        let (config, pipeline) = Self::finish(self.config, self.pipeline, self.use_defaults);
        Ok(Manager {
            config,
            pipeline,
            transport,
        })
    }

    /// Build a manager over a custom transport. Transport settings are ignored.
    #[must_use]
    pub fn build_with_transport<T: Transport>(self, transport: T) -> Manager<T> {
        let (config, pipeline) = Self::finish(self.config, self.pipeline, self.use_defaults);
        Manager {
            config,
            pipeline,
            transport,
        }
    }

    fn finish(
        config: ManagerConfigBuilder,
        pipeline: PipelineBuilder,
        use_defaults: bool,
    ) -> (Arc<ManagerConfig>, Pipeline) {
        let pipeline = pipeline.build();
        let pipeline = if use_defaults {
            let mut builder = Pipeline::builder()
                .response_stage(LogStage::new())
                .response_stage(DecodeStage::new());
            for stage in pipeline.request_stages() {
                builder = builder.request_stage_arc(Arc::clone(stage));
            }
            for stage in pipeline.response_stages() {
                builder = builder.response_stage_arc(Arc::clone(stage));
            }
            builder.build()
        } else {
            pipeline
        };
        (Arc::new(config.build()), pipeline)
    }
}
