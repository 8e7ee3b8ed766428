//! Pipeline engine.
//!
//! A [`Pipeline`] holds two immutable stage chains shared behind `Arc`, so
//! one pipeline can serve any number of concurrent calls.
//!
//! A call runs in four steps:
//!
//! 1. request stages, in registration order
//! 2. preparation (URL, headers, body, timeouts)
//! 3. dispatch through a [`Transport`]
//! 4. response stages, in registration order
//!
//! When a step fails the error is routed through
//! [`ResponseStage::transform_error`]: on every response stage for failures
//! up to and including dispatch, or on the stages strictly after the failing
//! one for response stage failures. Each call receives the previous output
//! and the last output is returned to the caller.

use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::sync::Arc;

use futures_util::future::{self, Either};
use tracing::{debug, trace};

use crate::{
    Error, ManagerConfig, Request, RequestStage, Response, ResponseStage, Result, StagePhase,
    Transport, prepare,
};

/// Ordered request and response stage chains.
#[derive(Clone, Default)]
pub struct Pipeline {
    request_stages: Arc<[Arc<dyn RequestStage>]>,
    response_stages: Arc<[Arc<dyn ResponseStage>]>,
}

impl Pipeline {
    /// Create a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// Registered request stages.
    #[must_use]
    pub fn request_stages(&self) -> &[Arc<dyn RequestStage>] {
        &self.request_stages
    }

    /// Registered response stages.
    #[must_use]
    pub fn response_stages(&self) -> &[Arc<dyn ResponseStage>] {
        &self.response_stages
    }

    /// Run `request` through the stages and `transport`.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing step, as rewritten by the
    /// response stages.
    pub async fn execute<T>(
        &self,
        transport: &T,
        config: &ManagerConfig,
        request: Request,
    ) -> Result<Response>
    where
        T: Transport,
    {
        self.execute_with_cancel(transport, config, request, future::pending())
            .await
    }

    /// Like [`execute`](Self::execute), but `cancel` completing during
    /// dispatch fails the call with [`Error::Cancelled`].
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn execute_with_cancel<T, C>(
        &self,
        transport: &T,
        config: &ManagerConfig,
        mut request: Request,
        cancel: C,
    ) -> Result<Response>
    where
        T: Transport,
        C: Future<Output = ()> + Send,
    {
        request.resolve_log_enabled(config.log_enabled);

        for (index, stage) in self.request_stages.iter().enumerate() {
            let last_good = request.clone();
            trace!(index, stage = stage.name(), "request stage");
            match stage.transform(request) {
                Ok(next) => request = next,
                Err(source) => {
                    debug!(index, stage = stage.name(), error = %source, "request stage failed");
                    let error = Error::stage(StagePhase::Request, index, stage.name(), source);
                    return Err(self.propagate(error, &last_good, 0));
                }
            }
        }

        let prepared = match prepare(&request, config) {
            Ok(prepared) => prepared,
            Err(error) => {
                debug!(path = request.path(), %error, "request preparation failed");
                return Err(self.propagate(error, &request, 0));
            }
        };

        debug!(method = %prepared.method(), url = %prepared.url(), "dispatching request");
        request.mark_started(prepared.clone());
        let outcome = {
            let send = pin!(transport.send(prepared));
            let cancel = pin!(cancel);
            match future::select(send, cancel).await {
                Either::Left((outcome, _)) => outcome,
                Either::Right(((), _)) => Err(Error::Cancelled),
            }
        };
        request.mark_finished();
        let request = Arc::new(request);

        let raw = match outcome {
            Ok(raw) => raw,
            Err(error) => {
                debug!(%error, "dispatch failed");
                return Err(self.propagate(error, &request, 0));
            }
        };
        debug!(status = raw.status(), elapsed = ?request.duration(), "response received");

        let mut response = Response::new(Arc::clone(&request), raw);
        for (index, stage) in self.response_stages.iter().enumerate() {
            trace!(index, stage = stage.name(), "response stage");
            match stage.transform_response(response, &request) {
                Ok(next) => response = next,
                Err(source) => {
                    debug!(index, stage = stage.name(), error = %source, "response stage failed");
                    let error = Error::stage(StagePhase::Response, index, stage.name(), source);
                    return Err(self.propagate(error, &request, index + 1));
                }
            }
        }

        Ok(response)
    }

    fn propagate(&self, error: Error, request: &Request, from: usize) -> Error {
        self.response_stages
            .iter()
            .skip(from)
            .fold(error, |error, stage| stage.transform_error(error, request))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let request_stages: Vec<_> = self.request_stages.iter().map(|s| s.name()).collect();
        let response_stages: Vec<_> = self.response_stages.iter().map(|s| s.name()).collect();
        f.debug_struct("Pipeline")
            .field("request_stages", &request_stages)
            .field("response_stages", &response_stages)
            .finish()
    }
}

/// Builder for [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    request_stages: Vec<Arc<dyn RequestStage>>,
    response_stages: Vec<Arc<dyn ResponseStage>>,
}

impl PipelineBuilder {
    /// Append a request stage.
    #[must_use]
    pub fn request_stage<S: RequestStage + 'static>(mut self, stage: S) -> Self {
        self.request_stages.push(Arc::new(stage));
        self
    }

    /// Append a shared request stage.
    #[must_use]
    pub fn request_stage_arc(mut self, stage: Arc<dyn RequestStage>) -> Self {
        self.request_stages.push(stage);
        self
    }

    /// Append a response stage.
    #[must_use]
    pub fn response_stage<S: ResponseStage + 'static>(mut self, stage: S) -> Self {
        self.response_stages.push(Arc::new(stage));
        self
    }

    /// Append a shared response stage.
    #[must_use]
    pub fn response_stage_arc(mut self, stage: Arc<dyn ResponseStage>) -> Self {
        self.response_stages.push(stage);
        self
    }

    /// Freeze the stage chains.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            request_stages: self.request_stages.into(),
            response_stages: self.response_stages.into(),
        }
    }
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("request_stages", &self.request_stages.len())
            .field("response_stages", &self.response_stages.len())
            .finish()
    }
}
