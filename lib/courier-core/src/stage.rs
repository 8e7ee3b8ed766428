//! Request and response stage traits.
//!
//! Stages are synchronous and run in registration order. A request stage
//! rewrites the logical [`Request`] before it is prepared; a response stage
//! rewrites the [`Response`] after dispatch and may also rewrite the error of
//! a failed call.
//!
//! # Example
//!
//! ```
//! use courier_core::{Request, RequestStage, StageError};
//!
//! #[derive(Debug)]
//! struct ApiVersion(&'static str);
//!
//! impl RequestStage for ApiVersion {
//!     fn name(&self) -> &str {
//!         "api-version"
//!     }
//!
//!     fn transform(&self, mut request: Request) -> Result<Request, StageError> {
//!         request.set_header("X-Api-Version", self.0);
//!         Ok(request)
//!     }
//! }
//! ```

use std::fmt;

use crate::{Error, Request, Response, StageError};

/// Rewrites the logical request before preparation.
pub trait RequestStage: Send + Sync {
    /// Name used in errors and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Transform the request.
    ///
    /// # Errors
    ///
    /// An error stops the request phase; nothing is dispatched.
    fn transform(&self, request: Request) -> Result<Request, StageError>;
}

/// Rewrites the response, or the error of a failed call.
pub trait ResponseStage: Send + Sync {
    /// Name used in errors and logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Transform a response. `request` is the request as dispatched.
    ///
    /// # Errors
    ///
    /// An error stops the response phase; the following stages only see it
    /// through [`transform_error`](Self::transform_error).
    fn transform_response(
        &self,
        response: Response,
        request: &Request,
    ) -> Result<Response, StageError> {
        let _ = request;
        Ok(response)
    }

    /// Transform the error of a failed call. Returns it unchanged by default.
    fn transform_error(&self, error: Error, request: &Request) -> Error {
        let _ = request;
        error
    }
}

/// Request stage built from a closure, see [`request_stage_fn`].
#[derive(Clone)]
pub struct RequestStageFn<F> {
    name: String,
    f: F,
}

/// Create a request stage from a closure.
///
/// # Example
///
/// ```
/// use courier_core::{Request, StageError, request_stage_fn};
///
/// let stage = request_stage_fn("trace-id", |mut request: Request| {
///     request.set_header("X-Trace-Id", "abc");
///     Ok::<_, StageError>(request)
/// });
/// ```
pub fn request_stage_fn<F>(name: impl Into<String>, f: F) -> RequestStageFn<F>
where
    F: Fn(Request) -> Result<Request, StageError> + Send + Sync,
{
    RequestStageFn {
        name: name.into(),
        f,
    }
}

impl<F> RequestStage for RequestStageFn<F>
where
    F: Fn(Request) -> Result<Request, StageError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, request: Request) -> Result<Request, StageError> {
        (self.f)(request)
    }
}

impl<F> fmt::Debug for RequestStageFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestStageFn")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Response stage built from a closure, see [`response_stage_fn`].
#[derive(Clone)]
pub struct ResponseStageFn<F> {
    name: String,
    f: F,
}

/// Create a response stage from a closure. Errors pass through unchanged.
pub fn response_stage_fn<F>(name: impl Into<String>, f: F) -> ResponseStageFn<F>
where
    F: Fn(Response, &Request) -> Result<Response, StageError> + Send + Sync,
{
    ResponseStageFn {
        name: name.into(),
        f,
    }
}

impl<F> ResponseStage for ResponseStageFn<F>
where
    F: Fn(Response, &Request) -> Result<Response, StageError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transform_response(
        &self,
        response: Response,
        request: &Request,
    ) -> Result<Response, StageError> {
        (self.f)(response, request)
    }
}

impl<F> fmt::Debug for ResponseStageFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStageFn")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
