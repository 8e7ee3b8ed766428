//! Transport trait.

use std::future::Future;

use crate::{PreparedRequest, RawResponse, Result};

/// Delivers a prepared request and returns the raw response.
///
/// This is the only suspension point of a pipeline call. Implementations
/// own connection pooling, TLS and timeouts; the pipeline never retries.
pub trait Transport: Send + Sync {
    /// Send the request.
    ///
    /// # Errors
    ///
    /// Returns a dispatch error (connection, TLS, timeout, invalid response)
    /// or [`Error::PinningDenied`](crate::Error::PinningDenied).
    fn send(&self, request: PreparedRequest) -> impl Future<Output = Result<RawResponse>> + Send;
}

impl<T: Transport> Transport for &T {
    fn send(&self, request: PreparedRequest) -> impl Future<Output = Result<RawResponse>> + Send {
        (**self).send(request)
    }
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(&self, request: PreparedRequest) -> impl Future<Output = Result<RawResponse>> + Send {
        (**self).send(request)
    }
}
