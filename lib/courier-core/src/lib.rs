//! Core types, stage traits and pipeline engine for courier.
//!
//! This crate provides the foundational types used by courier:
//! - [`Request`] and [`RequestBuilder`] - logical request description
//! - [`PreparedRequest`] - resolved wire form of a request
//! - [`RawResponse`] and [`Response`] - transport output and staged response
//! - [`RequestStage`] and [`ResponseStage`] - pipeline extension points
//! - [`Pipeline`] - the stage engine
//! - [`Transport`] - the dispatch seam
//! - [`PinningPolicy`] - certificate pinning rules
//! - [`Error`] and [`Result`] - error handling

mod body;
mod config;
mod decode;
mod error;
mod method;
mod multipart;
mod pinning;
mod pipeline;
mod prepare;
pub mod prelude;
mod request;
mod response;
mod stage;
mod transport;

pub use body::{ContentType, JsonParams, Parameters, from_json, to_json, to_query_string};
pub use config::{ManagerConfig, ManagerConfigBuilder};
pub use decode::{DecodeError, DecodeIntent, DecodeTarget, Model, locate};
pub use error::{BoxError, Error, ErrorKind, Result, StageError, StagePhase};
pub use method::Method;
pub use multipart::{Multipart, Part};
pub use pinning::{
    PinningDenied, PinningPolicy, PinningRule, ServerTrust, TrustDecision, fingerprint,
};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use prepare::{PreparedRequest, merge_headers, prepare, resolve_url};
pub use request::{Request, RequestBuilder};
pub use response::{RawResponse, Response};
pub use stage::{
    RequestStage, RequestStageFn, ResponseStage, ResponseStageFn, request_stage_fn,
    response_stage_fn,
};
pub use transport::Transport;

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
