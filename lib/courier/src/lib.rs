//! Staged HTTP client with certificate pinning.
//!
//! A [`Manager`] runs every request through a fixed pipeline: request stages
//! rewrite the logical [`Request`], the transport dispatches its prepared
//! form, then response stages transform the [`Response`]. When any step
//! fails, the error flows through the response stages' error handlers
//! instead.
//!
//! HTTPS connections can be restricted to known certificates with a
//! [`PinningPolicy`], or with any custom [`ServerTrust`] hook.
//!
//! # Example
//!
//! ```ignore
//! use courier::prelude::*;
//! use courier::stage::BearerAuthStage;
//!
//! #[derive(Debug, Deserialize)]
//! pub struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! let manager = Manager::builder()
//!     .base_url("https://api.example.com")
//!     .with_defaults()
//!     .request_stage(BearerAuthStage::new("my-token"))
//!     .pinning(PinningPolicy::from_json(include_str!("pins.json"))?)
//!     .build()?;
//!
//! let request = Request::builder(Method::Get, "/users")
//!     .decode(DecodeIntent::of::<Vec<User>>().at("data.rows"))
//!     .build();
//! let response = manager.execute(request).await?;
//! let users = response.model_as::<Vec<User>>();
//! ```

mod config;
mod manager;
pub mod prelude;
pub mod stage;
pub mod tls;
mod transport;

// Re-export manager and transport types
pub use config::{TransportConfig, TransportConfigBuilder};
pub use manager::{Manager, ManagerBuilder};
pub use transport::{BoxedService, HyperTransport, HyperTransportBuilder, ServiceFuture};

// Re-export tower for layer composition
pub use tower;

// Re-export core types
pub use courier_core::{
    BoxError, ContentType, DecodeError, DecodeIntent, DecodeTarget, Error, ErrorKind, JsonParams,
    ManagerConfig, ManagerConfigBuilder, Method, Model, Multipart, Parameters, Part, PinningDenied,
    PinningPolicy, PinningRule, Pipeline, PipelineBuilder, PreparedRequest, RawResponse, Request,
    RequestBuilder, RequestStage, RequestStageFn, Response, ResponseStage, ResponseStageFn,
    Result, ServerTrust, StageError, StagePhase, Transport, TrustDecision, fingerprint, from_json,
    locate, merge_headers, prepare, request_stage_fn, resolve_url, response_stage_fn, to_json,
    to_query_string,
};

// Re-export http types for status codes and headers
pub use courier_core::{StatusCode, header};
