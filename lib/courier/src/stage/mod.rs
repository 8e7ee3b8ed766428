//! Built-in request and response stages.
//!
//! Stages are registered on the [`ManagerBuilder`](crate::ManagerBuilder) and
//! run in registration order. A response stage also sees every failure that
//! happened before it, through
//! [`ResponseStage::transform_error`](crate::ResponseStage::transform_error).
//!
//! # Feature Flags
//!
//! Some stages pull extra dependencies and are feature-gated:
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `stage-basic-auth` | `BasicAuthStage` |
//! | `stage-decompression` | `DecompressionStage` |
//! | `stage-metrics` | `MetricsStage` |
//! | `stages-full` | All stages |
//!
//! # Available Stages
//!
//! - [`LogStage`] - Logs exchanges using `tracing`, with a replayable `curl` command
//! - [`DecodeStage`] - Decodes JSON bodies according to the request's decode intent
//! - [`BearerAuthStage`] - Adds `Authorization: Bearer <token>` header
//! - `BasicAuthStage` - Adds `Authorization: Basic <base64>` header
//! - `DecompressionStage` - Negotiates and undoes gzip, deflate, br and zstd
//! - `MetricsStage` - Records HTTP metrics (counters, histograms)
//!
//! [`LogStage`] and [`DecodeStage`] are the defaults installed by
//! [`ManagerBuilder::with_defaults`](crate::ManagerBuilder::with_defaults).

#[cfg(feature = "stage-basic-auth")]
mod basic_auth;
mod bearer_auth;
mod decode;
#[cfg(feature = "stage-decompression")]
mod decompression;
mod logging;
#[cfg(feature = "stage-metrics")]
mod metrics;

#[cfg(feature = "stage-basic-auth")]
pub use basic_auth::BasicAuthStage;
pub use bearer_auth::BearerAuthStage;
pub use decode::DecodeStage;
#[cfg(feature = "stage-decompression")]
pub use decompression::DecompressionStage;
pub use logging::{LogStage, curl_command, exchange_log};
#[cfg(feature = "stage-metrics")]
pub use metrics::MetricsStage;
