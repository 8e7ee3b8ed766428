//! Prelude module for convenient imports.
//!
//! ```ignore
//! use courier_core::prelude::*;
//! ```

pub use crate::{
    DecodeIntent, Error, ErrorKind, ManagerConfig, Method, Parameters, Part, Pipeline,
    PinningPolicy, PinningRule, Request, RequestBuilder, RequestStage, Response, ResponseStage,
    Result, StageError, Transport, TrustDecision,
};
