//! Prelude module for convenient imports.
//!
//! ```ignore
//! use courier::prelude::*;
//! ```

pub use crate::{
    DecodeIntent, Error, Manager, Method, Model, Parameters, Part, PinningPolicy, PinningRule,
    Request, RequestBuilder, RequestStage, Response, ResponseStage, Result, StageError,
    StatusCode, header, request_stage_fn, response_stage_fn,
};
pub use serde::{Deserialize, Serialize};
