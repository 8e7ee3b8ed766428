//! Response decoding stage.

use tracing::trace;

use crate::{Request, Response, ResponseStage, StageError};

/// Decodes successful responses according to the request's
/// [`DecodeIntent`](crate::DecodeIntent).
///
/// Responses without an intent, or with a status outside `[200, 300)`, pass
/// through untouched. A body that is not JSON leaves the model unset unless a
/// target type was declared, in which case the stage fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeStage {
    _private: (),
}

impl DecodeStage {
    /// Create a new decode stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseStage for DecodeStage {
    fn name(&self) -> &str {
        "decode"
    }

    fn transform_response(
        &self,
        mut response: Response,
        request: &Request,
    ) -> Result<Response, StageError> {
        let Some(intent) = request.decode() else {
            return Ok(response);
        };
        if !response.succeed() {
            return Ok(response);
        }

        let document = match serde_json::from_slice(response.body()) {
            Ok(document) => document,
            Err(_) if intent.target().is_none() => {
                trace!(path = request.path(), "body is not JSON, no model");
                return Ok(response);
            }
            Err(err) => return Err(StageError::with_source("response body is not JSON", err)),
        };

        let model = intent.decode(document).map_err(StageError::from_error)?;
        response.set_model(model);
        Ok(response)
    }
}
