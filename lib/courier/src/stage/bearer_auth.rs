//! Bearer token authentication stage.
//!
//! Adds an `Authorization: Bearer <token>` header to every outgoing request.

use std::sync::Arc;

use crate::{Request, RequestStage, StageError};

/// Request stage that adds bearer token authentication.
///
/// # Example
///
/// ```ignore
/// use courier::{Manager, stage::BearerAuthStage};
///
/// let manager = Manager::builder()
///     .request_stage(BearerAuthStage::new("my-secret-token"))
///     .build()?;
/// ```
#[derive(Clone)]
pub struct BearerAuthStage {
    token: Arc<str>,
}

impl BearerAuthStage {
    /// Create a new bearer auth stage with the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Arc::from(token.into()),
        }
    }
}

impl std::fmt::Debug for BearerAuthStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuthStage")
            .field("token", &"***")
            .finish()
    }
}

impl RequestStage for BearerAuthStage {
    fn name(&self) -> &str {
        "bearer-auth"
    }

    fn transform(&self, mut request: Request) -> Result<Request, StageError> {
        request.set_header("Authorization", format!("Bearer {}", self.token));
        Ok(request)
    }
}
