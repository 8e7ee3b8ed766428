//! Basic authentication stage.
//!
//! Adds an `Authorization: Basic <base64(user:pass)>` header to every
//! outgoing request.

use std::sync::Arc;

use base64::Engine;

use crate::{Request, RequestStage, StageError};

/// Request stage that adds basic authentication.
#[derive(Clone)]
pub struct BasicAuthStage {
    /// Base64-encoded "username:password".
    encoded_credentials: Arc<str>,
}

impl BasicAuthStage {
    /// Create a new basic auth stage with the given username and password.
    pub fn new(username: impl AsRef<str>, password: impl AsRef<str>) -> Self {
        let credentials = format!("{}:{}", username.as_ref(), password.as_ref());
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
        Self {
            encoded_credentials: Arc::from(encoded),
        }
    }
}

impl std::fmt::Debug for BasicAuthStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuthStage").finish_non_exhaustive()
    }
}

impl RequestStage for BasicAuthStage {
    fn name(&self) -> &str {
        "basic-auth"
    }

    fn transform(&self, mut request: Request) -> Result<Request, StageError> {
        request.set_header(
            "Authorization",
            format!("Basic {}", self.encoded_credentials),
        );
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Method;

    #[test]
    fn basic_auth_encodes_correctly() {
        // "user:pass" -> "dXNlcjpwYXNz"
        let stage = BasicAuthStage::new("user", "pass");
        assert_eq!(&*stage.encoded_credentials, "dXNlcjpwYXNz");
    }

    #[test]
    fn adds_authorization_header() {
        let stage = BasicAuthStage::new("user", "pass");
        let request = stage
            .transform(Request::builder(Method::Get, "/").build())
            .expect("transform");
        assert_eq!(request.header("authorization"), Some("Basic dXNlcjpwYXNz"));
    }
}
