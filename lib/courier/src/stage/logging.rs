//! Request/response logging stage.
//!
//! Logs each exchange using the `tracing` crate when the request's effective
//! log flag is set. The `debug` output renders the request as a `curl`
//! command that can be replayed from a shell.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::{Error, Method, Request, Response, ResponseStage, StageError};

/// Bodies longer than this are truncated in logs.
const MAX_LOGGED_BODY: usize = 10_240;
/// Number of characters kept from a truncated body.
const TRUNCATED_BODY: usize = 512;

/// Response stage that logs exchanges and failures.
///
/// Never changes the response or the error.
///
/// # Example
///
/// ```ignore
/// use courier::{Manager, stage::LogStage};
///
/// let manager = Manager::builder()
///     .log_enabled(true)
///     .response_stage(LogStage::new())
///     .build()?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStage {
    _private: (),
}

impl LogStage {
    /// Create a new logging stage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseStage for LogStage {
    fn name(&self) -> &str {
        "log"
    }

    fn transform_response(
        &self,
        response: Response,
        request: &Request,
    ) -> Result<Response, StageError> {
        if request.is_log_enabled() {
            let elapsed_ms = duration_ms(response.duration());
            let status = response.status();
            if response.succeed() {
                info!(
                    method = %request.method(),
                    path = request.path(),
                    status,
                    elapsed_ms,
                    "request completed"
                );
            } else {
                warn!(
                    method = %request.method(),
                    path = request.path(),
                    status,
                    elapsed_ms,
                    "request failed with HTTP error"
                );
            }
            debug!("\n{}", exchange_log(request, &response));
        }
        Ok(response)
    }

    fn transform_error(&self, error: Error, request: &Request) -> Error {
        if request.is_log_enabled() {
            let elapsed_ms = request.started_at().map(|start| duration_ms(start.elapsed()));
            warn!(
                method = %request.method(),
                path = request.path(),
                elapsed_ms,
                error = %error,
                "request failed"
            );
            debug!("\n{}\n------Error\n{error}\nEnd<<<<<<<<<<", curl_command(request));
        }
        error
    }
}

fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Render `request` as a `curl` command.
///
/// Uses the prepared wire form when available, the logical request
/// otherwise. Headers are sorted by name.
#[must_use]
pub fn curl_command(request: &Request) -> String {
    let (method, url, headers, body) = match request.prepared() {
        Some(prepared) => (
            prepared.method(),
            prepared.url().to_string(),
            prepared.headers(),
            prepared
                .body()
                .map(|body| String::from_utf8_lossy(body).into_owned()),
        ),
        None => (
            request.method(),
            request.path().to_string(),
            request.headers(),
            None,
        ),
    };

    let mut lines = vec![format!("curl -X {method} '{url}'")];
    let sorted: BTreeMap<_, _> = headers.iter().collect();
    for (name, value) in sorted {
        lines.push(format!(" -H '{name}: {value}'"));
    }
    if !matches!(method, Method::Get | Method::Head) {
        lines.push(format!(" -d '{}'", body.unwrap_or_default()));
    }
    lines.join(" \\\n")
}

/// Render the full exchange: the `curl` command, status and body.
#[must_use]
pub fn exchange_log(request: &Request, response: &Response) -> String {
    let mut log = curl_command(request);
    log.push_str(&format!(
        "\n------Response: {}ms\nStatusCode: {}\n",
        duration_ms(response.duration()),
        response.status()
    ));
    log.push_str(&truncate_body(&String::from_utf8_lossy(response.body())));
    log.push_str("\nEnd<<<<<<<<<<");
    log
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_LOGGED_BODY {
        body.chars().take(TRUNCATED_BODY).collect()
    } else {
        body.to_string()
    }
}
