//! Metrics stage using the metrics crate facade.
//!
//! Records exchange metrics through the `metrics` crate, so any installed
//! recorder (Prometheus, `StatsD`, ...) receives them.

use crate::{Error, Request, Response, ResponseStage, StageError};

/// Labels used for metrics.
const LABEL_METHOD: &str = "method";
const LABEL_STATUS: &str = "status";

/// Metric names.
const METRIC_REQUESTS_TOTAL: &str = "http_client_requests_total";
const METRIC_REQUEST_DURATION: &str = "http_client_request_duration_seconds";

/// Response stage that records HTTP metrics.
///
/// Records the following metrics:
/// - `http_client_requests_total` (counter): number of exchanges, labeled by method and status
/// - `http_client_request_duration_seconds` (histogram): dispatch duration in seconds
///
/// Failed exchanges are counted with the status label `error`.
///
/// # Example
///
/// ```ignore
/// use courier::{Manager, stage::MetricsStage};
///
/// let manager = Manager::builder()
///     .response_stage(MetricsStage::new())
///     .build()?;
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsStage {
    _private: (),
}

impl MetricsStage {
    /// Create a new metrics stage.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl ResponseStage for MetricsStage {
    fn name(&self) -> &str {
        "metrics"
    }

    fn transform_response(
        &self,
        response: Response,
        request: &Request,
    ) -> Result<Response, StageError> {
        let method = request.method().to_string();

        metrics::histogram!(METRIC_REQUEST_DURATION, LABEL_METHOD => method.clone())
            .record(response.duration().as_secs_f64());
        metrics::counter!(
            METRIC_REQUESTS_TOTAL,
            LABEL_METHOD => method,
            LABEL_STATUS => response.status().to_string()
        )
        .increment(1);

        Ok(response)
    }

    fn transform_error(&self, error: Error, request: &Request) -> Error {
        let method = request.method().to_string();

        if let Some(start) = request.started_at() {
            let end = request.finished_at().unwrap_or_else(std::time::Instant::now);
            metrics::histogram!(METRIC_REQUEST_DURATION, LABEL_METHOD => method.clone())
                .record(end.saturating_duration_since(start).as_secs_f64());
        }
        metrics::counter!(
            METRIC_REQUESTS_TOTAL,
            LABEL_METHOD => method,
            LABEL_STATUS => "error"
        )
        .increment(1);

        error
    }
}
