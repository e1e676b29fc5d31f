use std::{fmt, time::Instant};

use metrics::{Counter, Gauge, Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use rama::error::{BoxError, ErrorContext as _};

use super::{
    InstrumentationHooks, MetricsExport, MetricsExporter, STATUS_CLASSES, status_class_index,
};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Quantiles published for every summary.
const SUMMARY_QUANTILES: [f64; 5] = [0.5, 0.75, 0.95, 0.99, 0.999];

/// Buckets of the request size histogram, in bytes.
const REQUEST_SIZE_BUCKETS: [f64; 9] = [
    0.0, 64.0, 256.0, 1024.0, 4096.0, 16384.0, 65536.0, 262144.0, 1048576.0,
];

/// Hooks recording through the [`metrics`] facade.
///
/// Every instance owns a Prometheus recorder of its own, no global
/// recorder is installed. Timers and the response size are published
/// as summaries, the request size as a histogram.
#[derive(Clone)]
pub struct FacadeHooks {
    handle: PrometheusHandle,
    requests_total: Counter,
    inprogress_requests: Gauge,
    requests_latency: Histogram,
    sleep_time: Histogram,
    request_size: Histogram,
    response_size: Histogram,
    responses_by_class: [Counter; STATUS_CLASSES.len()],
}

impl fmt::Debug for FacadeHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacadeHooks").finish_non_exhaustive()
    }
}

impl FacadeHooks {
    pub fn try_new() -> Result<Self, BoxError> {
        let recorder = PrometheusBuilder::new()
            .set_quantiles(&SUMMARY_QUANTILES)
            .context("set summary quantiles")?
            .set_buckets_for_metric(
                Matcher::Full("request_size_bytes".to_owned()),
                &REQUEST_SIZE_BUCKETS,
            )
            .context("set request size buckets")?
            .build_recorder();
        let handle = recorder.handle();

        Ok(metrics::with_local_recorder(&recorder, move || {
            metrics::describe_counter!("requests_total", "Total number of requests.");
            metrics::describe_gauge!("inprogress_requests", "Number of requests in progress.");
            metrics::describe_histogram!(
                "requests_latency_seconds",
                Unit::Seconds,
                "Request latency, from first to last byte handled."
            );
            metrics::describe_histogram!(
                "sleep_time_seconds",
                Unit::Seconds,
                "Simulated processing time."
            );
            metrics::describe_histogram!(
                "request_size_bytes",
                Unit::Bytes,
                "Request body size."
            );
            metrics::describe_histogram!(
                "response_size_bytes",
                Unit::Bytes,
                "Response body size."
            );
            metrics::describe_counter!(
                "responses_total",
                "Total number of responses per status class."
            );

            Self {
                handle,
                requests_total: metrics::counter!("requests_total"),
                inprogress_requests: metrics::gauge!("inprogress_requests"),
                requests_latency: metrics::histogram!("requests_latency_seconds"),
                sleep_time: metrics::histogram!("sleep_time_seconds"),
                request_size: metrics::histogram!("request_size_bytes"),
                response_size: metrics::histogram!("response_size_bytes"),
                responses_by_class: STATUS_CLASSES
                    .map(|class| metrics::counter!("responses_total", "class" => class)),
            }
        }))
    }
}

impl InstrumentationHooks for FacadeHooks {
    type RequestToken = Instant;
    type SleepToken = Instant;

    fn on_request_start(&self, _method: &str, _uri: &str) -> Instant {
        self.requests_total.increment(1);
        self.inprogress_requests.increment(1.0);
        Instant::now()
    }

    fn on_request_end(&self, _method: &str, _uri: &str, status_code: u16, token: Instant) {
        self.requests_latency.record(token.elapsed());
        self.inprogress_requests.decrement(1.0);
        self.responses_by_class[status_class_index(status_code)].increment(1);
    }

    fn on_sleep_start(&self) -> Instant {
        Instant::now()
    }

    fn on_sleep_end(&self, token: Instant) {
        self.sleep_time.record(token.elapsed());
    }

    fn on_request_size(&self, size: usize) {
        self.request_size.record(size as f64);
    }

    fn on_response_size(&self, size: usize) {
        self.response_size.record(size as f64);
    }
}

impl MetricsExporter for FacadeHooks {
    fn export(&self) -> Result<MetricsExport, BoxError> {
        self.handle.run_upkeep();
        Ok(MetricsExport {
            content_type: CONTENT_TYPE,
            body: self.handle.render().into_bytes(),
        })
    }
}
