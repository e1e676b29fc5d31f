use ::prometheus::{
    Encoder as _, Histogram, HistogramOpts, HistogramTimer, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TEXT_FORMAT, TextEncoder, exponential_buckets,
};
use rama::error::{BoxError, ErrorContext as _};

use super::{
    InstrumentationHooks, MetricsExport, MetricsExporter, STATUS_CLASSES, status_class_index,
};

/// Hooks backed by a private Prometheus registry.
#[derive(Debug, Clone)]
pub struct PrometheusHooks {
    registry: Registry,
    requests_total: IntCounter,
    inprogress_requests: IntGauge,
    requests_latency: Histogram,
    sleep_time: Histogram,
    request_size: Histogram,
    response_size: Histogram,
    // label children resolved once, indexed by `status_class_index`
    responses_by_class: [IntCounter; STATUS_CLASSES.len()],
}

impl PrometheusHooks {
    pub fn try_new() -> Result<Self, BoxError> {
        let registry = Registry::new();

        let requests_total = IntCounter::new("requests_total", "Total number of requests.")
            .context("create requests_total counter")?;
        let inprogress_requests =
            IntGauge::new("inprogress_requests", "Number of requests in progress.")
                .context("create inprogress_requests gauge")?;

        let requests_latency = Histogram::with_opts(
            HistogramOpts::new(
                "requests_latency_seconds",
                "Request latency in seconds, from first to last byte handled.",
            )
            .buckets(exponential_buckets(0.000_1, 2.0, 18).context("latency buckets")?),
        )
        .context("create requests_latency_seconds histogram")?;
        let sleep_time = Histogram::with_opts(
            HistogramOpts::new("sleep_time_seconds", "Simulated processing time in seconds.")
                .buckets(exponential_buckets(0.001, 2.0, 16).context("sleep buckets")?),
        )
        .context("create sleep_time_seconds histogram")?;

        let size_buckets = exponential_buckets(64.0, 4.0, 10).context("size buckets")?;
        let request_size = Histogram::with_opts(
            HistogramOpts::new("request_size_bytes", "Request body size in bytes.")
                .buckets(size_buckets.clone()),
        )
        .context("create request_size_bytes histogram")?;
        let response_size = Histogram::with_opts(
            HistogramOpts::new("response_size_bytes", "Response body size in bytes.")
                .buckets(size_buckets),
        )
        .context("create response_size_bytes histogram")?;

        let responses_total = IntCounterVec::new(
            Opts::new("responses_total", "Total number of responses per status class."),
            &["class"],
        )
        .context("create responses_total counter vec")?;
        let responses_by_class =
            STATUS_CLASSES.map(|class| responses_total.with_label_values(&[class]));

        registry
            .register(Box::new(requests_total.clone()))
            .context("register requests_total")?;
        registry
            .register(Box::new(inprogress_requests.clone()))
            .context("register inprogress_requests")?;
        registry
            .register(Box::new(requests_latency.clone()))
            .context("register requests_latency_seconds")?;
        registry
            .register(Box::new(sleep_time.clone()))
            .context("register sleep_time_seconds")?;
        registry
            .register(Box::new(request_size.clone()))
            .context("register request_size_bytes")?;
        registry
            .register(Box::new(response_size.clone()))
            .context("register response_size_bytes")?;
        registry
            .register(Box::new(responses_total))
            .context("register responses_total")?;

        Ok(Self {
            registry,
            requests_total,
            inprogress_requests,
            requests_latency,
            sleep_time,
            request_size,
            response_size,
            responses_by_class,
        })
    }
}

impl InstrumentationHooks for PrometheusHooks {
    type RequestToken = HistogramTimer;
    type SleepToken = HistogramTimer;

    fn on_request_start(&self, _method: &str, _uri: &str) -> HistogramTimer {
        self.requests_total.inc();
        self.inprogress_requests.inc();
        self.requests_latency.start_timer()
    }

    fn on_request_end(&self, _method: &str, _uri: &str, status_code: u16, token: HistogramTimer) {
        token.observe_duration();
        self.inprogress_requests.dec();
        self.responses_by_class[status_class_index(status_code)].inc();
    }

    fn on_sleep_start(&self) -> HistogramTimer {
        self.sleep_time.start_timer()
    }

    fn on_sleep_end(&self, token: HistogramTimer) {
        token.observe_duration();
    }

    fn on_request_size(&self, size: usize) {
        self.request_size.observe(size as f64);
    }

    fn on_response_size(&self, size: usize) {
        self.response_size.observe(size as f64);
    }
}

impl MetricsExporter for PrometheusHooks {
    fn export(&self) -> Result<MetricsExport, BoxError> {
        let mut body = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut body)
            .context("encode prometheus metrics")?;
        Ok(MetricsExport {
            content_type: TEXT_FORMAT,
            body,
        })
    }
}
