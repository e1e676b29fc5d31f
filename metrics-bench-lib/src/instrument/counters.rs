use std::{
    sync::atomic::{AtomicI64, AtomicU64, Ordering},
    time::{Duration, Instant},
};

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use rama::error::{BoxError, ErrorContext as _};
use serde::Serialize;

use super::{InstrumentationHooks, MetricsExport, MetricsExporter, is_success_status};

/// Highest trackable duration, in microseconds (one hour).
const MAX_DURATION_US: u64 = 60 * 60 * 1_000_000;
/// Highest trackable body size, in bytes (1 GiB).
const MAX_SIZE_BYTES: u64 = 1024 * 1024 * 1024;
const SIGNIFICANT_FIGURES: u8 = 3;

/// Hooks backed by atomic counters and HDR histograms,
/// in the spirit of a dropwizard metric registry.
///
/// Durations are recorded in microseconds, sizes in bytes.
/// Values above the trackable maximum are clamped to it.
#[derive(Debug)]
pub struct CounterHooks {
    started: Instant,
    requests_total: AtomicU64,
    inprogress_requests: AtomicI64,
    requests_succeeded: AtomicU64,
    requests_failed: AtomicU64,
    requests_latency: Distribution,
    sleep_time: Distribution,
    request_size: Distribution,
    response_size: Distribution,
}

impl CounterHooks {
    pub fn try_new() -> Result<Self, BoxError> {
        Ok(Self {
            started: Instant::now(),
            requests_total: AtomicU64::new(0),
            inprogress_requests: AtomicI64::new(0),
            requests_succeeded: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            requests_latency: Distribution::try_new(MAX_DURATION_US)
                .context("create request latency histogram")?,
            sleep_time: Distribution::try_new(MAX_DURATION_US)
                .context("create sleep time histogram")?,
            request_size: Distribution::try_new(MAX_SIZE_BYTES)
                .context("create request size histogram")?,
            response_size: Distribution::try_new(MAX_SIZE_BYTES)
                .context("create response size histogram")?,
        })
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        let uptime = self.started.elapsed();
        let requests_succeeded = self.requests_succeeded.load(Ordering::Relaxed);

        let success_rate_per_second = match uptime.as_secs_f64() {
            secs if secs > 0.0 => requests_succeeded as f64 / secs,
            _ => 0.0,
        };

        CountersSnapshot {
            uptime_seconds: uptime.as_secs_f64(),
            requests_total: self.requests_total.load(Ordering::Relaxed),
            inprogress_requests: self.inprogress_requests.load(Ordering::Relaxed),
            requests_succeeded,
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            success_rate_per_second,
            requests_latency_us: self.requests_latency.snapshot(),
            sleep_time_us: self.sleep_time.snapshot(),
            request_size_bytes: self.request_size.snapshot(),
            response_size_bytes: self.response_size.snapshot(),
        }
    }
}

impl InstrumentationHooks for CounterHooks {
    type RequestToken = Instant;
    type SleepToken = Instant;

    fn on_request_start(&self, _method: &str, _uri: &str) -> Instant {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.inprogress_requests.fetch_add(1, Ordering::Relaxed);
        Instant::now()
    }

    fn on_request_end(&self, _method: &str, _uri: &str, status_code: u16, token: Instant) {
        self.requests_latency.record(duration_micros(token.elapsed()));
        self.inprogress_requests.fetch_sub(1, Ordering::Relaxed);
        if is_success_status(status_code) {
            self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_sleep_start(&self) -> Instant {
        Instant::now()
    }

    fn on_sleep_end(&self, token: Instant) {
        self.sleep_time.record(duration_micros(token.elapsed()));
    }

    fn on_request_size(&self, size: usize) {
        self.request_size.record(size as u64);
    }

    fn on_response_size(&self, size: usize) {
        self.response_size.record(size as u64);
    }
}

impl MetricsExporter for CounterHooks {
    fn export(&self) -> Result<MetricsExport, BoxError> {
        let body = serde_json::to_vec(&self.snapshot()).context("serialize counters snapshot")?;
        Ok(MetricsExport {
            content_type: "application/json",
            body,
        })
    }
}

fn duration_micros(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}

/// HDR histogram of a series of recorded values.
#[derive(Debug)]
struct Distribution(Mutex<Histogram<u64>>);

impl Distribution {
    fn try_new(max_value: u64) -> Result<Self, BoxError> {
        let histogram = Histogram::new_with_max(max_value, SIGNIFICANT_FIGURES)
            .context("create hdr histogram")
            .context_field("max_value", max_value)?;
        Ok(Self(Mutex::new(histogram)))
    }

    fn record(&self, value: u64) {
        self.0.lock().saturating_record(value);
    }

    fn snapshot(&self) -> DistributionSnapshot {
        let histogram = self.0.lock();
        if histogram.is_empty() {
            return DistributionSnapshot::default();
        }
        DistributionSnapshot {
            count: histogram.len(),
            min: histogram.min(),
            max: histogram.max(),
            mean: histogram.mean(),
            stddev: histogram.stdev(),
            p50: histogram.value_at_quantile(0.5),
            p75: histogram.value_at_quantile(0.75),
            p95: histogram.value_at_quantile(0.95),
            p99: histogram.value_at_quantile(0.99),
            p999: histogram.value_at_quantile(0.999),
        }
    }
}

/// Count, extremes and percentiles of a [`Distribution`].
///
/// Values are exact up to 2048, above that within 0.1%.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistributionSnapshot {
    pub count: u64,
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub stddev: f64,
    pub p50: u64,
    pub p75: u64,
    pub p95: u64,
    pub p99: u64,
    pub p999: u64,
}

/// Point-in-time view of [`CounterHooks`], as exported on the metrics port.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountersSnapshot {
    pub uptime_seconds: f64,
    pub requests_total: u64,
    pub inprogress_requests: i64,
    pub requests_succeeded: u64,
    pub requests_failed: u64,
    pub success_rate_per_second: f64,
    pub requests_latency_us: DistributionSnapshot,
    pub sleep_time_us: DistributionSnapshot,
    pub request_size_bytes: DistributionSnapshot,
    pub response_size_bytes: DistributionSnapshot,
}
