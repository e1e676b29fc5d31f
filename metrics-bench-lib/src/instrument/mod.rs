//! Instrumentation hooks invoked around every request.
//!
//! The request pipeline owns no metrics state: it only calls into an
//! [`InstrumentationHooks`] implementation, which makes each metrics
//! backend a drop-in replacement for another. Backends are picked at
//! startup using [`Backend`].

use std::sync::Arc;

use rama::error::BoxError;

mod counters;
mod facade;
mod noop;
mod prometheus;

pub use self::{
    counters::CounterHooks, facade::FacadeHooks, noop::NoopHooks, prometheus::PrometheusHooks,
};

/// Lifecycle callbacks a metrics backend implements.
///
/// Hooks are pure observers and are called concurrently from many requests.
/// Start hooks return a token which is handed back, untouched, to the paired
/// end hook. The pipeline never inspects these tokens.
pub trait InstrumentationHooks: Send + Sync + 'static {
    /// Correlation handle for the span of a whole request.
    type RequestToken: Send + 'static;
    /// Correlation handle for the simulated sleep.
    type SleepToken: Send + 'static;

    /// Called once per request, before any decision is made.
    fn on_request_start(&self, method: &str, uri: &str) -> Self::RequestToken;

    /// Called exactly once per request, regardless of how the request exits.
    fn on_request_end(&self, method: &str, uri: &str, status_code: u16, token: Self::RequestToken);

    /// Called right before the simulated sleep. Never called for a zero sleep.
    fn on_sleep_start(&self) -> Self::SleepToken;

    /// Called once the sleep ended, also when it ended early.
    fn on_sleep_end(&self, token: Self::SleepToken);

    /// Size in bytes of the request body.
    fn on_request_size(&self, size: usize);

    /// Size in bytes of the response body.
    fn on_response_size(&self, size: usize);
}

impl<H: InstrumentationHooks> InstrumentationHooks for Arc<H> {
    type RequestToken = H::RequestToken;
    type SleepToken = H::SleepToken;

    #[inline(always)]
    fn on_request_start(&self, method: &str, uri: &str) -> Self::RequestToken {
        (**self).on_request_start(method, uri)
    }

    #[inline(always)]
    fn on_request_end(&self, method: &str, uri: &str, status_code: u16, token: Self::RequestToken) {
        (**self).on_request_end(method, uri, status_code, token)
    }

    #[inline(always)]
    fn on_sleep_start(&self) -> Self::SleepToken {
        (**self).on_sleep_start()
    }

    #[inline(always)]
    fn on_sleep_end(&self, token: Self::SleepToken) {
        (**self).on_sleep_end(token)
    }

    #[inline(always)]
    fn on_request_size(&self, size: usize) {
        (**self).on_request_size(size)
    }

    #[inline(always)]
    fn on_response_size(&self, size: usize) {
        (**self).on_response_size(size)
    }
}

/// Snapshot of a backend's metrics, in the backend's own format.
#[derive(Debug, Clone)]
pub struct MetricsExport {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Renders the metrics collected by a backend, served on the metrics port.
pub trait MetricsExporter: Send + Sync + 'static {
    fn export(&self) -> Result<MetricsExport, BoxError>;
}

impl<E: MetricsExporter> MetricsExporter for Arc<E> {
    #[inline(always)]
    fn export(&self) -> Result<MetricsExport, BoxError> {
        (**self).export()
    }
}

/// The metrics backends this server can be instrumented with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Backend {
    /// Counters, timers and HDR histograms; exported as JSON.
    #[default]
    Counters,
    /// `metrics` facade with a Prometheus recorder, timers and summaries;
    /// exported in the Prometheus text format.
    Facade,
    /// Prometheus client registry; exported in the Prometheus text format.
    Prometheus,
    /// No metrics at all, measures the bare request path.
    Noop,
}

impl Backend {
    /// Offset added to the configured (non-zero) ports,
    /// so that one server per backend can run side by side.
    pub const fn port_offset(self) -> u16 {
        match self {
            Backend::Counters => 0,
            Backend::Facade => 1,
            Backend::Prometheus => 2,
            Backend::Noop => 3,
        }
    }

    /// Apply [`Self::port_offset`] to a port, keeping `0` (ephemeral port) as-is.
    pub fn offset_port(self, port: u16) -> u16 {
        if port == 0 {
            0
        } else {
            port.saturating_add(self.port_offset())
        }
    }
}

/// Classify a status code as a success (1xx-3xx) or failure.
pub(crate) fn is_success_status(status_code: u16) -> bool {
    (100..400).contains(&status_code)
}

/// Label values of the per status class response counters.
pub(crate) const STATUS_CLASSES: [&str; 6] = ["1xx", "2xx", "3xx", "4xx", "5xx", "other"];

/// Index into [`STATUS_CLASSES`].
pub(crate) fn status_class_index(status_code: u16) -> usize {
    match status_code {
        100..=599 => (status_code / 100 - 1) as usize,
        _ => STATUS_CLASSES.len() - 1,
    }
}
