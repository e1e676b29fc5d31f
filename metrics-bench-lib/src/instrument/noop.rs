use rama::error::BoxError;

use super::{InstrumentationHooks, MetricsExport, MetricsExporter};

/// Hooks which record nothing.
///
/// Serves as the baseline against which the overhead
/// of the other backends is measured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl InstrumentationHooks for NoopHooks {
    type RequestToken = ();
    type SleepToken = ();

    #[inline(always)]
    fn on_request_start(&self, _method: &str, _uri: &str) {}

    #[inline(always)]
    fn on_request_end(&self, _method: &str, _uri: &str, _status_code: u16, _token: ()) {}

    #[inline(always)]
    fn on_sleep_start(&self) {}

    #[inline(always)]
    fn on_sleep_end(&self, _token: ()) {}

    #[inline(always)]
    fn on_request_size(&self, _size: usize) {}

    #[inline(always)]
    fn on_response_size(&self, _size: usize) {}
}

impl MetricsExporter for NoopHooks {
    fn export(&self) -> Result<MetricsExport, BoxError> {
        Ok(MetricsExport {
            content_type: "text/plain; charset=utf-8",
            body: Vec::new(),
        })
    }
}
