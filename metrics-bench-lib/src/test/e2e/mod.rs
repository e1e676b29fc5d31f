#![allow(unused)]

mod client;
mod runtime;

mod test_bench;
mod test_tls;

use rama::telemetry::tracing;

use crate::instrument::Backend;

#[tokio::test]
#[tracing_test::traced_test]
async fn test_runtime_get() {
    // simple test to ensure that creating and getting runtime works,
    // outside out of any other things that might otherwise go wrong

    let runtime = self::runtime::get(Backend::Counters).await;
    assert!(runtime.bench_socket_addr().ip_addr.is_loopback());
    assert!(runtime.metrics_socket_addr().ip_addr.is_loopback());
    assert_ne!(runtime.bench_socket_addr(), runtime.metrics_socket_addr());
}
