use std::path::Path;

use rama::{
    error::{BoxError, ErrorContext as _},
    net::address::SocketAddress,
};

mod bench;
mod metrics;

pub use self::{bench::run_bench_server, metrics::run_metrics_server};

/// Write the bound address of a server to `<dir>/<name>.addr.txt`,
/// so that load generators (and the e2e tests) can find ephemeral ports.
pub async fn write_server_socket_address_as_file(
    dir: &Path,
    name: &str,
    addr: SocketAddress,
) -> Result<(), BoxError> {
    let path = dir.join(format!("{name}.addr.txt"));
    tokio::fs::write(&path, addr.to_string())
        .await
        .context("write server's socket address to file")
        .context_field("address", addr)
        .with_context_debug_field("path", || path.to_owned())
}
