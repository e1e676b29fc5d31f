use std::{net::IpAddr, path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use rama::{
    error::{BoxError, ErrorContext as _},
    graceful::{self, ShutdownGuard},
    net::{address::SocketAddress, socket::Interface},
    telemetry::tracing::{self, Instrument as _},
    tls::boring::server::TlsAcceptorLayer,
};

use crate::{
    config::HandlerConfig,
    instrument::{
        Backend, CounterHooks, FacadeHooks, InstrumentationHooks, MetricsExporter, NoopHooks,
        PrometheusHooks,
    },
    pipeline::RequestPipeline,
    server, tls, utils,
};

pub const DEFAULT_PORT: u16 = 8688;
pub const DEFAULT_METRICS_PORT: u16 = 9797;

/// CLI arguments for configuring the bench server.
#[derive(Debug, Clone, Parser)]
#[command(name = "metrics-bench")]
#[command(bin_name = "metrics-bench")]
#[command(version, about, long_about = None)]
pub struct Args {
    /// IP address to bind the bench and metrics servers to
    #[arg(long, short = 'a', value_name = "IP", default_value = "0.0.0.0")]
    pub address: IpAddr,

    /// port of the bench http(s) server (0 = ephemeral);
    /// a non-zero port is offset per backend
    #[arg(long, short = 'p', default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// port of the metrics http server (0 = ephemeral);
    /// a non-zero port is offset per backend
    #[arg(long, default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// metrics backend to instrument requests with
    #[arg(long, value_enum, default_value_t = Backend::Counters)]
    pub backend: Backend,

    /// serve the bench server over TLS, using a generated self-signed certificate
    #[arg(long = "enable-ssl", default_value_t = false)]
    pub enable_ssl: bool,

    /// accepted for compatibility only: connections are accepted
    /// by a single listener task per server
    #[arg(long, value_name = "N")]
    pub boss_threads: Option<usize>,

    /// number of async runtime worker threads (unset or 0: one per CPU core)
    #[arg(long, value_name = "N")]
    pub worker_threads: Option<usize>,

    #[command(flatten)]
    pub handler: HandlerConfig,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,

    /// enable pretty logging (format for humans)
    #[arg(long, default_value_t = false)]
    pub pretty: bool,

    /// directory in which the bound server addresses are written
    #[arg(long, short = 'D', default_value = ".metrics-bench")]
    pub data: PathBuf,

    /// write the tracing output to the provided (log) file instead of stderr
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "SECONDS", default_value_t = 1.)]
    /// the graceful shutdown timeout (<= 0.0 = no timeout)
    pub graceful: f64,

    #[cfg(target_family = "unix")]
    /// Set the limit of max open file descriptors for this process and its children.
    #[arg(long, value_name = "N", default_value_t = 262_144)]
    pub ulimit: utils::os::rlim_t,
}

impl Args {
    /// Interface of the bench server, with the backend port offset applied.
    pub fn bench_interface(&self) -> Interface {
        Interface::Address(SocketAddress::new(
            self.address,
            self.backend.offset_port(self.port),
        ))
    }

    /// Interface of the metrics server, with the backend port offset applied.
    pub fn metrics_interface(&self) -> Interface {
        Interface::Address(SocketAddress::new(
            self.address,
            self.backend.offset_port(self.metrics_port),
        ))
    }
}

/// Runs the bench and metrics servers and blocks until
/// a critical error occurs or the (graceful) shutdown has been initiated.
///
/// This entry point is used by both the (binary) `main` function as well as
/// for the e2e test suite found in the test module.
pub async fn run_with_args<F>(base_shutdown_signal: F, args: Args) -> Result<(), BoxError>
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    tokio::fs::create_dir_all(&args.data)
        .await
        .context("create data directory")
        .with_context_debug_field("path", || args.data.clone())?;

    tracing::info!(
        port = args.backend.offset_port(args.port),
        metrics_port = args.backend.offset_port(args.metrics_port),
        backend = ?args.backend,
        boss_threads = ?args.boss_threads,
        worker_threads = ?args.worker_threads,
        enable_ssl = args.enable_ssl,
        sleep_time_ms = args.handler.sleep_time_ms,
        random_sleep = args.handler.random_sleep,
        payload_size_bytes = args.handler.payload_size_bytes,
        random_payload = args.handler.random_payload,
        random_status_code = args.handler.random_status_code,
        "starting {}", utils::env::server_identifier(),
    );
    if let Some(boss_threads) = args.boss_threads {
        tracing::debug!(
            "boss threads ({boss_threads}) ignored: connections are accepted by one task per listener"
        );
    }

    let graceful_timeout = (args.graceful > 0.).then(|| Duration::from_secs_f64(args.graceful));

    let tls_acceptor = if args.enable_ssl {
        Some(tls::new_self_signed_tls_acceptor_layer().context("prepare TLS acceptor")?)
    } else {
        None
    };

    let (error_tx, error_rx) = tokio::sync::mpsc::channel::<BoxError>(1);
    let graceful = graceful::Shutdown::new(wait_for_shutdown(error_rx, base_shutdown_signal));

    match args.backend {
        Backend::Counters => {
            let hooks = CounterHooks::try_new().context("create counter metrics")?;
            spawn_servers(&graceful, args, error_tx, tls_acceptor, hooks)
        }
        Backend::Facade => {
            let hooks = FacadeHooks::try_new().context("create facade metrics")?;
            spawn_servers(&graceful, args, error_tx, tls_acceptor, hooks)
        }
        Backend::Prometheus => {
            let hooks = PrometheusHooks::try_new().context("create prometheus metrics")?;
            spawn_servers(&graceful, args, error_tx, tls_acceptor, hooks)
        }
        Backend::Noop => spawn_servers(&graceful, args, error_tx, tls_acceptor, NoopHooks),
    }

    let delay = match graceful_timeout {
        Some(duration) => graceful.shutdown_with_limit(duration).await?,
        None => graceful.shutdown().await,
    };

    tracing::info!("gracefully shutdown with a delay of: {delay:?}");
    Ok(())
}

fn spawn_servers<H>(
    graceful: &graceful::Shutdown,
    args: Args,
    error_tx: tokio::sync::mpsc::Sender<BoxError>,
    tls_acceptor: Option<TlsAcceptorLayer>,
    hooks: H,
) where
    H: InstrumentationHooks + MetricsExporter,
{
    let hooks = Arc::new(hooks);
    let pipeline = Arc::new(RequestPipeline::new(
        Arc::new(args.handler.clone()),
        hooks.clone(),
    ));

    graceful.spawn_task_fn({
        let args = args.clone();
        let error_tx = error_tx.clone();
        move |guard| run_metrics_server(args, guard, error_tx, hooks)
    });

    graceful.spawn_task_fn(move |guard| {
        run_bench_server(args, guard, error_tx, tls_acceptor, pipeline)
    });
}

async fn run_metrics_server<E: MetricsExporter + Clone>(
    args: Args,
    guard: ShutdownGuard,
    error_tx: tokio::sync::mpsc::Sender<BoxError>,
    exporter: E,
) {
    tracing::info!("spawning metrics http server...");
    if let Err(err) = server::run_metrics_server(args, guard, exporter)
        .instrument(tracing::debug_span!(
            "metrics server lifetime",
            server.service.name = format!("{}-metrics", utils::env::project_name()),
            otel.kind = "server",
            network.protocol.name = "http",
        ))
        .await
    {
        tracing::error!("metrics server exited with an error: {err}");
        let _ = error_tx.send(err).await;
    }
}

async fn run_bench_server<H: InstrumentationHooks>(
    args: Args,
    guard: ShutdownGuard,
    error_tx: tokio::sync::mpsc::Sender<BoxError>,
    tls_acceptor: Option<TlsAcceptorLayer>,
    pipeline: Arc<RequestPipeline<H>>,
) {
    tracing::info!("spawning bench http(s) server...");
    if let Err(err) = server::run_bench_server(args, guard, tls_acceptor, pipeline)
        .instrument(tracing::debug_span!(
            "bench server lifetime",
            server.service.name = utils::env::project_name(),
            otel.kind = "server",
            network.protocol.name = "http",
        ))
        .await
    {
        tracing::error!("bench server exited with an error: {err}");
        let _ = error_tx.send(err).await;
    }
}

/// Resolves on the base shutdown signal, or as soon as
/// one of the servers reports a fatal error.
async fn wait_for_shutdown<F>(mut error_rx: tokio::sync::mpsc::Receiver<BoxError>, signal: F)
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    tokio::pin!(signal);

    // a closed error channel disables its branch, leaving only the signal
    tokio::select! {
        _ = &mut signal => {
            tracing::info!("shutdown signal received: init graceful shutdown");
        }
        Some(err) = error_rx.recv() => {
            tracing::error!("server failed, init graceful shutdown: {err}");
        }
    }
}
