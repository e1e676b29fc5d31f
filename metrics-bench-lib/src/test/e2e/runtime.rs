use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock, OnceLock},
    time::Duration,
};

use clap::{Parser, ValueEnum as _};
use rama::{
    Service,
    error::BoxError,
    http::{Request, Response},
    net::address::SocketAddress,
};
use tempfile::TempDir;

use crate::{cli::Args, instrument::Backend};

/// Payload size all e2e servers are configured with.
pub(super) const PAYLOAD_SIZE: usize = 50;

/// Sleep time of the [random status](get_random_status) server.
pub(super) const RANDOM_STATUS_SLEEP_TIME_MS: u64 = 20;

#[derive(Clone)]
pub(super) struct Runtime {
    _app: App,

    tls: bool,
    bench_addr: SocketAddress,
    metrics_addr: SocketAddress,
}

impl Runtime {
    #[inline(always)]
    pub fn bench_socket_addr(&self) -> SocketAddress {
        self.bench_addr
    }

    #[inline(always)]
    pub fn metrics_socket_addr(&self) -> SocketAddress {
        self.metrics_addr
    }

    #[inline(always)]
    pub fn bench_url(&self, path: &str) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}{path}", self.bench_addr)
    }

    #[inline(always)]
    pub fn metrics_url(&self) -> String {
        format!("http://{}/metrics", self.metrics_addr)
    }

    #[inline(always)]
    pub fn client(&self) -> impl Service<Request, Output = Response, Error = BoxError> {
        super::client::new_web_client()
    }

    #[inline(always)]
    pub fn insecure_tls_client(&self) -> impl Service<Request, Output = Response, Error = BoxError> {
        super::client::new_web_client_insecure_tls()
    }
}

#[derive(Clone)]
struct App {
    data_dir: Arc<TempDir>,
    tls: bool,
}

/// Get the (lazily spawned) app instrumented with the given backend,
/// shared by all tests of this process.
pub(super) async fn get(backend: Backend) -> Runtime {
    static COUNTERS: LazyLock<App> = LazyLock::new(|| App::new(Backend::Counters, &[]));
    static FACADE: LazyLock<App> = LazyLock::new(|| App::new(Backend::Facade, &[]));
    static PROMETHEUS: LazyLock<App> = LazyLock::new(|| App::new(Backend::Prometheus, &[]));
    static NOOP: LazyLock<App> = LazyLock::new(|| App::new(Backend::Noop, &[]));

    let app = match backend {
        Backend::Counters => COUNTERS.clone(),
        Backend::Facade => FACADE.clone(),
        Backend::Prometheus => PROMETHEUS.clone(),
        Backend::Noop => NOOP.clone(),
    };

    wait_for_runtime(app).await
}

/// Get the (lazily spawned) counters app which answers with a random
/// status code after a fixed sleep of [`RANDOM_STATUS_SLEEP_TIME_MS`].
pub(super) async fn get_random_status() -> Runtime {
    static RANDOM_STATUS: LazyLock<App> = LazyLock::new(|| {
        App::new(
            Backend::Counters,
            &[
                "--random-status-code",
                "--sleep-time",
                &RANDOM_STATUS_SLEEP_TIME_MS.to_string(),
            ],
        )
    });

    wait_for_runtime(RANDOM_STATUS.clone()).await
}

/// Get the (lazily spawned) counters app serving the bench port over TLS.
pub(super) async fn get_tls() -> Runtime {
    static TLS: LazyLock<App> = LazyLock::new(|| App::new(Backend::Counters, &["--enable-ssl"]));

    wait_for_runtime(TLS.clone()).await
}

async fn wait_for_runtime(app: App) -> Runtime {
    let data_dir = app.data_dir.path();
    let (bench_addr, metrics_addr) = tokio::try_join!(
        tokio::time::timeout(
            Duration::from_secs(30),
            read_file_or_wait(data_dir.join("bench.addr.txt"))
        ),
        tokio::time::timeout(
            Duration::from_secs(30),
            read_file_or_wait(data_dir.join("metrics.addr.txt"))
        ),
    )
    .unwrap();

    let runtime = Runtime {
        tls: app.tls,
        _app: app,
        bench_addr,
        metrics_addr,
    };

    assert!(runtime.bench_socket_addr().ip_addr.is_loopback());
    assert!(runtime.metrics_socket_addr().ip_addr.is_loopback());
    assert_ne!(runtime.bench_socket_addr(), runtime.metrics_socket_addr());

    runtime
}

async fn read_file_or_wait(path: PathBuf) -> SocketAddress {
    loop {
        match tokio::fs::read_to_string(&path).await {
            Ok(s) => match s.trim().parse() {
                Ok(addr) => return addr,
                Err(err) => {
                    // file might be created but not yet written
                    eprintln!("unexpected error parsing socket addr (content={s:?}): {err}");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
}

impl App {
    fn new(backend: Backend, extra_args: &[&str]) -> Self {
        let tls = extra_args.contains(&"--enable-ssl");
        let data_dir = spawn_metrics_bench_app(backend, extra_args);
        Self {
            data_dir: Arc::new(data_dir),
            tls,
        }
    }
}

fn spawn_metrics_bench_app(backend: Backend, extra_args: &[&str]) -> TempDir {
    let backend_name = backend
        .to_possible_value()
        .expect("backend to have a cli value")
        .get_name()
        .to_owned();

    let data_dir = tempfile::Builder::new()
        .prefix(&format!("metrics_bench_e2e_{backend_name}_"))
        .tempdir()
        .unwrap();
    eprintln!(
        "metrics_bench_e2e ({backend_name}, {extra_args:?}) all data stored under: {:?}",
        data_dir.path()
    );

    let args = try_parse_args(&backend_name, data_dir.path(), extra_args);

    let wait_server_ready = Arc::new(OnceLock::new());
    let notify_server_ready = wait_server_ready.clone();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let server_future = crate::cli::run_with_args(std::future::pending::<()>(), args);

        notify_server_ready.set(()).expect("waiter to be notified");

        rt.block_on(server_future).expect("serve without errors");
    });

    wait_server_ready.wait();

    data_dir
}

fn try_parse_args(backend_name: &str, data_dir: &Path, extra_args: &[&str]) -> Args {
    let data_dir = data_dir.display().to_string();
    let payload_size = PAYLOAD_SIZE.to_string();

    let mut args = vec![
        crate::utils::env::project_name(),
        "--address",
        "127.0.0.1",
        "--port",
        "0",
        "--metrics-port",
        "0",
        "--backend",
        backend_name,
        "--payload-size",
        &payload_size,
        "--data",
        &data_dir,
        "--graceful",
        "0.42",
    ];
    args.extend_from_slice(extra_args);

    Args::try_parse_from(args).unwrap()
}
