use rama::{
    error::{BoxError, ErrorContext as _},
    graceful,
};

use metrics_bench_lib::{
    cli::{Args, run_with_args},
    utils::{self, telemetry::TelemetryConfig},
};

use clap::Parser;

#[cfg(target_family = "unix")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    utils::telemetry::init_tracing(Some(TelemetryConfig {
        verbose: args.verbose,
        pretty: args.pretty,
        output: args.output.as_deref(),
    }))?;

    #[cfg(target_family = "unix")]
    utils::os::raise_nofile(args.ulimit).context("set file descriptor limit")?;

    let mut rt_builder = tokio::runtime::Builder::new_multi_thread();
    if let Some(worker_threads) = args.worker_threads.filter(|n| *n > 0) {
        rt_builder.worker_threads(worker_threads);
    }
    let rt = rt_builder
        .thread_name("metrics-bench-worker")
        .enable_all()
        .build()
        .context("build async runtime")?;

    if let Err(err) = rt.block_on(async move {
        let base_shutdown_signal = graceful::default_signal();
        run_with_args(base_shutdown_signal, args).await
    }) {
        eprintln!("🚩 exit with error: {err}");
        std::process::exit(1);
    }

    Ok(())
}
