use std::sync::Arc;

use rama::{
    Layer as _,
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    http::{
        HeaderValue,
        layer::{required_header::AddRequiredResponseHeadersLayer, trace::TraceLayer},
        server::HttpServer,
    },
    net::stream::layer::http::BodyLimitLayer,
    rt::Executor,
    tcp::server::TcpListener,
    telemetry::tracing,
    tls::boring::server::TlsAcceptorLayer,
};

use crate::{
    cli::Args,
    http::{BenchHttpService, MAX_BODY_SIZE},
    instrument::InstrumentationHooks,
    pipeline::RequestPipeline,
    utils::env::server_identifier,
};

/// Runs the HTTP(S) server which hands every request to the [`RequestPipeline`].
///
/// With a TLS acceptor all connections are expected to be TLS,
/// there is no plain-text fallback on the same port.
///
/// No idle timeout is applied to connections: load generators keep
/// connections alive for the full duration of a benchmark run.
pub async fn run_bench_server<H: InstrumentationHooks>(
    args: Args,
    guard: ShutdownGuard,
    tls_acceptor: Option<TlsAcceptorLayer>,
    pipeline: Arc<RequestPipeline<H>>,
) -> Result<(), BoxError> {
    let exec = Executor::graceful(guard);

    let tcp_listener = TcpListener::bind(args.bench_interface(), exec.clone())
        .await
        .context("bind bench http(s) server")?;

    let bench_addr = tcp_listener
        .local_addr()
        .context("get bound address for bench http(s) server")?;

    let http_svc = (
        TraceLayer::new_for_http(),
        AddRequiredResponseHeadersLayer::new()
            .with_server_header_value(HeaderValue::from_static(server_identifier())),
    )
        .into_layer(BenchHttpService::new(pipeline));

    let http_server = HttpServer::auto(exec).service(Arc::new(http_svc));

    tracing::info!(
        server.address = %bench_addr,
        tls = tls_acceptor.is_some(),
        backend = ?args.backend,
        "bench http(s) server ready",
    );
    crate::server::write_server_socket_address_as_file(&args.data, "bench", bench_addr.into())
        .await?;

    let body_limit = BodyLimitLayer::symmetric(MAX_BODY_SIZE);
    match tls_acceptor {
        Some(tls_acceptor) => {
            tcp_listener
                .serve(body_limit.into_layer(tls_acceptor.into_layer(http_server)))
                .await
        }
        None => tcp_listener.serve(body_limit.into_layer(http_server)).await,
    }

    Ok(())
}
