use std::{sync::Arc, time::Duration};

use rama::{
    Layer as _,
    error::{BoxError, ErrorContext as _},
    graceful::ShutdownGuard,
    http::{
        Body, HeaderValue, Response, StatusCode,
        header::CONTENT_TYPE,
        headers::{ContentLength, HeaderMapExt as _},
        layer::{required_header::AddRequiredResponseHeadersLayer, trace::TraceLayer},
        server::HttpServer,
        service::web::{Router, response::IntoResponse as _},
    },
    layer::TimeoutLayer,
    rt::Executor,
    tcp::server::TcpListener,
    telemetry::tracing,
};

use crate::{
    cli::Args,
    instrument::{MetricsExport, MetricsExporter},
    utils::env::server_identifier,
};

/// Path on which the metrics of the active backend are exposed.
pub const METRICS_PATH: &str = "/metrics";

/// Runs the (plain-text) HTTP server exposing the metrics
/// collected by the active backend.
pub async fn run_metrics_server<E: MetricsExporter + Clone>(
    args: Args,
    guard: ShutdownGuard,
    exporter: E,
) -> Result<(), BoxError> {
    let http_router = Router::new()
        .with_get("/ping", "pong")
        .with_get(METRICS_PATH, move || {
            std::future::ready(metrics_response(&exporter))
        });

    let http_svc = (
        TraceLayer::new_for_http(),
        AddRequiredResponseHeadersLayer::new()
            .with_server_header_value(HeaderValue::from_static(server_identifier())),
    )
        .into_layer(http_router);

    let exec = Executor::graceful(guard);
    let http_server = HttpServer::auto(exec.clone()).service(Arc::new(http_svc));

    let tcp_svc = TimeoutLayer::new(Duration::from_secs(60)).into_layer(http_server);

    let tcp_listener = TcpListener::bind(args.metrics_interface(), exec)
        .await
        .context("bind metrics http server")?;

    let metrics_addr = tcp_listener
        .local_addr()
        .context("get bound address for metrics http server")?;

    tracing::info!(
        server.address = %metrics_addr,
        backend = ?args.backend,
        "metrics http server ready: http://{metrics_addr}{METRICS_PATH}",
    );
    crate::server::write_server_socket_address_as_file(&args.data, "metrics", metrics_addr.into())
        .await?;

    tcp_listener.serve(tcp_svc).await;

    Ok(())
}

fn metrics_response(exporter: &impl MetricsExporter) -> Response {
    match exporter.export() {
        Ok(MetricsExport { content_type, body }) => {
            let body_size = body.len();
            let mut resp = Response::new(Body::from(body));
            let headers = resp.headers_mut();
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
            headers.typed_insert(ContentLength(body_size as u64));
            resp
        }
        Err(err) => {
            tracing::error!("failed to export metrics: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
