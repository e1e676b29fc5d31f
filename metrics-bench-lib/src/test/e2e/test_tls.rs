use rama::{
    http::{
        BodyExtractExt as _, StatusCode,
        service::client::HttpClientExt as _,
    },
    telemetry::tracing,
};

use crate::test::e2e;

#[tokio::test]
#[tracing_test::traced_test]
async fn test_get_over_tls() {
    let runtime = e2e::runtime::get_tls().await;
    let url = runtime.bench_url("/");
    assert!(url.starts_with("https://"), "{url}");

    let resp = runtime.insecure_tls_client().get(url).send().await.unwrap();
    assert_eq!(StatusCode::OK, resp.status());

    let payload = resp.try_into_string().await.unwrap();
    assert_eq!(e2e::runtime::PAYLOAD_SIZE, payload.len());
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_self_signed_certificate_not_trusted() {
    let runtime = e2e::runtime::get_tls().await;

    let result = runtime.client().get(runtime.bench_url("/")).send().await;
    assert!(result.is_err());
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_plain_http_on_tls_port_fails() {
    let runtime = e2e::runtime::get_tls().await;

    let result = runtime
        .client()
        .get(format!("http://{}/", runtime.bench_socket_addr()))
        .send()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_metrics_stay_plain_http() {
    let runtime = e2e::runtime::get_tls().await;

    let resp = runtime
        .client()
        .get(runtime.metrics_url())
        .send()
        .await
        .unwrap();
    assert_eq!(StatusCode::OK, resp.status());
}
