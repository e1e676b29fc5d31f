use rama::{
    http::{
        BodyExtractExt as _, StatusCode,
        header::{CONTENT_TYPE, SERVER},
        service::client::HttpClientExt as _,
    },
    telemetry::tracing,
};

use crate::{http::MAX_BODY_SIZE, instrument::Backend, test::e2e};

#[tokio::test]
#[tracing_test::traced_test]
async fn test_get_synthesized_payload() {
    let runtime = e2e::runtime::get(Backend::Counters).await;
    let client = runtime.client();

    let resp = client
        .get(runtime.bench_url("/"))
        .send()
        .await
        .unwrap();

    assert_eq!(StatusCode::OK, resp.status());
    assert_eq!(
        "application/json",
        resp.headers().get(CONTENT_TYPE).unwrap()
    );
    assert!(resp.headers().contains_key(SERVER));

    let payload = resp.try_into_string().await.unwrap();
    assert_eq!(e2e::runtime::PAYLOAD_SIZE, payload.len());

    let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
    assert_eq!("50B", value["size"]);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_get_any_path() {
    let runtime = e2e::runtime::get(Backend::Counters).await;
    let client = runtime.client();

    let resp = client
        .get(runtime.bench_url("/some/path?with=query"))
        .send()
        .await
        .unwrap();

    assert_eq!(StatusCode::OK, resp.status());
    let payload = resp.try_into_string().await.unwrap();
    assert_eq!(e2e::runtime::PAYLOAD_SIZE, payload.len());
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_post_echo_json() {
    let runtime = e2e::runtime::get(Backend::Counters).await;
    let client = runtime.client();

    let resp = client
        .post(runtime.bench_url("/"))
        .header(CONTENT_TYPE, "application/json")
        .body(r#"{"a":1}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(StatusCode::OK, resp.status());
    assert_eq!(
        "application/json",
        resp.headers().get(CONTENT_TYPE).unwrap()
    );

    let payload = resp.try_into_string().await.unwrap();
    assert_eq!(r#"{"a":1}"#, payload);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_put_echo_without_content_type() {
    let runtime = e2e::runtime::get(Backend::Counters).await;
    let client = runtime.client();

    let resp = client
        .put(runtime.bench_url("/echo"))
        .body("plain bytes")
        .send()
        .await
        .unwrap();

    assert_eq!(StatusCode::OK, resp.status());
    assert!(resp.headers().get(CONTENT_TYPE).is_none());

    let payload = resp.try_into_string().await.unwrap();
    assert_eq!("plain bytes", payload);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_get_for_all_backends() {
    for backend in [
        Backend::Counters,
        Backend::Facade,
        Backend::Prometheus,
        Backend::Noop,
    ] {
        let runtime = e2e::runtime::get(backend).await;
        let client = runtime.client();

        let resp = client
            .get(runtime.bench_url("/"))
            .send()
            .await
            .unwrap();

        assert_eq!(StatusCode::OK, resp.status(), "backend: {backend:?}");
        let payload = resp.try_into_string().await.unwrap();
        assert_eq!(
            e2e::runtime::PAYLOAD_SIZE,
            payload.len(),
            "backend: {backend:?}"
        );
    }
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_connection_close_requested() {
    let runtime = e2e::runtime::get(Backend::Counters).await;

    let resp = e2e::client::send_raw_until_close(
        runtime.bench_socket_addr(),
        "GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert_eq!(200, resp.status_code);
    assert_eq!("OK", resp.reason_phrase);
    assert_eq!(Some("close"), resp.header("connection"));
    assert_eq!(e2e::runtime::PAYLOAD_SIZE, resp.body.len());
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_http10_without_keep_alive_closes() {
    let runtime = e2e::runtime::get(Backend::Counters).await;

    let resp = e2e::client::send_raw_until_close(
        runtime.bench_socket_addr(),
        "GET / HTTP/1.0\r\nHost: localhost\r\n\r\n",
    )
    .await;

    assert_eq!(200, resp.status_code);
    assert_eq!(Some("close"), resp.header("connection"));
    assert_eq!(e2e::runtime::PAYLOAD_SIZE, resp.body.len());
}

#[tokio::test]
#[tracing_test::traced_test]
async fn test_oversized_body_rejected() {
    let runtime = e2e::runtime::get(Backend::Counters).await;

    let request = format!(
        "POST / HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n",
        MAX_BODY_SIZE + 1
    );
    let resp = e2e::client::send_raw_until_close(runtime.bench_socket_addr(), &request).await;

    assert_eq!(413, resp.status_code);
    assert_eq!(Some("close"), resp.header("connection"));
    assert!(resp.body.is_empty());
}
