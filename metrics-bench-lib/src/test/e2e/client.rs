use std::{sync::Arc, time::Duration};

use rama::{
    Layer as _, Service,
    error::BoxError,
    http::{
        Request, Response, client::EasyHttpWebClient,
        layer::map_request_body::MapRequestBodyLayer,
    },
    layer::TimeoutLayer,
    net::{address::SocketAddress, tls::client::ServerVerifyMode},
    rt::Executor,
    tls::boring::client::TlsConnectorDataBuilder,
};
use tokio::{
    io::{AsyncReadExt as _, AsyncWriteExt as _},
    net::TcpStream,
};

/// Http client without proxy support, verifying server certificates.
pub fn new_web_client() -> impl Service<Request, Output = Response, Error = BoxError> {
    new_web_client_inner(None)
}

/// Http client which accepts any server certificate,
/// such as the self-signed one of the bench server.
pub fn new_web_client_insecure_tls() -> impl Service<Request, Output = Response, Error = BoxError>
{
    let tls_config = Arc::new(
        TlsConnectorDataBuilder::new_http_auto().with_server_verify_mode(ServerVerifyMode::Disable),
    );
    new_web_client_inner(Some(tls_config))
}

fn new_web_client_inner(
    tls_config: Option<Arc<TlsConnectorDataBuilder>>,
) -> impl Service<Request, Output = Response, Error = BoxError> {
    let inner_http_client = EasyHttpWebClient::connector_builder()
        .with_default_transport_connector()
        .without_tls_proxy_support()
        .without_proxy_support()
        .with_tls_support_using_boringssl(tls_config)
        .with_default_http_connector(Executor::default())
        .try_with_default_connection_pool()
        .expect("create connection pool for e2e web client")
        .build_client();

    (
        TimeoutLayer::new(Duration::from_secs(30)),
        MapRequestBodyLayer::new_boxed_streaming_body(),
    )
        .into_layer(inner_http_client)
}

/// Http/1 response as it was read from the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub version: String,
    pub status_code: u16,
    pub reason_phrase: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Write the raw request on a fresh connection and read until the server closes it.
///
/// Panics when the server does not close the connection within a few seconds.
pub async fn send_raw_until_close(addr: SocketAddress, request: &str) -> RawResponse {
    let mut stream = TcpStream::connect((addr.ip_addr, addr.port)).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("server to close the connection")
        .unwrap();

    parse_raw_response(&buf)
}

fn parse_raw_response(buf: &[u8]) -> RawResponse {
    let head_end = buf
        .windows(4)
        .position(|window| window == b"\r\n\r\n")
        .expect("complete response head");
    let head = std::str::from_utf8(&buf[..head_end]).unwrap();
    let mut lines = head.split("\r\n");

    let status_line = lines.next().unwrap();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap().to_owned();
    let status_code = parts.next().unwrap().parse().unwrap();
    let reason_phrase = parts.next().unwrap_or_default().to_owned();

    let headers = lines
        .map(|line| {
            let (key, value) = line.split_once(':').unwrap();
            (key.trim().to_owned(), value.trim().to_owned())
        })
        .collect();

    RawResponse {
        version,
        status_code,
        reason_phrase,
        headers,
        body: buf[head_end + 4..].to_vec(),
    }
}

#[test]
fn test_parse_raw_response() {
    let resp = parse_raw_response(
        b"HTTP/1.1 342 Random Status Code\r\ncontent-length: 2\r\nConnection: close\r\n\r\nok",
    );
    assert_eq!("HTTP/1.1", resp.version);
    assert_eq!(342, resp.status_code);
    assert_eq!("Random Status Code", resp.reason_phrase);
    assert_eq!(Some("close"), resp.header("connection"));
    assert_eq!(Some("2"), resp.header("Content-Length"));
    assert_eq!(b"ok", &resp.body[..]);
}
