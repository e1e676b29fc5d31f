//! Adapter between rama's HTTP types and the transport-independent
//! [`RequestPipeline`].

use std::{convert::Infallible, sync::Arc};

use rama::{
    Service,
    http::{
        Body, HeaderValue, Request, Response, StatusCode, Version,
        body::util::BodyExt as _,
        core::ext::ReasonPhrase,
        header::{CONNECTION, CONTENT_TYPE},
        headers::{ContentLength, HeaderMapExt as _},
    },
    telemetry::tracing,
};

use crate::{
    instrument::InstrumentationHooks,
    pipeline::{RequestContext, RequestPipeline, ResponseDescriptor},
};

/// Maximum size of a request or response body: 1 MiB.
pub const MAX_BODY_SIZE: usize = 1024 * 1024;

/// HTTP service handing every request to the [`RequestPipeline`].
#[derive(Debug)]
pub struct BenchHttpService<H> {
    pipeline: Arc<RequestPipeline<H>>,
}

impl<H> BenchHttpService<H> {
    pub fn new(pipeline: Arc<RequestPipeline<H>>) -> Self {
        Self { pipeline }
    }
}

impl<H> Clone for BenchHttpService<H> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
        }
    }
}

impl<H: InstrumentationHooks> Service<Request> for BenchHttpService<H> {
    type Output = Response;
    type Error = Infallible;

    async fn serve(&self, req: Request) -> Result<Self::Output, Self::Error> {
        let version = req.version();
        let ctx = match try_request_context(req).await {
            Ok(ctx) => ctx,
            Err(response) => return Ok(response),
        };

        let fut = self.pipeline.handle(ctx, &mut rand::rng());
        let descriptor = fut.await;

        Ok(into_http_response(descriptor, version))
    }
}

/// Read the full request into a [`RequestContext`].
///
/// Bodies larger than [`MAX_BODY_SIZE`] are rejected with a
/// `413 Payload Too Large` response, without running the pipeline.
pub async fn try_request_context(req: Request) -> Result<RequestContext, Response> {
    let version = req.version();

    if let Some(ContentLength(length)) = req.headers().typed_get()
        && length > MAX_BODY_SIZE as u64
    {
        tracing::debug!(
            http.request.body.size = length,
            "request body exceeds limit: reject"
        );
        return Err(payload_too_large(version));
    }

    let keep_alive = is_keep_alive(&req);
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ToOwned::to_owned);

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            tracing::debug!(error = %err, "failed to collect request body: reject");
            return Err(payload_too_large(version));
        }
    };

    Ok(RequestContext {
        method: parts.method.as_str().to_owned(),
        uri: parts.uri.to_string(),
        body,
        content_type,
        keep_alive,
    })
}

fn payload_too_large(version: Version) -> Response {
    into_http_response(
        ResponseDescriptor {
            status_code: StatusCode::PAYLOAD_TOO_LARGE.as_u16(),
            body: Default::default(),
            content_type: None,
            close_connection: true,
        },
        version,
    )
}

/// Whether the client wishes to reuse the connection after this request.
///
/// HTTP/1.1 (and later) is persistent unless `Connection: close` is sent,
/// HTTP/1.0 only when `Connection: keep-alive` is sent.
pub fn is_keep_alive<B>(req: &Request<B>) -> bool {
    let has_connection_token = |token: &str| {
        req.headers()
            .get_all(CONNECTION)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|value| value.trim().eq_ignore_ascii_case(token))
    };

    match req.version() {
        Version::HTTP_09 | Version::HTTP_10 => has_connection_token("keep-alive"),
        Version::HTTP_11 => !has_connection_token("close"),
        _ => true,
    }
}

/// Whether the connection can be reused after a response with this status.
///
/// A `413` may leave an unread request body on the connection,
/// and an informational status does not end the exchange.
pub fn status_allows_reuse(status: StatusCode) -> bool {
    !status.is_informational() && status != StatusCode::PAYLOAD_TOO_LARGE
}

/// Turn a [`ResponseDescriptor`] into an HTTP response for the given request version.
///
/// Status codes without a registered reason phrase are sent
/// with the [generic one](crate::pipeline::GENERIC_REASON_PHRASE).
pub fn into_http_response(descriptor: ResponseDescriptor, version: Version) -> Response {
    let status = StatusCode::from_u16(descriptor.status_code).unwrap_or_else(|err| {
        tracing::error!(
            http.response.status_code = descriptor.status_code,
            "invalid status code from pipeline: {err}; respond with 500"
        );
        StatusCode::INTERNAL_SERVER_ERROR
    });
    let reason_phrase = descriptor.reason_phrase();
    let close_connection = descriptor.close_connection || !status_allows_reuse(status);

    let body_size = descriptor.body.len();
    let mut resp = Response::new(Body::from(descriptor.body));
    *resp.status_mut() = status;

    if status.canonical_reason().is_none() {
        match ReasonPhrase::try_from(reason_phrase.as_bytes()) {
            Ok(reason_phrase) => {
                resp.extensions_mut().insert(reason_phrase);
            }
            Err(err) => {
                tracing::debug!("drop invalid reason phrase from response: {err}");
            }
        }
    }

    let headers = resp.headers_mut();
    headers.typed_insert(ContentLength(body_size as u64));

    if let Some(content_type) = descriptor.content_type {
        match HeaderValue::try_from(content_type) {
            Ok(value) => {
                headers.insert(CONTENT_TYPE, value);
            }
            Err(err) => {
                tracing::debug!("drop invalid content type from response: {err}");
            }
        }
    }

    // connection management headers do not exist in h2 and later
    if matches!(
        version,
        Version::HTTP_09 | Version::HTTP_10 | Version::HTTP_11
    ) {
        let connection = if close_connection {
            HeaderValue::from_static("close")
        } else {
            HeaderValue::from_static("keep-alive")
        };
        headers.insert(CONNECTION, connection);
    }

    resp
}
