use bytes::Bytes;
use rama::http::StatusCode;

/// Reason phrase used for status codes without a registered one.
pub const GENERIC_REASON_PHRASE: &str = "Random Status Code";

/// Transport-independent view of an inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: String,
    pub uri: String,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub keep_alive: bool,
}

impl RequestContext {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            body: Bytes::new(),
            content_type: None,
            keep_alive: true,
        }
    }

    rama::utils::macros::generate_set_and_with! {
        /// Set the request body.
        pub fn body(mut self, body: Bytes) -> Self {
            self.body = body;
            self
        }
    }

    rama::utils::macros::generate_set_and_with! {
        /// Set the media type of the request body.
        pub fn content_type(mut self, content_type: Option<String>) -> Self {
            self.content_type = content_type;
            self
        }
    }

    rama::utils::macros::generate_set_and_with! {
        /// Set whether the connection is to be reused after this request.
        pub fn keep_alive(mut self, keep_alive: bool) -> Self {
            self.keep_alive = keep_alive;
            self
        }
    }
}

/// Transport-independent response, produced once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseDescriptor {
    pub status_code: u16,
    pub body: Bytes,
    pub content_type: Option<String>,
    pub close_connection: bool,
}

impl ResponseDescriptor {
    /// Canonical reason phrase of the status code,
    /// or [`GENERIC_REASON_PHRASE`] if it has none.
    pub fn reason_phrase(&self) -> &'static str {
        StatusCode::from_u16(self.status_code)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or(GENERIC_REASON_PHRASE)
    }
}
