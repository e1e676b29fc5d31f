//! The request pipeline: one linear pass per request,
//! wrapped in instrumentation hooks.
//!
//! ```text
//! START -> SLEEP (optional) -> BODY_RESOLUTION -> RESPOND -> END
//! ```
//!
//! `on_request_end` and `on_sleep_end` are fired from drop guards,
//! so they run exactly once on every exit path, including panics
//! and request futures dropped mid-flight.

use std::sync::Arc;

use crate::{
    config::HandlerConfig,
    instrument::InstrumentationHooks,
    payload::{self, PAYLOAD_CONTENT_TYPE},
    policy::{BodyPlan, DEFAULT_STATUS_CODE, RandomSource, RequestPlan},
};

mod context;
pub use self::context::{GENERIC_REASON_PHRASE, RequestContext, ResponseDescriptor};

#[derive(Debug)]
pub struct RequestPipeline<H> {
    config: Arc<HandlerConfig>,
    hooks: H,
}

impl<H: InstrumentationHooks> RequestPipeline<H> {
    pub fn new(config: Arc<HandlerConfig>, hooks: H) -> Self {
        Self { config, hooks }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Handle a single request.
    ///
    /// Start hooks fire and all random decisions are made before this
    /// function returns, so the random source is never held across an await.
    /// The returned future sleeps (if so decided) and produces the response.
    pub fn handle<'a, R: RandomSource>(
        &'a self,
        ctx: RequestContext,
        rng: &mut R,
    ) -> impl Future<Output = ResponseDescriptor> + Send + use<'a, H, R> {
        let RequestContext {
            method,
            uri,
            body,
            content_type,
            keep_alive,
        } = ctx;

        let request = RequestGuard::start(&self.hooks, method, uri);
        self.hooks.on_request_size(body.len());
        let plan = RequestPlan::resolve(&self.config, &request.method, rng);

        async move {
            let mut request = request;

            if !plan.sleep.is_zero() {
                let _sleep = SleepGuard::start(&self.hooks);
                tokio::time::sleep(plan.sleep).await;
            }

            request.record_status(plan.status_code);

            let (body, content_type) = match plan.body {
                BodyPlan::Synthesize { payload_size } => (
                    payload::generate(payload_size),
                    Some(PAYLOAD_CONTENT_TYPE.to_owned()),
                ),
                BodyPlan::Echo => (body, content_type),
            };
            self.hooks.on_response_size(body.len());

            ResponseDescriptor {
                status_code: plan.status_code,
                body,
                content_type,
                close_connection: !keep_alive,
            }
        }
    }
}

/// Owns the request token, firing `on_request_end` when dropped.
struct RequestGuard<'a, H: InstrumentationHooks> {
    hooks: &'a H,
    method: String,
    uri: String,
    status_code: u16,
    token: Option<H::RequestToken>,
}

impl<'a, H: InstrumentationHooks> RequestGuard<'a, H> {
    fn start(hooks: &'a H, method: String, uri: String) -> Self {
        let token = hooks.on_request_start(&method, &uri);
        Self {
            hooks,
            method,
            uri,
            status_code: DEFAULT_STATUS_CODE,
            token: Some(token),
        }
    }

    fn record_status(&mut self, status_code: u16) {
        self.status_code = status_code;
    }
}

impl<H: InstrumentationHooks> Drop for RequestGuard<'_, H> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.hooks
                .on_request_end(&self.method, &self.uri, self.status_code, token);
        }
    }
}

/// Owns the sleep token, firing `on_sleep_end` when dropped.
struct SleepGuard<'a, H: InstrumentationHooks> {
    hooks: &'a H,
    token: Option<H::SleepToken>,
}

impl<'a, H: InstrumentationHooks> SleepGuard<'a, H> {
    fn start(hooks: &'a H) -> Self {
        Self {
            hooks,
            token: Some(hooks.on_sleep_start()),
        }
    }
}

impl<H: InstrumentationHooks> Drop for SleepGuard<'_, H> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.hooks.on_sleep_end(token);
        }
    }
}
