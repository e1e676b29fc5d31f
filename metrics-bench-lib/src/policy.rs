//! Per-request decisions: how long to sleep, which status to return
//! and how to produce the response body.
//!
//! All functions are pure given the [`HandlerConfig`] and an injected
//! [`RandomSource`], which keeps them reproducible in tests.

use std::time::Duration;

use rand::RngExt as _;

use crate::config::HandlerConfig;

/// Status code used when random status codes are disabled.
pub const DEFAULT_STATUS_CODE: u16 = 200;

/// Sent in place of an informational (1xx) status code,
/// which HTTP only allows as an interim response.
pub const INFORMATIONAL_REPLACEMENT_STATUS_CODE: u16 = 500;

const RANDOM_STATUS_CODE_BASE: u16 = 100;
const RANDOM_STATUS_CODE_SPAN: u32 = 500;

/// Source of uniformly distributed integers.
pub trait RandomSource {
    /// Uniform value in `[0, bound)`. `bound` is never `0`.
    fn next_bounded(&mut self, bound: u32) -> u32;
}

impl<R: rand::RngExt> RandomSource for R {
    fn next_bounded(&mut self, bound: u32) -> u32 {
        self.random_range(0..bound)
    }
}

/// How the body of a response is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyStrategy {
    /// Synthesize a JSON payload.
    Synthesize,
    /// Send the request body back as-is.
    Echo,
}

/// [`BodyStrategy`] with its payload size resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPlan {
    Synthesize { payload_size: usize },
    Echo,
}

/// All decisions for a single request, resolved up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPlan {
    pub sleep: Duration,
    pub status_code: u16,
    pub body: BodyPlan,
}

impl RequestPlan {
    pub fn resolve(config: &HandlerConfig, method: &str, rng: &mut impl RandomSource) -> Self {
        let sleep = Duration::from_millis(resolve_sleep_millis(config, rng).into());
        let status_code = final_status_code(resolve_status_code(config, rng, DEFAULT_STATUS_CODE));
        let body = match resolve_body_strategy(method) {
            BodyStrategy::Synthesize => BodyPlan::Synthesize {
                payload_size: resolve_payload_size(config, rng) as usize,
            },
            BodyStrategy::Echo => BodyPlan::Echo,
        };
        Self {
            sleep,
            status_code,
            body,
        }
    }
}

pub fn resolve_sleep_millis(config: &HandlerConfig, rng: &mut impl RandomSource) -> u32 {
    match config.sleep_time_ms {
        0 => 0,
        max if config.random_sleep => rng.next_bounded(max),
        fixed => fixed,
    }
}

pub fn resolve_status_code(
    config: &HandlerConfig,
    rng: &mut impl RandomSource,
    default_status: u16,
) -> u16 {
    if !config.random_status_code {
        return default_status;
    }
    // always < 500, so the sum fits in an u16
    RANDOM_STATUS_CODE_BASE + rng.next_bounded(RANDOM_STATUS_CODE_SPAN) as u16
}

/// Map a status code onto one that can end an HTTP exchange.
///
/// Only informational codes are replaced, any other code
/// (registered or not) is kept as-is.
pub fn final_status_code(status_code: u16) -> u16 {
    if (100..200).contains(&status_code) {
        INFORMATIONAL_REPLACEMENT_STATUS_CODE
    } else {
        status_code
    }
}

pub fn resolve_body_strategy(method: &str) -> BodyStrategy {
    if method == "GET" {
        BodyStrategy::Synthesize
    } else {
        BodyStrategy::Echo
    }
}

pub fn resolve_payload_size(config: &HandlerConfig, rng: &mut impl RandomSource) -> u32 {
    match config.payload_size_bytes {
        0 => 0,
        max if config.random_payload => rng.next_bounded(max),
        fixed => fixed,
    }
}
