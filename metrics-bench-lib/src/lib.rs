//! Synthetic HTTP endpoint used to benchmark the overhead
//! of metrics libraries on the request path.
//!
//! Every request runs through the same [`pipeline::RequestPipeline`],
//! which only talks to a metrics backend through the
//! [`instrument::InstrumentationHooks`] it was created with.

#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

pub mod cli;
pub mod config;
pub mod http;
pub mod instrument;
pub mod payload;
pub mod pipeline;
pub mod policy;
pub mod server;
pub mod tls;
pub mod utils;

#[cfg(test)]
pub mod test;
