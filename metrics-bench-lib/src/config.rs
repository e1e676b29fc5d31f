use crate::http::MAX_BODY_SIZE;

/// Request handling behavior of the bench server.
///
/// Set once at startup and shared read-only by all requests.
#[derive(Debug, Clone, clap::Args)]
pub struct HandlerConfig {
    /// Sleep time in milliseconds before responding.
    #[arg(long = "sleep-time", value_name = "MILLISECONDS", default_value_t = 0)]
    pub sleep_time_ms: u32,

    /// Sleep for a random time, with `--sleep-time` as (exclusive) maximum.
    #[arg(long, default_value_t = false)]
    pub random_sleep: bool,

    /// Size of the payloads synthesized for GET requests.
    /// Bounded by the body size limit of the bench server.
    #[arg(
        long = "payload-size",
        value_name = "BYTES",
        default_value_t = DEFAULT_PAYLOAD_SIZE,
        value_parser = clap::value_parser!(u32).range(0..=MAX_BODY_SIZE as i64)
    )]
    pub payload_size_bytes: u32,

    /// Generate payloads of a random size, with `--payload-size` as (exclusive) maximum.
    #[arg(long, default_value_t = false)]
    pub random_payload: bool,

    /// Respond with random HTTP status codes (100-599),
    /// informational codes are answered with a 500.
    #[arg(long, default_value_t = false)]
    pub random_status_code: bool,
}

/// 100 KiB
pub const DEFAULT_PAYLOAD_SIZE: u32 = 100 * 1024;

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            sleep_time_ms: 0,
            random_sleep: false,
            payload_size_bytes: DEFAULT_PAYLOAD_SIZE,
            random_payload: false,
            random_status_code: false,
        }
    }
}
