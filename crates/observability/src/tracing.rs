//! Tracing/logging initialization.
//!
//! JSON lines by default, filtered through `RUST_LOG`. The ledger emits its span
//! fields (`sku`, `reservation_id`, `quantity`) and per-commit fields (`version`,
//! `attempt`) on every line, so JSON output can be grepped per SKU.

use tracing_subscriber::EnvFilter;

/// Env var selecting the output format (`json`, `pretty` or `compact`).
pub const LOG_FORMAT_ENV: &str = "STOCK_LEDGER_LOG_FORMAT";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to JSON.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }

    pub fn from_env() -> Self {
        std::env::var(LOG_FORMAT_ENV)
            .map(|v| Self::parse(&v))
            .unwrap_or_default()
    }
}

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with(LogFormat::from_env(), "info");
}

/// Initialize with an explicit format and a fallback filter used when `RUST_LOG`
/// is unset. Returns `false` if a global subscriber was already installed.
pub fn init_with(format: LogFormat, default_directive: &str) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive))
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    result.is_ok()
}

/// Compact output captured by the test harness, `debug` unless `RUST_LOG` says
/// otherwise. Safe to call from every test.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("debug"))
        .with_test_writer()
        .compact()
        .try_init();
}
