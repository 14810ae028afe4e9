use tracing_subscriber::{fmt, EnvFilter};

/// Env var that switches log output to JSON lines.
pub const LOG_JSON_ENV: &str = "TRADER_SIM_LOG_JSON";

const DEFAULT_FILTER: &str = "trader_sim_engine=info";

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    // a subscriber may already be installed (tests, embedding); keep it
    let _ = if std::env::var(LOG_JSON_ENV).is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .try_init()
    };
}
