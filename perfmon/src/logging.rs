use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use crate::cli::LogFormat;

/// Filter directives, e.g. `PERFMON_LOG=perfmon_core=debug`.
pub const LOG_ENV: &str = "PERFMON_LOG";
const DEFAULT_FILTER: &str = "info";

/// Installs the global subscriber. Logs go to stderr so `collect` keeps stdout for samples.
pub fn init(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .unwrap_or_default();

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    let registry = tracing_subscriber::registry();

    match format {
        LogFormat::Text => registry.with(layer.with_filter(filter)).try_init()?,
        LogFormat::Json => registry.with(layer.json().with_filter(filter)).try_init()?,
    }
    Ok(())
}
