use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context as _;
use perfmon_core::collector::{CollectorConfig, Sampler, SysfsCounterSource, run_collector};

use crate::cli::CollectArgs;
use crate::exit_codes::ExitCode;
use crate::run_error::RunError;

/// Samples one interface and prints the log to stdout until `--time` elapsed or Ctrl-C.
pub async fn collect(args: CollectArgs) -> Result<ExitCode, RunError> {
    let tc = (!args.no_qdisc).then(|| args.tc.clone());
    let source = SysfsCounterSource::with_sysfs_root(&args.device, &args.sysfs_root)
        .map_err(|e| RunError::InvalidInput(e.into()))?
        .with_tc_program(tc);

    let cfg = CollectorConfig {
        interval: args.interval,
        duration: args.duration,
    };

    let stop = Arc::new(AtomicBool::new(false));
    let signal = {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                stop.store(true, Ordering::Relaxed);
            }
        })
    };

    let worker_stop = stop.clone();
    let lines = tokio::task::spawn_blocking(move || {
        let mut sampler = Sampler::new(source);
        tracing::info!(
            device = sampler.source().interface(),
            interval = ?cfg.interval,
            time = ?cfg.duration,
            "collecting"
        );
        let mut out = std::io::stdout().lock();
        run_collector(&mut sampler, &mut out, &cfg, &worker_stop)
    })
    .await
    .context("collector thread")
    .map_err(RunError::RuntimeError)?
    .map_err(|e| RunError::RuntimeError(e.into()))?;
    signal.abort();

    let interrupted = stop.load(Ordering::Relaxed);
    tracing::info!(lines, interrupted, "collection finished");
    Ok(if interrupted {
        ExitCode::Interrupted
    } else {
        ExitCode::Success
    })
}
