//! On-host counter sampling, the `collect` side of an experiment.
//!
//! A collector runs on every monitored host/interface pair and prints one
//! [`RawSample`](crate::RawSample) per tick; the orchestrator redirects that stdout into the
//! per-interface log file.

mod error;
mod sampler;
mod source;
mod tc;

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

pub use error::{Error, Result};
pub use sampler::Sampler;
pub use source::{CounterSource, LinkCounters, SysfsCounterSource};
pub use tc::parse_tc_json;

use crate::counter_log::HEADER;

const STOP_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub struct CollectorConfig {
    pub interval: Duration,
    /// Sampling stops at the first tick after this much time has passed.
    pub duration: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(20),
            duration: Duration::from_secs(60),
        }
    }
}

/// Writes the header, then one line per tick until `duration` elapsed or `stop` is set.
///
/// Blocking; run it on a dedicated thread. Returns the number of sample lines written.
pub fn run_collector<S, W>(
    sampler: &mut Sampler<S>,
    out: &mut W,
    cfg: &CollectorConfig,
    stop: &AtomicBool,
) -> Result<usize>
where
    S: CounterSource,
    W: Write,
{
    if cfg.interval.is_zero() {
        return Err(Error::InvalidInterval);
    }

    writeln!(out, "{HEADER}").map_err(Error::Write)?;
    out.flush().map_err(Error::Write)?;

    let start = Instant::now();
    let mut next = start + cfg.interval;
    let mut lines = 0usize;

    loop {
        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(lines);
            }
            let now = Instant::now();
            if now >= next {
                break;
            }
            std::thread::sleep((next - now).min(STOP_POLL));
        }

        let sample = sampler.tick(unix_now())?;
        writeln!(out, "{sample}").map_err(Error::Write)?;
        out.flush().map_err(Error::Write)?;
        lines += 1;

        if start.elapsed() > cfg.duration {
            break;
        }

        next += cfg.interval;
        let now = Instant::now();
        if next < now {
            // Fell behind (slow `tc`); skip missed ticks instead of bursting.
            next = now + cfg.interval;
        }
    }

    tracing::debug!(lines, "collector finished");
    Ok(lines)
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
