use serde::Serialize;

use crate::counter_log::RawLog;

use super::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesConfig {
    /// Rows with a relative time above this many seconds are dropped.
    pub time_cutoff: Option<f64>,

    /// `queue_exists` is set where the backlog grew by more than this.
    pub queue_threshold: i64,

    /// Sampling interval in seconds; estimated from the timestamps when unset.
    pub interval: Option<f64>,

    /// Take the backlog from the first qdisc of this kind instead of the first qdisc.
    pub qdisc_kind: Option<String>,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            time_cutoff: Some(100.0),
            queue_threshold: 10,
            interval: None,
            qdisc_kind: None,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, strum::EnumString, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum ThroughputMetric {
    #[default]
    #[strum(serialize = "tx-mbps")]
    TxMbps,
    #[strum(serialize = "rx-mbps")]
    RxMbps,
    #[strum(serialize = "tx-pps")]
    TxPps,
    #[strum(serialize = "rx-pps")]
    RxPps,
}

/// Per-sample rates derived from one collector log. All vectors have the same length.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateSeries {
    pub time: Vec<f64>,
    /// Seconds since the first retained sample.
    pub relative_time: Vec<f64>,

    pub rx_packets: Vec<u64>,
    pub rx_bytes: Vec<u64>,
    pub tx_packets: Vec<u64>,
    pub tx_bytes: Vec<u64>,

    pub rx_pps: Vec<f64>,
    pub tx_pps: Vec<f64>,
    pub rx_mbps: Vec<f64>,
    pub tx_mbps: Vec<f64>,

    pub backlog: Vec<u64>,
    pub drops: Vec<u64>,
    pub overlimits: Vec<u64>,

    /// Backlog change since the previous log line.
    pub queue_size: Vec<i64>,
    pub queue_exists: Vec<bool>,

    /// Sampling interval (seconds) the rates were computed with.
    pub interval: f64,
}

impl RateSeries {
    #[must_use]
    pub fn len(&self) -> usize {
        self.time.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    #[must_use]
    pub fn metric(&self, metric: ThroughputMetric) -> &[f64] {
        match metric {
            ThroughputMetric::TxMbps => &self.tx_mbps,
            ThroughputMetric::RxMbps => &self.rx_mbps,
            ThroughputMetric::TxPps => &self.tx_pps,
            ThroughputMetric::RxPps => &self.rx_pps,
        }
    }

    fn truncate(&mut self, len: usize) {
        self.time.truncate(len);
        self.relative_time.truncate(len);
        self.rx_packets.truncate(len);
        self.rx_bytes.truncate(len);
        self.tx_packets.truncate(len);
        self.tx_bytes.truncate(len);
        self.rx_pps.truncate(len);
        self.tx_pps.truncate(len);
        self.rx_mbps.truncate(len);
        self.tx_mbps.truncate(len);
        self.backlog.truncate(len);
        self.drops.truncate(len);
        self.overlimits.truncate(len);
        self.queue_size.truncate(len);
        self.queue_exists.truncate(len);
    }
}

#[derive(Debug, Clone, Default)]
pub struct SampleSeriesBuilder {
    config: SeriesConfig,
}

impl SampleSeriesBuilder {
    pub fn new(config: SeriesConfig) -> Result<Self> {
        if let Some(interval) = config.interval
            && !(interval.is_finite() && interval > 0.0)
        {
            return Err(Error::InvalidInterval(interval));
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &SeriesConfig {
        &self.config
    }

    /// Builds the series. Sample 0 only anchors the deltas; a log with fewer than two
    /// samples yields an empty series.
    pub fn build(&self, log: &RawLog) -> Result<RateSeries> {
        let samples = log.samples();
        if samples.len() < 2 {
            return Ok(RateSeries::default());
        }

        let interval = match self.config.interval {
            Some(interval) => interval,
            None => {
                let diffs = samples.windows(2).map(|w| w[1].timestamp - w[0].timestamp);
                let mean = diffs.sum::<f64>() / (samples.len() - 1) as f64;
                if !(mean.is_finite() && mean > 0.0) {
                    return Err(Error::InvalidInterval(mean));
                }
                mean
            }
        };

        let kind = self.config.qdisc_kind.as_deref();
        let backlog_of = |idx: usize| samples[idx].qdisc(kind).map_or(0, |q| q.backlog);

        let rows = samples.len() - 1;
        let t0 = samples[1].timestamp;
        let mut out = RateSeries {
            interval,
            ..RateSeries::default()
        };

        for idx in 1..samples.len() {
            let s = &samples[idx];
            let qdisc = s.qdisc(kind);
            let backlog = backlog_of(idx);
            // Differenced over the raw log so the first retained row has a predecessor.
            let queue_size = backlog as i64 - backlog_of(idx - 1) as i64;

            out.time.push(s.timestamp);
            out.relative_time.push(s.timestamp - t0);
            out.rx_packets.push(s.rx_packets);
            out.rx_bytes.push(s.rx_bytes);
            out.tx_packets.push(s.tx_packets);
            out.tx_bytes.push(s.tx_bytes);
            out.rx_pps.push(s.rx_packets as f64 / interval);
            out.tx_pps.push(s.tx_packets as f64 / interval);
            out.rx_mbps.push(8.0 * s.rx_bytes as f64 / interval / 1e6);
            out.tx_mbps.push(8.0 * s.tx_bytes as f64 / interval / 1e6);
            out.backlog.push(backlog);
            out.drops.push(qdisc.map_or(0, |q| q.drops));
            out.overlimits.push(qdisc.map_or(0, |q| q.overlimits));
            out.queue_size.push(queue_size);
            out.queue_exists.push(queue_size > self.config.queue_threshold);
        }
        debug_assert_eq!(out.len(), rows);

        if let Some(cutoff) = self.config.time_cutoff {
            // Hard cutoff: stop at the first row past it, even if later rows dip back under.
            let keep = out
                .relative_time
                .iter()
                .position(|t| *t > cutoff)
                .unwrap_or(rows);
            out.truncate(keep);
        }

        Ok(out)
    }
}
