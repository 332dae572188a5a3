use crate::counter_log::RawSample;

use super::error::Result;
use super::source::{CounterSource, LinkCounters};

/// Turns cumulative interface counters into per-tick deltas.
///
/// The previous counters start at zero, so the first sample carries the absolute totals and
/// is only useful as an anchor for the ones after it.
#[derive(Debug)]
pub struct Sampler<S> {
    source: S,
    previous: LinkCounters,
}

impl<S: CounterSource> Sampler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            previous: LinkCounters::default(),
        }
    }

    pub fn tick(&mut self, timestamp: f64) -> Result<RawSample> {
        let current = self.source.link_counters()?;
        let qdiscs = self.source.qdisc_stats()?;

        // Counter resets (link flap, driver reload) yield 0 rather than wrapping.
        let sample = RawSample {
            timestamp,
            rx_packets: current.rx_packets.saturating_sub(self.previous.rx_packets),
            rx_bytes: current.rx_bytes.saturating_sub(self.previous.rx_bytes),
            tx_packets: current.tx_packets.saturating_sub(self.previous.tx_packets),
            tx_bytes: current.tx_bytes.saturating_sub(self.previous.tx_bytes),
            qdiscs,
        };
        self.previous = current;
        Ok(sample)
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}
