//! Two-timescale peak ("link is saturated") detection.
//!
//! Both variants estimate the best throughput seen around each sample (the long-term
//! envelope) and score how close the current throughput gets to it.

use serde::Serialize;

use super::error::{Error, Result};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, strum::EnumString, strum::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    #[default]
    #[strum(serialize = "s", serialize = "seconds")]
    Seconds,
    #[strum(serialize = "ms", serialize = "milliseconds")]
    Milliseconds,
}

impl TimeUnit {
    fn to_millis(self, value: f64) -> f64 {
        match self {
            Self::Seconds => value * 1000.0,
            Self::Milliseconds => value,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, strum::EnumString, strum::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum DetectorKind {
    #[default]
    #[strum(serialize = "block", serialize = "block-partition")]
    BlockPartition,
    #[strum(serialize = "padded", serialize = "padded-dual-window")]
    PaddedDualWindow,
}

impl DetectorKind {
    #[must_use]
    pub fn with_defaults(self) -> DetectorVariant {
        match self {
            Self::BlockPartition => DetectorVariant::BlockPartition { threshold: 0.2 },
            Self::PaddedDualWindow => DetectorVariant::PaddedDualWindow { ratio: 0.7 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DetectorVariant {
    /// Envelope and score are constant over non-overlapping long-term blocks; the score is
    /// the fraction of the block within `threshold` of the block peak.
    BlockPartition { threshold: f64 },

    /// Sliding long-term envelope over the median-filtered series, compared against a
    /// short-term block max of the raw series. Score is 1.0 where short > `ratio` × long.
    PaddedDualWindow { ratio: f64 },
}

impl DetectorVariant {
    #[must_use]
    pub fn kind(&self) -> DetectorKind {
        match self {
            Self::BlockPartition { .. } => DetectorKind::BlockPartition,
            Self::PaddedDualWindow { .. } => DetectorKind::PaddedDualWindow,
        }
    }
}

impl Default for DetectorVariant {
    fn default() -> Self {
        DetectorKind::default().with_defaults()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub short_term_ms: f64,
    pub long_term_ms: f64,
    /// Unit of the time axis passed to [`PeakDetector::detect`].
    pub time_unit: TimeUnit,
    pub variant: DetectorVariant,
    pub median_kernel: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            short_term_ms: 100.0,
            long_term_ms: 1000.0,
            time_unit: TimeUnit::Seconds,
            variant: DetectorVariant::default(),
            median_kernel: 15,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeakResult {
    pub filtered: Vec<f64>,
    pub envelope: Vec<f64>,
    pub score: Vec<f64>,
    /// Only produced by the dual-window variant.
    pub short_term_envelope: Option<Vec<f64>>,
    /// Window widths in samples; 0 when the series was too short to estimate its period.
    pub short_term_step: usize,
    pub long_term_step: usize,
}

#[derive(Debug, Clone)]
pub struct PeakDetector {
    config: DetectorConfig,
}

impl PeakDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(config.short_term_ms) || !positive(config.long_term_ms) {
            return Err(Error::InvalidWindow {
                short_ms: config.short_term_ms,
                long_ms: config.long_term_ms,
            });
        }
        if config.median_kernel == 0 || config.median_kernel % 2 == 0 {
            return Err(Error::InvalidKernel(config.median_kernel));
        }
        match config.variant {
            DetectorVariant::BlockPartition { threshold } => {
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(Error::InvalidThreshold {
                        what: "partition threshold",
                        range: "[0, 1]",
                        value: threshold,
                    });
                }
            }
            DetectorVariant::PaddedDualWindow { ratio } => {
                if !positive(ratio) {
                    return Err(Error::InvalidThreshold {
                        what: "peak ratio",
                        range: "(0, inf)",
                        value: ratio,
                    });
                }
            }
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn detect(&self, time: &[f64], throughput: &[f64]) -> Result<PeakResult> {
        if time.len() != throughput.len() {
            return Err(Error::LengthMismatch {
                what: "time and throughput",
                left: time.len(),
                right: throughput.len(),
            });
        }

        let n = throughput.len();
        if n < 2 {
            return Ok(self.quiet(throughput, 0, 0));
        }

        let mean_dt = (time[n - 1] - time[0]) / (n - 1) as f64;
        let dt_ms = self.config.time_unit.to_millis(mean_dt);
        if !(dt_ms.is_finite() && dt_ms > 0.0) {
            return Err(Error::InvalidTimeAxis(mean_dt));
        }
        let short_term_step = steps(self.config.short_term_ms, dt_ms);
        let long_term_step = steps(self.config.long_term_ms, dt_ms);
        if n < long_term_step {
            // No full long-term window fits; checked before any padding is allocated.
            return Ok(self.quiet(throughput, short_term_step, long_term_step));
        }

        let result = match self.config.variant {
            DetectorVariant::BlockPartition { threshold } => {
                self.block_partition(throughput, long_term_step, threshold)
            }
            DetectorVariant::PaddedDualWindow { ratio } => {
                self.padded_dual_window(throughput, short_term_step, long_term_step, ratio)
            }
        };
        Ok(PeakResult {
            short_term_step,
            long_term_step,
            ..result
        })
    }

    /// All-zero envelope and score alongside the filtered series.
    fn quiet(
        &self,
        throughput: &[f64],
        short_term_step: usize,
        long_term_step: usize,
    ) -> PeakResult {
        let n = throughput.len();
        PeakResult {
            filtered: median_filter(throughput, self.config.median_kernel),
            envelope: vec![0.0; n],
            score: vec![0.0; n],
            short_term_envelope: matches!(
                self.config.variant,
                DetectorVariant::PaddedDualWindow { .. }
            )
            .then(|| vec![0.0; n]),
            short_term_step,
            long_term_step,
        }
    }

    fn block_partition(&self, throughput: &[f64], lt: usize, threshold: f64) -> PeakResult {
        let filtered = median_filter(throughput, self.config.median_kernel);
        let mut envelope = vec![0.0; filtered.len()];
        let mut score = vec![0.0; filtered.len()];

        for (block_idx, block) in filtered.chunks_exact(lt).enumerate() {
            let peak = block.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let floor = (1.0 - threshold) * peak;
            let near_peak = block.iter().filter(|x| **x > floor).count();
            let block_score = near_peak as f64 / lt as f64;

            let range = block_idx * lt..(block_idx + 1) * lt;
            envelope[range.clone()].fill(peak);
            score[range].fill(block_score);
        }

        PeakResult {
            filtered,
            envelope,
            score,
            ..PeakResult::default()
        }
    }

    fn padded_dual_window(
        &self,
        throughput: &[f64],
        st: usize,
        lt: usize,
        ratio: f64,
    ) -> PeakResult {
        let mut padded = vec![0.0; lt];
        padded.extend_from_slice(throughput);
        let len = padded.len();

        let mut short_env = vec![0.0; len];
        for (block_idx, block) in padded.chunks_exact(st).enumerate() {
            let peak = block.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            short_env[block_idx * st..(block_idx + 1) * st].fill(peak);
        }

        let filtered = median_filter(&padded, self.config.median_kernel);

        let mut long_env = vec![0.0; len];
        let mut score = vec![0.0; len];
        for idx in lt..len.saturating_sub(lt) {
            long_env[idx] = filtered[idx - lt..idx + lt]
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max);
        }
        for idx in 0..len {
            if short_env[idx] > ratio * long_env[idx] {
                score[idx] = 1.0;
            }
        }

        PeakResult {
            filtered: filtered[lt..].to_vec(),
            envelope: long_env[lt..].to_vec(),
            score: score[lt..].to_vec(),
            short_term_envelope: Some(short_env[lt..].to_vec()),
            ..PeakResult::default()
        }
    }
}

fn steps(width_ms: f64, dt_ms: f64) -> usize {
    let raw = (width_ms / dt_ms).round();
    if raw < 1.0 { 1 } else { raw as usize }
}

/// Running median over an odd `kernel`, treating samples outside the input as zero.
#[must_use]
pub fn median_filter(values: &[f64], kernel: usize) -> Vec<f64> {
    let half = kernel / 2;
    let mut window = Vec::with_capacity(kernel);
    let mut out = Vec::with_capacity(values.len());

    for idx in 0..values.len() {
        window.clear();
        for pos in idx as isize - half as isize..=(idx + half) as isize {
            let v = usize::try_from(pos)
                .ok()
                .and_then(|p| values.get(p))
                .copied()
                .unwrap_or(0.0);
            window.push(v);
        }
        window.sort_by(f64::total_cmp);
        out.push(window[half]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time_axis(n: usize, dt: f64) -> Vec<f64> {
        (0..n).map(|i| i as f64 * dt).collect()
    }

    fn detector(variant: DetectorVariant) -> PeakDetector {
        PeakDetector::new(DetectorConfig {
            variant,
            ..DetectorConfig::default()
        })
        .unwrap_or_else(|e| panic!("config should be valid: {e}"))
    }

    #[test]
    fn median_filter_pads_with_zeros() {
        let out = median_filter(&[5.0, 5.0, 5.0, 5.0, 5.0], 3);
        assert_eq!(out, vec![5.0, 5.0, 5.0, 5.0, 5.0]);

        // Edge windows see a zero: [0,1,9] -> 1 and [9,1,0] -> 1.
        let out = median_filter(&[1.0, 9.0, 1.0], 3);
        assert_eq!(out, vec![1.0, 1.0, 1.0]);

        let out = median_filter(&[4.0, 4.0], 5);
        assert_eq!(out, vec![0.0, 0.0]);
        assert!(median_filter(&[], 15).is_empty());
    }

    #[test]
    fn steps_follow_sampling_period() -> Result<()> {
        // 20 ms samples: 100 ms -> 5, 1000 ms -> 50.
        let t = time_axis(200, 0.02);
        let r = detector(DetectorVariant::default()).detect(&t, &vec![1.0; 200])?;
        assert_eq!((r.short_term_step, r.long_term_step), (5, 50));

        let ms = PeakDetector::new(DetectorConfig {
            time_unit: TimeUnit::Milliseconds,
            ..DetectorConfig::default()
        })?;
        let r = ms.detect(&time_axis(200, 20.0), &vec![1.0; 200])?;
        assert_eq!((r.short_term_step, r.long_term_step), (5, 50));
        Ok(())
    }

    #[test]
    fn steps_are_clamped_to_one() -> Result<()> {
        // 2 s samples are coarser than both windows.
        let r = detector(DetectorVariant::default()).detect(&time_axis(10, 2.0), &vec![3.0; 10])?;
        assert_eq!((r.short_term_step, r.long_term_step), (1, 1));
        Ok(())
    }

    #[test]
    fn partition_envelope_bounds_filtered_and_score_in_range() -> Result<()> {
        let n = 537;
        let t = time_axis(n, 0.02);
        let tp: Vec<f64> = (0..n)
            .map(|i| 50.0 + 40.0 * ((i as f64) / 17.0).sin() + ((i * 7919) % 13) as f64)
            .collect();
        let r = detector(DetectorVariant::BlockPartition { threshold: 0.2 }).detect(&t, &tp)?;

        assert_eq!(r.filtered.len(), n);
        assert_eq!(r.envelope.len(), n);
        assert_eq!(r.score.len(), n);
        assert!(r.short_term_envelope.is_none());

        let full = (n / r.long_term_step) * r.long_term_step;
        for i in 0..full {
            assert!(r.envelope[i] >= r.filtered[i], "envelope below filtered at {i}");
        }
        assert!(r.score.iter().all(|s| (0.0..=1.0).contains(s)));
        // Trailing partial block is left at zero.
        assert!(r.envelope[full..].iter().all(|v| *v == 0.0));
        assert!(r.score[full..].iter().all(|v| *v == 0.0));
        Ok(())
    }

    #[test]
    fn partition_score_is_constant_per_block() -> Result<()> {
        let config = DetectorConfig {
            long_term_ms: 100.0,
            median_kernel: 1,
            ..DetectorConfig::default()
        };
        let d = PeakDetector::new(config)?;
        // dt 25 ms -> long-term step 4.
        let tp = [10.0, 10.0, 5.0, 9.0, 1.0, 1.0, 1.0, 1.0];
        let r = d.detect(&time_axis(8, 0.025), &tp)?;

        assert_eq!(r.long_term_step, 4);
        assert_eq!(r.envelope, vec![10.0, 10.0, 10.0, 10.0, 1.0, 1.0, 1.0, 1.0]);
        // Above 0.8 x 10: 10, 10, 9. Above 0.8 x 1: all four.
        assert_eq!(r.score, vec![0.75, 0.75, 0.75, 0.75, 1.0, 1.0, 1.0, 1.0]);
        Ok(())
    }

    #[test]
    fn all_zero_throughput_scores_zero_for_both_variants() -> Result<()> {
        let t = time_axis(300, 0.02);
        let zeros = vec![0.0; 300];
        for kind in [DetectorKind::BlockPartition, DetectorKind::PaddedDualWindow] {
            let r = detector(kind.with_defaults()).detect(&t, &zeros)?;
            assert!(r.envelope.iter().all(|v| *v == 0.0), "{kind}");
            assert!(r.score.iter().all(|v| *v == 0.0), "{kind}");
        }
        Ok(())
    }

    #[test]
    fn series_shorter_than_long_window_scores_zero() -> Result<()> {
        // 40 samples at 20 ms, long-term step 50.
        let t = time_axis(40, 0.02);
        let tp = vec![7.0; 40];
        for kind in [DetectorKind::BlockPartition, DetectorKind::PaddedDualWindow] {
            let r = detector(kind.with_defaults()).detect(&t, &tp)?;
            assert_eq!(r.long_term_step, 50);
            assert!(r.envelope.iter().all(|v| *v == 0.0), "{kind}");
            assert!(r.score.iter().all(|v| *v == 0.0), "{kind}");
        }
        Ok(())
    }

    #[test]
    fn huge_windows_on_short_series_do_not_allocate() -> Result<()> {
        let t = time_axis(10, 0.02);
        let tp = vec![5.0; 10];
        for kind in [DetectorKind::BlockPartition, DetectorKind::PaddedDualWindow] {
            let d = PeakDetector::new(DetectorConfig {
                short_term_ms: 1e20,
                long_term_ms: 1e20,
                variant: kind.with_defaults(),
                ..DetectorConfig::default()
            })?;
            let r = d.detect(&t, &tp)?;
            assert_eq!(r.filtered.len(), 10, "{kind}");
            assert!(r.envelope.iter().all(|v| *v == 0.0), "{kind}");
            assert!(r.score.iter().all(|v| *v == 0.0), "{kind}");
            assert!(r.long_term_step > 10, "{kind}");
        }
        Ok(())
    }

    #[test]
    fn dual_window_flags_saturated_stretch() -> Result<()> {
        // 10 s at 20 ms: 100 Mb/s for the first half, 10 Mb/s afterwards.
        let n = 500;
        let t = time_axis(n, 0.02);
        let tp: Vec<f64> = (0..n).map(|i| if i < 250 { 100.0 } else { 10.0 }).collect();
        let r = detector(DetectorVariant::PaddedDualWindow { ratio: 0.7 }).detect(&t, &tp)?;

        assert_eq!(r.filtered.len(), n);
        assert_eq!(r.envelope.len(), n);
        assert_eq!(r.score.len(), n);
        assert_eq!(r.short_term_envelope.as_ref().map(Vec::len), Some(n));

        // Deep inside the fast stretch the link runs at its own peak.
        assert_eq!(r.score[100], 1.0);
        assert_eq!(r.envelope[100], 100.0);
        // Right after the drop the long window still remembers 100 Mb/s.
        assert_eq!(r.score[260], 0.0);
        // Long after the drop the slow rate is the new peak again.
        assert_eq!(r.score[400], 1.0);
        assert!(r.score.iter().all(|s| *s == 0.0 || *s == 1.0));
        Ok(())
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let res = detector(DetectorVariant::default()).detect(&[0.0, 1.0, 2.0], &[1.0, 2.0]);
        assert!(matches!(
            res,
            Err(Error::LengthMismatch { left: 3, right: 2, .. })
        ));
    }

    #[test]
    fn degenerate_time_axis_is_rejected() {
        let res = detector(DetectorVariant::default()).detect(&[5.0, 5.0, 5.0], &[1.0, 2.0, 3.0]);
        assert!(matches!(res, Err(Error::InvalidTimeAxis(_))));
    }

    #[test]
    fn tiny_series_do_not_fail() -> Result<()> {
        let d = detector(DetectorVariant::default());
        let empty = d.detect(&[], &[])?;
        assert!(empty.score.is_empty());
        let one = d.detect(&[0.0], &[4.0])?;
        assert_eq!(one.score, vec![0.0]);
        assert_eq!(one.envelope, vec![0.0]);
        Ok(())
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let bad = |config: DetectorConfig| PeakDetector::new(config).is_err();
        assert!(bad(DetectorConfig {
            median_kernel: 14,
            ..DetectorConfig::default()
        }));
        assert!(bad(DetectorConfig {
            long_term_ms: 0.0,
            ..DetectorConfig::default()
        }));
        assert!(bad(DetectorConfig {
            variant: DetectorVariant::BlockPartition { threshold: 1.5 },
            ..DetectorConfig::default()
        }));
        assert!(bad(DetectorConfig {
            variant: DetectorVariant::PaddedDualWindow { ratio: -0.1 },
            ..DetectorConfig::default()
        }));
    }

    #[test]
    fn kinds_parse_from_cli_names() {
        assert_eq!("padded".parse::<DetectorKind>().ok(), Some(DetectorKind::PaddedDualWindow));
        assert_eq!("block".parse::<DetectorKind>().ok(), Some(DetectorKind::BlockPartition));
        assert_eq!("ms".parse::<TimeUnit>().ok(), Some(TimeUnit::Milliseconds));
        assert_eq!(DetectorVariant::default().kind(), DetectorKind::BlockPartition);
    }
}
