use std::path::Path;

use serde::Serialize;

use crate::counter_log::RawLog;

use super::error::{Error, Result};
use super::evaluate::{ClassificationReport, peak_flags};
use super::peak::{DetectorConfig, PeakDetector, PeakResult, TimeUnit};
use super::series::{RateSeries, SampleSeriesBuilder, SeriesConfig, ThroughputMetric};

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    pub series: SeriesConfig,
    pub detector: DetectorConfig,
    pub metric: ThroughputMetric,
    /// Scores at or above this are counted as predicted peaks.
    pub score_cutoff: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            series: SeriesConfig::default(),
            detector: DetectorConfig::default(),
            metric: ThroughputMetric::default(),
            score_cutoff: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogAnalysis {
    pub series: RateSeries,
    pub peaks: PeakResult,
    pub report: ClassificationReport,
}

pub fn read_raw_log(path: &Path) -> Result<RawLog> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    RawLog::parse(&text).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Builds the rate series, runs the detector on the selected metric and scores the
/// predicted peaks against `queue_exists`.
///
/// The detector always sees the series' relative time, which is in seconds; the configured
/// time unit is overridden accordingly.
pub fn analyze_log(log: &RawLog, cfg: &AnalysisConfig) -> Result<LogAnalysis> {
    if !(0.0..=1.0).contains(&cfg.score_cutoff) {
        return Err(Error::InvalidThreshold {
            what: "score cutoff",
            range: "[0, 1]",
            value: cfg.score_cutoff,
        });
    }

    let series = SampleSeriesBuilder::new(cfg.series.clone())?.build(log)?;
    let detector = PeakDetector::new(DetectorConfig {
        time_unit: TimeUnit::Seconds,
        ..cfg.detector.clone()
    })?;
    let peaks = detector.detect(&series.relative_time, series.metric(cfg.metric))?;
    let predicted = peak_flags(&peaks.score, cfg.score_cutoff);
    let report = ClassificationReport::evaluate(&series.queue_exists, &predicted)?;

    Ok(LogAnalysis {
        series,
        peaks,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::DetectorKind;
    use crate::counter_log::{QdiscSample, RawSample};

    fn synthetic_log() -> RawLog {
        // 4 s at 20 ms; the link saturates (and a queue builds) between 1 s and 3 s.
        let samples = (0..=200u32)
            .map(|i| {
                let busy = (50..150).contains(&i);
                RawSample {
                    timestamp: 1_700_000_000.0 + f64::from(i) * 0.02,
                    rx_packets: 10,
                    rx_bytes: 1000,
                    tx_packets: if busy { 160 } else { 20 },
                    tx_bytes: if busy { 250_000 } else { 25_000 },
                    qdiscs: vec![QdiscSample {
                        kind: "fq_codel".to_string(),
                        backlog: if busy { u64::from(i % 2) * 3000 } else { 0 },
                        bytes: 0,
                        packets: 0,
                        drops: 0,
                        overlimits: 0,
                    }],
                }
            })
            .collect();
        RawLog::from_samples(samples)
    }

    #[test]
    fn analysis_outputs_line_up_with_series() -> Result<()> {
        let a = analyze_log(&synthetic_log(), &AnalysisConfig::default())?;
        assert_eq!(a.series.len(), 200);
        assert_eq!(a.peaks.score.len(), 200);
        assert_eq!(a.peaks.long_term_step, 50);
        assert_eq!(a.report.matrix.total(), 200);
        assert!(a.report.support > 0);
        Ok(())
    }

    #[test]
    fn dual_window_variant_runs_through_pipeline() -> Result<()> {
        let cfg = AnalysisConfig {
            detector: DetectorConfig {
                variant: DetectorKind::PaddedDualWindow.with_defaults(),
                // Relative time is always seconds; this must not change the step size.
                time_unit: TimeUnit::Milliseconds,
                ..DetectorConfig::default()
            },
            ..AnalysisConfig::default()
        };
        let a = analyze_log(&synthetic_log(), &cfg)?;
        assert_eq!(a.peaks.long_term_step, 50);
        assert!(a.peaks.short_term_envelope.is_some());
        Ok(())
    }

    #[test]
    fn out_of_range_cutoff_is_rejected() {
        let cfg = AnalysisConfig {
            score_cutoff: 1.2,
            ..AnalysisConfig::default()
        };
        assert!(matches!(
            analyze_log(&synthetic_log(), &cfg),
            Err(Error::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn read_raw_log_names_the_file_on_parse_error() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.log");
        std::fs::write(&path, "# header\n1 2 3\n")?;
        match read_raw_log(&path) {
            Err(Error::Parse { path: p, source }) => {
                assert_eq!(p, path);
                assert_eq!(source.line, 2);
            }
            other => panic!("expected parse error, got {other:?}"),
        }
        Ok(())
    }
}
