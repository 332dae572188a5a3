//! Offline analysis of collector logs: rate series, peak detection and scoring against the
//! queue-occupancy ground truth.

mod discover;
mod error;
mod evaluate;
mod peak;
mod pipeline;
mod series;

pub use discover::{LinkDirection, LogFile, discover_logs};
pub use error::{Error, Result};
pub use evaluate::{ClassificationReport, ConfusionMatrix, LABELS, peak_flags};
pub use peak::{
    DetectorConfig, DetectorKind, DetectorVariant, PeakDetector, PeakResult, TimeUnit,
    median_filter,
};
pub use pipeline::{AnalysisConfig, LogAnalysis, analyze_log, read_raw_log};
pub use series::{RateSeries, SampleSeriesBuilder, SeriesConfig, ThroughputMetric};
