use std::path::PathBuf;

use crate::counter_log::ParseError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed log {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("{what}: lengths differ ({left} vs {right})")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },

    #[error("time axis must be strictly increasing on average (mean step {0})")]
    InvalidTimeAxis(f64),

    #[error("sampling interval must be a positive number of seconds, got {0}")]
    InvalidInterval(f64),

    #[error("window widths must be positive, got short={short_ms}ms long={long_ms}ms")]
    InvalidWindow { short_ms: f64, long_ms: f64 },

    #[error("{what} must be within {range}, got {value}")]
    InvalidThreshold {
        what: &'static str,
        range: &'static str,
        value: f64,
    },

    #[error("median kernel must be odd and positive, got {0}")]
    InvalidKernel(usize),
}
