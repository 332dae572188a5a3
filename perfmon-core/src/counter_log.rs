//! Line format shared by the collector (writer) and the analysis pipeline (reader).
//!
//! ```text
//! # time, rx_packets, rx_bytes, tx_packets, tx_bytes, qdisc, backlog, bytes, packets, drops, overlimits, repeat...
//! 1718000000.020000 12 1500 40 60000 fq_codel 0 123456 900 0 0
//! ```
//!
//! Counter columns are deltas since the previous line. The trailing qdisc group repeats once
//! per queueing discipline reported on the interface.

use std::fmt;

use serde::Serialize;

pub const HEADER: &str = "# time, rx_packets, rx_bytes, tx_packets, tx_bytes, qdisc, backlog, bytes, packets, drops, overlimits, repeat...";

const LINK_FIELDS: usize = 5;
const QDISC_FIELDS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QdiscSample {
    pub kind: String,
    pub backlog: u64,
    pub bytes: u64,
    pub packets: u64,
    pub drops: u64,
    pub overlimits: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSample {
    /// Unix timestamp in seconds.
    pub timestamp: f64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub qdiscs: Vec<QdiscSample>,
}

impl RawSample {
    /// Parses one data line. `line_no` is only used for error reporting.
    pub fn parse_line(line: &str, line_no: usize) -> Result<Self, ParseError> {
        let err = |reason: String| ParseError {
            line: line_no,
            reason,
        };

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < LINK_FIELDS {
            return Err(err(format!(
                "expected at least {LINK_FIELDS} columns, found {}",
                tokens.len()
            )));
        }

        let timestamp: f64 = tokens[0]
            .parse()
            .map_err(|_| err(format!("invalid timestamp `{}`", tokens[0])))?;
        if !timestamp.is_finite() {
            return Err(err(format!("invalid timestamp `{}`", tokens[0])));
        }

        let counter = |idx: usize, name: &str| -> Result<u64, ParseError> {
            tokens[idx]
                .parse()
                .map_err(|_| err(format!("invalid {name} `{}`", tokens[idx])))
        };

        let rest = &tokens[LINK_FIELDS..];
        if rest.len() % QDISC_FIELDS != 0 {
            return Err(err(format!(
                "qdisc columns must come in groups of {QDISC_FIELDS}, found {} trailing column(s)",
                rest.len()
            )));
        }

        let mut qdiscs = Vec::with_capacity(rest.len() / QDISC_FIELDS);
        for group in rest.chunks_exact(QDISC_FIELDS) {
            let field = |idx: usize, name: &str| -> Result<u64, ParseError> {
                group[idx]
                    .parse()
                    .map_err(|_| err(format!("invalid qdisc {name} `{}`", group[idx])))
            };
            qdiscs.push(QdiscSample {
                kind: group[0].to_string(),
                backlog: field(1, "backlog")?,
                bytes: field(2, "bytes")?,
                packets: field(3, "packets")?,
                drops: field(4, "drops")?,
                overlimits: field(5, "overlimits")?,
            });
        }

        Ok(Self {
            timestamp,
            rx_packets: counter(1, "rx_packets")?,
            rx_bytes: counter(2, "rx_bytes")?,
            tx_packets: counter(3, "tx_packets")?,
            tx_bytes: counter(4, "tx_bytes")?,
            qdiscs,
        })
    }

    /// First qdisc group, or the first one of `kind` when given.
    #[must_use]
    pub fn qdisc(&self, kind: Option<&str>) -> Option<&QdiscSample> {
        match kind {
            Some(kind) => self.qdiscs.iter().find(|q| q.kind == kind),
            None => self.qdiscs.first(),
        }
    }
}

impl fmt::Display for RawSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.6} {} {} {} {}",
            self.timestamp, self.rx_packets, self.rx_bytes, self.tx_packets, self.tx_bytes
        )?;
        for q in &self.qdiscs {
            write!(
                f,
                " {} {} {} {} {} {}",
                q.kind, q.backlog, q.bytes, q.packets, q.drops, q.overlimits
            )?;
        }
        Ok(())
    }
}

/// Ordered samples of one collector log, comment and blank lines removed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawLog {
    samples: Vec<RawSample>,
}

impl RawLog {
    #[must_use]
    pub fn from_samples(samples: Vec<RawSample>) -> Self {
        Self { samples }
    }

    /// Parses a collector log.
    ///
    /// The [`HEADER`] line is optional. Any line starting with `#` is a comment and blank lines
    /// are ignored wherever they appear; every other line must be a sample, including the first.
    /// Line numbers in errors count every line of `text`.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut samples = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            samples.push(RawSample::parse_line(trimmed, idx + 1)?);
        }
        Ok(Self { samples })
    }

    #[must_use]
    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawSample {
        RawSample {
            timestamp: 1718000000.25,
            rx_packets: 10,
            rx_bytes: 1000,
            tx_packets: 20,
            tx_bytes: 30000,
            qdiscs: vec![
                QdiscSample {
                    kind: "mq".to_string(),
                    backlog: 0,
                    bytes: 5,
                    packets: 1,
                    drops: 0,
                    overlimits: 0,
                },
                QdiscSample {
                    kind: "fq_codel".to_string(),
                    backlog: 1514,
                    bytes: 99,
                    packets: 2,
                    drops: 1,
                    overlimits: 3,
                },
            ],
        }
    }

    #[test]
    fn display_matches_collector_column_order() {
        assert_eq!(
            sample().to_string(),
            "1718000000.250000 10 1000 20 30000 mq 0 5 1 0 0 fq_codel 1514 99 2 1 3"
        );
    }

    #[test]
    fn parse_reads_written_line() {
        let line = sample().to_string();
        let parsed = RawSample::parse_line(&line, 2)
            .unwrap_or_else(|e| panic!("line should parse: {e}"));
        assert_eq!(parsed, sample());
    }

    #[test]
    fn parse_skips_header_and_blank_lines() {
        let text = format!("{HEADER}\n\n0 0 0 0 0 fq 5 1 0 0 5\r\n1 10 1000 10 1000 fq 50 6 0 0 50\n");
        let log = RawLog::parse(&text).unwrap_or_else(|e| panic!("log should parse: {e}"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.samples()[1].qdiscs[0].backlog, 50);
    }

    #[test]
    fn parse_accepts_headerless_log_and_interleaved_comments() -> Result<(), ParseError> {
        let text = "0 0 0 0 0\n# restarted\n\n1 10 1000 10 1000\n";
        let log = RawLog::parse(text)?;
        assert_eq!(log.len(), 2);
        assert_eq!(log.samples()[0].rx_bytes, 0);
        assert_eq!(log.samples()[1].rx_bytes, 1000);
        Ok(())
    }

    #[test]
    fn parse_error_counts_skipped_lines() {
        match RawLog::parse("# header\n\nnot a sample\n") {
            Err(e) => assert_eq!(e.line, 3),
            Ok(_) => panic!("text line must be rejected"),
        }
    }

    #[test]
    fn parse_rejects_partial_qdisc_group() {
        let err = RawLog::parse("# header\n1 2 3 4 5 fq 1 2\n");
        match err {
            Err(e) => assert_eq!(e.line, 2),
            Ok(_) => panic!("partial qdisc group must be rejected"),
        }
    }

    #[test]
    fn parse_rejects_non_numeric_counter() {
        let err = RawSample::parse_line("1.0 x 3 4 5", 7);
        match err {
            Err(e) => {
                assert_eq!(e.line, 7);
                assert!(e.reason.contains("rx_packets"), "{}", e.reason);
            }
            Ok(_) => panic!("non-numeric counter must be rejected"),
        }
    }

    #[test]
    fn line_without_qdisc_group_is_accepted() {
        let parsed = RawSample::parse_line("3.5 1 2 3 4", 1)
            .unwrap_or_else(|e| panic!("line should parse: {e}"));
        assert!(parsed.qdiscs.is_empty());
        assert!(parsed.qdisc(None).is_none());
    }

    #[test]
    fn qdisc_lookup_by_kind() {
        let s = sample();
        assert_eq!(s.qdisc(None).map(|q| q.kind.as_str()), Some("mq"));
        assert_eq!(s.qdisc(Some("fq_codel")).map(|q| q.backlog), Some(1514));
        assert!(s.qdisc(Some("htb")).is_none());
    }
}
