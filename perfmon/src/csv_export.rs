use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context as _, Result};
use csv::Writer;
use perfmon_core::analysis::LogAnalysis;

const COLUMNS: [&str; 20] = [
    "time",
    "relative_time",
    "rx_packets",
    "rx_bytes",
    "tx_packets",
    "tx_bytes",
    "rx_pps",
    "tx_pps",
    "rx_mbps",
    "tx_mbps",
    "backlog",
    "drops",
    "overlimits",
    "queue_size",
    "queue_exists",
    "filtered",
    "envelope",
    "score",
    "predicted",
    "short_term_envelope",
];

/// Writes the rate series with the detector outputs alongside, one row per sample.
///
/// `short_term_envelope` is left empty for detectors that do not produce one.
pub fn export_analysis(path: &Path, analysis: &LogAnalysis, score_cutoff: f64) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    write_analysis(file, analysis, score_cutoff).with_context(|| format!("write {}", path.display()))
}

fn write_analysis<W: Write>(out: W, analysis: &LogAnalysis, score_cutoff: f64) -> Result<()> {
    let s = &analysis.series;
    let p = &analysis.peaks;
    let mut wtr = Writer::from_writer(out);

    wtr.write_record(COLUMNS)?;
    for i in 0..s.len() {
        let short = p
            .short_term_envelope
            .as_ref()
            .and_then(|e| e.get(i))
            .map(f64::to_string)
            .unwrap_or_default();
        wtr.write_record([
            format!("{:.6}", s.time[i]),
            format!("{:.6}", s.relative_time[i]),
            s.rx_packets[i].to_string(),
            s.rx_bytes[i].to_string(),
            s.tx_packets[i].to_string(),
            s.tx_bytes[i].to_string(),
            s.rx_pps[i].to_string(),
            s.tx_pps[i].to_string(),
            s.rx_mbps[i].to_string(),
            s.tx_mbps[i].to_string(),
            s.backlog[i].to_string(),
            s.drops[i].to_string(),
            s.overlimits[i].to_string(),
            s.queue_size[i].to_string(),
            u8::from(s.queue_exists[i]).to_string(),
            p.filtered[i].to_string(),
            p.envelope[i].to_string(),
            p.score[i].to_string(),
            u8::from(p.score[i] >= score_cutoff).to_string(),
            short,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
