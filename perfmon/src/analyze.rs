use std::path::{Path, PathBuf};

use anyhow::{Context as _, anyhow, bail};
use perfmon_core::analysis::{
    AnalysisConfig, DetectorConfig, DetectorKind, DetectorVariant, LogAnalysis, LogFile,
    PeakDetector, SampleSeriesBuilder, SeriesConfig, TimeUnit, analyze_log, discover_logs,
    read_raw_log,
};

use crate::cli::AnalyzeArgs;
use crate::csv_export;
use crate::exit_codes::ExitCode;
use crate::output::{self, AnalysisTotals};
use crate::run_error::RunError;

pub fn analyze(args: AnalyzeArgs) -> Result<ExitCode, RunError> {
    let cfg = analysis_config(&args).map_err(RunError::InvalidInput)?;

    let logs = discover_logs(&args.paths)
        .context("list logs")
        .map_err(RunError::InvalidInput)?;
    if logs.is_empty() {
        return Err(RunError::InvalidInput(anyhow!(
            "no .log files found under {}",
            args.paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    if let Some(dir) = &args.csv_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create {}", dir.display()))
            .map_err(RunError::RuntimeError)?;
    }

    let out = output::formatter(args.output);
    let mut totals = AnalysisTotals::default();

    for log in &logs {
        // One bad log must not hide the results of the others.
        match analyze_one(log, &cfg, args.csv_dir.as_deref()) {
            Ok((analysis, csv)) => {
                out.print_analysis(log, &analysis, csv.as_deref())
                    .map_err(RunError::RuntimeError)?;
                totals.add(&analysis.report);
            }
            Err(err) => {
                tracing::error!(path = %log.path.display(), error = %format!("{err:#}"), "analysis failed");
                out.print_analysis_failure(log, &err);
                totals.failed += 1;
            }
        }
    }

    out.print_analysis_totals(&totals)
        .map_err(RunError::RuntimeError)?;

    Ok(if totals.failed > 0 {
        ExitCode::AnalysisFailed
    } else {
        ExitCode::Success
    })
}

fn analyze_one(
    log: &LogFile,
    cfg: &AnalysisConfig,
    csv_dir: Option<&Path>,
) -> anyhow::Result<(LogAnalysis, Option<PathBuf>)> {
    let raw = read_raw_log(&log.path)?;
    let analysis = analyze_log(&raw, cfg)
        .with_context(|| format!("analyze {}", log.path.display()))?;
    tracing::debug!(
        path = %log.path.display(),
        samples = analysis.series.len(),
        f1 = analysis.report.f1,
        "analyzed"
    );

    let csv = match csv_dir {
        Some(dir) => {
            let path = dir.join(format!("{}.csv", log.label()));
            csv_export::export_analysis(&path, &analysis, cfg.score_cutoff)?;
            Some(path)
        }
        None => None,
    };
    Ok((analysis, csv))
}

/// Maps the flags onto an [`AnalysisConfig`] and validates it before any file is read.
fn analysis_config(args: &AnalyzeArgs) -> anyhow::Result<AnalysisConfig> {
    let variant = match (args.detector, args.threshold, args.ratio) {
        (DetectorKind::BlockPartition, _, Some(_)) => {
            bail!("--ratio only applies to the padded detector")
        }
        (DetectorKind::PaddedDualWindow, Some(_), _) => {
            bail!("--threshold only applies to the block detector")
        }
        (DetectorKind::BlockPartition, Some(threshold), None) => {
            DetectorVariant::BlockPartition { threshold }
        }
        (DetectorKind::PaddedDualWindow, None, Some(ratio)) => {
            DetectorVariant::PaddedDualWindow { ratio }
        }
        (kind, _, _) => kind.with_defaults(),
    };

    if !args.no_cutoff && !(args.cutoff.is_finite() && args.cutoff >= 0.0) {
        bail!("--cutoff must be a non-negative number of seconds, got {}", args.cutoff);
    }
    if !(0.0..=1.0).contains(&args.score_cutoff) {
        bail!("--score-cutoff must be within [0, 1], got {}", args.score_cutoff);
    }

    let cfg = AnalysisConfig {
        series: SeriesConfig {
            time_cutoff: (!args.no_cutoff).then_some(args.cutoff),
            queue_threshold: args.queue_threshold,
            interval: args.interval.map(|d| d.as_secs_f64()),
            qdisc_kind: args.qdisc.clone(),
        },
        detector: DetectorConfig {
            short_term_ms: args.short_window.as_secs_f64() * 1000.0,
            long_term_ms: args.long_window.as_secs_f64() * 1000.0,
            time_unit: TimeUnit::Seconds,
            variant,
            median_kernel: args.median_kernel,
        },
        metric: args.metric,
        score_cutoff: args.score_cutoff,
    };

    SampleSeriesBuilder::new(cfg.series.clone())?;
    PeakDetector::new(cfg.detector.clone())?;
    Ok(cfg)
}
