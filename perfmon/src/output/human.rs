use std::path::Path;

use perfmon_core::analysis::{ClassificationReport, LABELS, LogAnalysis, LogFile};
use perfmon_core::orchestrator::{EventFn, HandleState, OrchestratorConfig, RunReport};
use perfmon_core::{ExperimentDescriptor, HostSpec};

use super::{AnalysisTotals, OutputFormatter};

/// Lifecycle lines come from the tracing logs on stderr; stdout only gets the summaries.
pub(crate) struct HumanReadableOutput;

impl OutputFormatter for HumanReadableOutput {
    fn print_run_header(
        &self,
        descriptor: &ExperimentDescriptor,
        hosts: &[HostSpec],
        config: &OrchestratorConfig,
    ) {
        let collectors: usize = hosts.iter().map(|h| h.interfaces.len()).sum();
        println!(
            "experiment: {} tests={} generators={} collectors={}",
            config.name,
            descriptor.tests.len(),
            descriptor.endpoint_count(),
            collectors
        );
        println!(
            "sampling: interval={:?} time={:?} last start offset={}s",
            config.interval,
            config.duration,
            descriptor.max_start_offset()
        );
        println!("logs: {}", config.log_dir.display());
        println!();
    }

    fn events(&self) -> Option<EventFn> {
        None
    }

    fn print_run_report(&self, report: &RunReport) -> anyhow::Result<()> {
        print!("{}", render_run_report(report));
        Ok(())
    }

    fn print_analysis(
        &self,
        log: &LogFile,
        analysis: &LogAnalysis,
        csv: Option<&Path>,
    ) -> anyhow::Result<()> {
        println!("log: {} ({})", log.path.display(), log.label());
        println!(
            "  samples={} interval={:.3}s steps short={} long={}",
            analysis.series.len(),
            analysis.series.interval,
            analysis.peaks.short_term_step,
            analysis.peaks.long_term_step
        );
        print!("{}", render_report(&analysis.report));
        if let Some(path) = csv {
            println!("  csv: {}", path.display());
        }
        println!();
        Ok(())
    }

    fn print_analysis_failure(&self, log: &LogFile, error: &anyhow::Error) {
        println!("log: {} FAILED: {error:#}", log.path.display());
        println!();
    }

    fn print_analysis_totals(&self, totals: &AnalysisTotals) -> anyhow::Result<()> {
        println!("analyzed={} failed={}", totals.analyzed, totals.failed);
        if totals.analyzed > 0 {
            print!("{}", render_report(&totals.report()));
        }
        Ok(())
    }
}

fn render_run_report(report: &RunReport) -> String {
    let mut out = String::new();
    let handles = report.registry.handles();
    let killed = handles
        .iter()
        .filter(|h| h.state == HandleState::Killed)
        .count();
    let failed = report.failed_children();

    out.push_str(&format!(
        "experiment {} {} in {:.1}s\n",
        report.name,
        report.outcome,
        report.elapsed.as_secs_f64()
    ));
    out.push_str(&format!(
        "  spawned={} failed={} killed={} spawn_failures={}\n",
        handles.len(),
        failed.len(),
        killed,
        report.spawn_failures.len()
    ));
    for h in failed {
        let HandleState::Exited(exit) = h.state else {
            continue;
        };
        out.push_str(&format!(
            "  failed: {} {} pid={} ({exit})\n",
            h.role, h.spec, h.pid
        ));
    }
    for f in &report.spawn_failures {
        out.push_str(&format!(
            "  not spawned: {} {}: {}\n",
            f.role, f.spec, f.error
        ));
    }
    for f in &report.kill_failures {
        out.push_str(&format!("  kill failed: {} pid={}: {}\n", f.spec, f.pid, f.error));
    }
    out
}

fn render_report(report: &ClassificationReport) -> String {
    let m = report.matrix.as_array();
    let width = LABELS.iter().map(|l| l.len()).max().unwrap_or(0);

    let mut out = format!(
        "  accuracy={:.3} precision={:.3} recall={:.3} f1={:.3} support={}\n",
        report.accuracy, report.precision, report.recall, report.f1, report.support
    );
    out.push_str(&format!(
        "  {:>width$}  {:>8} {:>8}\n",
        "actual\\pred", LABELS[0], LABELS[1],
        width = width.max(11)
    ));
    for (label, row) in LABELS.iter().zip(m) {
        out.push_str(&format!(
            "  {:>width$}  {:>8} {:>8}\n",
            label,
            row[0],
            row[1],
            width = width.max(11)
        ));
    }
    out
}
