use std::io::Write as _;
use std::path::Path;
use std::sync::Arc;

use perfmon_core::analysis::{ClassificationReport, LogAnalysis, LogFile};
use perfmon_core::orchestrator::{
    ChildExit, EventFn, HandleState, KillFailure, OrchestratorConfig, OrchestratorEvent,
    ProcessRole, RunOutcome, RunReport, SpawnFailure, UnitSpec,
};
use perfmon_core::{ExperimentDescriptor, HostSpec};
use serde::Serialize;

use super::{AnalysisTotals, OutputFormatter};

pub(crate) struct JsonOutput;

impl OutputFormatter for JsonOutput {
    fn print_run_header(
        &self,
        _descriptor: &ExperimentDescriptor,
        _hosts: &[HostSpec],
        _config: &OrchestratorConfig,
    ) {
    }

    fn events(&self) -> Option<EventFn> {
        Some(Arc::new(|event| emit_json_line(&build_event_line(&event))))
    }

    fn print_run_report(&self, report: &RunReport) -> anyhow::Result<()> {
        emit_json_line(&build_run_line(report));
        Ok(())
    }

    fn print_analysis(
        &self,
        log: &LogFile,
        analysis: &LogAnalysis,
        csv: Option<&Path>,
    ) -> anyhow::Result<()> {
        emit_json_line(&build_analysis_line(log, analysis, csv));
        Ok(())
    }

    fn print_analysis_failure(&self, log: &LogFile, error: &anyhow::Error) {
        emit_json_line(&JsonAnalysisErrorLine {
            kind: "analysis_error",
            path: log.path.display().to_string(),
            error: format!("{error:#}"),
        });
    }

    fn print_analysis_totals(&self, totals: &AnalysisTotals) -> anyhow::Result<()> {
        emit_json_line(&JsonAnalysisTotalsLine {
            kind: "analysis_totals",
            analyzed: totals.analyzed,
            failed: totals.failed,
            report: totals.report(),
        });
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum JsonEvent {
    Spawned {
        index: usize,
        pid: u32,
        role: ProcessRole,
        unit: UnitSpec,
    },
    SpawnFailed {
        role: ProcessRole,
        unit: UnitSpec,
        error: String,
    },
    Exited {
        index: usize,
        pid: u32,
        exit: ChildExit,
    },
    Killed {
        index: usize,
        pid: u32,
        delivered: bool,
    },
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonEventLine {
    pub kind: &'static str,
    #[serde(flatten)]
    pub event: JsonEvent,
}

fn build_event_line(event: &OrchestratorEvent) -> JsonEventLine {
    let event = match event.clone() {
        OrchestratorEvent::Spawned {
            index,
            pid,
            role,
            spec,
        } => JsonEvent::Spawned {
            index,
            pid,
            role,
            unit: spec,
        },
        OrchestratorEvent::SpawnFailed { role, spec, error } => JsonEvent::SpawnFailed {
            role,
            unit: spec,
            error,
        },
        OrchestratorEvent::Exited { index, pid, exit } => JsonEvent::Exited { index, pid, exit },
        OrchestratorEvent::Killed {
            index,
            pid,
            delivered,
        } => JsonEvent::Killed {
            index,
            pid,
            delivered,
        },
    };
    JsonEventLine {
        kind: "event",
        event,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonRunLine<'a> {
    pub kind: &'static str,
    pub name: &'a str,
    pub outcome: RunOutcome,
    pub elapsed_secs: f64,
    pub clean: bool,
    pub children: Vec<JsonChild<'a>>,
    pub spawn_failures: &'a [SpawnFailure],
    pub kill_failures: &'a [KillFailure],
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonChild<'a> {
    pub pid: u32,
    pub role: ProcessRole,
    pub unit: &'a UnitSpec,
    pub state: &'static str,
    pub exit: Option<ChildExit>,
}

fn build_run_line(report: &RunReport) -> JsonRunLine<'_> {
    let children = report
        .registry
        .handles()
        .iter()
        .map(|h| {
            let (state, exit) = match h.state {
                HandleState::Live => ("live", None),
                HandleState::Exited(exit) => ("exited", Some(exit)),
                HandleState::Killed => ("killed", None),
            };
            JsonChild {
                pid: h.pid,
                role: h.role,
                unit: &h.spec,
                state,
                exit,
            }
        })
        .collect();

    JsonRunLine {
        kind: "run",
        name: &report.name,
        outcome: report.outcome,
        elapsed_secs: report.elapsed.as_secs_f64(),
        clean: report.is_clean(),
        children,
        spawn_failures: &report.spawn_failures,
        kill_failures: &report.kill_failures,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonAnalysisLine {
    pub kind: &'static str,
    pub path: String,
    pub label: String,
    pub samples: usize,
    pub interval_secs: f64,
    pub short_term_step: usize,
    pub long_term_step: usize,
    pub report: ClassificationReport,
    pub csv: Option<String>,
}

fn build_analysis_line(
    log: &LogFile,
    analysis: &LogAnalysis,
    csv: Option<&Path>,
) -> JsonAnalysisLine {
    JsonAnalysisLine {
        kind: "analysis",
        path: log.path.display().to_string(),
        label: log.label(),
        samples: analysis.series.len(),
        interval_secs: analysis.series.interval,
        short_term_step: analysis.peaks.short_term_step,
        long_term_step: analysis.peaks.long_term_step,
        report: analysis.report,
        csv: csv.map(|p| p.display().to_string()),
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonAnalysisErrorLine {
    pub kind: &'static str,
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct JsonAnalysisTotalsLine {
    pub kind: &'static str,
    pub analyzed: usize,
    pub failed: usize,
    pub report: ClassificationReport,
}

fn emit_json_line<T: Serialize>(line: &T) {
    let mut out = std::io::stdout().lock();
    if serde_json::to_writer(&mut out, line).is_ok() {
        let _ = writeln!(out);
    }
}
