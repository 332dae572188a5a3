use std::path::Path;

use perfmon_core::analysis::{ClassificationReport, ConfusionMatrix, LogAnalysis, LogFile};
use perfmon_core::orchestrator::{EventFn, OrchestratorConfig, RunReport};
use perfmon_core::{ExperimentDescriptor, HostSpec};

use crate::cli::OutputFormat;

mod human;
mod json;

pub(crate) trait OutputFormatter: Send + Sync {
    fn print_run_header(
        &self,
        descriptor: &ExperimentDescriptor,
        hosts: &[HostSpec],
        config: &OrchestratorConfig,
    );
    fn events(&self) -> Option<EventFn>;
    fn print_run_report(&self, report: &RunReport) -> anyhow::Result<()>;

    fn print_analysis(
        &self,
        log: &LogFile,
        analysis: &LogAnalysis,
        csv: Option<&Path>,
    ) -> anyhow::Result<()>;
    fn print_analysis_failure(&self, log: &LogFile, error: &anyhow::Error);
    fn print_analysis_totals(&self, totals: &AnalysisTotals) -> anyhow::Result<()>;
}

pub(crate) fn formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::HumanReadable => Box::new(human::HumanReadableOutput),
        OutputFormat::Json => Box::new(json::JsonOutput),
    }
}

/// Pooled confusion matrix over every log that was analyzed successfully.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct AnalysisTotals {
    pub analyzed: usize,
    pub failed: usize,
    pub matrix: ConfusionMatrix,
}

impl AnalysisTotals {
    pub(crate) fn add(&mut self, report: &ClassificationReport) {
        self.analyzed += 1;
        self.matrix.true_negative += report.matrix.true_negative;
        self.matrix.false_positive += report.matrix.false_positive;
        self.matrix.false_negative += report.matrix.false_negative;
        self.matrix.true_positive += report.matrix.true_positive;
    }

    pub(crate) fn report(&self) -> ClassificationReport {
        ClassificationReport::from(self.matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_pool_matrices() {
        let mut totals = AnalysisTotals::default();
        totals.add(&ClassificationReport::from(ConfusionMatrix {
            true_negative: 3,
            false_positive: 1,
            false_negative: 0,
            true_positive: 2,
        }));
        totals.add(&ClassificationReport::from(ConfusionMatrix {
            true_negative: 1,
            false_positive: 0,
            false_negative: 2,
            true_positive: 2,
        }));

        assert_eq!(totals.analyzed, 2);
        assert_eq!(totals.matrix.as_array(), [[4, 1], [2, 4]]);
        let report = totals.report();
        assert_eq!(report.support, 6);
        assert!((report.precision - 0.8).abs() < 1e-12);
    }
}
