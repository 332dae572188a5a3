use std::sync::Arc;

use anyhow::Context as _;
use perfmon_core::descriptor::{ExperimentDescriptor, load_hosts};
use perfmon_core::orchestrator::{
    ExperimentOrchestrator, Launcher, LocalShell, OrchestratorConfig, RunOutcome, SshShell,
};
use tokio_util::sync::CancellationToken;

use crate::cli::RunArgs;
use crate::exit_codes::ExitCode;
use crate::output;
use crate::run_error::RunError;

pub async fn run(args: RunArgs) -> Result<ExitCode, RunError> {
    if args.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(RunError::InvalidInput(anyhow::anyhow!("--name must not be empty")));
    }

    let hosts = load_hosts(&args.hosts)
        .context("load monitored hosts")
        .map_err(RunError::InvalidInput)?;
    let descriptors = args
        .descriptors
        .iter()
        .map(|path| ExperimentDescriptor::load(path))
        .collect::<Result<Vec<_>, _>>()
        .context("load experiment descriptor")
        .map_err(RunError::InvalidInput)?;

    let remote_path = remote_path(args.remote_path.as_deref())
        .context("resolve remote PATH directory")
        .map_err(RunError::RuntimeError)?;

    let launcher: Arc<dyn Launcher> = if args.local {
        Arc::new(LocalShell)
    } else {
        Arc::new(ssh_shell(&args))
    };
    let out = output::formatter(args.output);

    let cancel = CancellationToken::new();
    let signal = tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    let batch = descriptors.len() > 1;
    let mut interrupted = false;
    let mut children_failed = false;

    for (i, descriptor) in descriptors.iter().enumerate() {
        if i > 0 && !args.pause.is_zero() {
            tracing::info!(pause = ?args.pause, next = %descriptor.name, "pausing between experiments");
            tokio::select! {
                () = cancel.cancelled() => {
                    interrupted = true;
                    break;
                }
                () = tokio::time::sleep(args.pause) => {}
            }
        }

        let config = OrchestratorConfig {
            name: run_name(args.name.as_deref(), &descriptor.name, batch),
            interval: args.interval,
            duration: args.duration,
            log_dir: args.log_dir.clone(),
            remote_path: Some(remote_path.clone()),
            collector_program: args.collector_program.clone(),
        };
        let orchestrator = ExperimentOrchestrator::new(launcher.clone(), config)
            .map_err(|e| RunError::InvalidInput(e.into()))?;
        let orchestrator = match out.events() {
            Some(events) => orchestrator.with_events(events),
            None => orchestrator,
        };

        out.print_run_header(descriptor, &hosts, orchestrator.config());
        let report = orchestrator
            .run(descriptor, &hosts, cancel.clone())
            .await
            .map_err(|e| RunError::RuntimeError(e.into()))?;
        out.print_run_report(&report)
            .map_err(RunError::RuntimeError)?;

        children_failed |= !report.is_clean();
        if report.outcome == RunOutcome::Interrupted {
            interrupted = true;
            break;
        }
    }
    signal.abort();

    Ok(if interrupted {
        ExitCode::Interrupted
    } else if children_failed {
        ExitCode::ChildrenFailed
    } else {
        ExitCode::Success
    })
}

fn ssh_shell(args: &RunArgs) -> SshShell {
    let mut ssh = SshShell {
        program: args.ssh_program.clone(),
        user: args.ssh_user.clone(),
        ..SshShell::default()
    };
    ssh.options.extend(args.ssh_options.iter().cloned());
    ssh
}

/// Directory appended to PATH on the monitored hosts: `--remote-path`, else the working directory.
///
/// The hosts are expected to share this machine's layout, so the collector is found there too.
fn remote_path(explicit: Option<&str>) -> anyhow::Result<String> {
    if let Some(dir) = explicit {
        return Ok(dir.to_string());
    }
    let cwd = std::env::current_dir().context("read current directory")?;
    Ok(cwd.to_string_lossy().into_owned())
}

/// Log file prefix of one experiment: `--name`, the descriptor stem, or both in a batch.
fn run_name(explicit: Option<&str>, stem: &str, batch: bool) -> String {
    match explicit {
        Some(name) if batch => format!("{name}_{stem}"),
        Some(name) => name.to_string(),
        None => stem.to_string(),
    }
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::warn!("interrupt received, stopping experiment");
        cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_name_prefers_flag_and_disambiguates_batches() {
        assert_eq!(run_name(None, "bulk", false), "bulk");
        assert_eq!(run_name(Some("exp"), "bulk", false), "exp");
        assert_eq!(run_name(Some("exp"), "bulk", true), "exp_bulk");
        assert_eq!(run_name(None, "bulk", true), "bulk");
    }

    #[test]
    fn remote_path_flag_overrides_working_directory() -> anyhow::Result<()> {
        assert_eq!(remote_path(Some("/opt/perfmon"))?, "/opt/perfmon");
        let cwd = std::env::current_dir()?;
        assert_eq!(remote_path(None)?, cwd.to_string_lossy());
        Ok(())
    }

    #[test]
    fn default_run_extends_remote_path() -> anyhow::Result<()> {
        let descriptor = perfmon_core::descriptor::ExperimentDescriptor::from_json_str(
            "exp",
            r#"[{ "testname": "t", "host1": { "name": "s1", "cmd": "iperf3 -s" } }]"#,
        )?;
        let config = OrchestratorConfig {
            remote_path: Some(remote_path(None)?),
            ..OrchestratorConfig::default()
        };
        let units = perfmon_core::orchestrator::plan_launches(&descriptor, &[], &config);
        let script = &units[0].command.script;
        assert!(script.starts_with("export PATH=\"$PATH\":"), "{script}");
        assert!(script.ends_with("sleep 0 ; { iperf3 -s ; } > /dev/null 2>&1"), "{script}");
        Ok(())
    }
}
