use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::descriptor::{ExperimentDescriptor, HostSpec};

use super::config::OrchestratorConfig;
use super::error::{Error, Result};
use super::events::{EventFn, OrchestratorEvent};
use super::handle::{ProcessRole, Registry, RemoteProcessHandle, UnitSpec};
use super::launcher::{ChildExit, KillError, Launcher};
use super::plan::{LaunchUnit, plan_launches};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    #[strum(serialize = "completed")]
    Completed,
    #[strum(serialize = "interrupted")]
    Interrupted,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpawnFailure {
    pub role: ProcessRole,
    pub spec: UnitSpec,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct KillFailure {
    pub pid: u32,
    pub spec: UnitSpec,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub name: String,
    pub outcome: RunOutcome,
    pub registry: Registry,
    pub spawn_failures: Vec<SpawnFailure>,
    pub kill_failures: Vec<KillFailure>,
    pub elapsed: Duration,
}

impl RunReport {
    #[must_use]
    pub fn failed_children(&self) -> Vec<&RemoteProcessHandle> {
        self.registry.handles().iter().filter(|h| h.failed()).collect()
    }

    /// Completed, every unit spawned, and every child exited with status 0.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.outcome == RunOutcome::Completed
            && self.spawn_failures.is_empty()
            && self.failed_children().is_empty()
    }
}

/// Spawns one experiment's collectors and generators and waits for all of them.
pub struct ExperimentOrchestrator {
    launcher: Arc<dyn Launcher>,
    config: OrchestratorConfig,
    events: Option<EventFn>,
}

impl ExperimentOrchestrator {
    pub fn new(launcher: Arc<dyn Launcher>, config: OrchestratorConfig) -> Result<Self> {
        if config.interval.is_zero() {
            return Err(Error::InvalidInterval);
        }
        if config.name.trim().is_empty() {
            return Err(Error::EmptyName);
        }
        Ok(Self {
            launcher,
            config,
            events: None,
        })
    }

    #[must_use]
    pub fn with_events(mut self, events: EventFn) -> Self {
        self.events = Some(events);
        self
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs one experiment. Returns once every spawned child exited, or right after the
    /// kill sweep when `cancel` fires.
    pub async fn run(
        &self,
        descriptor: &ExperimentDescriptor,
        hosts: &[HostSpec],
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        if hosts.iter().any(|h| !h.interfaces.is_empty()) {
            tokio::fs::create_dir_all(&self.config.log_dir)
                .await
                .map_err(|source| Error::LogDir {
                    path: self.config.log_dir.clone(),
                    source,
                })?;
        }

        let units = plan_launches(descriptor, hosts, &self.config);
        tracing::info!(
            experiment = %self.config.name,
            collectors = units.iter().filter(|u| u.role == ProcessRole::Collector).count(),
            generators = descriptor.endpoint_count(),
            "starting experiment"
        );
        Ok(self.run_units(units, cancel).await)
    }

    pub async fn run_units(&self, units: Vec<LaunchUnit>, cancel: CancellationToken) -> RunReport {
        let started = Instant::now();
        let mut registry = Registry::default();
        let mut spawn_failures = Vec::new();
        let mut kill_failures = Vec::new();
        let mut waiters: JoinSet<(usize, io::Result<ChildExit>)> = JoinSet::new();

        for unit in units {
            if cancel.is_cancelled() {
                break;
            }
            tracing::debug!(command = %self.launcher.describe(&unit.command), "launching");

            match self.launcher.launch(&unit.command) {
                Ok(child) => {
                    let index = registry.register(child.pid, unit.role, unit.spec.clone());
                    tracing::info!(
                        role = %unit.role,
                        unit = %unit.spec,
                        pid = child.pid,
                        "spawned"
                    );
                    self.emit(OrchestratorEvent::Spawned {
                        index,
                        pid: child.pid,
                        role: unit.role,
                        spec: unit.spec,
                    });
                    let exit = child.exit;
                    waiters.spawn(async move { (index, exit.await) });
                }
                Err(err) => {
                    tracing::error!(
                        role = %unit.role,
                        unit = %unit.spec,
                        error = %err,
                        "failed to spawn"
                    );
                    self.emit(OrchestratorEvent::SpawnFailed {
                        role: unit.role,
                        spec: unit.spec.clone(),
                        error: err.to_string(),
                    });
                    spawn_failures.push(SpawnFailure {
                        role: unit.role,
                        spec: unit.spec,
                        error: err.to_string(),
                    });
                }
            }
        }

        let outcome = loop {
            if waiters.is_empty() {
                break if cancel.is_cancelled() {
                    RunOutcome::Interrupted
                } else {
                    RunOutcome::Completed
                };
            }

            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    // Exits that already landed are recorded first so their PIDs are never signalled.
                    while let Some(joined) = waiters.try_join_next() {
                        self.settle(&mut registry, joined);
                    }
                    kill_failures = self.kill_sweep(&mut registry);
                    break RunOutcome::Interrupted;
                }

                joined = waiters.join_next() => match joined {
                    Some(joined) => self.settle(&mut registry, joined),
                    None => break RunOutcome::Completed,
                },
            }
        };

        // Interrupted: remaining waiters are dropped with the set; the children were killed.
        waiters.abort_all();

        let report = RunReport {
            name: self.config.name.clone(),
            outcome,
            registry,
            spawn_failures,
            kill_failures,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            experiment = %report.name,
            outcome = %report.outcome,
            spawned = report.registry.len(),
            failed = report.failed_children().len(),
            spawn_failures = report.spawn_failures.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "experiment finished"
        );
        report
    }

    fn settle(
        &self,
        registry: &mut Registry,
        joined: std::result::Result<(usize, io::Result<ChildExit>), JoinError>,
    ) {
        match joined {
            Ok((index, result)) => self.reap(registry, index, result),
            Err(err) => tracing::error!(error = %err, "exit waiter failed"),
        }
    }

    fn reap(&self, registry: &mut Registry, index: usize, result: io::Result<ChildExit>) {
        let exit = match result {
            Ok(exit) => exit,
            Err(err) => {
                tracing::error!(index, error = %err, "failed to wait for child");
                ChildExit::Abnormal
            }
        };
        if !registry.mark_exited(index, exit) {
            return;
        }
        let Some(handle) = registry.get(index) else {
            return;
        };

        if exit.success() {
            tracing::info!(role = %handle.role, unit = %handle.spec, pid = handle.pid, "exited");
        } else {
            tracing::warn!(
                role = %handle.role,
                unit = %handle.spec,
                pid = handle.pid,
                exit = %exit,
                "child failed"
            );
        }
        self.emit(OrchestratorEvent::Exited {
            index,
            pid: handle.pid,
            exit,
        });
    }

    fn kill_sweep(&self, registry: &mut Registry) -> Vec<KillFailure> {
        let live = registry.live_indices();
        tracing::warn!(live = live.len(), "interrupted, killing live children");

        let mut failures = Vec::new();
        for index in live {
            let Some(handle) = registry.get(index) else {
                continue;
            };
            let pid = handle.pid;
            let spec = handle.spec.clone();

            let delivered = match self.launcher.kill(pid) {
                Ok(()) => {
                    tracing::info!(unit = %spec, pid, "killed");
                    true
                }
                Err(err) => {
                    match err {
                        KillError::NotRunning(_) => {
                            tracing::warn!(unit = %spec, pid, "kill skipped, process already gone");
                        }
                        KillError::SignalFailed(_) => {
                            tracing::error!(unit = %spec, pid, error = %err, "kill failed");
                        }
                    }
                    failures.push(KillFailure {
                        pid,
                        spec,
                        error: err.to_string(),
                    });
                    false
                }
            };

            registry.mark_killed(index);
            self.emit(OrchestratorEvent::Killed {
                index,
                pid,
                delivered,
            });
        }
        failures
    }

    fn emit(&self, event: OrchestratorEvent) {
        if let Some(events) = &self.events {
            events(event);
        }
    }
}
