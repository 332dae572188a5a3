mod config;
mod error;
mod events;
mod handle;
mod launcher;
mod plan;
mod run;

pub use config::OrchestratorConfig;
pub use error::{Error, Result};
pub use events::{EventFn, OrchestratorEvent};
pub use handle::{HandleState, ProcessRole, Registry, RemoteProcessHandle, UnitSpec};
pub use launcher::{
    ChildExit, ExitFuture, KillError, Launcher, LocalShell, RemoteCommand, SpawnedChild, SshShell,
    StdoutTarget,
};
pub use plan::{LaunchUnit, collector_log_path, plan_launches};
pub use run::{ExperimentOrchestrator, KillFailure, RunOutcome, RunReport, SpawnFailure};
