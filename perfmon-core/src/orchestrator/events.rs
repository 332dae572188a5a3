use std::sync::Arc;

use super::handle::{ProcessRole, UnitSpec};
use super::launcher::ChildExit;

/// Lifecycle notifications emitted by the coordinating task, in the order they happen.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    Spawned {
        index: usize,
        pid: u32,
        role: ProcessRole,
        spec: UnitSpec,
    },
    SpawnFailed {
        role: ProcessRole,
        spec: UnitSpec,
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

pub type EventFn = Arc<dyn Fn(OrchestratorEvent) + Send + Sync + 'static>;
