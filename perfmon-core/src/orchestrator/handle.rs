use std::fmt;

use serde::Serialize;

use super::launcher::ChildExit;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::EnumString, strum::Display,
)]
pub enum ProcessRole {
    #[strum(serialize = "collector")]
    #[serde(rename = "collector")]
    Collector,

    #[strum(serialize = "generator-host1")]
    #[serde(rename = "generator-host1")]
    GeneratorHost1,

    #[strum(serialize = "generator-host2")]
    #[serde(rename = "generator-host2")]
    GeneratorHost2,
}

/// Where a spawned unit came from: a monitored interface or a test endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnitSpec {
    Collector { host: String, interface: String },
    Generator { test: String, host: String },
}

impl UnitSpec {
    #[must_use]
    pub fn host(&self) -> &str {
        match self {
            Self::Collector { host, .. } | Self::Generator { host, .. } => host,
        }
    }
}

impl fmt::Display for UnitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collector { host, interface } => write!(f, "{host}/{interface}"),
            Self::Generator { test, host } => write!(f, "`{test}` on {host}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Live,
    Exited(ChildExit),
    Killed,
}

#[derive(Debug, Clone)]
pub struct RemoteProcessHandle {
    pub pid: u32,
    pub role: ProcessRole,
    pub spec: UnitSpec,
    pub state: HandleState,
}

impl RemoteProcessHandle {
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self.state, HandleState::Live)
    }

    /// True for an exit that was reaped with a non-zero or abnormal status.
    #[must_use]
    pub fn failed(&self) -> bool {
        matches!(self.state, HandleState::Exited(exit) if !exit.success())
    }
}

/// Append-only list of spawned units. Indices are stable for the lifetime of a run.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    handles: Vec<RemoteProcessHandle>,
}

impl Registry {
    pub(crate) fn register(&mut self, pid: u32, role: ProcessRole, spec: UnitSpec) -> usize {
        self.handles.push(RemoteProcessHandle {
            pid,
            role,
            spec,
            state: HandleState::Live,
        });
        self.handles.len() - 1
    }

    /// Returns `false` if the handle was no longer live.
    pub(crate) fn mark_exited(&mut self, index: usize, exit: ChildExit) -> bool {
        match self.handles.get_mut(index) {
            Some(h) if h.is_live() => {
                h.state = HandleState::Exited(exit);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn mark_killed(&mut self, index: usize) {
        if let Some(h) = self.handles.get_mut(index)
            && h.is_live()
        {
            h.state = HandleState::Killed;
        }
    }

    pub(crate) fn live_indices(&self) -> Vec<usize> {
        self.handles
            .iter()
            .enumerate()
            .filter(|(_, h)| h.is_live())
            .map(|(idx, _)| idx)
            .collect()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&RemoteProcessHandle> {
        self.handles.get(index)
    }

    #[must_use]
    pub fn handles(&self) -> &[RemoteProcessHandle] {
        &self.handles
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[must_use]
    pub fn live_count(&self) -> usize {
        self.handles.iter().filter(|h| h.is_live()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector(host: &str) -> UnitSpec {
        UnitSpec::Collector {
            host: host.to_string(),
            interface: "eth0".to_string(),
        }
    }

    #[test]
    fn role_names_round_trip_through_strum() {
        for role in [
            ProcessRole::Collector,
            ProcessRole::GeneratorHost1,
            ProcessRole::GeneratorHost2,
        ] {
            let parsed: ProcessRole = role
                .to_string()
                .parse()
                .unwrap_or_else(|e| panic!("role should parse back: {e}"));
            assert_eq!(parsed, role);
        }
        assert_eq!(ProcessRole::GeneratorHost2.to_string(), "generator-host2");
    }

    #[test]
    fn registry_tracks_live_handles() {
        let mut reg = Registry::default();
        let a = reg.register(10, ProcessRole::Collector, collector("r1"));
        let b = reg.register(11, ProcessRole::Collector, collector("r2"));
        let c = reg.register(12, ProcessRole::Collector, collector("r3"));

        assert!(reg.mark_exited(b, ChildExit::Success));
        assert!(!reg.mark_exited(b, ChildExit::Code(1)));
        reg.mark_killed(c);

        assert_eq!(reg.live_indices(), vec![a]);
        assert_eq!(reg.live_count(), 1);
        assert_eq!(reg.get(c).map(|h| h.state), Some(HandleState::Killed));
        assert_eq!(
            reg.get(b).map(|h| h.state),
            Some(HandleState::Exited(ChildExit::Success))
        );
    }

    #[test]
    fn killed_handle_is_not_reaped_later() {
        let mut reg = Registry::default();
        let idx = reg.register(1, ProcessRole::GeneratorHost1, collector("h"));
        reg.mark_killed(idx);
        assert!(!reg.mark_exited(idx, ChildExit::Abnormal));
        assert_eq!(reg.get(idx).map(|h| h.state), Some(HandleState::Killed));
    }

    #[test]
    fn spec_display_names_identity() {
        assert_eq!(collector("r1").to_string(), "r1/eth0");
        let g = UnitSpec::Generator {
            test: "iperf #1".to_string(),
            host: "client1".to_string(),
        };
        assert_eq!(g.to_string(), "`iperf #1` on client1");
        assert_eq!(g.host(), "client1");
    }
}
