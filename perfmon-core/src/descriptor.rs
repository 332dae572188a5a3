//! Experiment descriptors and monitored host lists.
//!
//! Both are plain JSON documents, loaded once when a run starts and never mutated afterwards.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {what}: {source}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("host entry #{0} has an empty `hostname`")]
    EmptyHostname(usize),

    #[error("host `{host}` lists interface `{interface}` more than once")]
    DuplicateInterface { host: String, interface: String },

    #[error("host `{0}` has an empty interface name")]
    EmptyInterface(String),

    #[error("test `{test}`: `{slot}.name` must not be empty")]
    EmptyEndpointHost { test: String, slot: &'static str },

    #[error("test `{test}`: `{slot}.cmd` must not be empty")]
    EmptyCommand { test: String, slot: &'static str },
}

/// A host whose interfaces get a stats collector during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    pub hostname: String,
    pub interfaces: Vec<String>,
}

/// One side of a traffic test: where to run, what to run and when to start it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEndpoint {
    /// Host the command is executed on.
    pub name: String,
    pub cmd: String,

    /// Carried through from the descriptor; the orchestrator does not act on it.
    #[serde(default)]
    pub persist: bool,

    /// Start offset in seconds relative to the experiment start.
    #[serde(default)]
    pub start_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEntry {
    #[serde(rename = "testname")]
    pub name: String,

    /// Initiator (usually the server side).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host1: Option<TestEndpoint>,

    /// Optional responder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host2: Option<TestEndpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExperimentDescriptor {
    pub name: String,
    pub tests: Vec<TestEntry>,
}

impl ExperimentDescriptor {
    /// Loads a descriptor file; the experiment is named after the file stem.
    pub fn load(path: &Path) -> Result<Self> {
        let text = read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "test".to_string());
        Self::from_json_str(name, &text)
    }

    pub fn from_json_str(name: impl Into<String>, text: &str) -> Result<Self> {
        let name = name.into();
        let tests: Vec<TestEntry> = serde_json::from_str(text).map_err(|source| Error::Parse {
            what: format!("experiment descriptor `{name}`"),
            source,
        })?;

        let descriptor = Self { name, tests };
        descriptor.validate()?;
        Ok(descriptor)
    }

    fn validate(&self) -> Result<()> {
        for test in &self.tests {
            for (slot, endpoint) in [("host1", &test.host1), ("host2", &test.host2)] {
                let Some(endpoint) = endpoint else {
                    continue;
                };
                if endpoint.name.trim().is_empty() {
                    return Err(Error::EmptyEndpointHost {
                        test: test.name.clone(),
                        slot,
                    });
                }
                if endpoint.cmd.trim().is_empty() {
                    return Err(Error::EmptyCommand {
                        test: test.name.clone(),
                        slot,
                    });
                }
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.tests
            .iter()
            .map(|t| usize::from(t.host1.is_some()) + usize::from(t.host2.is_some()))
            .sum()
    }

    #[must_use]
    pub fn max_start_offset(&self) -> u64 {
        self.tests
            .iter()
            .flat_map(|t| t.host1.iter().chain(t.host2.iter()))
            .map(|e| e.start_time)
            .max()
            .unwrap_or(0)
    }
}

pub fn load_hosts(path: &Path) -> Result<Vec<HostSpec>> {
    let text = read(path)?;
    parse_hosts(&text)
}

pub fn parse_hosts(text: &str) -> Result<Vec<HostSpec>> {
    let hosts: Vec<HostSpec> = serde_json::from_str(text).map_err(|source| Error::Parse {
        what: "host list".to_string(),
        source,
    })?;

    for (idx, host) in hosts.iter().enumerate() {
        if host.hostname.trim().is_empty() {
            return Err(Error::EmptyHostname(idx));
        }

        let mut seen = HashSet::with_capacity(host.interfaces.len());
        for iface in &host.interfaces {
            if iface.trim().is_empty() {
                return Err(Error::EmptyInterface(host.hostname.clone()));
            }
            if !seen.insert(iface.as_str()) {
                return Err(Error::DuplicateInterface {
                    host: host.hostname.clone(),
                    interface: iface.clone(),
                });
            }
        }
    }

    Ok(hosts)
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}
