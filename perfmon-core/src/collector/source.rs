use std::path::{Path, PathBuf};
use std::process::Command;

use crate::counter_log::QdiscSample;

use super::error::{Error, Result};
use super::tc::parse_tc_json;

/// Cumulative link counters as reported by the kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkCounters {
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub tx_packets: u64,
    pub tx_bytes: u64,
}

/// Reads the raw counters of one interface at the current instant.
pub trait CounterSource {
    fn link_counters(&mut self) -> Result<LinkCounters>;

    /// Stats of every qdisc attached to the interface, in kernel order.
    fn qdisc_stats(&mut self) -> Result<Vec<QdiscSample>>;
}

/// Linux adapter: link counters from sysfs, qdisc stats from `tc -s -j qdisc show`.
#[derive(Debug, Clone)]
pub struct SysfsCounterSource {
    interface: String,
    stats_dir: PathBuf,
    tc_program: Option<String>,
}

impl SysfsCounterSource {
    pub fn new(interface: &str) -> Result<Self> {
        Self::with_sysfs_root(interface, Path::new("/sys/class/net"))
    }

    /// Same as [`Self::new`] with a different `/sys/class/net`.
    pub fn with_sysfs_root(interface: &str, root: &Path) -> Result<Self> {
        let stats_dir = root.join(interface).join("statistics");
        if interface.is_empty() || !stats_dir.is_dir() {
            return Err(Error::UnknownInterface(interface.to_string()));
        }
        Ok(Self {
            interface: interface.to_string(),
            stats_dir,
            tc_program: Some("tc".to_string()),
        })
    }

    /// `None` skips qdisc statistics entirely.
    #[must_use]
    pub fn with_tc_program(mut self, program: Option<String>) -> Self {
        self.tc_program = program;
        self
    }

    #[must_use]
    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn read_counter(&self, name: &str) -> Result<u64> {
        let path = self.stats_dir.join(name);
        let text = std::fs::read_to_string(&path).map_err(|source| Error::Read {
            path: path.clone(),
            source,
        })?;
        let value = text.trim();
        value.parse().map_err(|_| Error::InvalidCounter {
            path,
            value: value.to_string(),
        })
    }
}

impl CounterSource for SysfsCounterSource {
    fn link_counters(&mut self) -> Result<LinkCounters> {
        Ok(LinkCounters {
            rx_packets: self.read_counter("rx_packets")?,
            rx_bytes: self.read_counter("rx_bytes")?,
            tx_packets: self.read_counter("tx_packets")?,
            tx_bytes: self.read_counter("tx_bytes")?,
        })
    }

    fn qdisc_stats(&mut self) -> Result<Vec<QdiscSample>> {
        let Some(program) = &self.tc_program else {
            return Ok(Vec::new());
        };

        let output = Command::new(program)
            .args(["-s", "-j", "qdisc", "show", "dev", &self.interface])
            .output()
            .map_err(|source| Error::TcSpawn {
                program: program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(Error::TcFailed {
                program: program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_tc_json(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(root: &Path, iface: &str, values: [u64; 4]) -> std::io::Result<()> {
        let dir = root.join(iface).join("statistics");
        std::fs::create_dir_all(&dir)?;
        for (name, value) in ["rx_packets", "rx_bytes", "tx_packets", "tx_bytes"]
            .iter()
            .zip(values)
        {
            std::fs::write(dir.join(name), format!("{value}\n"))?;
        }
        Ok(())
    }

    #[test]
    fn reads_link_counters_from_sysfs() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fake_sysfs(root.path(), "veth0", [1, 2, 3, 4])?;

        let mut src = SysfsCounterSource::with_sysfs_root("veth0", root.path())?.with_tc_program(None);
        assert_eq!(
            src.link_counters()?,
            LinkCounters {
                rx_packets: 1,
                rx_bytes: 2,
                tx_packets: 3,
                tx_bytes: 4,
            }
        );
        assert!(src.qdisc_stats()?.is_empty());
        Ok(())
    }

    #[test]
    fn unknown_interface_is_an_error() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let res = SysfsCounterSource::with_sysfs_root("nope0", root.path());
        assert!(matches!(res, Err(Error::UnknownInterface(name)) if name == "nope0"));
        Ok(())
    }

    #[test]
    fn garbage_counter_names_the_file() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fake_sysfs(root.path(), "veth0", [1, 2, 3, 4])?;
        std::fs::write(root.path().join("veth0/statistics/tx_bytes"), "lots\n")?;

        let mut src = SysfsCounterSource::with_sysfs_root("veth0", root.path())?.with_tc_program(None);
        match src.link_counters() {
            Err(Error::InvalidCounter { path, value }) => {
                assert!(path.ends_with("tx_bytes"));
                assert_eq!(value, "lots");
            }
            other => panic!("expected InvalidCounter, got {other:?}"),
        }
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn qdisc_stats_come_from_tc_json() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir()?;
        fake_sysfs(root.path(), "veth0", [0, 0, 0, 0])?;

        let script = root.path().join("fake-tc");
        std::fs::write(
            &script,
            "#!/bin/sh\necho '[{\"kind\":\"fq_codel\",\"bytes\":10,\"packets\":2,\"drops\":1,\"overlimits\":0,\"backlog\":1514}]'\n",
        )?;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))?;

        let mut src = SysfsCounterSource::with_sysfs_root("veth0", root.path())?
            .with_tc_program(Some(script.to_string_lossy().into_owned()));
        let stats = src.qdisc_stats()?;
        assert_eq!(stats.len(), 1);
        assert_eq!(stats[0].kind, "fq_codel");
        assert_eq!(stats[0].backlog, 1514);
        Ok(())
    }
}
