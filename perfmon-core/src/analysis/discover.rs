use std::path::{Path, PathBuf};

use serde::Serialize;

use super::error::{Error, Result};

/// Link side of a `<base>-r1.log` / `<base>-r2.log` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    #[strum(serialize = "downstream")]
    Downstream,
    #[strum(serialize = "upstream")]
    Upstream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    /// Pair base name and direction, when the file follows the `-r1`/`-r2` naming.
    pub pair: Option<(String, LinkDirection)>,
}

impl LogFile {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        let pair = path.file_name().and_then(|n| n.to_str()).and_then(|name| {
            if let Some(base) = name.strip_suffix("-r1.log") {
                Some((base.to_string(), LinkDirection::Downstream))
            } else {
                name.strip_suffix("-r2.log")
                    .map(|base| (base.to_string(), LinkDirection::Upstream))
            }
        });
        Self { path, pair }
    }

    /// `<base>_downstream` for paired logs, the file stem otherwise.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.pair {
            Some((base, direction)) => format!("{base}_{direction}"),
            None => self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.path.display().to_string()),
        }
    }
}

/// Expands directories to their `*.log` files (sorted by name); other paths pass through.
pub fn discover_logs(paths: &[PathBuf]) -> Result<Vec<LogFile>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = read_log_dir(path)?;
            found.sort();
            out.extend(found.into_iter().map(LogFile::new));
        } else {
            out.push(LogFile::new(path.clone()));
        }
    }
    Ok(out)
}

fn read_log_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let io_err = |source| Error::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "log") {
            found.push(path);
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_suffixes_set_direction() {
        let down = LogFile::new(PathBuf::from("/logs/bbr_60s-r1.log"));
        assert_eq!(
            down.pair,
            Some(("bbr_60s".to_string(), LinkDirection::Downstream))
        );
        assert_eq!(down.label(), "bbr_60s_downstream");

        let up = LogFile::new(PathBuf::from("bbr_60s-r2.log"));
        assert_eq!(up.label(), "bbr_60s_upstream");

        let plain = LogFile::new(PathBuf::from("/logs/test_r1_eth0.log"));
        assert!(plain.pair.is_none());
        assert_eq!(plain.label(), "test_r1_eth0");
    }

    #[test]
    fn directories_expand_to_sorted_logs() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["b-r2.log", "a.log", "notes.txt", "b-r1.log"] {
            std::fs::write(dir.path().join(name), "")?;
        }
        std::fs::create_dir(dir.path().join("nested.log"))?;
        let extra = PathBuf::from("/elsewhere/c.log");

        let logs = discover_logs(&[dir.path().to_path_buf(), extra.clone()])?;
        let names: Vec<String> = logs
            .iter()
            .map(|l| {
                l.path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            })
            .collect();
        assert_eq!(names, vec!["a.log", "b-r1.log", "b-r2.log", "c.log"]);
        assert_eq!(logs[3].path, extra);
        Ok(())
    }
}
