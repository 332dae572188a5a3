use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};

use serde::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::process::Command;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "code", rename_all = "snake_case")]
pub enum ChildExit {
    Success,
    Code(i32),
    /// Terminated by a signal (no exit code).
    Abnormal,
}

impl ChildExit {
    #[must_use]
    pub fn success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<ExitStatus> for ChildExit {
    fn from(status: ExitStatus) -> Self {
        if status.success() {
            return Self::Success;
        }
        match status.code() {
            Some(code) => Self::Code(code),
            None => Self::Abnormal,
        }
    }
}

impl std::fmt::Display for ChildExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("exit 0"),
            Self::Code(code) => write!(f, "exit {code}"),
            Self::Abnormal => f.write_str("killed by signal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StdoutTarget {
    Discard,
    /// Truncated and written on the orchestrating machine.
    File(PathBuf),
}

/// A shell snippet to run on one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCommand {
    pub host: String,
    pub script: String,
    pub stdout: StdoutTarget,
}

pub type ExitFuture = Pin<Box<dyn Future<Output = io::Result<ChildExit>> + Send + 'static>>;

pub struct SpawnedChild {
    pub pid: u32,
    /// Resolves once the local side of the child exits.
    pub exit: ExitFuture,
}

impl std::fmt::Debug for SpawnedChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedChild")
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KillError {
    #[error("process {0} is not running")]
    NotRunning(u32),

    #[error("failed to deliver SIGKILL to process {0}")]
    SignalFailed(u32),
}

/// Starts remote commands and force-kills them by PID.
///
/// `kill` takes down everything the child started, not only the child itself.
/// Implementations must not block in `launch`; waiting happens on the returned exit future.
pub trait Launcher: Send + Sync {
    fn launch(&self, command: &RemoteCommand) -> io::Result<SpawnedChild>;

    fn kill(&self, pid: u32) -> Result<(), KillError>;

    /// Human readable form of what `launch` would execute, for logs.
    fn describe(&self, command: &RemoteCommand) -> String {
        format!("{}: {}", command.host, command.script)
    }
}

/// Runs every command through `ssh <options> <user>@<host> <script>`.
///
/// The default options force a remote tty (`-tt`) so that killing the local client hangs up
/// the remote session and the commands in it.
#[derive(Debug, Clone)]
pub struct SshShell {
    pub program: String,
    pub user: String,
    pub options: Vec<String>,
}

impl Default for SshShell {
    fn default() -> Self {
        Self {
            program: "ssh".to_string(),
            user: "root".to_string(),
            options: vec![
                "-tt".to_string(),
                "-o".to_string(),
                "StrictHostKeyChecking=no".to_string(),
            ],
        }
    }
}

impl SshShell {
    fn args(&self, command: &RemoteCommand) -> Vec<String> {
        let mut args = self.options.clone();
        args.push(format!("{}@{}", self.user, command.host));
        args.push(command.script.clone());
        args
    }
}

impl Launcher for SshShell {
    fn launch(&self, command: &RemoteCommand) -> io::Result<SpawnedChild> {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args(command));
        spawn(cmd, &command.stdout)
    }

    fn kill(&self, pid: u32) -> Result<(), KillError> {
        kill_group(pid)
    }

    fn describe(&self, command: &RemoteCommand) -> String {
        let mut out = quote_for_display(&self.program);
        for arg in self.args(command) {
            out.push(' ');
            out.push_str(&quote_for_display(&arg));
        }
        if let StdoutTarget::File(path) = &command.stdout {
            out.push_str(" > ");
            out.push_str(&quote_for_display(&path.to_string_lossy()));
        }
        out
    }
}

/// Runs every command with `sh -c` on this machine, ignoring the host.
///
/// Useful for single-machine experiments and for exercising the orchestrator end to end.
#[derive(Debug, Clone, Default)]
pub struct LocalShell;

impl Launcher for LocalShell {
    fn launch(&self, command: &RemoteCommand) -> io::Result<SpawnedChild> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&command.script);
        spawn(cmd, &command.stdout)
    }

    fn kill(&self, pid: u32) -> Result<(), KillError> {
        kill_group(pid)
    }

    fn describe(&self, command: &RemoteCommand) -> String {
        format!("sh -c {}", quote_for_display(&command.script))
    }
}

fn spawn(mut cmd: Command, stdout: &StdoutTarget) -> io::Result<SpawnedChild> {
    let stdout = match stdout {
        StdoutTarget::Discard => Stdio::null(),
        StdoutTarget::File(path) => Stdio::from(std::fs::File::create(path)?),
    };
    cmd.stdin(Stdio::null()).stdout(stdout);
    // Each child leads its own process group so `kill_group` reaches its descendants too.
    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn()?;
    let pid = child
        .id()
        .ok_or_else(|| io::Error::other("child exited before its pid was read"))?;

    let exit = Box::pin(async move { child.wait().await.map(ChildExit::from) });
    Ok(SpawnedChild { pid, exit })
}

/// SIGKILLs the process group led by `pid`, after checking the leader is still known.
fn kill_group(pid: u32) -> Result<(), KillError> {
    let pid_ = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid_]),
        true,
        ProcessRefreshKind::nothing(),
    );

    let Some(process) = sys.process(pid_) else {
        return Err(KillError::NotRunning(pid));
    };
    signal_group(pid, process)
}

#[cfg(unix)]
fn signal_group(pid: u32, _leader: &sysinfo::Process) -> Result<(), KillError> {
    // Group 0 and 1 would mean our own group and init's.
    let pgid = match libc::pid_t::try_from(pid) {
        Ok(pgid) if pgid > 1 => pgid,
        _ => return Err(KillError::NotRunning(pid)),
    };

    // SAFETY: killpg only sends a signal and touches no memory of ours.
    if unsafe { libc::killpg(pgid, libc::SIGKILL) } == 0 {
        return Ok(());
    }
    match io::Error::last_os_error().raw_os_error() {
        Some(libc::ESRCH) => Err(KillError::NotRunning(pid)),
        _ => Err(KillError::SignalFailed(pid)),
    }
}

#[cfg(not(unix))]
fn signal_group(pid: u32, leader: &sysinfo::Process) -> Result<(), KillError> {
    match leader.kill_with(sysinfo::Signal::Kill) {
        Some(true) => Ok(()),
        _ => Err(KillError::SignalFailed(pid)),
    }
}

pub(crate) fn quote_for_display(s: &str) -> String {
    // Not a shell-accurate escaper; just makes spaces/specials unambiguous in logs.
    let needs_quotes = s.is_empty()
        || s.chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\\' | ';' | '$' | '>'));
    if !needs_quotes {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
