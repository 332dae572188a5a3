use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use perfmon_core::analysis::{DetectorKind, ThroughputMetric};

fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60 * 60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

fn parse_positive_duration(input: &str) -> Result<Duration, String> {
    let d = parse_duration(input)?;
    if d.is_zero() {
        return Err(format!("duration '{}' must be greater than zero", input.trim()));
    }
    Ok(d)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Emit JSON lines (NDJSON) to stdout.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "perfmon",
    version,
    about = "Distributed network throughput experiments and peak detection",
    long_about = "perfmon launches interface counter collectors and traffic generators on remote hosts over ssh, waits for them, and analyzes the collected counter logs for link saturation.\n\nLog verbosity is controlled with the PERFMON_LOG environment variable (e.g. PERFMON_LOG=debug).",
    after_help = "Examples:\n  perfmon run tests.json --hosts hosts.json --log-dir logs\n  perfmon run a.json b.json --hosts hosts.json --pause 30s\n  perfmon collect --device eth0 --interval 20ms --time 60s > eth0.log\n  perfmon analyze logs/ --detector padded --csv-dir extracted"
)]
pub struct Cli {
    /// Log line format on stderr
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = LogFormat::Text,
        env = "PERFMON_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one or more experiments across the monitored hosts
    #[command(
        long_about = "Spawn a counter collector per monitored host/interface and every traffic generator of the experiment descriptor, then wait for all of them.\n\nSeveral descriptors run one after another with a pause in between. Ctrl-C kills everything still running."
    )]
    Run(RunArgs),

    /// Sample one interface's counters and print a log line per tick
    Collect(CollectArgs),

    /// Build rate series from collector logs and score the peak detector
    Analyze(AnalyzeArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Experiment descriptor files (JSON), run in order
    #[arg(required = true, num_args = 1..)]
    pub descriptors: Vec<PathBuf>,

    /// Monitored hosts file (JSON)
    #[arg(long, env = "PERFMON_HOSTS")]
    pub hosts: PathBuf,

    /// Run name used for log file names (defaults to the descriptor file stem)
    #[arg(long)]
    pub name: Option<String>,

    /// Collector sampling interval
    #[arg(long, value_parser = parse_positive_duration, default_value = "20ms", env = "PERFMON_INTERVAL")]
    pub interval: Duration,

    /// How long each collector samples
    #[arg(long = "time", value_parser = parse_duration, default_value = "100s", env = "PERFMON_TIME")]
    pub duration: Duration,

    /// Directory for the collector logs
    #[arg(long, default_value = ".", env = "PERFMON_LOG_DIR")]
    pub log_dir: PathBuf,

    /// Directory appended to PATH on the remote hosts [default: current directory]
    #[arg(long, env = "PERFMON_REMOTE_PATH")]
    pub remote_path: Option<String>,

    /// Collector executable as found on the remote hosts
    #[arg(long, default_value = "perfmon", env = "PERFMON_COLLECTOR")]
    pub collector_program: String,

    /// Remote user
    #[arg(long, default_value = "root", env = "PERFMON_SSH_USER")]
    pub ssh_user: String,

    /// ssh executable
    #[arg(long, default_value = "ssh", env = "PERFMON_SSH")]
    pub ssh_program: String,

    /// Extra ssh option (repeatable, e.g. --ssh-option=-p2222)
    #[arg(long = "ssh-option", value_name = "OPT", allow_hyphen_values = true)]
    pub ssh_options: Vec<String>,

    /// Run every command on this machine with `sh -c` instead of ssh
    #[arg(long)]
    pub local: bool,

    /// Pause between consecutive experiments
    #[arg(long, value_parser = parse_duration, default_value = "20s", env = "PERFMON_PAUSE")]
    pub pause: Duration,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Network interface to sample
    #[arg(short, long)]
    pub device: String,

    /// Sampling interval
    #[arg(short, long, value_parser = parse_positive_duration, default_value = "20ms")]
    pub interval: Duration,

    /// Total sampling time
    #[arg(short = 't', long = "time", value_parser = parse_duration, default_value = "60s")]
    pub duration: Duration,

    /// Root of the per-interface sysfs tree
    #[arg(long, default_value = "/sys/class/net", env = "PERFMON_SYSFS_ROOT")]
    pub sysfs_root: PathBuf,

    /// `tc` executable used for qdisc statistics
    #[arg(long, default_value = "tc", env = "PERFMON_TC")]
    pub tc: String,

    /// Skip qdisc statistics
    #[arg(long)]
    pub no_qdisc: bool,
}

#[derive(Debug, Args)]
pub struct AnalyzeArgs {
    /// Log files or directories containing `*.log` files
    #[arg(required = true, num_args = 1..)]
    pub paths: Vec<PathBuf>,

    /// Drop samples later than this many seconds after the first one
    #[arg(long, default_value_t = 100.0, env = "PERFMON_CUTOFF")]
    pub cutoff: f64,

    /// Keep every sample regardless of `--cutoff`
    #[arg(long)]
    pub no_cutoff: bool,

    /// Backlog growth above which a queue is considered present
    #[arg(long, default_value_t = 10, allow_negative_numbers = true)]
    pub queue_threshold: i64,

    /// Sampling interval used for rates (estimated from timestamps when unset)
    #[arg(long, value_parser = parse_positive_duration)]
    pub interval: Option<Duration>,

    /// Read the backlog from the first qdisc of this kind
    #[arg(long)]
    pub qdisc: Option<String>,

    /// Throughput series fed to the detector
    #[arg(long, default_value_t = ThroughputMetric::TxMbps)]
    pub metric: ThroughputMetric,

    /// Detector variant (block, padded)
    #[arg(long, default_value_t = DetectorKind::BlockPartition, env = "PERFMON_DETECTOR")]
    pub detector: DetectorKind,

    /// Block variant: fraction below the block peak still counted as peaking
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Padded variant: short/long envelope ratio above which a sample is peaking
    #[arg(long)]
    pub ratio: Option<f64>,

    /// Short-term window
    #[arg(long, value_parser = parse_positive_duration, default_value = "100ms")]
    pub short_window: Duration,

    /// Long-term window
    #[arg(long, value_parser = parse_positive_duration, default_value = "1s")]
    pub long_window: Duration,

    /// Median filter kernel (odd)
    #[arg(long, default_value_t = 15)]
    pub median_kernel: usize,

    /// Score at or above which a sample counts as a predicted peak
    #[arg(long, default_value_t = 0.5)]
    pub score_cutoff: f64,

    /// Write `<label>.csv` per analyzed log into this directory
    #[arg(long, env = "PERFMON_CSV_DIR")]
    pub csv_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,
}
