use std::path::{Path, PathBuf};

use crate::descriptor::{ExperimentDescriptor, HostSpec, TestEndpoint};

use super::config::OrchestratorConfig;
use super::handle::{ProcessRole, UnitSpec};
use super::launcher::{RemoteCommand, StdoutTarget};

/// One process the orchestrator is about to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchUnit {
    pub role: ProcessRole,
    pub spec: UnitSpec,
    pub command: RemoteCommand,
}

#[must_use]
pub fn collector_log_path(log_dir: &Path, name: &str, host: &str, interface: &str) -> PathBuf {
    log_dir.join(format!("{name}_{host}_{interface}.log"))
}

/// Expands a descriptor into launch order: collectors (host order, then interface order),
/// then every `host1` endpoint, then every `host2` endpoint.
#[must_use]
pub fn plan_launches(
    descriptor: &ExperimentDescriptor,
    hosts: &[HostSpec],
    cfg: &OrchestratorConfig,
) -> Vec<LaunchUnit> {
    let mut units = Vec::with_capacity(
        hosts.iter().map(|h| h.interfaces.len()).sum::<usize>() + descriptor.endpoint_count(),
    );

    for host in hosts {
        for interface in &host.interfaces {
            units.push(LaunchUnit {
                role: ProcessRole::Collector,
                spec: UnitSpec::Collector {
                    host: host.hostname.clone(),
                    interface: interface.clone(),
                },
                command: RemoteCommand {
                    host: host.hostname.clone(),
                    script: collector_script(interface, cfg),
                    stdout: StdoutTarget::File(collector_log_path(
                        &cfg.log_dir,
                        &cfg.name,
                        &host.hostname,
                        interface,
                    )),
                },
            });
        }
    }

    for test in &descriptor.tests {
        if let Some(ep) = &test.host1 {
            units.push(generator_unit(ProcessRole::GeneratorHost1, &test.name, ep, cfg));
        }
    }
    for test in &descriptor.tests {
        if let Some(ep) = &test.host2 {
            units.push(generator_unit(ProcessRole::GeneratorHost2, &test.name, ep, cfg));
        }
    }

    units
}

fn generator_unit(
    role: ProcessRole,
    test: &str,
    endpoint: &TestEndpoint,
    cfg: &OrchestratorConfig,
) -> LaunchUnit {
    let script = format!(
        "{}sleep {} ; {{ {} ; }} > /dev/null 2>&1",
        path_prefix(cfg),
        endpoint.start_time,
        endpoint.cmd
    );
    LaunchUnit {
        role,
        spec: UnitSpec::Generator {
            test: test.to_string(),
            host: endpoint.name.clone(),
        },
        command: RemoteCommand {
            host: endpoint.name.clone(),
            script,
            stdout: StdoutTarget::Discard,
        },
    }
}

fn collector_script(interface: &str, cfg: &OrchestratorConfig) -> String {
    format!(
        "{}{} collect --device {} --interval {}ms --time {}ms",
        path_prefix(cfg),
        shell_quote(&cfg.collector_program),
        shell_quote(interface),
        cfg.interval.as_millis(),
        cfg.duration.as_millis()
    )
}

fn path_prefix(cfg: &OrchestratorConfig) -> String {
    match &cfg.remote_path {
        Some(dir) => format!("export PATH=\"$PATH\":{}; ", shell_quote(dir)),
        None => String::new(),
    }
}

/// POSIX single-quoting; leaves simple words untouched.
fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '@' | '+'));
    if plain {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn descriptor() -> ExperimentDescriptor {
        ExperimentDescriptor::from_json_str(
            "exp",
            r#"[
                { "testname": "a", "host1": { "name": "s1", "cmd": "iperf3 -s -1", "start_time": 0 },
                                   "host2": { "name": "c1", "cmd": "iperf3 -c s1", "start_time": 2 } },
                { "testname": "b", "host1": { "name": "s2", "cmd": "iperf3 -s -1", "start_time": 1 } }
            ]"#,
        )
        .unwrap_or_else(|e| panic!("descriptor should parse: {e}"))
    }

    fn hosts() -> Vec<HostSpec> {
        vec![
            HostSpec {
                hostname: "r1".to_string(),
                interfaces: vec!["eth1".to_string(), "eth0".to_string()],
            },
            HostSpec {
                hostname: "r2".to_string(),
                interfaces: vec!["eth0".to_string()],
            },
        ]
    }

    #[test]
    fn launch_order_is_collectors_then_host1_then_host2() {
        let units = plan_launches(&descriptor(), &hosts(), &OrchestratorConfig::default());
        let order: Vec<(ProcessRole, String)> =
            units.iter().map(|u| (u.role, u.spec.to_string())).collect();
        assert_eq!(
            order,
            vec![
                (ProcessRole::Collector, "r1/eth1".to_string()),
                (ProcessRole::Collector, "r1/eth0".to_string()),
                (ProcessRole::Collector, "r2/eth0".to_string()),
                (ProcessRole::GeneratorHost1, "`a` on s1".to_string()),
                (ProcessRole::GeneratorHost1, "`b` on s2".to_string()),
                (ProcessRole::GeneratorHost2, "`a` on c1".to_string()),
            ]
        );
    }

    #[test]
    fn collector_command_logs_locally() {
        let cfg = OrchestratorConfig {
            name: "run7".to_string(),
            interval: Duration::from_millis(20),
            duration: Duration::from_secs(60),
            log_dir: PathBuf::from("/data"),
            remote_path: Some("/opt/perf mon".to_string()),
            ..OrchestratorConfig::default()
        };
        let units = plan_launches(&ExperimentDescriptor::default(), &hosts(), &cfg);
        let first = &units[0].command;

        assert_eq!(first.host, "r1");
        assert_eq!(
            first.script,
            "export PATH=\"$PATH\":'/opt/perf mon'; perfmon collect --device eth1 --interval 20ms --time 60000ms"
        );
        assert_eq!(
            first.stdout,
            StdoutTarget::File(PathBuf::from("/data/run7_r1_eth1.log"))
        );
    }

    #[test]
    fn generator_command_sleeps_then_discards_output() {
        let units = plan_launches(&descriptor(), &[], &OrchestratorConfig::default());
        let host2 = &units[2].command;
        assert_eq!(host2.host, "c1");
        assert_eq!(host2.script, "sleep 2 ; { iperf3 -c s1 ; } > /dev/null 2>&1");
        assert_eq!(host2.stdout, StdoutTarget::Discard);
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("eth0"), "eth0");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
    }
}
