use serde::Deserialize;

use crate::counter_log::QdiscSample;

use super::error::Result;

#[derive(Debug, Deserialize)]
struct TcQdisc {
    kind: Option<String>,
    #[serde(default)]
    bytes: u64,
    #[serde(default)]
    packets: u64,
    #[serde(default)]
    drops: u64,
    #[serde(default)]
    overlimits: u64,
    #[serde(default)]
    backlog: u64,
}

/// Parses `tc -s -j qdisc show dev <if>` output. Entries without a `kind` are skipped.
pub fn parse_tc_json(bytes: &[u8]) -> Result<Vec<QdiscSample>> {
    // Older iproute2 prints nothing at all for an interface without qdiscs.
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let entries: Vec<TcQdisc> = serde_json::from_slice(bytes)?;
    Ok(entries
        .into_iter()
        .filter_map(|q| {
            Some(QdiscSample {
                kind: q.kind?,
                backlog: q.backlog,
                bytes: q.bytes,
                packets: q.packets,
                drops: q.drops,
                overlimits: q.overlimits,
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_iproute2_output_and_ignores_extra_fields() -> Result<()> {
        let json = br#"[
            {"kind":"mq","handle":"0:","root":true,"options":{},"bytes":900,"packets":9,"drops":0,"overlimits":0,"requeues":0,"backlog":0,"qlen":0},
            {"kind":"fq_codel","handle":"0:","parent":":1","options":{"limit":10240},"bytes":900,"packets":9,"drops":3,"overlimits":1,"requeues":0,"backlog":3028,"qlen":2},
            {"handle":"ffff:"}
        ]"#;
        let stats = parse_tc_json(json)?;
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].kind, "mq");
        assert_eq!(stats[1].drops, 3);
        assert_eq!(stats[1].backlog, 3028);
        Ok(())
    }

    #[test]
    fn missing_counters_default_to_zero() -> Result<()> {
        let stats = parse_tc_json(br#"[{"kind":"noqueue"}]"#)?;
        assert_eq!(stats[0].bytes, 0);
        assert_eq!(stats[0].backlog, 0);
        Ok(())
    }

    #[test]
    fn empty_output_means_no_qdiscs() -> Result<()> {
        assert!(parse_tc_json(b"\n")?.is_empty());
        Ok(())
    }
}
