use std::collections::BTreeMap;
use std::io::Write;

use rulesmith_core::{Result, RuleFilter, RuleKind};

use crate::catalog::RuleCatalog;
use crate::walker::extract_selectors;

/// One rule expression together with the labels attached at evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleQuery {
    pub expression: String,
    pub labels: BTreeMap<String, String>,
}

/// Per-name dependency report: which referenced metrics are scraped
/// (`direct`) and which are produced by other recording rules (`indirect`).
#[derive(Debug, Clone, Default)]
pub struct RuleInfo {
    pub name: String,
    pub queries: Vec<RuleQuery>,
    pub direct: Vec<String>,
    pub indirect: Vec<String>,
}

/// Classifies every metric referenced by the selected rules of `kind`.
/// Names are visited in lexicographic order so reports diff cleanly between
/// runs. Direct and indirect always partition the referenced names.
pub fn analyze(catalog: &RuleCatalog, kind: RuleKind, filter: &RuleFilter) -> Result<Vec<RuleInfo>> {
    let mut infos = Vec::new();
    for (name, definitions) in catalog.rules(kind) {
        if !filter.matches(name) {
            continue;
        }
        let mut info = RuleInfo {
            name: name.clone(),
            ..Default::default()
        };
        for definition in definitions {
            info.queries.push(RuleQuery {
                expression: definition.query.clone(),
                labels: definition.labels.clone(),
            });
            let dependencies = extract_selectors(&definition.query, |_| true)?;
            for metric in dependencies.keys() {
                if catalog.is_recording(metric) {
                    info.indirect.push(metric.clone());
                } else {
                    info.direct.push(metric.clone());
                }
            }
        }
        infos.push(info);
    }
    Ok(infos)
}

/// Renders the report for operators; analysis itself stays pure.
pub fn render_report(infos: &[RuleInfo], out: &mut impl Write) -> std::io::Result<()> {
    for info in infos {
        writeln!(out, "{}:", info.name)?;
        writeln!(out, "  queries:")?;
        for query in &info.queries {
            writeln!(out, "    expr: {}", query.expression)?;
            let labels: Vec<String> = query
                .labels
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            writeln!(out, "    labels: {{{}}}", labels.join(", "))?;
        }
        writeln!(out, "  metrics:")?;
        writeln!(out, "    direct: [{}]", info.direct.join(", "))?;
        writeln!(out, "    indirect: [{}]", info.indirect.join(", "))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rulesmith_core::RuleDefinition;

    fn catalog() -> RuleCatalog {
        RuleCatalog::from_definitions(vec![
            (
                RuleKind::Recording,
                RuleDefinition::new("job:cpu:rate5m", "rate(cpu_seconds_total[5m])"),
            ),
            (
                RuleKind::Recording,
                RuleDefinition::new("derived:metric", "job:cpu:rate5m * 2"),
            ),
            (
                RuleKind::Alerting,
                RuleDefinition::new("HighCpu", "job:cpu:rate5m > bound")
                    .with_label("severity", "critical"),
            ),
        ])
    }

    #[test]
    fn scraped_metric_is_a_direct_dependency() {
        let infos = analyze(&catalog(), RuleKind::Recording, &RuleFilter::default()).unwrap();
        let info = infos.iter().find(|i| i.name == "job:cpu:rate5m").unwrap();
        assert_eq!(info.direct, vec!["cpu_seconds_total"]);
        assert!(info.indirect.is_empty());
    }

    #[test]
    fn recording_rule_output_is_an_indirect_dependency() {
        let infos = analyze(&catalog(), RuleKind::Recording, &RuleFilter::default()).unwrap();
        let info = infos.iter().find(|i| i.name == "derived:metric").unwrap();
        assert_eq!(info.indirect, vec!["job:cpu:rate5m"]);
        assert!(info.direct.is_empty());
    }

    #[test]
    fn direct_and_indirect_partition_the_references() {
        let infos = analyze(&catalog(), RuleKind::Alerting, &RuleFilter::default()).unwrap();
        let info = &infos[0];
        assert_eq!(info.direct, vec!["bound"]);
        assert_eq!(info.indirect, vec!["job:cpu:rate5m"]);
        assert!(info.direct.iter().all(|m| !info.indirect.contains(m)));
    }

    #[test]
    fn names_are_reported_in_sorted_order() {
        let infos = analyze(&catalog(), RuleKind::Recording, &RuleFilter::default()).unwrap();
        let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["derived:metric", "job:cpu:rate5m"]);
    }

    #[test]
    fn filter_narrows_the_report() {
        let filter = RuleFilter::new(vec!["derived:metric".to_string()]);
        let infos = analyze(&catalog(), RuleKind::Recording, &filter).unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].name, "derived:metric");
    }

    #[test]
    fn report_rendering_includes_labels_and_partitions() {
        let infos = analyze(&catalog(), RuleKind::Alerting, &RuleFilter::default()).unwrap();
        let mut out = Vec::new();
        render_report(&infos, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("HighCpu:"));
        assert!(text.contains("expr: job:cpu:rate5m > bound"));
        assert!(text.contains("labels: {severity=critical}"));
        assert!(text.contains("direct: [bound]"));
        assert!(text.contains("indirect: [job:cpu:rate5m]"));
    }
}
