use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use rulesmith_client::{QueryGateway, QueryResult, SampleStream};
use rulesmith_core::{
    ExpectedSample, ExprTestCase, InputSeries, PromDuration, Result, RuleDefinition, RuleFilter,
    RulesmithError, TestGroup,
};

use crate::catalog::RuleCatalog;
use crate::walker::extract_selectors;

/// How far back raw samples are collected; also the fixture evaluation
/// offset.
const LOOKBACK: Duration = Duration::from_secs(5 * 60);
/// Range-query resolution; also the fixture interval.
const STEP: Duration = Duration::from_secs(60);

/// Builds one replayable test group per selected recording rule, in
/// lexicographic rule-name order.
///
/// Backend calls are strictly sequential. The first error of any kind
/// aborts the whole run; no partial output is produced.
pub async fn generate(
    catalog: &RuleCatalog,
    gateway: &dyn QueryGateway,
    filter: &RuleFilter,
    now: DateTime<Utc>,
) -> Result<Vec<TestGroup>> {
    let mut groups = Vec::new();
    for (name, definitions) in catalog.recording() {
        if !filter.matches(name) {
            continue;
        }
        groups.push(generate_rule(catalog, gateway, name, definitions, now).await?);
    }
    Ok(groups)
}

async fn generate_rule(
    catalog: &RuleCatalog,
    gateway: &dyn QueryGateway,
    name: &str,
    definitions: &[RuleDefinition],
    now: DateTime<Utc>,
) -> Result<TestGroup> {
    // The rule's own recorded output over the lookback window. Its freshest
    // sample becomes the alignment point for every dependency query below.
    let own = gateway
        .instant_query(&format!("{name}[{}]", PromDuration::from(LOOKBACK)), now)
        .await?;
    let QueryResult::Matrix(streams) = own else {
        return Err(RulesmithError::Query(format!(
            "unexpected result type for {name}"
        )));
    };
    let (eval_time, exp_samples) = expected_samples(name, &streams)?;
    let start = eval_time - chrono::Duration::seconds(LOOKBACK.as_secs() as i64);

    let mut series: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for definition in definitions {
        // Raw scraped metrics only; anything produced by another recording
        // rule must not be re-derived as input.
        let dependencies =
            extract_selectors(&definition.query, |metric| !catalog.is_recording(metric))?;
        for (metric, selectors) in &dependencies {
            debug!(rule = name, metric, ?selectors, "resolved dependency");
        }

        for metric in dependencies.keys() {
            let result = gateway.range_query(metric, start, eval_time, STEP).await?;
            let QueryResult::Matrix(streams) = result else {
                // A non-range shape means the dependency is not a plain
                // selector; it contributes no input series.
                warn!(rule = name, metric, "skipping non-matrix dependency result");
                continue;
            };
            for stream in streams {
                // First writer wins: a series already captured by an
                // earlier dependency query keeps its original samples.
                series
                    .entry(stream.metric.to_string())
                    .or_insert_with(|| stream.values.iter().map(|s| s.value).collect());
            }
        }
    }

    Ok(TestGroup {
        interval: PromDuration::from(STEP),
        input_series: assemble_input(&series),
        promql_expr_test: vec![ExprTestCase {
            expr: name.to_string(),
            eval_time: PromDuration::from(LOOKBACK),
            exp_samples,
        }],
    })
}

/// Last observed value of every stream, plus the timestamp the fixture is
/// aligned to. An empty result is a hard error: a fixture without an
/// expected value is useless.
fn expected_samples(
    name: &str,
    streams: &[SampleStream],
) -> Result<(DateTime<Utc>, Vec<ExpectedSample>)> {
    let mut eval_time = None;
    let mut samples = Vec::new();
    for stream in streams {
        let Some(last) = stream.values.last() else {
            continue;
        };
        eval_time.get_or_insert(last.timestamp);
        samples.push(ExpectedSample {
            labels: stream.metric.to_string(),
            value: last.value,
        });
    }
    match eval_time {
        Some(at) => Ok((at, samples)),
        None => Err(RulesmithError::Query(format!(
            "found 0 samples for {name} over the last {}",
            PromDuration::from(LOOKBACK)
        ))),
    }
}

/// Joins the accumulated series into fixture rows. Keys come out of the
/// `BTreeMap` sorted, which keeps the output byte-stable across runs no
/// matter the insertion order.
fn assemble_input(series: &BTreeMap<String, Vec<f64>>) -> Vec<InputSeries> {
    series
        .iter()
        .map(|(key, values)| InputSeries {
            series: key.clone(),
            values: values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_input_is_stable_under_insertion_order() {
        let mut forward = BTreeMap::new();
        forward.insert("b{}".to_string(), vec![1.0, 2.0]);
        forward.insert("a{}".to_string(), vec![3.5]);

        let mut reverse = BTreeMap::new();
        reverse.insert("a{}".to_string(), vec![3.5]);
        reverse.insert("b{}".to_string(), vec![1.0, 2.0]);

        assert_eq!(assemble_input(&forward), assemble_input(&reverse));
        assert_eq!(
            assemble_input(&forward),
            vec![
                InputSeries {
                    series: "a{}".to_string(),
                    values: "3.5".to_string(),
                },
                InputSeries {
                    series: "b{}".to_string(),
                    values: "1 2".to_string(),
                },
            ]
        );
    }

    #[test]
    fn empty_matrix_is_a_query_error() {
        let err = expected_samples("job:cpu:rate5m", &[]).unwrap_err();
        assert!(matches!(err, RulesmithError::Query(_)));
        assert!(err.to_string().contains("found 0 samples for job:cpu:rate5m"));
    }
}
