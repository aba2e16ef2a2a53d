use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

/// Envelope every API v1 endpoint wraps its payload in.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub status: String,
    // An explicit default path keeps the derived impl free of a `T: Default`
    // bound; payload types only ever implement `Deserialize`.
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RuleGroupsData {
    pub groups: Vec<RuleGroup>,
}

/// One rule group as reported by `/api/v1/rules`.
#[derive(Debug, Clone, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    pub rules: Vec<ApiRule>,
}

/// Rules arrive as a heterogeneous list; the kind is resolved once here, at
/// the wire boundary, and never re-dispatched later.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ApiRule {
    Recording {
        name: String,
        query: String,
        #[serde(default)]
        labels: BTreeMap<String, String>,
    },
    Alerting {
        name: String,
        query: String,
        #[serde(default)]
        labels: BTreeMap<String, String>,
    },
}

/// Result payload of an instant or range query. The discriminant is checked
/// before any payload is extracted; never assume the shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryResult {
    Scalar(SamplePair),
    String((f64, String)),
    Vector(Vec<InstantSample>),
    Matrix(Vec<SampleStream>),
}

/// One `[timestamp, "value"]` pair; the backend encodes the float as a
/// string.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "(f64, String)")]
pub struct SamplePair {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TryFrom<(f64, String)> for SamplePair {
    type Error = String;

    fn try_from((secs, raw): (f64, String)) -> std::result::Result<Self, String> {
        let value = raw
            .parse::<f64>()
            .map_err(|e| format!("invalid sample value {raw:?}: {e}"))?;
        let timestamp = Utc
            .timestamp_millis_opt((secs * 1000.0).round() as i64)
            .single()
            .ok_or_else(|| format!("invalid sample timestamp {secs}"))?;
        Ok(Self { timestamp, value })
    }
}

/// A single labeled sample from a vector-typed result.
#[derive(Debug, Clone, Deserialize)]
pub struct InstantSample {
    pub metric: Metric,
    pub value: SamplePair,
}

/// One series of a matrix-typed result, samples ordered by time.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleStream {
    pub metric: Metric,
    pub values: Vec<SamplePair>,
}

/// Label set identifying one series. `Display` renders the canonical
/// `name{key="value", ...}` form used as the series key in fixtures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Metric(pub BTreeMap<String, String>);

const NAME_LABEL: &str = "__name__";

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.0.get(NAME_LABEL).map(String::as_str).unwrap_or("");
        let labels: Vec<String> = self
            .0
            .iter()
            .filter(|(key, _)| key.as_str() != NAME_LABEL)
            .map(|(key, value)| format!("{key}={value:?}"))
            .collect();
        if labels.is_empty() {
            write!(f, "{name}")
        } else {
            write!(f, "{name}{{{}}}", labels.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserialize_matrix_result() {
        let result: QueryResult = serde_json::from_value(json!({
            "resultType": "matrix",
            "result": [{
                "metric": {"__name__": "cpu_seconds_total", "job": "node"},
                "values": [[1700000000.0, "1.5"], [1700000060.0, "2.5"]]
            }]
        }))
        .unwrap();

        let QueryResult::Matrix(streams) = result else {
            panic!("expected matrix");
        };
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].values[0].value, 1.5);
        assert_eq!(streams[0].values[1].value, 2.5);
        assert!(streams[0].values[0].timestamp < streams[0].values[1].timestamp);
    }

    #[test]
    fn deserialize_vector_and_scalar_results() {
        let vector: QueryResult = serde_json::from_value(json!({
            "resultType": "vector",
            "result": [{
                "metric": {"__name__": "up", "instance": "localhost:9090"},
                "value": [1700000000.0, "1"]
            }]
        }))
        .unwrap();
        assert!(matches!(vector, QueryResult::Vector(ref v) if v.len() == 1));

        let scalar: QueryResult = serde_json::from_value(json!({
            "resultType": "scalar",
            "result": [1700000000.0, "42"]
        }))
        .unwrap();
        let QueryResult::Scalar(pair) = scalar else {
            panic!("expected scalar");
        };
        assert_eq!(pair.value, 42.0);
    }

    #[test]
    fn invalid_sample_value_is_a_deserialization_error() {
        let result: Result<QueryResult, _> = serde_json::from_value(json!({
            "resultType": "scalar",
            "result": [1700000000.0, "not-a-float"]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn rule_kind_is_resolved_from_the_type_tag() {
        let group: RuleGroup = serde_json::from_value(json!({
            "name": "example",
            "rules": [
                {
                    "type": "recording",
                    "name": "job:cpu:rate5m",
                    "query": "rate(cpu_seconds_total[5m])",
                    "health": "ok"
                },
                {
                    "type": "alerting",
                    "name": "HighCpu",
                    "query": "job:cpu:rate5m > 0.9",
                    "labels": {"severity": "critical"},
                    "state": "inactive"
                }
            ]
        }))
        .unwrap();

        assert!(matches!(group.rules[0], ApiRule::Recording { .. }));
        let ApiRule::Alerting { ref labels, .. } = group.rules[1] else {
            panic!("expected alerting rule");
        };
        assert_eq!(labels.get("severity").map(String::as_str), Some("critical"));
    }

    #[test]
    fn error_envelope_deserializes_without_a_payload() {
        // RuleGroupsData has no Default impl; deserializing the envelope for
        // it must not require one.
        let response: ApiResponse<RuleGroupsData> = serde_json::from_value(json!({
            "status": "error",
            "error": "query timed out"
        }))
        .unwrap();
        assert_eq!(response.status, "error");
        assert!(response.data.is_none());
        assert_eq!(response.error.as_deref(), Some("query timed out"));

        let ok: ApiResponse<RuleGroupsData> = serde_json::from_value(json!({
            "status": "success",
            "data": {"groups": []}
        }))
        .unwrap();
        assert!(ok.data.unwrap().groups.is_empty());
        assert!(ok.error.is_none());
    }

    #[test]
    fn metric_display_is_canonical() {
        let metric: Metric = serde_json::from_value(json!({
            "__name__": "cpu_seconds_total",
            "mode": "user",
            "job": "node"
        }))
        .unwrap();
        // Labels sorted by name, the metric name outside the braces.
        assert_eq!(
            metric.to_string(),
            r#"cpu_seconds_total{job="node", mode="user"}"#
        );

        let bare: Metric = serde_json::from_value(json!({"__name__": "up"})).unwrap();
        assert_eq!(bare.to_string(), "up");
    }
}
