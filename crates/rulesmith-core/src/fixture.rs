use std::fmt;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::error::Result;

/// Duration in the promtool unit-test notation ("30s", "5m", "1h30m").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromDuration(Duration);

impl PromDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn minutes(minutes: u64) -> Self {
        Self(Duration::from_secs(minutes * 60))
    }

    pub fn as_std(&self) -> Duration {
        self.0
    }
}

impl From<Duration> for PromDuration {
    fn from(d: Duration) -> Self {
        Self(d)
    }
}

impl fmt::Display for PromDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut millis = self.0.as_millis();
        if millis == 0 {
            return write!(f, "0s");
        }
        for (unit, factor) in [
            ("d", 24 * 60 * 60 * 1000),
            ("h", 60 * 60 * 1000),
            ("m", 60 * 1000),
            ("s", 1000),
            ("ms", 1),
        ] {
            let count = millis / factor;
            if count > 0 {
                write!(f, "{count}{unit}")?;
                millis -= count * factor;
            }
        }
        Ok(())
    }
}

impl Serialize for PromDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The persisted unit-test file consumed by the downstream rule tester.
/// Field names are fixed for compatibility and must not change.
#[derive(Debug, Clone, Serialize)]
pub struct TestFile {
    pub rule_files: Vec<String>,
    pub evaluation_interval: PromDuration,
    pub tests: Vec<TestGroup>,
}

impl TestFile {
    pub fn new(tests: Vec<TestGroup>) -> Self {
        Self {
            rule_files: Vec::new(),
            evaluation_interval: PromDuration::minutes(1),
            tests,
        }
    }

    /// Renders the file, preserving test order (fixture order reflects the
    /// order rules were selected).
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// One group of input series plus the expectations evaluated against them.
#[derive(Debug, Clone, Serialize)]
pub struct TestGroup {
    pub interval: PromDuration,
    pub input_series: Vec<InputSeries>,
    pub promql_expr_test: Vec<ExprTestCase>,
}

/// A single fixture row: one uniquely-labeled series and its
/// whitespace-joined values in timestamp order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputSeries {
    pub series: String,
    pub values: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExprTestCase {
    pub expr: String,
    pub eval_time: PromDuration,
    pub exp_samples: Vec<ExpectedSample>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedSample {
    pub labels: String,
    pub value: f64,
}
