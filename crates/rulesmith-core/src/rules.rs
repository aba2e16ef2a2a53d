use std::collections::BTreeMap;

/// Alerting vs. recording, resolved once when the catalog is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Alerting,
    Recording,
}

/// One rule instance as loaded from the backend. Immutable once loaded;
/// several definitions may share a name across groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDefinition {
    /// Recording-rule output metric name, or the alert name.
    pub name: String,
    /// The rule's source PromQL expression.
    pub query: String,
    /// Labels attached at evaluation time (alerting rules mostly).
    pub labels: BTreeMap<String, String>,
}

impl RuleDefinition {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            labels: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}
