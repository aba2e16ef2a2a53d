use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rulesmith_core::Result;

use crate::response::{QueryResult, RuleGroup};

/// Read-only view of the metrics backend. The production implementation
/// talks HTTP ([`crate::PromClient`]); tests substitute canned responses.
#[async_trait]
pub trait QueryGateway: Send + Sync {
    /// Fetches every rule group currently loaded by the backend.
    async fn rule_groups(&self) -> Result<Vec<RuleGroup>>;

    /// Evaluates `expr` at one instant.
    async fn instant_query(&self, expr: &str, at: DateTime<Utc>) -> Result<QueryResult>;

    /// Evaluates `expr` over `[start, end]` at `step` resolution.
    async fn range_query(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<QueryResult>;
}
