use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use tokio::fs;
use tracing::debug;

use rulesmith_core::{Result, RulesmithError, Settings};

use crate::gateway::QueryGateway;
use crate::response::{ApiResponse, QueryResult, RuleGroup, RuleGroupsData};

/// HTTP implementation of [`QueryGateway`] against the Prometheus API v1.
pub struct PromClient {
    http: reqwest::Client,
    base: String,
    token_file: Option<PathBuf>,
}

impl PromClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if settings.insecure_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(ca) = &settings.ca_file {
            let pem = std::fs::read(ca)?;
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(&pem)?);
        }
        Ok(Self {
            http: builder.build()?,
            base: settings
                .prometheus_url
                .as_str()
                .trim_end_matches('/')
                .to_string(),
            token_file: settings.token_file.clone(),
        })
    }

    /// Reads the bearer token fresh on every request so rotated tokens are
    /// picked up without a restart.
    async fn bearer_token(&self) -> Result<Option<String>> {
        match &self.token_file {
            Some(path) => {
                let raw = fs::read_to_string(path).await?;
                Ok(Some(raw.trim_end_matches('\n').to_string()))
            }
            None => Ok(None),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        let mut request = self.http.get(&url).query(params);
        if let Some(token) = self.bearer_token().await? {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        debug!(%url, "querying backend");

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RulesmithError::Backend {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: ApiResponse<T> = response.json().await?;
        if body.status != "success" {
            return Err(RulesmithError::Query(
                body.error
                    .unwrap_or_else(|| "unknown backend error".to_string()),
            ));
        }
        body.data
            .ok_or_else(|| RulesmithError::Query("missing data in backend response".to_string()))
    }
}

fn unix_seconds(at: DateTime<Utc>) -> String {
    format!("{:.3}", at.timestamp_millis() as f64 / 1000.0)
}

#[async_trait]
impl QueryGateway for PromClient {
    async fn rule_groups(&self) -> Result<Vec<RuleGroup>> {
        let data: RuleGroupsData = self
            .get("/api/v1/rules", &[])
            .await
            .map_err(|e| RulesmithError::Fetch(e.to_string()))?;
        Ok(data.groups)
    }

    async fn instant_query(&self, expr: &str, at: DateTime<Utc>) -> Result<QueryResult> {
        self.get(
            "/api/v1/query",
            &[("query", expr.to_string()), ("time", unix_seconds(at))],
        )
        .await
    }

    async fn range_query(
        &self,
        expr: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: Duration,
    ) -> Result<QueryResult> {
        self.get(
            "/api/v1/query_range",
            &[
                ("query", expr.to_string()),
                ("start", unix_seconds(start)),
                ("end", unix_seconds(end)),
                ("step", step.as_secs().to_string()),
            ],
        )
        .await
    }
}
