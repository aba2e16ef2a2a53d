use std::collections::HashSet;
use std::path::PathBuf;

use url::Url;

use crate::error::{Result, RulesmithError};

/// Rule-name selection filter. An empty filter selects every rule.
#[derive(Debug, Clone, Default)]
pub struct RuleFilter {
    names: HashSet<String>,
}

impl RuleFilter {
    pub fn new<I>(names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            names: names.into_iter().filter(|n| !n.is_empty()).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn matches(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.contains(name)
    }
}

/// Immutable run configuration, constructed once at startup and passed by
/// reference into every component that needs it.
#[derive(Debug, Clone)]
pub struct Settings {
    pub prometheus_url: Url,
    pub token_file: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
    pub insecure_tls: bool,
    pub recording_rules: RuleFilter,
    pub alerting_rules: RuleFilter,
}

impl Settings {
    /// Validates the backend address before anything touches the network.
    pub fn new(url: &str) -> Result<Self> {
        let prometheus_url = Url::parse(url)?;
        match prometheus_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(RulesmithError::Config(format!(
                    "invalid URL scheme: {other}"
                )))
            }
        }
        Ok(Self {
            prometheus_url,
            token_file: None,
            ca_file: None,
            insecure_tls: false,
            recording_rules: RuleFilter::default(),
            alerting_rules: RuleFilter::default(),
        })
    }

    pub fn with_token_file(mut self, path: Option<PathBuf>) -> Self {
        self.token_file = path;
        self
    }

    pub fn with_ca_file(mut self, path: Option<PathBuf>) -> Self {
        self.ca_file = path;
        self
    }

    pub fn with_insecure_tls(mut self, insecure: bool) -> Self {
        self.insecure_tls = insecure;
        self
    }

    pub fn with_recording_rules(mut self, names: Vec<String>) -> Self {
        self.recording_rules = RuleFilter::new(names);
        self
    }

    pub fn with_alerting_rules(mut self, names: Vec<String>) -> Self {
        self.alerting_rules = RuleFilter::new(names);
        self
    }
}
