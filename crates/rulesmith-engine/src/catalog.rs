use std::collections::BTreeMap;

use tracing::debug;

use rulesmith_client::{ApiRule, QueryGateway};
use rulesmith_core::{Result, RuleDefinition, RuleKind};

/// Snapshot of the backend's rule groups, partitioned by kind and keyed by
/// name. Built once, read-only afterwards. A name keyed in the recording
/// mapping is by construction never a "direct" dependency.
#[derive(Debug, Clone, Default)]
pub struct RuleCatalog {
    alerting: BTreeMap<String, Vec<RuleDefinition>>,
    recording: BTreeMap<String, Vec<RuleDefinition>>,
}

impl RuleCatalog {
    /// Loads the current rule groups. Exactly one backend call; any fetch
    /// error is fatal and no partial catalog is exposed.
    pub async fn load(gateway: &dyn QueryGateway) -> Result<Self> {
        let groups = gateway.rule_groups().await?;
        let definitions = groups.into_iter().flat_map(|group| {
            group.rules.into_iter().map(|rule| match rule {
                ApiRule::Alerting {
                    name,
                    query,
                    labels,
                } => (
                    RuleKind::Alerting,
                    RuleDefinition {
                        name,
                        query,
                        labels,
                    },
                ),
                ApiRule::Recording {
                    name,
                    query,
                    labels,
                } => (
                    RuleKind::Recording,
                    RuleDefinition {
                        name,
                        query,
                        labels,
                    },
                ),
            })
        });

        let catalog = Self::from_definitions(definitions);
        debug!(
            alerting = catalog.alerting.len(),
            recording = catalog.recording.len(),
            "loaded rule catalog"
        );
        Ok(catalog)
    }

    /// Builds a catalog from already-classified definitions, appending when
    /// a name repeats across groups.
    pub fn from_definitions<I>(definitions: I) -> Self
    where
        I: IntoIterator<Item = (RuleKind, RuleDefinition)>,
    {
        let mut catalog = Self::default();
        for (kind, definition) in definitions {
            let map = match kind {
                RuleKind::Alerting => &mut catalog.alerting,
                RuleKind::Recording => &mut catalog.recording,
            };
            map.entry(definition.name.clone()).or_default().push(definition);
        }
        catalog
    }

    /// Name-keyed rules of one kind, in lexicographic name order.
    pub fn rules(&self, kind: RuleKind) -> &BTreeMap<String, Vec<RuleDefinition>> {
        match kind {
            RuleKind::Alerting => &self.alerting,
            RuleKind::Recording => &self.recording,
        }
    }

    pub fn recording(&self) -> &BTreeMap<String, Vec<RuleDefinition>> {
        &self.recording
    }

    /// Whether `name` is produced by a recording rule, i.e. an indirect
    /// dependency wherever it is referenced.
    pub fn is_recording(&self, name: &str) -> bool {
        self.recording.contains_key(name)
    }
}
