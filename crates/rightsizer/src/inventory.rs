//! File-backed inventory of managed targets
//!
//! Stands in for the cluster: it serves workload policy, containers and
//! recommendations from a JSON document loaded at startup and keeps written
//! containers in memory.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rightsizer_lib::{
    Container, ContainerPolicyBound, Notifier, RecommendationSource, RecommendationStatus,
    TargetRef, TieredRecommendation, UpdateResult, WorkloadStore,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::info;

/// One managed workload as described in the inventory file
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTarget {
    pub kind: String,
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    #[serde(default)]
    pub containers: Vec<Container>,
    /// Absent until the recommender has produced a status
    #[serde(default)]
    pub recommendations: Option<Vec<TieredRecommendation>>,
    #[serde(default)]
    pub policy_bounds: Vec<ContainerPolicyBound>,
}

impl InventoryTarget {
    pub fn target_ref(&self) -> TargetRef {
        TargetRef::new(&self.kind, &self.namespace, &self.name)
    }
}

#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    targets: Vec<InventoryTarget>,
}

pub struct Inventory {
    targets: RwLock<HashMap<String, InventoryTarget>>,
}

impl Inventory {
    /// Load the inventory from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read inventory {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid inventory {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: InventoryFile = serde_json::from_str(raw)?;
        let targets = file
            .targets
            .into_iter()
            .map(|t| (t.target_ref().key(), t))
            .collect();
        Ok(Self {
            targets: RwLock::new(targets),
        })
    }

    pub async fn targets(&self) -> Vec<TargetRef> {
        let mut refs: Vec<TargetRef> = self
            .targets
            .read()
            .await
            .values()
            .map(InventoryTarget::target_ref)
            .collect();
        refs.sort_by_key(|t| t.key());
        refs
    }

    async fn with_target<T>(
        &self,
        target: &TargetRef,
        read: impl FnOnce(&InventoryTarget) -> T,
    ) -> Result<T> {
        let targets = self.targets.read().await;
        targets
            .get(&target.key())
            .map(read)
            .ok_or_else(|| anyhow!("{target} not found in inventory"))
    }
}

#[async_trait]
impl RecommendationSource for Inventory {
    async fn tiered_recommendations(
        &self,
        target: &TargetRef,
    ) -> Result<Option<Vec<TieredRecommendation>>> {
        self.with_target(target, |t| t.recommendations.clone()).await
    }

    async fn container_policy_bounds(&self, target: &TargetRef) -> Result<Vec<ContainerPolicyBound>> {
        self.with_target(target, |t| t.policy_bounds.clone()).await
    }

    async fn status(&self, target: &TargetRef) -> Result<RecommendationStatus> {
        self.with_target(target, |t| RecommendationStatus {
            recommendations: t.recommendations.clone(),
            policy_bounds: t.policy_bounds.clone(),
        })
        .await
    }
}

#[async_trait]
impl WorkloadStore for Inventory {
    async fn raw_policy(&self, target: &TargetRef) -> Result<HashMap<String, String>> {
        self.with_target(target, |t| t.annotations.clone()).await
    }

    async fn containers(&self, target: &TargetRef) -> Result<Vec<Container>> {
        self.with_target(target, |t| t.containers.clone()).await
    }

    async fn write_containers(&self, target: &TargetRef, containers: &[Container]) -> Result<()> {
        let mut targets = self.targets.write().await;
        let entry = targets
            .get_mut(&target.key())
            .ok_or_else(|| anyhow!("{target} not found in inventory"))?;
        entry.containers = containers.to_vec();
        Ok(())
    }
}

/// Notifier that emits one log line per change
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, result: &UpdateResult) -> Result<()> {
        for change in &result.changes {
            info!(
                event = "resource_change",
                key = %result.key,
                result = %result.kind,
                change = %change,
                "Resource change"
            );
        }
        Ok(())
    }
}
