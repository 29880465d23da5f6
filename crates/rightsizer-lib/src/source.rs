//! Collaborator interfaces
//!
//! The pipeline reads recommendations and workloads through these traits
//! and never talks to the cluster directly.

use crate::models::{Container, ContainerPolicyBound, TargetRef, TieredRecommendation};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// External source of tiered recommendations
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    /// Current recommendations for `target`, or `None` when the source has
    /// no status for it yet
    async fn tiered_recommendations(
        &self,
        target: &TargetRef,
    ) -> Result<Option<Vec<TieredRecommendation>>>;

    /// Per-container bounds from the source's own resource policy
    async fn container_policy_bounds(&self, target: &TargetRef) -> Result<Vec<ContainerPolicyBound>>;

    /// Recommendations and bounds in one read
    ///
    /// The pipeline only calls this. Sources that can serve both halves from
    /// a single snapshot should override it.
    async fn status(&self, target: &TargetRef) -> Result<RecommendationStatus> {
        Ok(RecommendationStatus {
            recommendations: self.tiered_recommendations(target).await?,
            policy_bounds: self.container_policy_bounds(target).await?,
        })
    }
}

/// One read of a recommendation source's status for a target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecommendationStatus {
    pub recommendations: Option<Vec<TieredRecommendation>>,
    pub policy_bounds: Vec<ContainerPolicyBound>,
}

/// Read and write access to managed workloads
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    /// Raw policy annotations of the workload
    async fn raw_policy(&self, target: &TargetRef) -> Result<HashMap<String, String>>;

    /// Current containers of the workload's pod template
    async fn containers(&self, target: &TargetRef) -> Result<Vec<Container>>;

    /// Persist mutated containers
    async fn write_containers(&self, target: &TargetRef, containers: &[Container]) -> Result<()>;
}
