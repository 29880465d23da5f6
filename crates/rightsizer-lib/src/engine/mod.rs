//! Resource rightsizing engine
//!
//! Turns recommendations and resolved policy into container mutations:
//! - `selector`: one candidate per axis from the chosen estimate band
//! - `unprovided`: defaults for containers without recommendations
//! - `apply`: transforms, guards and limit derivation, producing changes

pub mod apply;
pub mod selector;
pub mod unprovided;

use crate::models::{Candidate, Change, Container, ContainerPolicyBound, ResourceAxis, TieredRecommendation};
use crate::policy::PolicyResolver;
use crate::quantity::Quantity;

/// Candidates for one container, at most one per axis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    candidates: Vec<Candidate>,
}

impl CandidateSet {
    /// Set the candidate for `axis`, replacing any previous one
    pub fn insert(&mut self, axis: ResourceAxis, value: Quantity) {
        match self.candidates.iter_mut().find(|c| c.axis == axis) {
            Some(existing) => existing.value = value,
            None => self.candidates.push(Candidate { axis, value }),
        }
    }

    pub fn get(&self, axis: ResourceAxis) -> Option<Quantity> {
        self.candidates
            .iter()
            .find(|c| c.axis == axis)
            .map(|c| c.value)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Containers after one engine pass and the changes committed to them
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub containers: Vec<Container>,
    pub changes: Vec<Change>,
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Run the engine over every container of a workload
///
/// `recommendations` is `None` when the source has no status for the
/// target. Containers missing from the recommendations fall back to the
/// unprovided defaults. Recommendations for containers the workload does
/// not have are ignored.
pub fn plan(
    mut containers: Vec<Container>,
    recommendations: Option<&[TieredRecommendation]>,
    bounds: &[ContainerPolicyBound],
    resolver: &PolicyResolver<'_>,
) -> Plan {
    let recommendations = recommendations.unwrap_or_default();
    let mut changes = Vec::new();

    for container in containers.iter_mut() {
        let config = resolver.effective(Some(&container.name));
        let candidates = match recommendations
            .iter()
            .find(|r| r.container_name == container.name)
        {
            Some(rec) => selector::select(rec, &config),
            None => unprovided::default_candidates(&container.name, &config, bounds),
        };
        changes.extend(apply::apply_container(container, &candidates, &config));
    }

    Plan {
        containers,
        changes,
    }
}

#[cfg(test)]
mod tests;
