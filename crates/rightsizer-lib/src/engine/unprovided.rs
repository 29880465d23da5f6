//! Default candidates for containers the recommendation source does not cover

use super::CandidateSet;
use crate::models::{AxisSide, ContainerPolicyBound, ResourceAxis};
use crate::policy::{EffectiveConfig, UnprovidedDefaultMode, UnprovidedPolicy};
use crate::quantity::{Quantity, ResourceKind};
use tracing::{debug, warn};

/// Request candidates synthesized from policy bounds or configured values
pub fn default_candidates(
    container: &str,
    config: &EffectiveConfig,
    bounds: &[ContainerPolicyBound],
) -> CandidateSet {
    let mut candidates = CandidateSet::default();
    for kind in [ResourceKind::Cpu, ResourceKind::Memory] {
        if let Some(value) = resolve_default(container, kind, config.unprovided(kind), bounds) {
            debug!(
                container = %container,
                resource = %kind,
                value = %value,
                "Using unprovided default"
            );
            candidates.insert(ResourceAxis::new(kind, AxisSide::Request), value);
        }
    }
    candidates
}

/// Resolve the default for one resource of one container
pub fn resolve_default(
    container: &str,
    kind: ResourceKind,
    policy: &UnprovidedPolicy,
    bounds: &[ContainerPolicyBound],
) -> Option<Quantity> {
    let bound = ContainerPolicyBound::lookup(bounds, container);

    match policy.mode {
        UnprovidedDefaultMode::Off => None,
        UnprovidedDefaultMode::MinAllowed => {
            let min = bound.and_then(|b| b.min_allowed.get(kind));
            tighten(min, policy.min_allowed_recommendation, |bound, floor| {
                if bound < floor {
                    floor
                } else {
                    bound
                }
            })
        }
        UnprovidedDefaultMode::MaxAllowed => {
            let max = bound.and_then(|b| b.max_allowed.get(kind));
            tighten(max, policy.max_allowed_recommendation, |bound, ceiling| {
                if bound > ceiling {
                    ceiling
                } else {
                    bound
                }
            })
        }
        UnprovidedDefaultMode::Value => match Quantity::parse(kind, &policy.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    container = %container,
                    resource = %kind,
                    value = %policy.value,
                    error = %e,
                    "Invalid unprovided default value, leaving unset"
                );
                None
            }
        },
    }
}

fn tighten(
    bound: Option<Quantity>,
    configured: Option<Quantity>,
    pick: impl Fn(Quantity, Quantity) -> Quantity,
) -> Option<Quantity> {
    match (bound, configured) {
        (Some(bound), Some(configured)) => Some(pick(bound, configured)),
        (bound, configured) => bound.or(configured),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceEstimate;

    fn policy(mode: UnprovidedDefaultMode) -> UnprovidedPolicy {
        UnprovidedPolicy {
            mode,
            value: String::new(),
            min_allowed_recommendation: None,
            max_allowed_recommendation: None,
        }
    }

    fn bound(name: &str, min_cpu: i64, max_cpu: i64) -> ContainerPolicyBound {
        ContainerPolicyBound {
            container_name: name.to_string(),
            min_allowed: ResourceEstimate::new(Some(Quantity::cpu_millis(min_cpu)), None),
            max_allowed: ResourceEstimate::new(Some(Quantity::cpu_millis(max_cpu)), None),
        }
    }

    #[test]
    fn test_min_allowed_not_raised_above_floor() {
        let mut p = policy(UnprovidedDefaultMode::MinAllowed);
        p.min_allowed_recommendation = Some(Quantity::cpu_millis(25));
        let bounds = [bound("app", 50, 500)];
        assert_eq!(
            resolve_default("app", ResourceKind::Cpu, &p, &bounds),
            Some(Quantity::cpu_millis(50))
        );
    }

    #[test]
    fn test_min_allowed_raised_to_floor() {
        let mut p = policy(UnprovidedDefaultMode::MinAllowed);
        p.min_allowed_recommendation = Some(Quantity::cpu_millis(25));
        let bounds = [bound("app", 10, 500)];
        assert_eq!(
            resolve_default("app", ResourceKind::Cpu, &p, &bounds),
            Some(Quantity::cpu_millis(25))
        );
    }

    #[test]
    fn test_max_allowed_lowered_to_ceiling() {
        let mut p = policy(UnprovidedDefaultMode::MaxAllowed);
        p.max_allowed_recommendation = Some(Quantity::cpu_millis(300));
        let bounds = [bound("*", 10, 500)];
        assert_eq!(
            resolve_default("sidecar", ResourceKind::Cpu, &p, &bounds),
            Some(Quantity::cpu_millis(300))
        );

        p.max_allowed_recommendation = None;
        assert_eq!(
            resolve_default("sidecar", ResourceKind::Cpu, &p, &bounds),
            Some(Quantity::cpu_millis(500))
        );
    }

    #[test]
    fn test_no_bound_anywhere_stays_unset() {
        let p = policy(UnprovidedDefaultMode::MinAllowed);
        let bounds = [bound("app", 10, 500)];
        // No memory bound and no configured floor
        assert_eq!(resolve_default("app", ResourceKind::Memory, &p, &bounds), None);
        // No entry for this container and no wildcard
        assert_eq!(resolve_default("other", ResourceKind::Cpu, &p, &bounds), None);
    }

    #[test]
    fn test_value_mode() {
        let mut p = policy(UnprovidedDefaultMode::Value);
        p.value = "256Mi".to_string();
        assert_eq!(
            resolve_default("app", ResourceKind::Memory, &p, &[]).map(|q| q.to_string()),
            Some("256Mi".to_string())
        );

        p.value = "plenty".to_string();
        assert_eq!(resolve_default("app", ResourceKind::Memory, &p, &[]), None);
    }

    #[test]
    fn test_off_mode() {
        let bounds = [bound("app", 10, 500)];
        assert_eq!(
            resolve_default("app", ResourceKind::Cpu, &policy(UnprovidedDefaultMode::Off), &bounds),
            None
        );
    }
}
