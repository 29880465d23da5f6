//! Apply engine
//!
//! Each axis runs through the same pipeline:
//!
//! 1. transform: the increase calculator for requests, limit derivation
//!    for limits
//! 2. clamp to `min-allowed` then `max-allowed`
//! 3. anti-flap: drop proposals below `applyAlgo(current, min-diff)`
//! 4. scale direction
//! 5. mode gate: skip when the axis is `off` or the value would not change
//!
//! Requests are committed before their limit is computed, so an `auto`
//! limit and the memory-from-CPU derivations see this run's values.

use super::CandidateSet;
use crate::calculator::{apply_algo, cpu_to_memory_heuristic};
use crate::models::{AxisSide, Change, Container, ResourceAxis};
use crate::policy::{ApplyMode, ApplyTarget, AxisPolicy, EffectiveConfig, ScaleDirection};
use crate::quantity::{Quantity, ResourceKind};
use tracing::debug;

/// Apply candidates to `container` and return the committed changes
///
/// A resource whose request has no candidate is left untouched on both
/// sides.
pub fn apply_container(
    container: &mut Container,
    candidates: &CandidateSet,
    config: &EffectiveConfig,
) -> Vec<Change> {
    let mut changes = Vec::new();

    for kind in [ResourceKind::Cpu, ResourceKind::Memory] {
        let request = ResourceAxis::new(kind, AxisSide::Request);
        let Some(candidate) = candidates.get(request) else {
            continue;
        };

        let proposed = request_value(container, kind, candidate, config);
        changes.extend(commit(container, request, proposed, config.axis(request)));

        let limit = ResourceAxis::new(kind, AxisSide::Limit);
        if let Some(proposed) = limit_value(container, kind, candidates, config) {
            changes.extend(commit(container, limit, proposed, config.axis(limit)));
        }
    }

    changes
}

fn request_value(
    container: &Container,
    kind: ResourceKind,
    candidate: Quantity,
    config: &EffectiveConfig,
) -> Quantity {
    let from_cpu = config.memory_from_cpu(AxisSide::Request);
    if kind == ResourceKind::Memory && from_cpu.enabled {
        if let Some(cpu) = container.resources.cpu_request {
            return apply_algo(cpu_to_memory_heuristic(cpu), from_cpu.algo, &from_cpu.value);
        }
    }

    let policy = config.axis(ResourceAxis::new(kind, AxisSide::Request));
    apply_algo(candidate, policy.calculator_algo, &policy.calculator_value)
}

fn limit_value(
    container: &Container,
    kind: ResourceKind,
    candidates: &CandidateSet,
    config: &EffectiveConfig,
) -> Option<Quantity> {
    let limit = ResourceAxis::new(kind, AxisSide::Limit);
    let policy = config.axis(limit);

    let from_cpu = config.memory_from_cpu(AxisSide::Limit);
    if kind == ResourceKind::Memory && from_cpu.enabled {
        let resources = &container.resources;
        let cpu = resources.cpu_limit.or(resources.cpu_request)?;
        return Some(apply_algo(
            cpu_to_memory_heuristic(cpu),
            from_cpu.algo,
            &from_cpu.value,
        ));
    }

    if policy.apply_target == ApplyTarget::Auto {
        let request = container.resources.get(limit.request())?;
        return Some(apply_algo(
            request,
            policy.calculator_algo,
            &policy.calculator_value,
        ));
    }

    candidates.get(limit)
}

/// Run the guards and, if a change survives, write it into `container`
fn commit(
    container: &mut Container,
    axis: ResourceAxis,
    proposed: Quantity,
    policy: &AxisPolicy,
) -> Option<Change> {
    let current = container.resources.get(axis);
    let value = guard(&container.name, axis, current, proposed, policy)?;

    container.resources.set(axis, value);
    Some(Change {
        container: container.name.clone(),
        axis,
        old: current,
        new: value,
    })
}

/// Guards of the pipeline after the transform
///
/// Returns `None` when the axis keeps its current value. An unset current
/// value counts as zero for the comparisons.
pub fn guard(
    container: &str,
    axis: ResourceAxis,
    current: Option<Quantity>,
    proposed: Quantity,
    policy: &AxisPolicy,
) -> Option<Quantity> {
    let baseline = current.unwrap_or_else(|| Quantity::zero(axis.kind()));
    let mut value = proposed;

    if let Some(min) = policy.min_allowed {
        if value < min {
            value = min;
        }
    }
    if let Some(max) = policy.max_allowed {
        if value > max {
            value = max;
        }
    }

    // Unconfigured min-diff would make the threshold the current value
    // itself and block every decrease
    if !policy.min_diff_value.trim().is_empty() {
        let threshold = apply_algo(baseline, policy.min_diff_algo, &policy.min_diff_value);
        if value < threshold {
            debug!(
                container = %container,
                axis = %axis,
                proposed = %value,
                threshold = %threshold,
                "Below min-diff threshold, keeping current value"
            );
            return None;
        }
    }

    let blocked = match policy.scale_direction {
        ScaleDirection::Both => false,
        ScaleDirection::Up => value < baseline,
        ScaleDirection::Down => value > baseline,
    };
    if blocked {
        debug!(
            container = %container,
            axis = %axis,
            proposed = %value,
            direction = ?policy.scale_direction,
            "Scale direction not allowed, keeping current value"
        );
        return None;
    }

    if policy.apply_mode == ApplyMode::Off {
        return None;
    }
    // Canonical text equality, so 1000m and 1 count as the same value
    if current.map(|c| c.to_string()) == Some(value.to_string()) {
        return None;
    }

    Some(value)
}
