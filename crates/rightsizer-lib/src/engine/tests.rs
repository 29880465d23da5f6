//! Engine behaviour over whole containers

use super::apply::{apply_container, guard};
use super::{plan, CandidateSet};
use crate::calculator::CalculatorAlgo;
use crate::models::{
    Container, ContainerPolicyBound, ResourceAxis, ResourceEstimate, TieredRecommendation,
};
use crate::policy::{
    ApplyMode, ApplyTarget, AxisPolicy, EffectiveConfig, PolicyResolver, ProcessDefaults,
    ScaleDirection,
};
use crate::quantity::{Quantity, ResourceKind};
use std::collections::HashMap;

fn cpu(s: &str) -> Quantity {
    Quantity::parse(ResourceKind::Cpu, s).unwrap()
}

fn mem(s: &str) -> Quantity {
    Quantity::parse(ResourceKind::Memory, s).unwrap()
}

fn annotations(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (format!("rightsizer.io/{k}"), v.to_string()))
        .collect()
}

fn effective(pairs: &[(&str, &str)]) -> EffectiveConfig {
    let policy = annotations(pairs);
    PolicyResolver::new(&policy, &ProcessDefaults::default()).effective(Some("app"))
}

fn axis_policy() -> AxisPolicy {
    AxisPolicy {
        apply_mode: ApplyMode::Enforce,
        apply_target: ApplyTarget::Balanced,
        calculator_algo: CalculatorAlgo::Ratio,
        calculator_value: String::new(),
        min_allowed: None,
        max_allowed: None,
        min_diff_algo: CalculatorAlgo::Ratio,
        min_diff_value: String::new(),
        scale_direction: ScaleDirection::Both,
    }
}

fn recommendation(name: &str, cpu_target: &str, mem_target: &str) -> TieredRecommendation {
    TieredRecommendation {
        container_name: name.to_string(),
        lower_bound: ResourceEstimate::default(),
        target: ResourceEstimate::new(Some(cpu(cpu_target)), Some(mem(mem_target))),
        upper_bound: ResourceEstimate::default(),
    }
}

#[test]
fn test_end_to_end_balanced_with_auto_limits() {
    let containers = vec![Container::new("app")
        .with(ResourceAxis::CpuRequest, cpu("100m"))
        .with(ResourceAxis::MemoryRequest, mem("128Mi"))];
    let recs = vec![recommendation("app", "150m", "192Mi")];
    let policy = annotations(&[
        ("cpu-limit-calculator-value", "2"),
        ("memory-limit-calculator-value", "2"),
    ]);
    let defaults = ProcessDefaults::default();
    let resolver = PolicyResolver::new(&policy, &defaults);

    let plan = plan(containers, Some(&recs), &[], &resolver);

    let resources = &plan.containers[0].resources;
    assert_eq!(resources.cpu_request.map(|q| q.to_string()).as_deref(), Some("150m"));
    assert_eq!(resources.memory_request.map(|q| q.to_string()).as_deref(), Some("192Mi"));
    assert_eq!(resources.cpu_limit.map(|q| q.to_string()).as_deref(), Some("300m"));
    assert_eq!(resources.memory_limit.map(|q| q.to_string()).as_deref(), Some("384Mi"));

    assert_eq!(plan.changes.len(), 4);
    let axes: Vec<_> = plan.changes.iter().map(|c| c.axis).collect();
    assert_eq!(axes, ResourceAxis::ALL.to_vec());
    assert_eq!(plan.changes[0].old, Some(cpu("100m")));
    assert_eq!(plan.changes[1].old, None);
    assert_eq!(plan.changes[1].to_string(), "app cpu-limit: <unset> -> 300m");
}

#[test]
fn test_rerun_with_same_inputs_is_noop() {
    let policy = annotations(&[("cpu-limit-calculator-value", "2")]);
    let defaults = ProcessDefaults::default();
    let resolver = PolicyResolver::new(&policy, &defaults);
    let recs = vec![recommendation("app", "150m", "192Mi")];

    let first = plan(vec![Container::new("app")], Some(&recs), &[], &resolver);
    assert!(!first.is_noop());

    let second = plan(first.containers.clone(), Some(&recs), &[], &resolver);
    assert!(second.is_noop());
    assert_eq!(second.containers, first.containers);
}

#[test]
fn test_anti_flap_reverts_small_increase() {
    let mut policy = axis_policy();
    policy.min_diff_value = "1.1".to_string();

    let out = guard("app", ResourceAxis::CpuRequest, Some(cpu("100m")), cpu("105m"), &policy);
    assert_eq!(out, None);

    let out = guard("app", ResourceAxis::CpuRequest, Some(cpu("100m")), cpu("110m"), &policy);
    assert_eq!(out, Some(cpu("110m")));
}

#[test]
fn test_unconfigured_min_diff_allows_decrease() {
    let out = guard(
        "app",
        ResourceAxis::CpuRequest,
        Some(cpu("200m")),
        cpu("150m"),
        &axis_policy(),
    );
    assert_eq!(out, Some(cpu("150m")));
}

#[test]
fn test_scale_direction() {
    let mut policy = axis_policy();

    policy.scale_direction = ScaleDirection::Down;
    let out = guard("app", ResourceAxis::CpuRequest, Some(cpu("200m")), cpu("250m"), &policy);
    assert_eq!(out, None);

    policy.scale_direction = ScaleDirection::Up;
    let out = guard("app", ResourceAxis::CpuRequest, Some(cpu("200m")), cpu("250m"), &policy);
    assert_eq!(out, Some(cpu("250m")));
    let out = guard("app", ResourceAxis::CpuRequest, Some(cpu("200m")), cpu("150m"), &policy);
    assert_eq!(out, None);
}

#[test]
fn test_apply_mode_off_never_changes() {
    let mut policy = axis_policy();
    policy.apply_mode = ApplyMode::Off;

    let out = guard("app", ResourceAxis::CpuRequest, Some(cpu("100m")), cpu("500m"), &policy);
    assert_eq!(out, None);
    let out = guard("app", ResourceAxis::CpuRequest, None, cpu("500m"), &policy);
    assert_eq!(out, None);
}

#[test]
fn test_clamp_min_then_max() {
    let mut policy = axis_policy();
    policy.min_allowed = Some(cpu("200m"));
    policy.max_allowed = Some(cpu("400m"));

    assert_eq!(
        guard("app", ResourceAxis::CpuRequest, None, cpu("50m"), &policy),
        Some(cpu("200m"))
    );
    assert_eq!(
        guard("app", ResourceAxis::CpuRequest, None, cpu("2"), &policy),
        Some(cpu("400m"))
    );

    // Inverted bounds: max applies last and wins
    policy.min_allowed = Some(cpu("500m"));
    assert_eq!(
        guard("app", ResourceAxis::CpuRequest, None, cpu("50m"), &policy),
        Some(cpu("400m"))
    );
}

#[test]
fn test_same_canonical_value_is_not_a_change() {
    let out = guard("app", ResourceAxis::CpuRequest, Some(cpu("1000m")), cpu("1"), &axis_policy());
    assert_eq!(out, None);
}

#[test]
fn test_request_increase_transform() {
    let config = effective(&[("cpu-request-calculator-algo", "margin"), ("cpu-request-calculator-value", "50m")]);
    let mut candidates = CandidateSet::default();
    candidates.insert(ResourceAxis::CpuRequest, cpu("100m"));

    let mut container = Container::new("app");
    let changes = apply_container(&mut container, &candidates, &config);

    assert_eq!(container.resources.cpu_request, Some(cpu("150m")));
    // Auto limit with no calculator value mirrors the request
    assert_eq!(container.resources.cpu_limit, Some(cpu("150m")));
    assert_eq!(changes.len(), 2);
}

#[test]
fn test_no_request_candidate_skips_limit() {
    let config = effective(&[("memory-limit-apply-target", "peak")]);
    let mut candidates = CandidateSet::default();
    candidates.insert(ResourceAxis::MemoryLimit, mem("1Gi"));

    let mut container = Container::new("app");
    let changes = apply_container(&mut container, &candidates, &config);

    assert!(changes.is_empty());
    assert_eq!(container.resources.memory_limit, None);
}

#[test]
fn test_explicit_limit_band() {
    let config = effective(&[("cpu-limit-apply-target", "peak")]);
    let mut candidates = CandidateSet::default();
    candidates.insert(ResourceAxis::CpuRequest, cpu("100m"));
    candidates.insert(ResourceAxis::CpuLimit, cpu("800m"));

    let mut container = Container::new("app");
    apply_container(&mut container, &candidates, &config);
    assert_eq!(container.resources.cpu_limit, Some(cpu("800m")));
}

#[test]
fn test_memory_limit_from_cpu() {
    let config = effective(&[
        ("memory-limit-from-cpu-enabled", "true"),
        ("memory-limit-from-cpu-value", "2"),
        ("cpu-limit-apply-mode", "off"),
    ]);
    let mut candidates = CandidateSet::default();
    candidates.insert(ResourceAxis::CpuRequest, cpu("150m"));
    candidates.insert(ResourceAxis::MemoryRequest, mem("128Mi"));

    let mut container = Container::new("app");
    apply_container(&mut container, &candidates, &config);

    // No CPU limit, so the committed request drives the derivation
    assert_eq!(container.resources.cpu_limit, None);
    assert_eq!(
        container.resources.memory_limit.map(|q| q.to_string()).as_deref(),
        Some("300M")
    );
}

#[test]
fn test_memory_request_from_cpu() {
    let config = effective(&[("memory-request-from-cpu-enabled", "true")]);
    let mut candidates = CandidateSet::default();
    candidates.insert(ResourceAxis::CpuRequest, cpu("150m"));
    candidates.insert(ResourceAxis::MemoryRequest, mem("1Gi"));

    let mut container = Container::new("app");
    apply_container(&mut container, &candidates, &config);

    assert_eq!(
        container.resources.memory_request.map(|q| q.to_string()).as_deref(),
        Some("150M")
    );
}

#[test]
fn test_unprovided_container_uses_bounds() {
    let policy = annotations(&[("cpu-unprovided-default-mode", "min-allowed")]);
    let defaults = ProcessDefaults::default();
    let resolver = PolicyResolver::new(&policy, &defaults);
    let bounds = vec![ContainerPolicyBound {
        container_name: "*".to_string(),
        min_allowed: ResourceEstimate::new(Some(cpu("50m")), Some(mem("64Mi"))),
        max_allowed: ResourceEstimate::default(),
    }];
    let recs = vec![recommendation("app", "150m", "192Mi")];

    let plan = plan(
        vec![Container::new("app"), Container::new("sidecar")],
        Some(&recs),
        &bounds,
        &resolver,
    );

    let sidecar = &plan.containers[1].resources;
    assert_eq!(sidecar.cpu_request, Some(cpu("50m")));
    // Memory mode stays off
    assert_eq!(sidecar.memory_request, None);
}

#[test]
fn test_missing_recommendations_without_defaults_is_noop() {
    let policy = HashMap::new();
    let defaults = ProcessDefaults::default();
    let resolver = PolicyResolver::new(&policy, &defaults);
    let containers = vec![Container::new("app").with(ResourceAxis::CpuRequest, cpu("100m"))];

    let plan = plan(containers.clone(), None, &[], &resolver);
    assert!(plan.is_noop());
    assert_eq!(plan.containers, containers);
}

#[test]
fn test_container_scoped_policy_only_affects_that_container() {
    let policy = annotations(&[("cpu-request-apply-mode.sidecar", "off")]);
    let defaults = ProcessDefaults::default();
    let resolver = PolicyResolver::new(&policy, &defaults);
    let recs = vec![
        recommendation("app", "150m", "192Mi"),
        recommendation("sidecar", "150m", "192Mi"),
    ];

    let plan = plan(
        vec![Container::new("app"), Container::new("sidecar")],
        Some(&recs),
        &[],
        &resolver,
    );

    assert_eq!(plan.containers[0].resources.cpu_request, Some(cpu("150m")));
    assert_eq!(plan.containers[1].resources.cpu_request, None);
    // The sidecar's auto CPU limit has no request to derive from
    assert_eq!(plan.containers[1].resources.cpu_limit, None);
}
