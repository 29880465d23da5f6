//! Cascading policy resolution
//!
//! Every setting is looked up in order: the container-scoped annotation,
//! the workload annotation, the process default, then a hardcoded fallback.
//! Values that fail validation are logged and skipped, so resolution moves
//! on to the next layer instead of failing.

use super::defaults::ProcessDefaults;
use super::duration::parse_duration;
use super::settings::{
    self, annotation_key, axis_setting, fallback, from_cpu_setting, resource_setting, ApplyMode,
    ApplyTarget, ScaleDirection, UnprovidedDefaultMode,
};
use crate::calculator::CalculatorAlgo;
use crate::models::{AxisSide, ResourceAxis};
use crate::quantity::{Quantity, ResourceKind};
use crate::scheduler::CronSchedule;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Where a raw value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Container,
    Workload,
    ProcessDefault,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Container => write!(f, "container"),
            Scope::Workload => write!(f, "workload"),
            Scope::ProcessDefault => write!(f, "process-default"),
        }
    }
}

/// Resolved policy for one axis
#[derive(Debug, Clone, PartialEq)]
pub struct AxisPolicy {
    pub apply_mode: ApplyMode,
    pub apply_target: ApplyTarget,
    /// Increase transform on requests, auto-limit calculator on limits
    pub calculator_algo: CalculatorAlgo,
    pub calculator_value: String,
    pub min_allowed: Option<Quantity>,
    pub max_allowed: Option<Quantity>,
    pub min_diff_algo: CalculatorAlgo,
    pub min_diff_value: String,
    pub scale_direction: ScaleDirection,
}

/// Fallback policy for containers the recommendation source has no data for
#[derive(Debug, Clone, PartialEq)]
pub struct UnprovidedPolicy {
    pub mode: UnprovidedDefaultMode,
    pub value: String,
    pub min_allowed_recommendation: Option<Quantity>,
    pub max_allowed_recommendation: Option<Quantity>,
}

/// Derivation of a memory axis from CPU
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveFromCpu {
    pub enabled: bool,
    pub algo: CalculatorAlgo,
    pub value: String,
}

/// Fully resolved policy for one (target, container) pair
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub cpu_request: AxisPolicy,
    pub cpu_limit: AxisPolicy,
    pub memory_request: AxisPolicy,
    pub memory_limit: AxisPolicy,
    pub cpu_unprovided: UnprovidedPolicy,
    pub memory_unprovided: UnprovidedPolicy,
    pub memory_request_from_cpu: DeriveFromCpu,
    pub memory_limit_from_cpu: DeriveFromCpu,
    pub cron: String,
    pub max_jitter: Duration,
    pub dry_run: bool,
    pub webhook_enabled: bool,
}

impl EffectiveConfig {
    pub fn axis(&self, axis: ResourceAxis) -> &AxisPolicy {
        match axis {
            ResourceAxis::CpuRequest => &self.cpu_request,
            ResourceAxis::CpuLimit => &self.cpu_limit,
            ResourceAxis::MemoryRequest => &self.memory_request,
            ResourceAxis::MemoryLimit => &self.memory_limit,
        }
    }

    pub fn unprovided(&self, kind: ResourceKind) -> &UnprovidedPolicy {
        match kind {
            ResourceKind::Cpu => &self.cpu_unprovided,
            ResourceKind::Memory => &self.memory_unprovided,
        }
    }

    pub fn memory_from_cpu(&self, side: AxisSide) -> &DeriveFromCpu {
        match side {
            AxisSide::Request => &self.memory_request_from_cpu,
            AxisSide::Limit => &self.memory_limit_from_cpu,
        }
    }
}

/// Resolves settings over workload annotations and process defaults
#[derive(Debug, Clone, Copy)]
pub struct PolicyResolver<'a> {
    policy: &'a HashMap<String, String>,
    defaults: &'a ProcessDefaults,
}

impl<'a> PolicyResolver<'a> {
    pub fn new(policy: &'a HashMap<String, String>, defaults: &'a ProcessDefaults) -> Self {
        Self { policy, defaults }
    }

    fn layers(
        &self,
        setting: &str,
        container: Option<&str>,
    ) -> impl Iterator<Item = (Scope, &'a str)> {
        let container_value = container.and_then(|name| {
            self.policy
                .get(&annotation_key(setting, Some(name)))
                .map(|v| (Scope::Container, v.as_str()))
        });
        let workload_value = self
            .policy
            .get(&annotation_key(setting, None))
            .map(|v| (Scope::Workload, v.as_str()));
        let default_value = self
            .defaults
            .get(setting)
            .map(|v| (Scope::ProcessDefault, v));

        container_value
            .into_iter()
            .chain(workload_value)
            .chain(default_value)
    }

    /// Resolve `setting` through the cascade using a custom parser
    ///
    /// Returns `None` when no layer holds a valid value.
    pub fn resolve_with<T>(
        &self,
        setting: &str,
        container: Option<&str>,
        parse: impl Fn(&str) -> Result<T, String>,
    ) -> Option<T> {
        for (scope, raw) in self.layers(setting, container) {
            match parse(raw) {
                Ok(value) => return Some(value),
                Err(e) => warn!(
                    setting = %setting,
                    scope = %scope,
                    value = %raw,
                    error = %e,
                    "Ignoring invalid policy value"
                ),
            }
        }
        None
    }

    /// Resolve a setting whose type parses with [`FromStr`]
    pub fn resolve<T>(&self, setting: &str, container: Option<&str>) -> Option<T>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.resolve_with(setting, container, |raw| {
            raw.parse::<T>().map_err(|e| e.to_string())
        })
    }

    /// Raw string setting; any present value wins, including an empty one
    pub fn resolve_string(&self, setting: &str, container: Option<&str>) -> String {
        self.layers(setting, container)
            .next()
            .map(|(_, raw)| raw.trim().to_string())
            .unwrap_or_default()
    }

    /// Boolean setting; only the literal `true` is true
    pub fn resolve_bool(&self, setting: &str, container: Option<&str>) -> bool {
        self.layers(setting, container)
            .next()
            .map(|(_, raw)| raw == "true")
            .unwrap_or(false)
    }

    pub fn resolve_quantity(
        &self,
        setting: &str,
        container: Option<&str>,
        kind: ResourceKind,
    ) -> Option<Quantity> {
        self.resolve_with(setting, container, |raw| {
            Quantity::parse(kind, raw).map_err(|e| e.to_string())
        })
    }

    /// Resolve the complete policy for `container`, or the workload-level
    /// policy when no container is given
    pub fn effective(&self, container: Option<&str>) -> EffectiveConfig {
        let unprovided = |kind| self.unprovided_policy(kind, container);
        let from_cpu = |side| self.derive_from_cpu(side, container);

        EffectiveConfig {
            cpu_request: self.axis_policy(ResourceAxis::CpuRequest, container),
            cpu_limit: self.axis_policy(ResourceAxis::CpuLimit, container),
            memory_request: self.axis_policy(ResourceAxis::MemoryRequest, container),
            memory_limit: self.axis_policy(ResourceAxis::MemoryLimit, container),
            cpu_unprovided: unprovided(ResourceKind::Cpu),
            memory_unprovided: unprovided(ResourceKind::Memory),
            memory_request_from_cpu: from_cpu(AxisSide::Request),
            memory_limit_from_cpu: from_cpu(AxisSide::Limit),
            cron: self
                .resolve_with(settings::CRON, container, |raw| {
                    CronSchedule::parse(raw)
                        .map(|_| raw.trim().to_string())
                        .map_err(|e| e.to_string())
                })
                .unwrap_or_else(|| fallback::CRON.to_string()),
            max_jitter: self
                .resolve_with(settings::MAX_JITTER, container, parse_duration)
                .or_else(|| parse_duration(fallback::MAX_JITTER).ok())
                .unwrap_or_default(),
            dry_run: self.resolve_bool(settings::DRY_RUN, container),
            webhook_enabled: self.resolve_bool(settings::WEBHOOK_ENABLED, container),
        }
    }

    fn axis_policy(&self, axis: ResourceAxis, container: Option<&str>) -> AxisPolicy {
        let name = |field: &str| axis_setting(axis, field);
        let side = axis.side();
        let default_target = match side {
            AxisSide::Request => ApplyTarget::Balanced,
            AxisSide::Limit => ApplyTarget::Auto,
        };

        AxisPolicy {
            apply_mode: self
                .resolve(&name("apply-mode"), container)
                .unwrap_or(ApplyMode::Enforce),
            apply_target: self
                .resolve_with(&name("apply-target"), container, |raw| {
                    ApplyTarget::parse_for(side, raw)
                })
                .unwrap_or(default_target),
            calculator_algo: self
                .resolve(&name("calculator-algo"), container)
                .unwrap_or(CalculatorAlgo::Ratio),
            calculator_value: self.resolve_string(&name("calculator-value"), container),
            min_allowed: self.resolve_quantity(&name("min-allowed"), container, axis.kind()),
            max_allowed: self.resolve_quantity(&name("max-allowed"), container, axis.kind()),
            min_diff_algo: self
                .resolve(&name("min-diff-algo"), container)
                .unwrap_or(CalculatorAlgo::Ratio),
            min_diff_value: self.resolve_string(&name("min-diff-value"), container),
            scale_direction: self
                .resolve(&name("scale-direction"), container)
                .unwrap_or(ScaleDirection::Both),
        }
    }

    fn unprovided_policy(&self, kind: ResourceKind, container: Option<&str>) -> UnprovidedPolicy {
        let name = |field: &str| resource_setting(kind, field);
        UnprovidedPolicy {
            mode: self
                .resolve(&name("unprovided-default-mode"), container)
                .unwrap_or(UnprovidedDefaultMode::Off),
            value: self.resolve_string(&name("unprovided-default-value"), container),
            min_allowed_recommendation: self.resolve_quantity(
                &name("min-allowed-recommendation"),
                container,
                kind,
            ),
            max_allowed_recommendation: self.resolve_quantity(
                &name("max-allowed-recommendation"),
                container,
                kind,
            ),
        }
    }

    fn derive_from_cpu(&self, side: AxisSide, container: Option<&str>) -> DeriveFromCpu {
        let name = |field: &str| from_cpu_setting(side, field);
        DeriveFromCpu {
            enabled: self.resolve_bool(&name("enabled"), container),
            algo: self
                .resolve(&name("algo"), container)
                .unwrap_or(CalculatorAlgo::Ratio),
            value: self.resolve_string(&name("value"), container),
        }
    }
}
