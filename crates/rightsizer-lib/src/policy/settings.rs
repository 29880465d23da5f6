//! Policy vocabulary: setting names and enumerated option values

use crate::models::{AxisSide, ResourceAxis};
use crate::quantity::ResourceKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of every policy annotation on a workload
pub const ANNOTATION_PREFIX: &str = "rightsizer.io/";

pub const CRON: &str = "cron";
pub const MAX_JITTER: &str = "max-jitter";
pub const DRY_RUN: &str = "dry-run";
pub const WEBHOOK_ENABLED: &str = "webhook-enabled";

/// Hardcoded fallbacks used when neither policy nor process defaults set a value
pub mod fallback {
    pub const CRON: &str = "*/30 * * * *";
    pub const MAX_JITTER: &str = "30s";
}

/// Annotation key for `setting`, optionally scoped to a container
pub fn annotation_key(setting: &str, container: Option<&str>) -> String {
    match container {
        Some(name) => format!("{ANNOTATION_PREFIX}{setting}.{name}"),
        None => format!("{ANNOTATION_PREFIX}{setting}"),
    }
}

/// Per-axis setting name, e.g. `cpu-limit-apply-target`
pub fn axis_setting(axis: ResourceAxis, field: &str) -> String {
    format!("{}-{}", axis.as_str(), field)
}

/// Per-resource setting name, e.g. `memory-unprovided-default-mode`
pub fn resource_setting(kind: ResourceKind, field: &str) -> String {
    format!("{kind}-{field}")
}

/// Memory-from-CPU setting name, e.g. `memory-limit-from-cpu-enabled`
pub fn from_cpu_setting(side: AxisSide, field: &str) -> String {
    format!("memory-{side}-from-cpu-{field}")
}

fn normalize(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace('_', "-")
}

/// Whether an axis may be written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    Enforce,
    Off,
}

impl FromStr for ApplyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "enforce" => Ok(ApplyMode::Enforce),
            "off" => Ok(ApplyMode::Off),
            other => Err(format!("unknown apply mode '{other}'")),
        }
    }
}

/// Which band of a tiered recommendation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyTarget {
    /// Lower bound
    Frugal,
    /// Target
    Balanced,
    /// Upper bound
    Peak,
    /// Derive the limit from the request (limit axes only)
    Auto,
}

impl ApplyTarget {
    /// Parse a target for the given side; `auto` is rejected for requests
    pub fn parse_for(side: AxisSide, s: &str) -> Result<Self, String> {
        let target: ApplyTarget = s.parse()?;
        if target == ApplyTarget::Auto && side == AxisSide::Request {
            return Err("apply target 'auto' is only valid for limits".to_string());
        }
        Ok(target)
    }
}

impl FromStr for ApplyTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "frugal" => Ok(ApplyTarget::Frugal),
            "balanced" => Ok(ApplyTarget::Balanced),
            "peak" => Ok(ApplyTarget::Peak),
            "auto" => Ok(ApplyTarget::Auto),
            other => Err(format!("unknown apply target '{other}'")),
        }
    }
}

impl fmt::Display for ApplyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyTarget::Frugal => write!(f, "frugal"),
            ApplyTarget::Balanced => write!(f, "balanced"),
            ApplyTarget::Peak => write!(f, "peak"),
            ApplyTarget::Auto => write!(f, "auto"),
        }
    }
}

/// Permitted movement of an axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleDirection {
    Both,
    Up,
    Down,
}

impl FromStr for ScaleDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "both" => Ok(ScaleDirection::Both),
            "up" => Ok(ScaleDirection::Up),
            "down" => Ok(ScaleDirection::Down),
            other => Err(format!("unknown scale direction '{other}'")),
        }
    }
}

/// Fallback source for containers without a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnprovidedDefaultMode {
    Off,
    MinAllowed,
    MaxAllowed,
    Value,
}

impl FromStr for UnprovidedDefaultMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize(s).as_str() {
            "off" => Ok(UnprovidedDefaultMode::Off),
            "min-allowed" | "minallowed" => Ok(UnprovidedDefaultMode::MinAllowed),
            "max-allowed" | "maxallowed" => Ok(UnprovidedDefaultMode::MaxAllowed),
            "value" => Ok(UnprovidedDefaultMode::Value),
            other => Err(format!("unknown unprovided default mode '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_names() {
        assert_eq!(
            axis_setting(ResourceAxis::CpuLimit, "apply-target"),
            "cpu-limit-apply-target"
        );
        assert_eq!(
            resource_setting(ResourceKind::Memory, "unprovided-default-mode"),
            "memory-unprovided-default-mode"
        );
        assert_eq!(
            from_cpu_setting(AxisSide::Limit, "enabled"),
            "memory-limit-from-cpu-enabled"
        );
        assert_eq!(
            annotation_key("dry-run", Some("app")),
            "rightsizer.io/dry-run.app"
        );
        assert_eq!(annotation_key("cron", None), "rightsizer.io/cron");
    }

    #[test]
    fn test_enum_vocabulary() {
        assert_eq!("Enforce".parse::<ApplyMode>(), Ok(ApplyMode::Enforce));
        assert!("on".parse::<ApplyMode>().is_err());
        assert_eq!("PEAK".parse::<ApplyTarget>(), Ok(ApplyTarget::Peak));
        assert_eq!("down".parse::<ScaleDirection>(), Ok(ScaleDirection::Down));
        assert_eq!(
            "min_allowed".parse::<UnprovidedDefaultMode>(),
            Ok(UnprovidedDefaultMode::MinAllowed)
        );
        assert_eq!(
            "MaxAllowed".parse::<UnprovidedDefaultMode>(),
            Ok(UnprovidedDefaultMode::MaxAllowed)
        );
    }

    #[test]
    fn test_auto_rejected_for_requests() {
        assert!(ApplyTarget::parse_for(AxisSide::Request, "auto").is_err());
        assert_eq!(
            ApplyTarget::parse_for(AxisSide::Limit, "auto"),
            Ok(ApplyTarget::Auto)
        );
        assert_eq!(
            ApplyTarget::parse_for(AxisSide::Request, "frugal"),
            Ok(ApplyTarget::Frugal)
        );
    }
}
