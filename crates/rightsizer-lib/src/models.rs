//! Core data models for the rightsizer

use crate::quantity::{serde_opt, Quantity, ResourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wildcard container name in policy bounds
pub const WILDCARD_CONTAINER: &str = "*";

/// Request or limit side of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisSide {
    Request,
    Limit,
}

impl fmt::Display for AxisSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AxisSide::Request => write!(f, "request"),
            AxisSide::Limit => write!(f, "limit"),
        }
    }
}

/// One of the four scalar resource targets of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceAxis {
    CpuRequest,
    CpuLimit,
    MemoryRequest,
    MemoryLimit,
}

impl ResourceAxis {
    /// Processing order: each request precedes its limit
    pub const ALL: [ResourceAxis; 4] = [
        ResourceAxis::CpuRequest,
        ResourceAxis::CpuLimit,
        ResourceAxis::MemoryRequest,
        ResourceAxis::MemoryLimit,
    ];

    pub fn new(kind: ResourceKind, side: AxisSide) -> Self {
        match (kind, side) {
            (ResourceKind::Cpu, AxisSide::Request) => ResourceAxis::CpuRequest,
            (ResourceKind::Cpu, AxisSide::Limit) => ResourceAxis::CpuLimit,
            (ResourceKind::Memory, AxisSide::Request) => ResourceAxis::MemoryRequest,
            (ResourceKind::Memory, AxisSide::Limit) => ResourceAxis::MemoryLimit,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceAxis::CpuRequest | ResourceAxis::CpuLimit => ResourceKind::Cpu,
            ResourceAxis::MemoryRequest | ResourceAxis::MemoryLimit => ResourceKind::Memory,
        }
    }

    pub fn side(&self) -> AxisSide {
        match self {
            ResourceAxis::CpuRequest | ResourceAxis::MemoryRequest => AxisSide::Request,
            ResourceAxis::CpuLimit | ResourceAxis::MemoryLimit => AxisSide::Limit,
        }
    }

    /// The request axis of the same resource
    pub fn request(&self) -> ResourceAxis {
        ResourceAxis::new(self.kind(), AxisSide::Request)
    }

    /// Setting-name prefix, e.g. `cpu-request`
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceAxis::CpuRequest => "cpu-request",
            ResourceAxis::CpuLimit => "cpu-limit",
            ResourceAxis::MemoryRequest => "memory-request",
            ResourceAxis::MemoryLimit => "memory-limit",
        }
    }
}

impl fmt::Display for ResourceAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests and limits currently set on a container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerResources {
    #[serde(default, with = "serde_opt::cpu", skip_serializing_if = "Option::is_none")]
    pub cpu_request: Option<Quantity>,
    #[serde(default, with = "serde_opt::cpu", skip_serializing_if = "Option::is_none")]
    pub cpu_limit: Option<Quantity>,
    #[serde(default, with = "serde_opt::memory", skip_serializing_if = "Option::is_none")]
    pub memory_request: Option<Quantity>,
    #[serde(default, with = "serde_opt::memory", skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<Quantity>,
}

impl ContainerResources {
    pub fn get(&self, axis: ResourceAxis) -> Option<Quantity> {
        match axis {
            ResourceAxis::CpuRequest => self.cpu_request,
            ResourceAxis::CpuLimit => self.cpu_limit,
            ResourceAxis::MemoryRequest => self.memory_request,
            ResourceAxis::MemoryLimit => self.memory_limit,
        }
    }

    pub fn set(&mut self, axis: ResourceAxis, value: Quantity) {
        let slot = match axis {
            ResourceAxis::CpuRequest => &mut self.cpu_request,
            ResourceAxis::CpuLimit => &mut self.cpu_limit,
            ResourceAxis::MemoryRequest => &mut self.memory_request,
            ResourceAxis::MemoryLimit => &mut self.memory_limit,
        };
        *slot = Some(value);
    }
}

/// A container of the target workload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub resources: ContainerResources,
}

impl Container {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: ContainerResources::default(),
        }
    }

    pub fn with(mut self, axis: ResourceAxis, value: Quantity) -> Self {
        self.resources.set(axis, value);
        self
    }
}

/// CPU and memory amounts for one estimate band or bound
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceEstimate {
    #[serde(default, with = "serde_opt::cpu", skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Quantity>,
    #[serde(default, with = "serde_opt::memory", skip_serializing_if = "Option::is_none")]
    pub memory: Option<Quantity>,
}

impl ResourceEstimate {
    pub fn new(cpu: Option<Quantity>, memory: Option<Quantity>) -> Self {
        Self { cpu, memory }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<Quantity> {
        match kind {
            ResourceKind::Cpu => self.cpu,
            ResourceKind::Memory => self.memory,
        }
    }
}

/// One container's estimate from the external recommendation source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TieredRecommendation {
    pub container_name: String,
    #[serde(default)]
    pub lower_bound: ResourceEstimate,
    #[serde(default)]
    pub target: ResourceEstimate,
    #[serde(default)]
    pub upper_bound: ResourceEstimate,
}

/// Per-container min/max allowed from the recommendation source's own policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPolicyBound {
    pub container_name: String,
    #[serde(default)]
    pub min_allowed: ResourceEstimate,
    #[serde(default)]
    pub max_allowed: ResourceEstimate,
}

impl ContainerPolicyBound {
    /// Find the bound for `container`, falling back to the wildcard entry
    pub fn lookup<'a>(
        bounds: &'a [ContainerPolicyBound],
        container: &str,
    ) -> Option<&'a ContainerPolicyBound> {
        bounds
            .iter()
            .find(|b| b.container_name == container)
            .or_else(|| bounds.iter().find(|b| b.container_name == WILDCARD_CONTAINER))
    }
}

/// Workload kinds the transport layer knows how to patch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
    DaemonSet,
    CronJob,
    /// Database cluster custom resource
    Cluster,
}

impl FromStr for WorkloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deployment" => Ok(WorkloadKind::Deployment),
            "StatefulSet" => Ok(WorkloadKind::StatefulSet),
            "DaemonSet" => Ok(WorkloadKind::DaemonSet),
            "CronJob" => Ok(WorkloadKind::CronJob),
            "Cluster" => Ok(WorkloadKind::Cluster),
            other => Err(other.to_string()),
        }
    }
}

/// Identity of a managed workload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl TargetRef {
    pub fn new(kind: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Registry and report key: `namespace/name`
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// A proposed value for one axis, before any guard runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub axis: ResourceAxis,
    pub value: Quantity,
}

/// A committed mutation of one container axis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub container: String,
    pub axis: ResourceAxis,
    pub old: Option<Quantity>,
    pub new: Quantity,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.old {
            Some(old) => write!(f, "{} {}: {} -> {}", self.container, self.axis, old, self.new),
            None => write!(f, "{} {}: <unset> -> {}", self.container, self.axis, self.new),
        }
    }
}
