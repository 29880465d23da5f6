//! Core library for Kubernetes resource rightsizing
//!
//! This crate provides:
//! - Resource quantities and calculator algorithms
//! - Cascading policy resolution from workload annotations
//! - The rightsizing engine (selection, unprovided defaults, guarded apply)
//! - Change reporting and per-target scheduling
//! - Observability

pub mod calculator;
pub mod engine;
pub mod error;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod policy;
pub mod quantity;
pub mod report;
pub mod scheduler;
pub mod source;

pub use error::{Error, Result};
pub use models::*;
pub use observability::{RightsizerMetrics, StructuredLogger};
pub use pipeline::{Admission, Rightsizer, ScheduledApply};
pub use policy::{EffectiveConfig, PolicyResolver, ProcessDefaults};
pub use quantity::{Quantity, QuantityError, ResourceKind};
pub use report::{ChangeReporter, Notifier, ResultKind, UpdateResult};
pub use scheduler::{ScheduleRegistry, ScheduledJob};
pub use source::{RecommendationSource, RecommendationStatus, WorkloadStore};
