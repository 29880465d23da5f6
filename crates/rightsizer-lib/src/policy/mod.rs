//! Rightsizing policy
//!
//! Policy lives in `rightsizer.io/` annotations on the managed workload,
//! optionally scoped to one container, with process-wide defaults from the
//! environment underneath.

mod defaults;
mod duration;
mod resolver;
pub mod settings;

pub use defaults::{ProcessDefaults, ENV_PREFIX};
pub use duration::parse_duration;
pub use resolver::{
    AxisPolicy, DeriveFromCpu, EffectiveConfig, PolicyResolver, Scope, UnprovidedPolicy,
};
pub use settings::{ApplyMode, ApplyTarget, ScaleDirection, UnprovidedDefaultMode};
