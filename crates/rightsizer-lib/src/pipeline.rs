//! Pipeline entry points
//!
//! `Rightsizer` ties the collaborators, the policy resolver, the engine and
//! the reporter together. The scheduled path and the admission path run the
//! same computation; only the admission path skips the write.

use crate::engine::{self, Plan};
use crate::error::{Error, Result};
use crate::models::{Container, TargetRef, WorkloadKind};
use crate::observability::RightsizerMetrics;
use crate::policy::{PolicyResolver, ProcessDefaults};
use crate::report::{ChangeReporter, UpdateResult};
use crate::scheduler::{ScheduleRegistry, ScheduledJob};
use crate::source::{RecommendationSource, WorkloadStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Result of an admission review
#[derive(Debug, Clone)]
pub struct Admission {
    /// Containers to admit, mutated unless the run was a dry run
    pub containers: Vec<Container>,
    /// `None` when the webhook is disabled for the target
    pub result: Option<UpdateResult>,
}

pub struct Rightsizer {
    recommendations: Arc<dyn RecommendationSource>,
    workloads: Arc<dyn WorkloadStore>,
    defaults: ProcessDefaults,
    reporter: ChangeReporter,
    metrics: RightsizerMetrics,
}

impl Rightsizer {
    pub fn new(
        recommendations: Arc<dyn RecommendationSource>,
        workloads: Arc<dyn WorkloadStore>,
        defaults: ProcessDefaults,
        reporter: ChangeReporter,
    ) -> Self {
        Self {
            recommendations,
            workloads,
            defaults,
            reporter,
            metrics: RightsizerMetrics::new(),
        }
    }

    /// Compute changes for `containers` and write them unless this is a dry
    /// run
    ///
    /// The policy's own `dry-run` setting also makes the run a dry run. A
    /// write failure is reported as a `Failed` result, not an error.
    pub async fn resolve_and_apply(
        &self,
        target: &TargetRef,
        containers: Vec<Container>,
        dry_run: bool,
    ) -> Result<UpdateResult> {
        check_kind(target)?;
        let started = Instant::now();
        let key = target.key();

        let policy = self
            .workloads
            .raw_policy(target)
            .await
            .map_err(|e| Error::read("policy", &key, e))?;
        let resolver = PolicyResolver::new(&policy, &self.defaults);
        let dry_run = dry_run || resolver.effective(None).dry_run;

        let plan = self.plan(target, containers, &resolver).await?;

        let result = if plan.is_noop() {
            UpdateResult::success(&key, plan.changes)
        } else if dry_run {
            UpdateResult::dry_run(&key, plan.changes)
        } else {
            match self.workloads.write_containers(target, &plan.containers).await {
                Ok(()) => UpdateResult::success(&key, plan.changes),
                Err(e) => UpdateResult::failed(&key, plan.changes, e.to_string()),
            }
        };

        self.metrics
            .observe_run_duration(started.elapsed().as_secs_f64());
        self.reporter.report(&result).await;
        Ok(result)
    }

    /// Scheduled run: fetch the live containers and apply
    pub async fn run_scheduled(&self, target: &TargetRef) -> Result<UpdateResult> {
        check_kind(target)?;
        let containers = self
            .workloads
            .containers(target)
            .await
            .map_err(|e| Error::read("containers", target.key(), e))?;
        self.resolve_and_apply(target, containers, false).await
    }

    /// Admission review of a workload being written
    ///
    /// `policy` is taken from the incoming object. Nothing is written back;
    /// the caller patches the object with the returned containers.
    pub async fn admit(
        &self,
        target: &TargetRef,
        containers: Vec<Container>,
        policy: &HashMap<String, String>,
    ) -> Result<Admission> {
        check_kind(target)?;
        let resolver = PolicyResolver::new(policy, &self.defaults);
        let workload = resolver.effective(None);
        if !workload.webhook_enabled {
            debug!(key = %target.key(), "Webhook disabled, admitting unchanged");
            return Ok(Admission {
                containers,
                result: None,
            });
        }

        let original = containers.clone();
        let plan = self.plan(target, containers, &resolver).await?;
        let key = target.key();
        let (containers, result) = if workload.dry_run {
            (original, UpdateResult::dry_run(key, plan.changes))
        } else {
            (plan.containers, UpdateResult::success(key, plan.changes))
        };

        self.reporter.report(&result).await;
        Ok(Admission {
            containers,
            result: Some(result),
        })
    }

    /// Register or refresh the schedule of `target` from its workload policy
    ///
    /// Returns whether a new timer was registered.
    pub async fn schedule(
        self: &Arc<Self>,
        registry: &ScheduleRegistry,
        target: &TargetRef,
    ) -> Result<bool> {
        check_kind(target)?;
        let key = target.key();
        let policy = self
            .workloads
            .raw_policy(target)
            .await
            .map_err(|e| Error::read("policy", &key, e))?;
        let config = PolicyResolver::new(&policy, &self.defaults).effective(None);

        let job = Arc::new(ScheduledApply::new(Arc::clone(self), target.clone()));
        let registered = registry
            .sync(&key, &config.cron, config.max_jitter, job)
            .await?;
        Ok(registered)
    }

    async fn plan(
        &self,
        target: &TargetRef,
        containers: Vec<Container>,
        resolver: &PolicyResolver<'_>,
    ) -> Result<Plan> {
        let key = target.key();
        let status = self
            .recommendations
            .status(target)
            .await
            .map_err(|e| Error::read("recommendations", &key, e))?;

        if status.recommendations.is_none() {
            debug!(key = %key, "No recommendations yet");
        }
        Ok(engine::plan(
            containers,
            status.recommendations.as_deref(),
            &status.policy_bounds,
            resolver,
        ))
    }
}

fn check_kind(target: &TargetRef) -> Result<WorkloadKind> {
    target
        .kind
        .parse()
        .map_err(|_| Error::UnsupportedKind(target.kind.clone()))
}

/// Scheduled job applying one target
pub struct ScheduledApply {
    rightsizer: Arc<Rightsizer>,
    target: TargetRef,
}

impl ScheduledApply {
    pub fn new(rightsizer: Arc<Rightsizer>, target: TargetRef) -> Self {
        Self { rightsizer, target }
    }
}

#[async_trait]
impl ScheduledJob for ScheduledApply {
    async fn run(&self, key: &str) {
        match self.rightsizer.run_scheduled(&self.target).await {
            Ok(result) => info!(
                key = %key,
                result = %result.kind,
                changes = result.changes.len(),
                "Scheduled run finished"
            ),
            Err(e) => error!(key = %key, error = %e, "Scheduled run failed"),
        }
    }
}
