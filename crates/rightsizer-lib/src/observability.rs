//! Observability infrastructure for the rightsizer
//!
//! Provides:
//! - Prometheus metrics (run results, committed changes, run duration, scheduled targets)
//! - Structured JSON logging with tracing

use crate::report::{ResultKind, UpdateResult};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for pipeline run durations (in seconds)
const RUN_DURATION_BUCKETS: &[f64] = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<RightsizerMetricsInner> = OnceLock::new();

struct RightsizerMetricsInner {
    runs_total: IntCounterVec,
    changes_total: IntCounter,
    run_duration_seconds: Histogram,
    scheduled_targets: IntGauge,
}

impl RightsizerMetricsInner {
    fn new() -> Self {
        Self {
            runs_total: register_int_counter_vec!(
                "rightsizer_runs_total",
                "Pipeline runs by result",
                &["result"]
            )
            .expect("Failed to register runs_total"),

            changes_total: register_int_counter!(
                "rightsizer_changes_total",
                "Resource changes written to workloads"
            )
            .expect("Failed to register changes_total"),

            run_duration_seconds: register_histogram!(
                "rightsizer_run_duration_seconds",
                "Time spent in one resolve-and-apply run",
                RUN_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register run_duration_seconds"),

            scheduled_targets: register_int_gauge!(
                "rightsizer_scheduled_targets",
                "Number of targets with a registered schedule"
            )
            .expect("Failed to register scheduled_targets"),
        }
    }
}

/// Rightsizer metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance. Clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct RightsizerMetrics {
    _private: (),
}

impl Default for RightsizerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl RightsizerMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(RightsizerMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &RightsizerMetricsInner {
        GLOBAL_METRICS.get_or_init(RightsizerMetricsInner::new)
    }

    /// Count one finished run and, when written, its changes
    pub fn record_result(&self, result: &UpdateResult) {
        self.inner()
            .runs_total
            .with_label_values(&[result.kind.as_str()])
            .inc();
        if result.kind == ResultKind::Success {
            self.inner().changes_total.inc_by(result.changes.len() as u64);
        }
    }

    pub fn observe_run_duration(&self, duration_secs: f64) {
        self.inner().run_duration_seconds.observe(duration_secs);
    }

    pub fn set_scheduled_targets(&self, count: i64) {
        self.inner().scheduled_targets.set(count);
    }
}

/// Structured logger for rightsizer events
///
/// Consistent JSON-formatted events for updates, failures and lifecycle.
#[derive(Clone)]
pub struct StructuredLogger {
    controller_name: String,
}

impl StructuredLogger {
    pub fn new(controller_name: impl Into<String>) -> Self {
        Self {
            controller_name: controller_name.into(),
        }
    }

    /// Log one finished run that produced changes
    pub fn log_update(&self, result: &UpdateResult) {
        let changes: Vec<String> = result.changes.iter().map(|c| c.to_string()).collect();
        match result.kind {
            ResultKind::Failed => {
                warn!(
                    event = "update_failed",
                    controller = %self.controller_name,
                    target_key = %result.key,
                    changes = ?changes,
                    error = result.error.as_deref().unwrap_or_default(),
                    "Failed to update resources"
                );
            }
            ResultKind::DryRun => {
                info!(
                    event = "resources_updated",
                    controller = %self.controller_name,
                    target_key = %result.key,
                    dry_run = true,
                    changes = ?changes,
                    "Computed resource changes (dry run)"
                );
            }
            ResultKind::Success => {
                info!(
                    event = "resources_updated",
                    controller = %self.controller_name,
                    target_key = %result.key,
                    dry_run = false,
                    changes = ?changes,
                    "Updated resources"
                );
            }
        }
    }

    /// Log controller startup
    pub fn log_startup(&self, version: &str, targets: usize) {
        info!(
            event = "rightsizer_started",
            controller = %self.controller_name,
            version = %version,
            targets = targets,
            "Rightsizer started"
        );
    }

    /// Log controller shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "rightsizer_shutdown",
            controller = %self.controller_name,
            reason = %reason,
            "Rightsizer shutting down"
        );
    }
}
