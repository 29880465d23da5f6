//! Change reporting
//!
//! Every run ends in one `UpdateResult`. Runs that changed something are
//! logged and fanned out to the registered notifiers.

use crate::models::Change;
use crate::observability::{RightsizerMetrics, StructuredLogger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Success,
    DryRun,
    Failed,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Success => "success",
            ResultKind::DryRun => "dry_run",
            ResultKind::Failed => "failed",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Changes computed for one target and what became of them
#[derive(Debug, Clone, Serialize)]
pub struct UpdateResult {
    /// Target key, `namespace/name`
    pub key: String,
    pub changes: Vec<Change>,
    pub kind: ResultKind,
    /// Write error, verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl UpdateResult {
    fn new(key: impl Into<String>, changes: Vec<Change>, kind: ResultKind, error: Option<String>) -> Self {
        Self {
            key: key.into(),
            changes,
            kind,
            error,
            finished_at: Utc::now(),
        }
    }

    pub fn success(key: impl Into<String>, changes: Vec<Change>) -> Self {
        Self::new(key, changes, ResultKind::Success, None)
    }

    pub fn dry_run(key: impl Into<String>, changes: Vec<Change>) -> Self {
        Self::new(key, changes, ResultKind::DryRun, None)
    }

    pub fn failed(key: impl Into<String>, changes: Vec<Change>, error: impl Into<String>) -> Self {
        Self::new(key, changes, ResultKind::Failed, Some(error.into()))
    }

    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Receiver of non-empty update results
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, result: &UpdateResult) -> anyhow::Result<()>;
}

/// Records metrics for every result and reports the ones with changes
#[derive(Clone)]
pub struct ChangeReporter {
    logger: StructuredLogger,
    metrics: RightsizerMetrics,
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl ChangeReporter {
    pub fn new(logger: StructuredLogger) -> Self {
        Self {
            logger,
            metrics: RightsizerMetrics::new(),
            notifiers: Vec::new(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Report `result`; silent apart from metrics when nothing changed
    ///
    /// Notifier failures are logged and do not affect the result.
    pub async fn report(&self, result: &UpdateResult) {
        self.metrics.record_result(result);

        if result.is_noop() {
            debug!(target_key = %result.key, "No changes");
            return;
        }

        self.logger.log_update(result);
        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(result).await {
                warn!(target_key = %result.key, error = %e, "Notifier failed");
            }
        }
    }
}
