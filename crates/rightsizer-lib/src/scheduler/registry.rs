//! Registry of live schedules, one per target key

use super::{CronError, CronSchedule, ScheduledJob};
use crate::observability::RightsizerMetrics;
use chrono::Utc;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Uniformly random delay in `[0, max)`
pub fn jitter(max: Duration) -> Duration {
    let max_nanos = max.as_nanos().min(u64::MAX as u128) as u64;
    if max_nanos == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos(rand::thread_rng().gen_range(0..max_nanos))
}

/// A registered timer for one target key
pub struct ScheduleEntry {
    pub key: String,
    pub cron: String,
    pub max_jitter: Duration,
    job: Arc<dyn ScheduledJob>,
    run_lock: Arc<Mutex<()>>,
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl ScheduleEntry {
    /// Stop the timer. A run already in progress completes.
    fn cancel(self) {
        // The explicit send also reaches a task that is between its sleep
        // and its cancellation check
        let _ = self.shutdown.send(());
    }
}

/// Owned registry of schedules
///
/// Registration, replacement and removal are serialized by one lock. Runs
/// for the same key are serialized by a per-key lock that survives
/// re-registration, so a replaced timer's in-flight run never overlaps the
/// new timer's first run.
pub struct ScheduleRegistry {
    entries: Mutex<HashMap<String, ScheduleEntry>>,
    metrics: RightsizerMetrics,
}

impl Default for ScheduleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            metrics: RightsizerMetrics::new(),
        }
    }

    /// Register a timer for `key`, replacing and cancelling any previous one
    ///
    /// An invalid cron expression leaves the registry unchanged.
    pub async fn schedule(
        &self,
        key: &str,
        cron: &str,
        max_jitter: Duration,
        job: Arc<dyn ScheduledJob>,
    ) -> Result<(), CronError> {
        let schedule = CronSchedule::parse(cron)?;

        let mut entries = self.entries.lock().await;
        let run_lock = match entries.remove(key) {
            Some(previous) => {
                debug!(key = %key, cron = %previous.cron, "Replacing schedule");
                let lock = previous.run_lock.clone();
                previous.cancel();
                lock
            }
            None => Arc::new(Mutex::new(())),
        };

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_timer(
            key.to_string(),
            schedule,
            max_jitter,
            job.clone(),
            run_lock.clone(),
            shutdown_rx,
        ));

        entries.insert(
            key.to_string(),
            ScheduleEntry {
                key: key.to_string(),
                cron: cron.trim().to_string(),
                max_jitter,
                job,
                run_lock,
                shutdown,
                handle,
            },
        );
        self.metrics.set_scheduled_targets(entries.len() as i64);

        info!(
            event = "schedule_registered",
            key = %key,
            cron = %cron,
            max_jitter_ms = max_jitter.as_millis() as u64,
            "Registered schedule"
        );
        Ok(())
    }

    /// Register only when `key` has no entry or its timing changed
    ///
    /// Returns whether a new timer was registered.
    pub async fn sync(
        &self,
        key: &str,
        cron: &str,
        max_jitter: Duration,
        job: Arc<dyn ScheduledJob>,
    ) -> Result<bool, CronError> {
        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(key) {
                if entry.cron == cron.trim() && entry.max_jitter == max_jitter {
                    return Ok(false);
                }
            }
        }
        self.schedule(key, cron, max_jitter, job).await?;
        Ok(true)
    }

    /// Remove and cancel the entry for `key`
    pub async fn unschedule(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().await;
        let removed = entries.remove(key);
        self.metrics.set_scheduled_targets(entries.len() as i64);
        match removed {
            Some(entry) => {
                entry.cancel();
                info!(event = "schedule_removed", key = %key, "Removed schedule");
                true
            }
            None => false,
        }
    }

    /// Run the job registered for `key` now, without jitter
    ///
    /// Returns `false` when no entry exists.
    pub async fn invoke(&self, key: &str) -> bool {
        let (job, run_lock) = {
            let entries = self.entries.lock().await;
            match entries.get(key) {
                Some(entry) => (entry.job.clone(), entry.run_lock.clone()),
                None => return false,
            }
        };

        let _guard = run_lock.lock().await;
        job.run(key).await;
        true
    }

    /// Cancel every entry
    pub async fn shutdown(&self) {
        let mut entries = self.entries.lock().await;
        for (_, entry) in entries.drain() {
            entry.cancel();
        }
        self.metrics.set_scheduled_targets(0);
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn cron_for(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).map(|e| e.cron.clone())
    }
}

impl Drop for ScheduleRegistry {
    fn drop(&mut self) {
        for entry in self.entries.get_mut().values() {
            entry.handle.abort();
        }
    }
}

async fn run_timer(
    key: String,
    schedule: CronSchedule,
    max_jitter: Duration,
    job: Arc<dyn ScheduledJob>,
    run_lock: Arc<Mutex<()>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        let now = Utc::now();
        let Some(next) = schedule.next_after(now) else {
            warn!(key = %key, "Schedule has no future fire time, stopping timer");
            break;
        };
        let delay = (next - now).to_std().unwrap_or_default() + jitter(max_jitter);

        tokio::select! {
            biased;
            _ = shutdown.recv() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }

        let _guard = run_lock.lock().await;
        // Replaced or removed while waiting for the previous run
        if !matches!(shutdown.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }
        debug!(key = %key, delay_ms = delay.as_millis() as u64, "Schedule fired");
        job.run(&key).await;
    }
    debug!(key = %key, "Timer stopped");
}
