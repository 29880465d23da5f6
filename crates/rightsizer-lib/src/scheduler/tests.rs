//! Registry behaviour tests using short `@every` schedules

use super::{jitter, CronError, ScheduleRegistry, ScheduledJob};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Default)]
struct CountingJob {
    runs: AtomicUsize,
}

impl CountingJob {
    fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScheduledJob for CountingJob {
    async fn run(&self, _key: &str) {
        self.runs.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_schedule_fires_repeatedly() {
    let registry = ScheduleRegistry::new();
    let job = Arc::new(CountingJob::default());

    registry
        .schedule("default/web", "@every 10ms", Duration::ZERO, job.clone())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(job.runs() >= 2, "expected several runs, got {}", job.runs());
}

#[tokio::test]
async fn test_reregistering_replaces_entry() {
    let registry = ScheduleRegistry::new();
    let first = Arc::new(CountingJob::default());
    let second = Arc::new(CountingJob::default());

    registry
        .schedule("default/web", "@every 10ms", Duration::ZERO, first.clone())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    registry
        .schedule("default/web", "@every 15ms", Duration::ZERO, second.clone())
        .await
        .unwrap();
    let first_runs = first.runs();

    assert_eq!(registry.len().await, 1);
    assert_eq!(registry.cron_for("default/web").await.as_deref(), Some("@every 15ms"));

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(first.runs(), first_runs, "replaced timer kept firing");
    assert!(second.runs() >= 1);
}

/// Holds its first run open until released
#[derive(Default)]
struct GatedJob {
    runs: AtomicUsize,
    release: Notify,
}

#[async_trait]
impl ScheduledJob for GatedJob {
    async fn run(&self, _key: &str) {
        if self.runs.fetch_add(1, Ordering::SeqCst) == 0 {
            self.release.notified().await;
        }
    }
}

#[tokio::test]
async fn test_replaced_timer_waiting_on_run_does_not_fire() {
    let registry = Arc::new(ScheduleRegistry::new());
    let first = Arc::new(GatedJob::default());
    let second = Arc::new(CountingJob::default());

    registry
        .schedule("default/web", "@hourly", Duration::ZERO, first.clone())
        .await
        .unwrap();

    // A manual run holds the key's run lock
    let invoking = {
        let registry = registry.clone();
        tokio::spawn(async move { registry.invoke("default/web").await })
    };
    while first.runs.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // The run lock survives re-registration, so this timer fires and waits
    registry
        .schedule("default/web", "@every 20ms", Duration::ZERO, first.clone())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(first.runs.load(Ordering::SeqCst), 1);

    registry
        .schedule("default/web", "@hourly", Duration::ZERO, second.clone())
        .await
        .unwrap();
    first.release.notify_one();
    assert!(invoking.await.unwrap());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(first.runs.load(Ordering::SeqCst), 1);
    assert_eq!(second.runs(), 0);
    registry.shutdown().await;
}

#[tokio::test]
async fn test_unschedule_stops_timer() {
    let registry = ScheduleRegistry::new();
    let job = Arc::new(CountingJob::default());

    registry
        .schedule("default/web", "@every 10ms", Duration::ZERO, job.clone())
        .await
        .unwrap();
    assert!(registry.unschedule("default/web").await);
    assert!(!registry.unschedule("default/web").await);
    assert!(registry.is_empty().await);

    let runs = job.runs();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(job.runs(), runs);
}

#[tokio::test]
async fn test_invalid_cron_leaves_registry_unchanged() {
    let registry = ScheduleRegistry::new();
    let job = Arc::new(CountingJob::default());

    registry
        .schedule("default/web", "@hourly", Duration::ZERO, job.clone())
        .await
        .unwrap();

    let err = registry
        .schedule("default/web", "every so often", Duration::ZERO, job.clone())
        .await
        .unwrap_err();
    assert_eq!(err, CronError::FieldCount(3));
    assert_eq!(registry.cron_for("default/web").await.as_deref(), Some("@hourly"));
}

#[tokio::test]
async fn test_sync_only_reregisters_on_change() {
    let registry = ScheduleRegistry::new();
    let job = Arc::new(CountingJob::default());
    let jitter_max = Duration::from_secs(5);

    assert!(registry.sync("ns/a", "@hourly", jitter_max, job.clone()).await.unwrap());
    assert!(!registry.sync("ns/a", "@hourly", jitter_max, job.clone()).await.unwrap());
    assert!(registry.sync("ns/a", "@daily", jitter_max, job.clone()).await.unwrap());
    assert!(registry.sync("ns/a", "@daily", Duration::ZERO, job.clone()).await.unwrap());
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_invoke_runs_registered_job() {
    let registry = ScheduleRegistry::new();
    let job = Arc::new(CountingJob::default());

    assert!(!registry.invoke("ns/missing").await);

    registry
        .schedule("ns/a", "@daily", Duration::ZERO, job.clone())
        .await
        .unwrap();
    assert!(registry.invoke("ns/a").await);
    assert_eq!(job.runs(), 1);

    registry.shutdown().await;
    assert!(!registry.contains("ns/a").await);
}

#[test]
fn test_jitter_bounds() {
    assert_eq!(jitter(Duration::ZERO), Duration::ZERO);
    let max = Duration::from_millis(20);
    for _ in 0..100 {
        assert!(jitter(max) < max);
    }
}
