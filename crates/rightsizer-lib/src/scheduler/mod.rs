//! Periodic apply scheduling
//!
//! One jittered cron timer per target key, held in an owned registry.

mod cron;
mod registry;

#[cfg(test)]
mod tests;

pub use cron::{CronError, CronFields, CronSchedule};
pub use registry::{jitter, ScheduleEntry, ScheduleRegistry};

use async_trait::async_trait;

/// Work executed when a target's timer fires
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    async fn run(&self, key: &str);
}
