//! Cron-driven job trigger: loads persisted jobs with a
//! schedule, registers a per-job tick callback against the `cron` crate's
//! parser, and resubmits to the `JobManager` on each fire.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::job::JobManager;
use crate::job::descriptor::JobDescriptor;

struct ScheduledJob {
    descriptor: JobDescriptor,
    schedule: Schedule,
    next_run: Mutex<Option<chrono::DateTime<Utc>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

/// Registry of cron-triggered jobs. Holds one background task per registered
/// job that sleeps until its next scheduled fire time and then calls
/// `JobManager::start_job`.
pub struct Scheduler {
    manager: Arc<JobManager>,
    jobs: Mutex<HashMap<String, Arc<ScheduledJob>>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(manager: Arc<JobManager>) -> Arc<Self> {
        Arc::new(Self {
            manager,
            jobs: Mutex::new(HashMap::new()),
        })
    }

    /// Load every descriptor carrying a non-empty `schedule` and register it.
    /// Invalid cron expressions are logged and that job is left unscheduled
    /// rather than aborting the whole load.
    pub fn load_all(self: &Arc<Self>, descriptors: Vec<(JobDescriptor, Option<String>)>) {
        for (descriptor, schedule) in descriptors {
            let Some(expr) = schedule else { continue };
            if let Err(e) = self.register(descriptor.clone(), &expr) {
                warn!(job_id = %descriptor.id, expr, error = %e, "invalid cron expression, leaving job unscheduled");
            }
        }
    }

    /// Parse `expr` and register `descriptor` to fire on that schedule.
    pub fn register(self: &Arc<Self>, descriptor: JobDescriptor, expr: &str) -> Result<(), cron::error::Error> {
        let schedule = Schedule::from_str(expr)?;
        let job_id = descriptor.id.clone();

        let entry = Arc::new(ScheduledJob {
            descriptor,
            schedule,
            next_run: Mutex::new(None),
            handle: Mutex::new(None),
        });

        let scheduler = Arc::clone(self);
        let entry_bg = Arc::clone(&entry);
        let handle = tokio::spawn(async move { run_schedule(scheduler, entry_bg).await });
        *entry.handle.lock() = Some(handle);

        self.jobs.lock().insert(job_id, entry);
        Ok(())
    }

    /// Unregister a job without disturbing any other entry.
    pub fn remove_job(&self, job_id: &str) {
        if let Some(entry) = self.jobs.lock().remove(job_id)
            && let Some(handle) = entry.handle.lock().take()
        {
            handle.abort();
        }
    }

    #[must_use]
    pub fn next_run(&self, job_id: &str) -> Option<chrono::DateTime<Utc>> {
        self.jobs.lock().get(job_id).and_then(|e| *e.next_run.lock())
    }
}

async fn run_schedule(scheduler: Arc<Scheduler>, entry: Arc<ScheduledJob>) {
    loop {
        let now = Utc::now();
        let Some(next) = entry.schedule.after(&now).next() else {
            warn!(job_id = %entry.descriptor.id, "cron schedule has no future occurrences, stopping");
            return;
        };
        *entry.next_run.lock() = Some(next);

        let wait = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);
        tokio::time::sleep(wait).await;

        if !scheduler.jobs.lock().contains_key(&entry.descriptor.id) {
            return;
        }

        info!(job_id = %entry.descriptor.id, "cron trigger firing");
        scheduler.manager.start_job(entry.descriptor.clone());
    }
}
