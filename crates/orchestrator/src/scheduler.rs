//! Keyed background jobs.
//!
//! Every job is registered under a key (the transfer id) so that all jobs
//! for one transfer can be cancelled with a single call. Cancellation stops
//! future runs; a run that is already in progress is allowed to finish,
//! which matters when the job itself is the one cancelling its key.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub type JobFuture = BoxFuture<'static, ()>;

/// A job may run many times, so it is a factory of futures
pub type Job = Arc<dyn Fn() -> JobFuture + Send + Sync>;

pub trait Scheduler: Send + Sync {
    /// Run `job` every `every`, first run one period from now
    fn schedule_recurring(&self, key: &str, every: Duration, job: Job);

    /// Run `job` once after `after`
    fn schedule_once(&self, key: &str, after: Duration, job: Job);

    /// Stop every job under `key`; returns how many were still pending
    fn cancel(&self, key: &str) -> usize;

    /// Number of live jobs under `key`
    fn scheduled(&self, key: &str) -> usize;
}

// ═══════════════════════════════════════════════════════════════════════════
// TOKIO SCHEDULER
// ═══════════════════════════════════════════════════════════════════════════

struct Entry {
    stop: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl Entry {
    fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            stop,
            handles: Vec::new(),
        }
    }

    fn live(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }
}

/// Scheduler backed by spawned tokio tasks. Must be used inside a runtime.
#[derive(Default)]
pub struct TokioScheduler {
    jobs: Mutex<HashMap<String, Entry>>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, key: &str, spawn: impl FnOnce(watch::Receiver<bool>) -> JoinHandle<()>) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = jobs.entry(key.to_string()).or_insert_with(Entry::new);
        entry.handles.retain(|h| !h.is_finished());
        let handle = spawn(entry.stop.subscribe());
        entry.handles.push(handle);
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_recurring(&self, key: &str, every: Duration, job: Job) {
        self.register(key, |mut stop| {
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        biased;
                        _ = stop.changed() => break,
                        _ = ticker.tick() => job().await,
                    }
                    if *stop.borrow() {
                        break;
                    }
                }
            })
        });
    }

    fn schedule_once(&self, key: &str, after: Duration, job: Job) {
        self.register(key, |mut stop| {
            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = stop.changed() => {}
                    _ = tokio::time::sleep(after) => job().await,
                }
            })
        });
    }

    fn cancel(&self, key: &str) -> usize {
        let entry = self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);

        match entry {
            Some(entry) => {
                let live = entry.live();
                let _ = entry.stop.send(true);
                live
            }
            None => 0,
        }
    }

    fn scheduled(&self, key: &str) -> usize {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map_or(0, Entry::live)
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        let jobs = self.jobs.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in jobs.drain() {
            let _ = entry.stop.send(true);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MANUAL SCHEDULER
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Default, Clone)]
struct ManualJobs {
    recurring: Vec<(Duration, Job)>,
    once: Vec<(Duration, Job)>,
}

/// Records jobs and runs them only when a test fires them
#[derive(Default)]
pub struct ManualScheduler {
    jobs: Mutex<HashMap<String, ManualJobs>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every recurring job under `key` once; returns how many ran
    pub async fn fire_recurring(&self, key: &str) -> usize {
        let jobs: Vec<Job> = {
            let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            jobs.get(key)
                .map(|j| j.recurring.iter().map(|(_, job)| job.clone()).collect())
                .unwrap_or_default()
        };
        for job in &jobs {
            job().await;
        }
        jobs.len()
    }

    /// Run and consume the one-shot jobs under `key`
    pub async fn fire_once(&self, key: &str) -> usize {
        let jobs: Vec<Job> = {
            let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
            jobs.get_mut(key)
                .map(|j| j.once.drain(..).map(|(_, job)| job).collect())
                .unwrap_or_default()
        };
        for job in &jobs {
            job().await;
        }
        jobs.len()
    }

    pub fn recurring_period(&self, key: &str) -> Option<Duration> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get(key)?.recurring.first().map(|(every, _)| *every)
    }

    pub fn once_delay(&self, key: &str) -> Option<Duration> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get(key)?.once.first().map(|(after, _)| *after)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_recurring(&self, key: &str, every: Duration, job: Job) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.entry(key.to_string())
            .or_default()
            .recurring
            .push((every, job));
    }

    fn schedule_once(&self, key: &str, after: Duration, job: Job) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.entry(key.to_string())
            .or_default()
            .once
            .push((after, job));
    }

    fn cancel(&self, key: &str) -> usize {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.remove(key)
            .map_or(0, |j| j.recurring.len() + j.once.len())
    }

    fn scheduled(&self, key: &str) -> usize {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.get(key)
            .map_or(0, |j| j.recurring.len() + j.once.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_job(counter: Arc<AtomicUsize>) -> Job {
        Arc::new(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    const HALF_HOUR: Duration = Duration::from_secs(30 * 60);

    #[tokio::test(start_paused = true)]
    async fn test_recurring_job_runs_every_period() {
        let scheduler = TokioScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler.schedule_recurring("transfer-1", HALF_HOUR, counting_job(runs.clone()));

        tokio::time::sleep(Duration::from_secs(60 * 60 + 1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.scheduled("transfer-1"), 1);

        assert_eq!(scheduler.cancel("transfer-1"), 1);
        tokio::time::sleep(Duration::from_secs(2 * 60 * 60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.scheduled("transfer-1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_once_job_fires_once() {
        let scheduler = TokioScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler.schedule_once("transfer-1", HALF_HOUR, counting_job(runs.clone()));

        tokio::time::sleep(Duration::from_secs(3 * 60 * 60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.scheduled("transfer-1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_covers_both_jobs() {
        let scheduler = TokioScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler.schedule_recurring("transfer-1", HALF_HOUR, counting_job(runs.clone()));
        scheduler.schedule_once("transfer-1", HALF_HOUR * 4, counting_job(runs.clone()));
        scheduler.schedule_once("transfer-2", HALF_HOUR, counting_job(runs.clone()));

        assert_eq!(scheduler.cancel("transfer-1"), 2);
        tokio::time::sleep(Duration::from_secs(5 * 60 * 60)).await;

        // only transfer-2's job ran
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.cancel("transfer-1"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_can_cancel_its_own_key() {
        let scheduler = Arc::new(TokioScheduler::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let job: Job = {
            let scheduler = Arc::downgrade(&scheduler);
            let runs = runs.clone();
            Arc::new(move || {
                let scheduler = scheduler.clone();
                let runs = runs.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    if let Some(scheduler) = scheduler.upgrade() {
                        scheduler.cancel("transfer-1");
                    }
                    // still running after the cancel
                    tokio::task::yield_now().await;
                    runs.fetch_add(1, Ordering::SeqCst);
                }
                .boxed()
            })
        };
        scheduler.schedule_recurring("transfer-1", HALF_HOUR, job);

        tokio::time::sleep(Duration::from_secs(3 * 60 * 60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_manual_scheduler_fires_on_demand() {
        let scheduler = ManualScheduler::new();
        let runs = Arc::new(AtomicUsize::new(0));
        scheduler.schedule_recurring("transfer-1", HALF_HOUR, counting_job(runs.clone()));
        scheduler.schedule_once("transfer-1", HALF_HOUR * 2, counting_job(runs.clone()));

        assert_eq!(scheduler.recurring_period("transfer-1"), Some(HALF_HOUR));
        assert_eq!(scheduler.once_delay("transfer-1"), Some(HALF_HOUR * 2));

        assert_eq!(scheduler.fire_recurring("transfer-1").await, 1);
        assert_eq!(scheduler.fire_recurring("transfer-1").await, 1);
        assert_eq!(scheduler.fire_once("transfer-1").await, 1);
        assert_eq!(scheduler.fire_once("transfer-1").await, 0);
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        assert_eq!(scheduler.cancel("transfer-1"), 1);
        assert_eq!(scheduler.fire_recurring("transfer-1").await, 0);
    }
}
