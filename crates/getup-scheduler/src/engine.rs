//! Notification scheduler: one tokio timer per qualifying task write.
//! Jobs live in memory only; a job that outlives the process is lost.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use getup_core::{JobPolicy, UserId};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::normalize::NormalizedTask;

/// Identifier of one scheduled job.
pub type JobId = Uuid;

/// Immutable data handed to a job when it fires.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationJob {
    pub job_id: JobId,
    pub task_id: String,
    pub name: String,
    pub description: String,
    pub due: DateTime<Utc>,
    /// Pending participants when the job was scheduled. Used only if the
    /// task can't be re-read at fire time.
    pub pending_at_schedule: Vec<UserId>,
}

impl NotificationJob {
    pub fn from_task(task: &NormalizedTask, pending: Vec<UserId>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            task_id: task.task_id.clone(),
            name: task.name.clone(),
            description: task.description.clone(),
            due: task.due,
            pending_at_schedule: pending,
        }
    }
}

/// A job that has not fired yet.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJob {
    pub job_id: JobId,
    pub task_id: String,
    pub due: DateTime<Utc>,
}

struct JobEntry {
    task_id: String,
    due: DateTime<Utc>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    pending: HashMap<JobId, JobEntry>,
    /// Jobs whose timer elapsed and whose callback is still running.
    in_flight: usize,
}

impl Registry {
    fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight == 0
    }

    fn abort_task(&mut self, task_id: &str) -> usize {
        let ids: Vec<JobId> = self
            .pending
            .iter()
            .filter(|(_, e)| e.task_id == task_id)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(entry) = self.pending.remove(id) {
                entry.handle.abort();
            }
        }
        ids.len()
    }
}

/// Holds every pending one-shot job and fires each at its due instant.
pub struct NotificationScheduler {
    policy: JobPolicy,
    registry: Arc<Mutex<Registry>>,
    idle: Arc<Notify>,
    fired: Arc<AtomicU64>,
}

impl NotificationScheduler {
    pub fn new(policy: JobPolicy) -> Self {
        Self {
            policy,
            registry: Arc::new(Mutex::new(Registry::default())),
            idle: Arc::new(Notify::new()),
            fired: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn policy(&self) -> JobPolicy {
        self.policy
    }

    /// Register `job` to fire at `job.due`. A due instant already in the
    /// past fires immediately.
    ///
    /// Under [`JobPolicy::ReplacePerTask`] any pending job for the same task
    /// is aborted first; under [`JobPolicy::Independent`] it keeps running.
    pub async fn schedule<F, Fut>(&self, job: NotificationJob, on_fire: F) -> JobId
    where
        F: FnOnce(NotificationJob) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut registry = self.registry.lock().await;

        if self.policy == JobPolicy::ReplacePerTask {
            let replaced = registry.abort_task(&job.task_id);
            if replaced > 0 {
                tracing::info!("♻️ Replaced {} pending job(s) for task '{}'", replaced, job.task_id);
            }
        }

        let job_id = job.job_id;
        let task_id = job.task_id.clone();
        let due = job.due;
        let delay = (due - Utc::now()).to_std().unwrap_or_default();

        let task_id_fired = task_id.clone();
        let shared = Arc::clone(&self.registry);
        let idle = Arc::clone(&self.idle);
        let fired = Arc::clone(&self.fired);

        // The spawned task can't observe the registry until this lock is
        // released, so the entry is always inserted before it fires.
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            {
                let mut registry = shared.lock().await;
                if registry.pending.remove(&job_id).is_none() {
                    return;
                }
                registry.in_flight += 1;
            }

            tracing::info!("🔔 Job {} fired for task '{}'", job_id, job.task_id);
            fired.fetch_add(1, Ordering::Relaxed);
            // Run the callback in its own task so a panic in it can't skip
            // the in-flight bookkeeping below.
            if let Err(e) = tokio::spawn(async move { on_fire(job).await }).await {
                tracing::error!("❌ Job {} for task '{}' failed: {e}", job_id, task_id_fired);
            }

            let mut registry = shared.lock().await;
            registry.in_flight = registry.in_flight.saturating_sub(1);
            if registry.is_idle() {
                idle.notify_waiters();
            }
        });

        registry.pending.insert(
            job_id,
            JobEntry {
                task_id: task_id.clone(),
                due,
                handle,
            },
        );
        tracing::debug!(
            "⏰ Job {} scheduled for task '{}' in {}s",
            job_id,
            task_id,
            delay.as_secs()
        );
        job_id
    }

    /// Abort every pending job for `task_id`. Returns how many were aborted.
    /// Jobs already firing are not interrupted.
    pub async fn cancel_task(&self, task_id: &str) -> usize {
        let mut registry = self.registry.lock().await;
        let cancelled = registry.abort_task(task_id);
        if cancelled > 0 && registry.is_idle() {
            self.idle.notify_waiters();
        }
        cancelled
    }

    /// Pending jobs ordered by due instant.
    pub async fn pending_jobs(&self) -> Vec<PendingJob> {
        let registry = self.registry.lock().await;
        let mut jobs: Vec<PendingJob> = registry
            .pending
            .iter()
            .map(|(id, e)| PendingJob {
                job_id: *id,
                task_id: e.task_id.clone(),
                due: e.due,
            })
            .collect();
        jobs.sort_by_key(|j| j.due);
        jobs
    }

    /// Number of pending jobs for `task_id`.
    pub async fn pending_for(&self, task_id: &str) -> usize {
        let registry = self.registry.lock().await;
        registry.pending.values().filter(|e| e.task_id == task_id).count()
    }

    /// Number of jobs that have fired since creation.
    pub fn fired_count(&self) -> u64 {
        self.fired.load(Ordering::Relaxed)
    }

    /// Resolve once no job is pending or firing.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.registry.lock().await.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Abort all pending jobs. Returns how many were dropped.
    pub async fn shutdown(&self) -> usize {
        let mut registry = self.registry.lock().await;
        let count = registry.pending.len();
        for (_, entry) in registry.pending.drain() {
            entry.handle.abort();
        }
        if count > 0 {
            tracing::warn!("🛑 Scheduler shut down, {} pending job(s) dropped", count);
        }
        if registry.is_idle() {
            self.idle.notify_waiters();
        }
        count
    }
}

impl Default for NotificationScheduler {
    fn default() -> Self {
        Self::new(JobPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::atomic::AtomicUsize;

    fn job(task_id: &str, in_secs: i64) -> NotificationJob {
        NotificationJob {
            job_id: Uuid::new_v4(),
            task_id: task_id.into(),
            name: "Go to gym".into(),
            description: String::new(),
            due: Utc::now() + Duration::seconds(in_secs),
            pending_at_schedule: vec!["u1".into()],
        }
    }

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnOnce(NotificationJob) -> std::future::Ready<()> + Send + 'static {
        let counter = Arc::clone(counter);
        move |_job| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_fires_once_at_due_time() {
        let scheduler = NotificationScheduler::default();
        let hits = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(job("t1", 60), counting(&hits)).await;

        tokio::time::sleep(std::time::Duration::from_secs(59)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending_for("t1").await, 1);

        scheduler.wait_idle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.fired_count(), 1);
        assert!(scheduler.pending_jobs().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_policy_keeps_both_jobs() {
        let scheduler = NotificationScheduler::new(JobPolicy::Independent);
        let hits = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(job("t1", 60), counting(&hits)).await;
        scheduler.schedule(job("t1", 120), counting(&hits)).await;
        assert_eq!(scheduler.pending_for("t1").await, 2);

        scheduler.wait_idle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replace_policy_supersedes_pending_job() {
        let scheduler = NotificationScheduler::new(JobPolicy::ReplacePerTask);
        let hits = Arc::new(AtomicUsize::new(0));
        let first = scheduler.schedule(job("t1", 60), counting(&hits)).await;
        let second = scheduler.schedule(job("t1", 120), counting(&hits)).await;
        scheduler.schedule(job("t2", 30), counting(&hits)).await;

        let pending = scheduler.pending_jobs().await;
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|p| p.job_id != first));
        assert!(pending.iter().any(|p| p.job_id == second));

        scheduler.wait_idle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_task() {
        let scheduler = NotificationScheduler::default();
        let hits = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(job("t1", 60), counting(&hits)).await;
        scheduler.schedule(job("t1", 90), counting(&hits)).await;
        scheduler.schedule(job("t2", 60), counting(&hits)).await;

        assert_eq!(scheduler.cancel_task("t1").await, 2);
        assert_eq!(scheduler.cancel_task("missing").await, 0);
        scheduler.wait_idle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_past_due_fires_immediately() {
        let scheduler = NotificationScheduler::default();
        let hits = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(job("t1", -5), counting(&hits)).await;
        scheduler.wait_idle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_drops_pending() {
        let scheduler = NotificationScheduler::default();
        let hits = Arc::new(AtomicUsize::new(0));
        scheduler.schedule(job("t1", 60), counting(&hits)).await;
        scheduler.schedule(job("t2", 60), counting(&hits)).await;
        assert_eq!(scheduler.shutdown().await, 2);
        scheduler.wait_idle().await;
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.fired_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_callback_still_settles() {
        let scheduler = NotificationScheduler::default();
        let hits = Arc::new(AtomicUsize::new(0));
        scheduler
            .schedule(job("t1", 30), |_job| -> std::future::Ready<()> {
                panic!("push transport blew up")
            })
            .await;
        scheduler
            .schedule(job("t2", 60), |_job| async move {
                if true {
                    panic!("store blew up");
                }
            })
            .await;
        scheduler.schedule(job("t3", 90), counting(&hits)).await;

        let settled =
            tokio::time::timeout(std::time::Duration::from_secs(3600), scheduler.wait_idle()).await;
        assert!(settled.is_ok());
        assert_eq!(scheduler.fired_count(), 3);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(scheduler.pending_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_wait_idle_returns_when_empty() {
        let scheduler = NotificationScheduler::default();
        scheduler.wait_idle().await;
    }
}
