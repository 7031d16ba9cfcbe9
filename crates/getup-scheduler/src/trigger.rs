//! Trigger adapter: the entry point invoked on every `tasks/{taskId}` write.
//!
//! ```text
//! WriteEvent → evaluate ─┬─ Ineligible → log, done
//!                        └─ Eligible → scheduler.schedule(job)
//!                                         … due time …
//!                                         FirePipeline::run
//!                                           ├── RecipientResolver (re-read status, tokens)
//!                                           └── Dispatcher (one multicast, per-token log)
//! ```

use std::sync::Arc;

use chrono::Utc;
use getup_core::config::{NotificationConfig, NotifierConfig};
use getup_core::traits::{PushTransport, TaskStore, UserStore};
use getup_core::{JobPolicy, Session, WriteEvent};
use tracing::Instrument;

use crate::dispatch::{DispatchReport, Dispatcher};
use crate::eligibility::{Eligibility, evaluate};
use crate::engine::{JobId, NotificationJob, NotificationScheduler};
use crate::normalize::IneligibleReason;
use crate::notify::PushNotification;
use crate::recipients::RecipientResolver;

/// What `on_write` did with an event.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Scheduled(JobId),
    Skipped(IneligibleReason),
}

/// Work done when a job fires: resolve recipients, then dispatch.
pub struct FirePipeline {
    resolver: RecipientResolver,
    dispatcher: Dispatcher,
    notification: NotificationConfig,
}

impl FirePipeline {
    pub fn new(resolver: RecipientResolver, dispatcher: Dispatcher, notification: NotificationConfig) -> Self {
        Self {
            resolver,
            dispatcher,
            notification,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns `None` when nobody could be notified and dispatch was skipped.
    pub async fn run(&self, job: NotificationJob) -> Option<DispatchReport> {
        let resolution = self.resolver.resolve(&job).await;
        if resolution.is_empty() {
            tracing::info!("📭 No users to notify for task '{}'", job.task_id);
            return None;
        }

        let notification = PushNotification::for_task(&job, &self.notification);
        Some(self.dispatcher.dispatch(&resolution.tokens(), &notification).await)
    }
}

/// Wires normalizer, eligibility filter, scheduler and fire pipeline.
pub struct TriggerAdapter {
    scheduler: Arc<NotificationScheduler>,
    pipeline: Arc<FirePipeline>,
    session: Session,
}

impl TriggerAdapter {
    pub fn new(scheduler: Arc<NotificationScheduler>, pipeline: Arc<FirePipeline>) -> Self {
        Self {
            scheduler,
            pipeline,
            session: Session::system(),
        }
    }

    /// Build the full pipeline from config and collaborators.
    pub fn from_config(
        config: &NotifierConfig,
        tasks: Arc<dyn TaskStore>,
        users: Arc<dyn UserStore>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let scheduler = Arc::new(NotificationScheduler::new(config.scheduler.policy));
        let pipeline = Arc::new(FirePipeline::new(
            RecipientResolver::new(tasks, users),
            Dispatcher::new(transport),
            config.notification.clone(),
        ));
        Self::new(scheduler, pipeline)
    }

    /// Act as `session` in log spans.
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    pub fn scheduler(&self) -> &Arc<NotificationScheduler> {
        &self.scheduler
    }

    pub fn pipeline(&self) -> &Arc<FirePipeline> {
        &self.pipeline
    }

    /// Handle one document write. Never fails; the outcome is informational.
    pub async fn on_write(&self, event: &WriteEvent) -> TriggerOutcome {
        let span = tracing::info_span!("trigger", task = %event.task_id, session = %self.session);
        self.handle(event).instrument(span).await
    }

    async fn handle(&self, event: &WriteEvent) -> TriggerOutcome {
        tracing::info!("📥 New trigger received for task '{}'", event.task_id);

        let (task, pending) = match evaluate(event, Utc::now()) {
            Eligibility::Eligible { task, pending } => (task, pending),
            Eligibility::Ineligible(reason) => {
                tracing::info!("⏭️ Skipping notification for task '{}': {}", event.task_id, reason);
                if self.scheduler.policy() == JobPolicy::ReplacePerTask {
                    let cancelled = self.scheduler.cancel_task(&event.task_id).await;
                    if cancelled > 0 {
                        tracing::info!(
                            "🗑️ Cancelled {} pending job(s) for task '{}'",
                            cancelled,
                            event.task_id
                        );
                    }
                }
                return TriggerOutcome::Skipped(reason);
            }
        };

        tracing::info!(
            "📅 Task '{}' at {} for {}",
            task.name,
            task.due.to_rfc3339(),
            pending.join(", ")
        );

        let job = NotificationJob::from_task(&task, pending);
        let pipeline = Arc::clone(&self.pipeline);
        let span = tracing::info_span!("job", task = %task.task_id, job = %job.job_id);
        let job_id = self
            .scheduler
            .schedule(job, move |job| {
                async move {
                    pipeline.run(job).await;
                }
                .instrument(span)
            })
            .await;
        TriggerOutcome::Scheduled(job_id)
    }
}
