//! Recipient resolution at fire time.
//!
//! Completion status is re-read from the task store when the job fires, so a
//! participant who finished the task after it was scheduled is not notified.
//! Each still-pending participant is then resolved to a push token; user
//! lookups run concurrently and are all joined before returning.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use getup_core::traits::{TaskStore, UserStore};
use getup_core::UserId;
use serde::Deserialize;

use crate::engine::NotificationJob;
use crate::normalize::pending_participants;

/// A participant with a resolved delivery token.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    pub user_id: UserId,
    pub token: String,
}

/// Why a pending participant was left out.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    UnknownUser,
    NoToken,
    LookupFailed(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::UnknownUser => write!(f, "user not found"),
            DropReason::NoToken => write!(f, "no push token"),
            DropReason::LookupFailed(e) => write!(f, "lookup failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dropped {
    pub user_id: UserId,
    pub reason: DropReason,
}

/// Where the pending participant list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// Re-read from the task store at fire time.
    Live,
    /// The task could not be re-read; schedule-time list used.
    Snapshot,
}

/// Result of resolving a job's recipients.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub recipients: Vec<Recipient>,
    pub dropped: Vec<Dropped>,
    pub source: StatusSource,
}

impl Resolution {
    pub fn tokens(&self) -> Vec<String> {
        self.recipients.iter().map(|r| r.token.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.recipients.is_empty()
    }
}

/// Only the part of a task document needed at fire time.
#[derive(Deserialize)]
struct StatusView {
    #[serde(rename = "participantsStatus", default)]
    participants_status: BTreeMap<UserId, bool>,
}

/// Resolves a fired job to push tokens.
pub struct RecipientResolver {
    tasks: Arc<dyn TaskStore>,
    users: Arc<dyn UserStore>,
}

impl RecipientResolver {
    pub fn new(tasks: Arc<dyn TaskStore>, users: Arc<dyn UserStore>) -> Self {
        Self { tasks, users }
    }

    pub async fn resolve(&self, job: &NotificationJob) -> Resolution {
        let (pending, source) = self.current_pending(job).await;

        let lookups = pending.iter().map(|uid| self.lookup(uid));
        let mut recipients = Vec::new();
        let mut dropped = Vec::new();
        for result in join_all(lookups).await {
            match result {
                Ok(recipient) => {
                    tracing::info!("👤 User found: {}", recipient.user_id);
                    recipients.push(recipient);
                }
                Err(d) => {
                    tracing::info!("⏭️ Dropped {} for task '{}': {}", d.user_id, job.task_id, d.reason);
                    dropped.push(d);
                }
            }
        }

        Resolution {
            recipients,
            dropped,
            source,
        }
    }

    async fn current_pending(&self, job: &NotificationJob) -> (Vec<UserId>, StatusSource) {
        let snapshot = || (job.pending_at_schedule.clone(), StatusSource::Snapshot);
        match self.tasks.get_task(&job.task_id).await {
            Ok(Some(raw)) => match StatusView::deserialize(&raw) {
                Ok(view) => (pending_participants(&view.participants_status), StatusSource::Live),
                Err(e) => {
                    tracing::warn!(
                        "⚠️ Task '{}' status unreadable ({e}), using schedule-time participants",
                        job.task_id
                    );
                    snapshot()
                }
            },
            Ok(None) => {
                tracing::warn!(
                    "⚠️ Task '{}' no longer exists, using schedule-time participants",
                    job.task_id
                );
                snapshot()
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ Failed to re-read task '{}' ({e}), using schedule-time participants",
                    job.task_id
                );
                snapshot()
            }
        }
    }

    async fn lookup(&self, user_id: &str) -> Result<Recipient, Dropped> {
        let dropped = |reason| Dropped {
            user_id: user_id.to_string(),
            reason,
        };
        match self.users.get_user(user_id).await {
            Ok(Some(user)) => match user.token() {
                Some(token) => Ok(Recipient {
                    user_id: user_id.to_string(),
                    token: token.to_string(),
                }),
                None => Err(dropped(DropReason::NoToken)),
            },
            Ok(None) => Err(dropped(DropReason::UnknownUser)),
            Err(e) => Err(dropped(DropReason::LookupFailed(e.to_string()))),
        }
    }
}
