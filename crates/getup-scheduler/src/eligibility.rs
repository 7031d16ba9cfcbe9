//! Notification eligibility: decides from one write event whether a
//! notification job is needed. Pure; never touches a store.

use chrono::{DateTime, Utc};
use getup_core::{UserId, WriteEvent};

use crate::normalize::{IneligibleReason, NormalizedTask, normalize};

/// Decision for a single write event.
#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    Eligible {
        task: NormalizedTask,
        /// Pending participants at evaluation time. Informational only: the
        /// recipient list is recomputed when the job fires.
        pending: Vec<UserId>,
    },
    Ineligible(IneligibleReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible { .. })
    }
}

/// Evaluate `event` against `now`.
///
/// Eligible iff the document still exists, `timerSet` is true, the date
/// parses, and the due instant is strictly after `now`.
pub fn evaluate(event: &WriteEvent, now: DateTime<Utc>) -> Eligibility {
    let Some(after) = event.after.as_ref() else {
        return Eligibility::Ineligible(IneligibleReason::Deleted);
    };

    let task = match normalize(&event.task_id, after) {
        Ok(task) => task,
        Err(reason) => return Eligibility::Ineligible(reason),
    };

    if task.due <= now {
        return Eligibility::Ineligible(IneligibleReason::PastDue { due: task.due });
    }

    let pending = task.pending();
    Eligibility::Eligible { task, pending }
}
