//! Task record normalizer: turns a raw task document into the canonical
//! form the notification pipeline works with.
//!
//! Decoding is strict: either every field the pipeline needs is present and
//! well-typed, or the write is reported as ineligible with a reason.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use getup_core::{TaskDate, TaskDocument, UserId};
use serde::Deserialize;
use serde_json::Value;

/// Naive date-time layouts accepted after RFC 3339 / RFC 2822. Read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A timer-set task with a parsed due instant.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTask {
    pub task_id: String,
    pub name: String,
    /// Empty when the document carries none.
    pub description: String,
    pub due: DateTime<Utc>,
    pub participants_status: BTreeMap<UserId, bool>,
}

impl NormalizedTask {
    /// Participants whose done flag is `false`, in uid order.
    pub fn pending(&self) -> Vec<UserId> {
        pending_participants(&self.participants_status)
    }
}

/// Why a task write does not get a notification. Not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum IneligibleReason {
    /// The write removed the document.
    Deleted,
    /// The document did not decode.
    Malformed(String),
    /// `timerSet` is false; `taskDate` is only a day placeholder.
    TimerNotSet,
    /// `taskDate` missing or unparseable.
    InvalidDate,
    /// Due instant is not strictly after the evaluation time.
    PastDue { due: DateTime<Utc> },
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibleReason::Deleted => write!(f, "task deleted"),
            IneligibleReason::Malformed(e) => write!(f, "malformed task document: {e}"),
            IneligibleReason::TimerNotSet => write!(f, "timer not set"),
            IneligibleReason::InvalidDate => write!(f, "invalid task date"),
            IneligibleReason::PastDue { due } => {
                write!(f, "task date is in the past ({})", due.to_rfc3339())
            }
        }
    }
}

/// Outcome of normalizing a document.
pub type Normalized = std::result::Result<NormalizedTask, IneligibleReason>;

/// Normalize the raw document stored at `tasks/{task_id}`.
pub fn normalize(task_id: &str, raw: &Value) -> Normalized {
    let doc = TaskDocument::deserialize(raw)
        .map_err(|e| IneligibleReason::Malformed(e.to_string()))?;

    if let Some(doc_id) = doc.task_id.as_deref()
        && doc_id != task_id
    {
        tracing::debug!("taskID '{}' differs from document path '{}', using path", doc_id, task_id);
    }

    if !doc.timer_set {
        return Err(IneligibleReason::TimerNotSet);
    }

    let due = doc
        .task_date
        .as_ref()
        .and_then(parse_task_date)
        .ok_or(IneligibleReason::InvalidDate)?;

    Ok(NormalizedTask {
        task_id: task_id.to_string(),
        name: doc.name,
        description: doc.description.unwrap_or_default(),
        due,
        participants_status: doc.participants_status,
    })
}

/// Participants whose done flag is `false`.
pub fn pending_participants(status: &BTreeMap<UserId, bool>) -> Vec<UserId> {
    status
        .iter()
        .filter(|(_, done)| !**done)
        .map(|(uid, _)| uid.clone())
        .collect()
}

/// Convert any accepted `taskDate` representation into an instant.
pub fn parse_task_date(date: &TaskDate) -> Option<DateTime<Utc>> {
    match date {
        TaskDate::Timestamp { seconds, nanoseconds } => {
            DateTime::from_timestamp(*seconds, *nanoseconds)
        }
        TaskDate::Millis(ms) => DateTime::from_timestamp_millis(*ms),
        TaskDate::Text(s) => parse_date_str(s),
    }
}

/// Parse a date string: RFC 3339, RFC 2822, naive date-time, or date only.
pub fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
