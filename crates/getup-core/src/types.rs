//! Document types as they are stored by the mobile app.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque user identifier (auth uid).
pub type UserId = String;

/// Raw `taskDate` representation.
///
/// The app writes a database timestamp, but imported or dictated tasks may
/// carry an ISO-8601 string or epoch milliseconds instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskDate {
    /// Database-native timestamp.
    Timestamp {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(alias = "_nanoseconds", default)]
        nanoseconds: u32,
    },
    /// Milliseconds since the Unix epoch.
    Millis(i64),
    /// Free-form date string.
    Text(String),
}

/// A task document from the `tasks` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDocument {
    #[serde(rename = "taskID", default)]
    pub task_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Card color in the app, unused here.
    #[serde(default)]
    pub color_index: Option<i64>,
    #[serde(default)]
    pub task_date: Option<TaskDate>,
    #[serde(default)]
    pub timer_set: bool,
    /// Unused here.
    #[serde(rename = "creatorID", default)]
    pub creator_id: Option<String>,
    /// Participant uid → done flag. Includes the creator.
    #[serde(default)]
    pub participants_status: BTreeMap<UserId, bool>,
}

/// A user document from the `users` collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "fcmToken", default)]
    pub fcm_token: Option<String>,
}

impl UserDocument {
    pub fn with_token(token: &str) -> Self {
        Self {
            fcm_token: Some(token.to_string()),
        }
    }

    /// Push delivery token, if one is registered.
    pub fn token(&self) -> Option<&str> {
        self.fcm_token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// A single document write on `tasks/{taskId}`.
///
/// `after == None` means the document was deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteEvent {
    pub task_id: String,
    #[serde(default)]
    pub before: Option<Value>,
    #[serde(default)]
    pub after: Option<Value>,
}

impl WriteEvent {
    pub fn created(task_id: &str, after: Value) -> Self {
        Self {
            task_id: task_id.to_string(),
            before: None,
            after: Some(after),
        }
    }

    pub fn updated(task_id: &str, before: Value, after: Value) -> Self {
        Self {
            task_id: task_id.to_string(),
            before: Some(before),
            after: Some(after),
        }
    }

    pub fn deleted(task_id: &str, before: Value) -> Self {
        Self {
            task_id: task_id.to_string(),
            before: Some(before),
            after: None,
        }
    }

    pub fn is_delete(&self) -> bool {
        self.after.is_none()
    }
}
