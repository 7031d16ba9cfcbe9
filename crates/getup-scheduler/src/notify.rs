//! Push notification content for a due task.

use getup_core::config::NotificationConfig;
pub use getup_core::config::NotifyPriority;
use getup_core::traits::{ApnsPayload, MulticastMessage};
use serde::{Deserialize, Serialize};

use crate::engine::NotificationJob;

/// A notification to send to every pending participant of a task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
    /// APNs alert text; differs from the generic title/body.
    pub alert_title: String,
    pub alert_body: String,
    pub sound: String,
    pub badge: u32,
    pub priority: NotifyPriority,
    /// Task this notification is about.
    pub source: String,
}

impl PushNotification {
    /// Build the due-task notification for `job`.
    pub fn for_task(job: &NotificationJob, config: &NotificationConfig) -> Self {
        let description = job.description.as_str();
        let or_default = |fallback: &str| {
            if description.is_empty() {
                fallback.to_string()
            } else {
                description.to_string()
            }
        };
        Self {
            title: format!("{}{}", config.title_prefix, job.name),
            body: or_default(&config.default_body),
            alert_title: format!("{}{}", config.alert_title_prefix, job.name),
            alert_body: or_default(&config.alert_default_body),
            sound: config.sound.clone(),
            badge: config.badge,
            priority: config.priority,
            source: job.task_id.clone(),
        }
    }

    /// Address this notification to `tokens` in a single request.
    pub fn to_multicast(&self, tokens: &[String]) -> MulticastMessage {
        MulticastMessage {
            tokens: tokens.to_vec(),
            title: self.title.clone(),
            body: self.body.clone(),
            apns: ApnsPayload {
                alert_title: self.alert_title.clone(),
                alert_body: self.alert_body.clone(),
                sound: self.sound.clone(),
                badge: self.badge,
                priority: self.priority.apns_value().to_string(),
            },
        }
    }
}
