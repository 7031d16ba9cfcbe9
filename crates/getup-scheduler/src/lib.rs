//! # GetUp Scheduler
//!
//! Task-due push notifications: one in-memory timer per qualifying task
//! write, fire-time recipient resolution, and a single multicast dispatch
//! per job with per-token accounting.
//!
//! ## Architecture
//! ```text
//! TriggerAdapter::on_write(WriteEvent)
//!   ├── normalize   raw document → NormalizedTask | IneligibleReason
//!   ├── evaluate    deleted / timer / date / past-due checks
//!   └── NotificationScheduler::schedule(job)   (tokio timer per job)
//!          └── at due time → FirePipeline
//!                ├── RecipientResolver   re-read status, concurrent token lookups
//!                └── Dispatcher          one multicast → DispatchReport
//!                      ├── FcmTransport  (HTTP)
//!                      └── LogTransport  (dry run)
//! ```
//!
//! Jobs are not persisted; anything pending when the process exits is lost.

pub mod dispatch;
pub mod eligibility;
pub mod engine;
pub mod fcm;
pub mod normalize;
pub mod notify;
pub mod recipients;
pub mod store;
pub mod trigger;

#[cfg(test)]
mod test_utils;

pub use dispatch::{DispatchReport, Dispatcher};
pub use eligibility::{Eligibility, evaluate};
pub use engine::{JobId, NotificationJob, NotificationScheduler, PendingJob};
pub use fcm::{FcmTransport, LogTransport};
pub use normalize::{IneligibleReason, Normalized, NormalizedTask, normalize};
pub use notify::{NotifyPriority, PushNotification};
pub use recipients::{DropReason, Dropped, Recipient, RecipientResolver, Resolution, StatusSource};
pub use store::{JsonDocumentStore, MemoryStore};
pub use trigger::{FirePipeline, TriggerAdapter, TriggerOutcome};
