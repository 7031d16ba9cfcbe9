//! Document store traits.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::types::UserDocument;

/// Read access to the `tasks` collection.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch the raw task document. `Ok(None)` if it no longer exists.
    async fn get_task(&self, task_id: &str) -> Result<Option<Value>>;
}

/// Read access to the `users` collection.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a user document. `Ok(None)` if the user is unknown.
    async fn get_user(&self, user_id: &str) -> Result<Option<UserDocument>>;
}
