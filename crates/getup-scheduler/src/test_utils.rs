//! Test doubles for the collaborator traits.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use getup_core::error::{GetUpError, Result};
use getup_core::traits::{MulticastMessage, PushTransport, TaskStore, TokenOutcome, UserStore};
use getup_core::UserDocument;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::store::MemoryStore;

/// Records every multicast; can fail chosen tokens or the whole request.
pub struct RecordingTransport {
    calls: Mutex<Vec<MulticastMessage>>,
    failing: HashSet<String>,
    unavailable: bool,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: HashSet::new(),
            unavailable: false,
        }
    }

    pub fn failing_tokens(tokens: &[&str]) -> Self {
        Self {
            failing: tokens.iter().map(|t| t.to_string()).collect(),
            ..Self::new()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }

    pub async fn calls(&self) -> Vec<MulticastMessage> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl PushTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_multicast(&self, message: &MulticastMessage) -> Result<Vec<TokenOutcome>> {
        self.calls.lock().await.push(message.clone());
        if self.unavailable {
            return Err(GetUpError::Transport("service unavailable".into()));
        }
        Ok(message
            .tokens
            .iter()
            .map(|t| {
                if self.failing.contains(t) {
                    TokenOutcome::failed(t, "NotRegistered")
                } else {
                    TokenOutcome::delivered(t)
                }
            })
            .collect())
    }
}

/// User store whose lookups fail for chosen users.
pub struct FlakyUsers {
    inner: Arc<MemoryStore>,
    failing: HashSet<String>,
}

impl FlakyUsers {
    pub fn new(inner: Arc<MemoryStore>, failing: &[&str]) -> Self {
        Self {
            inner,
            failing: failing.iter().map(|u| u.to_string()).collect(),
        }
    }
}

#[async_trait]
impl UserStore for FlakyUsers {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserDocument>> {
        if self.failing.contains(user_id) {
            return Err(GetUpError::Store(format!("timeout reading users/{user_id}")));
        }
        self.inner.get_user(user_id).await
    }
}

/// Task store whose every read fails.
pub struct UnreadableTasks;

#[async_trait]
impl TaskStore for UnreadableTasks {
    async fn get_task(&self, task_id: &str) -> Result<Option<Value>> {
        Err(GetUpError::Store(format!("permission denied reading tasks/{task_id}")))
    }
}
