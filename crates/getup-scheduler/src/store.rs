//! Document stores backing the task/user traits.
//!
//! `JsonDocumentStore` keeps one JSON file per document, human-readable and
//! easy to seed by hand. `MemoryStore` is for embedding and tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use getup_core::error::{GetUpError, Result};
use getup_core::traits::{TaskStore, UserStore};
use getup_core::UserDocument;
use serde_json::Value;
use tokio::sync::RwLock;

/// In-memory task and user collections.
#[derive(Default)]
pub struct MemoryStore {
    tasks: RwLock<HashMap<String, Value>>,
    users: RwLock<HashMap<String, UserDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_task(&self, task_id: &str, doc: Value) {
        self.tasks.write().await.insert(task_id.to_string(), doc);
    }

    pub async fn remove_task(&self, task_id: &str) -> Option<Value> {
        self.tasks.write().await.remove(task_id)
    }

    pub async fn put_user(&self, user_id: &str, user: UserDocument) {
        self.users.write().await.insert(user_id.to_string(), user);
    }

    /// Set one participant's done flag. Returns false if the task is unknown
    /// or not an object.
    pub async fn set_participant_status(&self, task_id: &str, user_id: &str, done: bool) -> bool {
        let mut tasks = self.tasks.write().await;
        let Some(doc) = tasks.get_mut(task_id).filter(|d| d.is_object()) else {
            return false;
        };
        match doc.get_mut("participantsStatus").and_then(Value::as_object_mut) {
            Some(status) => {
                status.insert(user_id.to_string(), Value::Bool(done));
            }
            None => {
                doc["participantsStatus"] = serde_json::json!({ user_id: done });
            }
        }
        true
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn get_task(&self, task_id: &str) -> Result<Option<Value>> {
        Ok(self.tasks.read().await.get(task_id).cloned())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserDocument>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }
}

/// Directory-backed store: `<dir>/tasks/<id>.json`, `<dir>/users/<id>.json`.
pub struct JsonDocumentStore {
    path: PathBuf,
}

impl JsonDocumentStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir.join("tasks"))?;
        std::fs::create_dir_all(dir.join("users"))?;
        Ok(Self {
            path: dir.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.path
    }

    fn doc_path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(GetUpError::Store(format!("Invalid document id: '{id}'")));
        }
        Ok(self.path.join(collection).join(format!("{id}.json")))
    }

    async fn read_doc(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let file = self.doc_path(collection, id)?;
        match tokio::fs::read_to_string(&file).await {
            Ok(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                GetUpError::Store(format!("Failed to parse {}: {e}", file.display()))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GetUpError::Store(format!("Failed to read {}: {e}", file.display()))),
        }
    }

    async fn write_doc(&self, collection: &str, id: &str, doc: &Value) -> Result<()> {
        let file = self.doc_path(collection, id)?;
        let json = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&file, json).await?;
        tracing::debug!("💾 Saved {}/{} to {}", collection, id, file.display());
        Ok(())
    }

    pub async fn put_task(&self, task_id: &str, doc: &Value) -> Result<()> {
        self.write_doc("tasks", task_id, doc).await
    }

    pub async fn put_user(&self, user_id: &str, user: &UserDocument) -> Result<()> {
        self.write_doc("users", user_id, &serde_json::to_value(user)?).await
    }

    pub async fn remove_task(&self, task_id: &str) -> Result<bool> {
        let file = self.doc_path("tasks", task_id)?;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl TaskStore for JsonDocumentStore {
    async fn get_task(&self, task_id: &str) -> Result<Option<Value>> {
        self.read_doc("tasks", task_id).await
    }
}

#[async_trait]
impl UserStore for JsonDocumentStore {
    async fn get_user(&self, user_id: &str) -> Result<Option<UserDocument>> {
        match self.read_doc("users", user_id).await? {
            Some(raw) => serde_json::from_value(raw)
                .map(Some)
                .map_err(|e| GetUpError::Decode(format!("User '{user_id}': {e}"))),
            None => Ok(None),
        }
    }
}
