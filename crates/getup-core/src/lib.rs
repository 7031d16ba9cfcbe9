//! # GetUp Core
//! Shared documents, collaborator traits, configuration and errors for the
//! task-due notification pipeline.

pub mod config;
pub mod error;
pub mod session;
pub mod traits;
pub mod types;

pub use config::{JobPolicy, NotifierConfig, NotifyPriority};
pub use error::{GetUpError, Result};
pub use session::Session;
pub use types::{TaskDate, TaskDocument, UserDocument, UserId, WriteEvent};
