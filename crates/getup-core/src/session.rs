//! Acting-user context, passed explicitly to whatever needs an identity.

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// Who is acting on behalf of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
}

impl Session {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
        }
    }

    /// Identity used by background pipelines that act for no particular user.
    pub fn system() -> Self {
        Self::new("system")
    }
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.user_id)
    }
}
