//! Push transport trait and the multicast message it carries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// APNs-specific part of a push message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApnsPayload {
    pub alert_title: String,
    pub alert_body: String,
    pub sound: String,
    pub badge: u32,
    /// Value of the `apns-priority` header ("10" = immediate).
    pub priority: String,
}

/// One push request addressed to many device tokens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulticastMessage {
    pub tokens: Vec<String>,
    pub title: String,
    pub body: String,
    pub apns: ApnsPayload,
}

/// Delivery result for a single token of a multicast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenOutcome {
    pub token: String,
    pub success: bool,
    pub error: Option<String>,
}

impl TokenOutcome {
    pub fn delivered(token: &str) -> Self {
        Self {
            token: token.to_string(),
            success: true,
            error: None,
        }
    }

    pub fn failed(token: &str, error: impl Into<String>) -> Self {
        Self {
            token: token.to_string(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// A push service able to send one message to many tokens in a single call.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Transport name for logs.
    fn name(&self) -> &str;

    /// Send `message` to all of its tokens. Returns outcomes in token order.
    /// `Err` means the whole request failed.
    async fn send_multicast(&self, message: &MulticastMessage) -> Result<Vec<TokenOutcome>>;
}
