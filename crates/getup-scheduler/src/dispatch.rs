//! Notification dispatch: sends one multicast per fired job and accounts
//! for every token. No retries; failures are logged and reported.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use getup_core::traits::{PushTransport, TokenOutcome};
use tokio::sync::Mutex;

use crate::notify::PushNotification;

/// Reports kept in memory for inspection.
const HISTORY_LIMIT: usize = 100;

/// Per-token results of one dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub source: String,
    pub title: String,
    pub outcomes: Vec<TokenOutcome>,
    pub sent_at: DateTime<Utc>,
}

impl DispatchReport {
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.success_count()
    }
}

/// Sends notifications through a [`PushTransport`].
pub struct Dispatcher {
    transport: Arc<dyn PushTransport>,
    /// Ring buffer of recent reports.
    history: Mutex<VecDeque<DispatchReport>>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn PushTransport>) -> Self {
        Self {
            transport,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Send `notification` to `tokens` in a single request.
    pub async fn dispatch(&self, tokens: &[String], notification: &PushNotification) -> DispatchReport {
        let message = notification.to_multicast(tokens);

        let outcomes = match self.transport.send_multicast(&message).await {
            Ok(outcomes) => align_outcomes(tokens, outcomes),
            Err(e) => {
                tracing::warn!("⚠️ Error sending notifications via {}: {e}", self.transport.name());
                tokens
                    .iter()
                    .map(|t| TokenOutcome::failed(t, e.to_string()))
                    .collect()
            }
        };

        for outcome in &outcomes {
            if outcome.success {
                tracing::info!("✅ Sent to token {}", mask_token(&outcome.token));
            } else {
                tracing::warn!(
                    "❌ Failed: {}, Error: {}",
                    mask_token(&outcome.token),
                    outcome.error.as_deref().unwrap_or("unknown")
                );
            }
        }

        let report = DispatchReport {
            source: notification.source.clone(),
            title: notification.title.clone(),
            outcomes,
            sent_at: Utc::now(),
        };
        tracing::info!(
            "📊 Task '{}': Ok: {}, No: {}",
            report.source,
            report.success_count(),
            report.failure_count()
        );

        self.record(report.clone()).await;
        report
    }

    async fn record(&self, report: DispatchReport) {
        let mut history = self.history.lock().await;
        history.push_back(report);
        if history.len() > HISTORY_LIMIT {
            history.pop_front();
        }
    }

    /// Recent dispatch reports, oldest first.
    pub async fn history(&self) -> Vec<DispatchReport> {
        self.history.lock().await.iter().cloned().collect()
    }
}

/// Pair outcomes with the tokens they were requested for. Outcomes are
/// positional; a missing one counts as a failure.
fn align_outcomes(tokens: &[String], outcomes: Vec<TokenOutcome>) -> Vec<TokenOutcome> {
    if outcomes.len() != tokens.len() {
        tracing::warn!(
            "⚠️ Transport returned {} results for {} tokens",
            outcomes.len(),
            tokens.len()
        );
    }
    let mut outcomes = outcomes.into_iter();
    tokens
        .iter()
        .map(|token| match outcomes.next() {
            Some(o) => TokenOutcome {
                token: token.clone(),
                success: o.success,
                error: o.error,
            },
            None => TokenOutcome::failed(token, "no result returned"),
        })
        .collect()
}

/// Shorten a token for logs.
pub(crate) fn mask_token(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    if prefix.len() < token.len() {
        format!("{prefix}…")
    } else {
        prefix
    }
}
