//! Telling a party that it has something new to do.
//!
//! Notification is best effort. The orchestrator spawns every call and only
//! logs failures; parties are expected to poll for their prompts anyway.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification to '{url}' failed: {message}")]
    Http { url: String, message: String },

    #[error("notification task failed: {0}")]
    Internal(String),
}

/// Delivers "you have a new prompt" signals to parties.
#[async_trait]
pub trait PartyNotifier: Send + Sync + 'static {
    async fn notify(&self, party_name: &str) -> Result<(), NotifyError>;
}

/// Calls `GET <base_url>/party/<name>/notification` for each party that has
/// a configured base URL. Parties without one poll, so they are skipped.
///
/// Uses `ureq` (sync) inside `tokio::task::spawn_blocking`.
#[derive(Debug, Clone, Default)]
pub struct HttpNotifier {
    endpoints: BTreeMap<String, String>,
}

impl HttpNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, party_name: &str, base_url: &str) -> Self {
        self.endpoints
            .insert(party_name.to_string(), base_url.to_string());
        self
    }

    /// The notification URL for `party_name`, if it has an endpoint.
    pub fn notification_url(&self, party_name: &str) -> Option<String> {
        self.endpoints.get(party_name).map(|base| {
            format!(
                "{}/party/{}/notification",
                base.trim_end_matches('/'),
                party_name
            )
        })
    }
}

#[async_trait]
impl PartyNotifier for HttpNotifier {
    async fn notify(&self, party_name: &str) -> Result<(), NotifyError> {
        let Some(url) = self.notification_url(party_name) else {
            debug!(party = party_name, "no notification endpoint; skipped");
            return Ok(());
        };
        debug!(party = party_name, %url, "notifying party");

        tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            agent
                .get(&url)
                .call()
                .map(|_| ())
                .map_err(|e| NotifyError::Http {
                    url: url.clone(),
                    message: e.to_string(),
                })
        })
        .await
        .map_err(|e| NotifyError::Internal(format!("task join error: {}", e)))?
    }
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl PartyNotifier for NoopNotifier {
    async fn notify(&self, _party_name: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Remembers which parties were notified, in call order.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    notified: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notified(&self) -> Vec<String> {
        self.notified
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl PartyNotifier for RecordingNotifier {
    async fn notify(&self, party_name: &str) -> Result<(), NotifyError> {
        self.notified
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(party_name.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_url_joins_base_and_party() {
        let notifier = HttpNotifier::new().with_endpoint("alice", "http://localhost:9000/");
        assert_eq!(
            notifier.notification_url("alice").as_deref(),
            Some("http://localhost:9000/party/alice/notification")
        );
        assert!(notifier.notification_url("bob").is_none());
    }

    #[tokio::test]
    async fn party_without_endpoint_is_skipped() {
        let notifier = HttpNotifier::new().with_endpoint("alice", "http://127.0.0.1:1");
        notifier.notify("bob").await.unwrap();
    }

    #[tokio::test]
    async fn unreachable_endpoint_reports_http_error() {
        let notifier = HttpNotifier::new().with_endpoint("alice", "http://127.0.0.1:1");
        let err = notifier.notify("alice").await.unwrap_err();
        assert!(matches!(err, NotifyError::Http { .. }));
    }

    #[tokio::test]
    async fn recording_notifier_keeps_order() {
        let notifier = RecordingNotifier::new();
        notifier.notify("b").await.unwrap();
        notifier.notify("a").await.unwrap();
        assert_eq!(notifier.notified(), vec!["b", "a"]);
    }
}
