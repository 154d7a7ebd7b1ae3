// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Operator notifications.
//!
//! Cards that enter `Check status` notify their members. Delivery goes
//! through a [`Notifier`] sink; failures are logged and never interrupt a pass.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hugin_core::Card;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::{Error, Result};

/// Destination for operator messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sink type identifier (e.g., "log", "webhook").
    fn sink_type(&self) -> &'static str;

    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()>;
}

/// Writes notifications to the log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn sink_type(&self) -> &'static str {
        "log"
    }

    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        info!(recipients = ?recipients, subject, body, "Notification");
        Ok(())
    }
}

/// Posts notifications as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    http: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Notification(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn sink_type(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> Result<()> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({
                "recipients": recipients,
                "subject": subject,
                "body": body,
            }))
            .send()
            .await
            .map_err(|e| Error::Notification(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Notification(format!(
                "webhook answered {}: {}",
                status.as_u16(),
                text
            )));
        }
        Ok(())
    }
}

/// Maps board user names to addresses.
#[derive(Debug, Clone, Default)]
pub struct RecipientBook {
    default: Vec<String>,
    users: BTreeMap<String, Vec<String>>,
}

impl RecipientBook {
    pub fn new(default: Vec<String>, users: BTreeMap<String, Vec<String>>) -> Self {
        Self { default, users }
    }

    /// Addresses of `members`, or the default recipients when none resolve.
    pub fn resolve(&self, members: &[String]) -> Vec<String> {
        let mut resolved: Vec<String> = members
            .iter()
            .filter_map(|m| self.users.get(m))
            .flatten()
            .cloned()
            .collect();
        resolved.sort();
        resolved.dedup();
        if resolved.is_empty() {
            self.default.clone()
        } else {
            resolved
        }
    }
}

/// Sends "needs attention" messages for cards moved to `Check status`.
#[derive(Clone)]
pub struct StatusNotifier {
    sink: Arc<dyn Notifier>,
    recipients: RecipientBook,
    host: String,
}

impl StatusNotifier {
    pub fn new(sink: Arc<dyn Notifier>, recipients: RecipientBook, host: impl Into<String>) -> Self {
        Self {
            sink,
            recipients,
            host: host.into(),
        }
    }

    /// Notifier for `config`: a webhook when one is configured, the log otherwise.
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        let sink: Arc<dyn Notifier> = match &config.notify_webhook {
            Some(url) => Arc::new(WebhookNotifier::new(url)?),
            None => Arc::new(LogNotifier),
        };
        let recipients = RecipientBook::new(config.email_default.clone(), config.email_users.clone());
        Ok(Self::new(sink, recipients, config.host.clone()))
    }

    pub fn sink_type(&self) -> &'static str {
        self.sink.sink_type()
    }

    /// Tells the card's members that `card` (a `kind`, "run" or "project")
    /// needs attention. Never fails.
    pub async fn needs_attention(&self, kind: &str, card: &Card, board: &str, reason: &str) {
        let recipients = self.recipients.resolve(&card.members);
        if recipients.is_empty() {
            debug!(card = %card.name, "No recipients configured, notification skipped");
            return;
        }

        let subject = format!("[hugin]: The {kind} {} needs attention", card.name);
        let body = format!(
            "The {kind} {} has been moved to the {} list on the {board} board.\n\n{reason}\n\nSent from {}",
            card.name, card.list.name, self.host
        );

        match self.sink.send(&recipients, &subject, &body).await {
            Ok(()) => info!(card = %card.name, recipients = recipients.len(), "Notification sent"),
            Err(e) => warn!(card = %card.name, error = %e, "Failed to send notification"),
        }
    }
}
