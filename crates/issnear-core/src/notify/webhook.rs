//! Webhook sink -- post notifications as JSON.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;

use crate::error::NotifyError;

use super::{Notification, NotificationSink};

pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let url = url.into();
        if url.is_empty() {
            return Err(NotifyError::NotConfigured("webhook URL is empty".into()));
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

impl NotificationSink for WebhookSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = json!({
            "title": notification.title,
            "body": notification.body,
            "data": notification.data,
            "content": format!("{}: {}", notification.title, notification.body),
        });

        let resp = self.client.post(&self.url).json(&body).send().await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            Err(NotifyError::Rejected { status, body: text })
        }
    }
}
