use tracing::info;

use crate::error::NotifyError;

use super::{Notification, NotificationSink};

/// Writes notifications to the log. Used when no other sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(title = %notification.title, body = %notification.body, "notification");
        Ok(())
    }
}
