//! Local notification dispatch.
//!
//! Sinks hand a [`Notification`] to whatever the host uses to alert the
//! user. [`fire`] is the only entry point the session uses: it never fails,
//! it only reports whether delivery worked.

mod log;
mod webhook;

pub use self::log::LogSink;
pub use self::webhook::WebhookSink;

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FailureKind, NotifyError};

pub const PROXIMITY_TITLE: &str = "ISS Nearby";

/// When the platform should show the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    #[default]
    Immediate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub trigger: Trigger,
}

impl Notification {
    /// The "station is overhead" alert for a distance in kilometres.
    pub fn proximity(distance_km: f64) -> Self {
        Self {
            title: PROXIMITY_TITLE.to_string(),
            body: format!(
                "The ISS is {} km away from you. Look up!",
                distance_km.round() as i64
            ),
            data: serde_json::json!({ "near": true }),
            trigger: Trigger::Immediate,
        }
    }
}

pub trait NotificationSink: Send + Sync {
    fn deliver(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<(), NotifyError>> + Send;
}

/// Best-effort proximity alert. Failures are logged and swallowed.
pub async fn fire<N: NotificationSink>(sink: &N, distance_km: f64) -> Result<(), NotifyError> {
    let notification = Notification::proximity(distance_km);
    let result = sink.deliver(&notification).await;
    if let Err(e) = &result {
        warn!(kind = %FailureKind::NotificationDispatchFailure, distance_km, error = %e, "notification failed");
    }
    result
}
