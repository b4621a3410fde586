use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::Coordinate;
use crate::permissions::Permissions;

/// Every state change in the monitor produces an Event.
/// Sessions broadcast them; the CLI prints them as JSON lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    PermissionsResolved {
        permissions: Permissions,
        at: DateTime<Utc>,
    },
    /// Location permission missing; no position work will happen.
    Degraded {
        at: DateTime<Utc>,
    },
    UserPositionAcquired {
        position: Coordinate,
        at: DateTime<Utc>,
    },
    UserPositionUnavailable {
        reason: String,
        at: DateTime<Utc>,
    },
    /// Polling has started.
    MonitorActive {
        at: DateTime<Utc>,
    },
    TargetUpdated {
        position: Coordinate,
        distance_km: Option<f64>,
        at: DateTime<Utc>,
    },
    PollFailed {
        reason: String,
        consecutive_failures: u32,
        at: DateTime<Utc>,
    },
    ConfigChanged {
        alerts_enabled: bool,
        threshold_km: f64,
        at: DateTime<Utc>,
    },
    /// Distance within threshold with alerts on and notifications granted.
    ProximityAlert {
        distance_km: f64,
        threshold_km: f64,
        at: DateTime<Utc>,
    },
    NotificationFailed {
        reason: String,
        at: DateTime<Utc>,
    },
    MonitorStopped {
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::PermissionsResolved { at, .. }
            | Event::Degraded { at }
            | Event::UserPositionAcquired { at, .. }
            | Event::UserPositionUnavailable { at, .. }
            | Event::MonitorActive { at }
            | Event::TargetUpdated { at, .. }
            | Event::PollFailed { at, .. }
            | Event::ConfigChanged { at, .. }
            | Event::ProximityAlert { at, .. }
            | Event::NotificationFailed { at, .. }
            | Event::MonitorStopped { at } => *at,
        }
    }
}
