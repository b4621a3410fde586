//! Location and notification permissions.
//!
//! Both capabilities are queried once when a session starts. The engine
//! never re-queries; asking the user again is the host's business.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FailureKind, PermissionError};

/// A capability the engine needs the host to grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Location,
    Notifications,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Location => f.write_str("location"),
            Capability::Notifications => f.write_str("notifications"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Not resolved yet.
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        self == PermissionState::Granted
    }

    pub fn from_granted(granted: bool) -> Self {
        if granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        }
    }
}

/// Resolved state of both capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Permissions {
    pub location: PermissionState,
    pub notifications: PermissionState,
}

impl Permissions {
    pub fn new(location: PermissionState, notifications: PermissionState) -> Self {
        Self {
            location,
            notifications,
        }
    }

    pub fn all_granted() -> Self {
        Self::new(PermissionState::Granted, PermissionState::Granted)
    }

    pub fn get(&self, capability: Capability) -> PermissionState {
        match capability {
            Capability::Location => self.location,
            Capability::Notifications => self.notifications,
        }
    }
}

/// Host-side permission queries.
pub trait PermissionGate: Send + Sync {
    fn request_location(
        &self,
    ) -> impl Future<Output = Result<PermissionState, PermissionError>> + Send;

    fn request_notifications(
        &self,
    ) -> impl Future<Output = Result<PermissionState, PermissionError>> + Send;
}

/// Query both capabilities. A failed query resolves to `Denied` for that
/// capability only.
pub async fn resolve_permissions<G: PermissionGate>(gate: &G) -> Permissions {
    let location = settle(Capability::Location, gate.request_location().await);
    let notifications = settle(Capability::Notifications, gate.request_notifications().await);
    Permissions::new(location, notifications)
}

fn settle(
    capability: Capability,
    result: Result<PermissionState, PermissionError>,
) -> PermissionState {
    match result {
        Ok(PermissionState::Unknown) => PermissionState::Denied,
        Ok(state) => state,
        Err(e) => {
            warn!(kind = %FailureKind::PermissionDenied, %capability, error = %e, "permission query failed");
            PermissionState::Denied
        }
    }
}

/// Permission answers fixed up front, e.g. from configuration.
#[derive(Debug, Clone, Copy)]
pub struct PresetPermissionGate {
    answers: Permissions,
}

impl PresetPermissionGate {
    pub fn new(answers: Permissions) -> Self {
        Self { answers }
    }
}

impl PermissionGate for PresetPermissionGate {
    async fn request_location(&self) -> Result<PermissionState, PermissionError> {
        Ok(self.answers.location)
    }

    async fn request_notifications(&self) -> Result<PermissionState, PermissionError> {
        Ok(self.answers.notifications)
    }
}
