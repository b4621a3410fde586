//! Proximity monitor state machine.
//!
//! The monitor does no I/O and owns no timer. The session feeds it
//! permission answers, the one-shot device fix and every poll result; each
//! call updates [`MonitorState`] and runs the alert evaluation in one step,
//! returning the events that step produced.
//!
//! ## State Transitions
//!
//! ```text
//! Initializing -> Degraded            (location not granted)
//! Initializing -> Active              (after the device fix attempt)
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let mut monitor = ProximityMonitor::new(MonitorConfig::default());
//! monitor.resolve_permissions(permissions);
//! monitor.record_own_position(fix);
//! // On every poll:
//! let events = monitor.apply_poll(result);
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FailureKind, PositionError};
use crate::events::Event;
use crate::geo::{distance_km, Coordinate};
use crate::permissions::Permissions;

pub const DEFAULT_THRESHOLD_KM: f64 = 500.0;
pub const THRESHOLD_FLOOR_KM: f64 = 50.0;
pub const THRESHOLD_STEP_KM: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorPhase {
    Initializing,
    /// Location permission missing. Terminal.
    Degraded,
    /// Polling. Lasts until the session is torn down.
    Active,
}

/// User-adjustable settings, read on every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub alerts_enabled: bool,
    pub threshold_km: f64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            alerts_enabled: true,
            threshold_km: DEFAULT_THRESHOLD_KM,
        }
    }
}

/// Bounds for threshold adjustments. There is no ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdLimits {
    pub floor_km: f64,
    pub step_km: f64,
}

impl Default for ThresholdLimits {
    fn default() -> Self {
        Self {
            floor_km: THRESHOLD_FLOOR_KM,
            step_km: THRESHOLD_STEP_KM,
        }
    }
}

impl ThresholdLimits {
    pub fn clamp(&self, km: f64) -> f64 {
        km.max(self.floor_km)
    }
}

/// When to notify while the target stays within the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertPolicy {
    /// Notify on every evaluation that finds the target within range.
    #[default]
    EveryEvaluation,
    /// Notify once when the target comes within range; re-arm when it
    /// leaves range or alerts are switched off.
    OncePerEpisode,
}

/// Last-known positions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MonitorState {
    pub user_position: Option<Coordinate>,
    pub target_position: Option<Coordinate>,
    pub last_alerted_distance_km: Option<f64>,
}

/// Read-only view for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub phase: MonitorPhase,
    pub permissions: Permissions,
    pub config: MonitorConfig,
    pub user_position: Option<Coordinate>,
    pub target_position: Option<Coordinate>,
    pub distance_km: Option<f64>,
}

impl MonitorSnapshot {
    pub fn user_status(&self) -> String {
        match (self.phase, self.user_position) {
            (MonitorPhase::Degraded, _) => "unavailable".to_string(),
            (_, Some(pos)) => pos.to_string(),
            (_, None) => "Location not available".to_string(),
        }
    }

    pub fn target_status(&self) -> String {
        match (self.phase, self.target_position) {
            (MonitorPhase::Degraded, _) => "unavailable".to_string(),
            (_, Some(pos)) => pos.to_string(),
            (_, None) => "ISS position not available".to_string(),
        }
    }

    pub fn distance_status(&self) -> Option<String> {
        self.distance_km.map(|d| format!("Distance: {d:.1} km"))
    }
}

#[derive(Debug, Clone)]
pub struct ProximityMonitor {
    config: MonitorConfig,
    limits: ThresholdLimits,
    policy: AlertPolicy,
    permissions: Permissions,
    phase: MonitorPhase,
    state: MonitorState,
    /// Set while an alert has been raised for the current episode.
    in_episode: bool,
    consecutive_failures: u32,
}

impl ProximityMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self::bounded(config, ThresholdLimits::default())
    }

    /// Build with custom threshold limits. The initial threshold is clamped
    /// to `limits.floor_km`.
    pub fn bounded(config: MonitorConfig, limits: ThresholdLimits) -> Self {
        Self {
            config: MonitorConfig {
                threshold_km: limits.clamp(config.threshold_km),
                ..config
            },
            limits,
            policy: AlertPolicy::default(),
            permissions: Permissions::default(),
            phase: MonitorPhase::Initializing,
            state: MonitorState::default(),
            in_episode: false,
            consecutive_failures: 0,
        }
    }

    pub fn with_policy(mut self, policy: AlertPolicy) -> Self {
        self.policy = policy;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn config(&self) -> MonitorConfig {
        self.config
    }

    pub fn limits(&self) -> ThresholdLimits {
        self.limits
    }

    pub fn policy(&self) -> AlertPolicy {
        self.policy
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Distance between device and target, when both are known.
    pub fn distance_km(&self) -> Option<f64> {
        match (self.state.user_position, self.state.target_position) {
            (Some(user), Some(target)) => Some(distance_km(user, target)),
            _ => None,
        }
    }

    /// True once permissions allow a device fix and none has been attempted.
    pub fn needs_own_position(&self) -> bool {
        self.phase == MonitorPhase::Initializing && self.permissions.location.is_granted()
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            phase: self.phase,
            permissions: self.permissions,
            config: self.config,
            user_position: self.state.user_position,
            target_position: self.state.target_position,
            distance_km: self.distance_km(),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Record the startup permission answers. Only honoured once.
    pub fn resolve_permissions(&mut self, permissions: Permissions) -> Vec<Event> {
        // After a resolution the monitor is either Degraded or holds a
        // granted location permission.
        if self.phase != MonitorPhase::Initializing || self.permissions.location.is_granted() {
            return Vec::new();
        }

        self.permissions = permissions;
        let mut events = vec![Event::PermissionsResolved {
            permissions,
            at: Utc::now(),
        }];

        if !permissions.notifications.is_granted() {
            warn!(kind = %FailureKind::PermissionDenied, capability = "notifications", "alerts will not be delivered");
        }

        if !permissions.location.is_granted() {
            warn!(kind = %FailureKind::PermissionDenied, capability = "location", "position tracking unavailable");
            self.phase = MonitorPhase::Degraded;
            events.push(Event::Degraded { at: Utc::now() });
        }

        events
    }

    /// Record the outcome of the one-shot device fix and go `Active`.
    ///
    /// A failed fix is tolerated: the monitor runs without a user position.
    pub fn record_own_position(
        &mut self,
        result: Result<Coordinate, PositionError>,
    ) -> Vec<Event> {
        if !self.needs_own_position() {
            return Vec::new();
        }

        let mut events = Vec::new();
        match result {
            Ok(position) => {
                self.state.user_position = Some(position);
                events.push(Event::UserPositionAcquired {
                    position,
                    at: Utc::now(),
                });
            }
            Err(e) => {
                warn!(kind = %FailureKind::AcquisitionFailure, error = %e, "failed to get location");
                events.push(Event::UserPositionUnavailable {
                    reason: e.to_string(),
                    at: Utc::now(),
                });
            }
        }

        self.phase = MonitorPhase::Active;
        info!("proximity monitor active");
        events.push(Event::MonitorActive { at: Utc::now() });
        self.evaluate(&mut events);
        events
    }

    /// Apply one poll tick. A failure leaves the last target position in
    /// place and skips evaluation.
    pub fn apply_poll(&mut self, result: Result<Coordinate, PositionError>) -> Vec<Event> {
        if self.phase != MonitorPhase::Active {
            debug!(phase = ?self.phase, "poll result ignored");
            return Vec::new();
        }

        let mut events = Vec::new();
        match result {
            Ok(position) => {
                self.consecutive_failures = 0;
                self.state.target_position = Some(position);
                events.push(Event::TargetUpdated {
                    position,
                    distance_km: self.distance_km(),
                    at: Utc::now(),
                });
                self.evaluate(&mut events);
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                warn!(
                    kind = %FailureKind::PollFailure,
                    consecutive_failures = self.consecutive_failures,
                    error = %e,
                    "ISS fetch failed"
                );
                events.push(Event::PollFailed {
                    reason: e.to_string(),
                    consecutive_failures: self.consecutive_failures,
                    at: Utc::now(),
                });
            }
        }
        events
    }

    // ── Controls ─────────────────────────────────────────────────────

    pub fn set_alerts_enabled(&mut self, enabled: bool) -> Vec<Event> {
        if self.config.alerts_enabled == enabled {
            return Vec::new();
        }
        self.config.alerts_enabled = enabled;
        if !enabled {
            self.in_episode = false;
        }
        self.config_changed()
    }

    /// Set the threshold, clamped to the floor. Non-finite values are ignored.
    pub fn set_threshold(&mut self, km: f64) -> Vec<Event> {
        if !km.is_finite() {
            warn!(threshold_km = km, "ignoring non-finite threshold");
            return Vec::new();
        }
        let km = self.limits.clamp(km);
        if km == self.config.threshold_km {
            return Vec::new();
        }
        self.config.threshold_km = km;
        self.config_changed()
    }

    pub fn increase_threshold(&mut self) -> Vec<Event> {
        self.set_threshold(self.config.threshold_km + self.limits.step_km)
    }

    pub fn decrease_threshold(&mut self) -> Vec<Event> {
        self.set_threshold(self.config.threshold_km - self.limits.step_km)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn config_changed(&mut self) -> Vec<Event> {
        let mut events = vec![Event::ConfigChanged {
            alerts_enabled: self.config.alerts_enabled,
            threshold_km: self.config.threshold_km,
            at: Utc::now(),
        }];
        self.evaluate(&mut events);
        events
    }

    fn evaluate(&mut self, events: &mut Vec<Event>) {
        if self.phase != MonitorPhase::Active {
            return;
        }
        let Some(distance) = self.distance_km() else {
            return;
        };

        if distance > self.config.threshold_km {
            self.in_episode = false;
            return;
        }
        if !self.config.alerts_enabled {
            return;
        }
        if !self.permissions.notifications.is_granted() {
            debug!(distance_km = distance, "within threshold, notifications not granted");
            return;
        }
        if self.policy == AlertPolicy::OncePerEpisode && self.in_episode {
            debug!(distance_km = distance, "within threshold, already alerted this episode");
            return;
        }

        self.in_episode = true;
        self.state.last_alerted_distance_km = Some(distance);
        events.push(Event::ProximityAlert {
            distance_km: distance,
            threshold_km: self.config.threshold_km,
            at: Utc::now(),
        });
    }
}
