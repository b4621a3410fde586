//! # ISS Near Me Core Library
//!
//! This library provides the proximity engine behind "ISS Near Me": it
//! polls the station's position, takes the device position once, and raises
//! a local notification whenever the great-circle distance between the two
//! falls within a user-adjustable threshold.
//!
//! ## Architecture
//!
//! - **GeoMath**: haversine distance on a spherical Earth
//! - **Permissions**: location and notification capabilities, resolved once
//! - **Positions**: device location provider and remote target feed
//! - **Monitor**: caller-driven state machine plus the session task that
//!   owns the poll timer and serializes every update
//! - **Notifications**: best-effort sinks (log, webhook)
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`ProximityMonitor`]: alert decisions and last-known positions
//! - [`MonitorSession`]: lifecycle and polling glue
//! - [`Config`]: application configuration management
//! - [`PositionSource`], [`PermissionGate`], [`NotificationSink`]: host seams

pub mod error;
pub mod events;
pub mod geo;
pub mod monitor;
pub mod notify;
pub mod permissions;
pub mod position;
pub mod storage;

pub use error::{
    ConfigError, CoreError, FailureKind, NotifyError, PermissionError, PositionError,
    ValidationError,
};
pub use events::Event;
pub use geo::{distance_km, Coordinate, EARTH_RADIUS_KM};
pub use monitor::{
    AlertPolicy, Control, MonitorConfig, MonitorHandle, MonitorPhase, MonitorSession,
    MonitorSnapshot, MonitorState, ProximityMonitor, SessionSettings, ThresholdLimits,
};
pub use notify::{LogSink, Notification, NotificationSink, WebhookSink};
pub use permissions::{
    resolve_permissions, Capability, PermissionGate, PermissionState, Permissions,
    PresetPermissionGate,
};
pub use position::{
    Accuracy, CompositeSource, FixedLocation, LocationProvider, OpenNotifyClient, PositionSource,
    TargetFeed,
};
pub use storage::Config;
