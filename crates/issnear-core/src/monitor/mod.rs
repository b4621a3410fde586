//! Proximity monitoring: the state machine and the session that drives it.

pub mod engine;
pub mod session;

pub use engine::{
    AlertPolicy, MonitorConfig, MonitorPhase, MonitorSnapshot, MonitorState, ProximityMonitor,
    ThresholdLimits, DEFAULT_THRESHOLD_KM, THRESHOLD_FLOOR_KM, THRESHOLD_STEP_KM,
};
pub use session::{Control, MonitorHandle, MonitorSession, SessionSettings, DEFAULT_POLL_INTERVAL};
