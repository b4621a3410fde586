//! Integration tests for the monitoring session.
//!
//! Time is paused, so `sleep` jumps the clock and the poll timer fires
//! deterministically: with a 10 s cadence, ticks land at 0, 10, 20, ...

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use issnear_core::monitor::{AlertPolicy, MonitorConfig, MonitorPhase, MonitorSession, ProximityMonitor};
use issnear_core::{
    Coordinate, Event, Notification, NotificationSink, NotifyError, PermissionError,
    PermissionGate, PermissionState, Permissions, PositionError, PositionSource,
    PresetPermissionGate,
};
use tokio::sync::broadcast;
use tokio::time::sleep;

const ORIGIN: Coordinate = Coordinate::new(0.0, 0.0);
const FAR: Coordinate = Coordinate::new(0.0, 10.0);

struct Probe {
    own: Option<Coordinate>,
    target: Mutex<Option<Coordinate>>,
    failing: AtomicBool,
    own_calls: AtomicUsize,
    poll_calls: AtomicUsize,
}

impl Probe {
    fn new(own: Option<Coordinate>, target: Option<Coordinate>) -> Arc<Self> {
        Arc::new(Self {
            own,
            target: Mutex::new(target),
            failing: AtomicBool::new(false),
            own_calls: AtomicUsize::new(0),
            poll_calls: AtomicUsize::new(0),
        })
    }

    fn own_calls(&self) -> usize {
        self.own_calls.load(Ordering::SeqCst)
    }

    fn poll_calls(&self) -> usize {
        self.poll_calls.load(Ordering::SeqCst)
    }

    fn move_target(&self, to: Coordinate) {
        *self.target.lock().unwrap() = Some(to);
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

struct Source(Arc<Probe>);

impl PositionSource for Source {
    async fn acquire_own_position(&self) -> Result<Coordinate, PositionError> {
        self.0.own_calls.fetch_add(1, Ordering::SeqCst);
        self.0
            .own
            .ok_or_else(|| PositionError::Unavailable("no fix".into()))
    }

    async fn poll_target_position(&self) -> Result<Coordinate, PositionError> {
        self.0.poll_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.failing.load(Ordering::SeqCst) {
            return Err(PositionError::Status {
                status: "failure".into(),
            });
        }
        let target = *self.0.target.lock().unwrap();
        target.ok_or_else(|| PositionError::Unavailable("no target".into()))
    }
}

#[derive(Clone, Default)]
struct Recorder {
    attempts: Arc<Mutex<Vec<Notification>>>,
    broken: bool,
}

impl Recorder {
    fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    fn count(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

impl NotificationSink for Recorder {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.attempts.lock().unwrap().push(notification.clone());
        if self.broken {
            return Err(NotifyError::NotConfigured("broken sink".into()));
        }
        Ok(())
    }
}

/// Never answers.
struct PendingGate;

impl PermissionGate for PendingGate {
    async fn request_location(&self) -> Result<PermissionState, PermissionError> {
        std::future::pending().await
    }

    async fn request_notifications(&self) -> Result<PermissionState, PermissionError> {
        std::future::pending().await
    }
}

fn session(
    probe: &Arc<Probe>,
    permissions: Permissions,
    monitor: ProximityMonitor,
    sink: Recorder,
) -> MonitorSession<Source, PresetPermissionGate, Recorder> {
    MonitorSession::new(
        monitor,
        Source(Arc::clone(probe)),
        PresetPermissionGate::new(permissions),
        sink,
    )
}

fn default_monitor() -> ProximityMonitor {
    ProximityMonitor::new(MonitorConfig::default())
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        out.push(event);
    }
    out
}

async fn settle() {
    sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn location_denied_never_touches_positions() {
    let probe = Probe::new(Some(ORIGIN), Some(ORIGIN));
    let sink = Recorder::default();
    let denied = Permissions::new(PermissionState::Denied, PermissionState::Granted);
    let mut handle = session(&probe, denied, default_monitor(), sink.clone()).spawn();

    sleep(Duration::from_secs(60)).await;

    assert_eq!(probe.own_calls(), 0);
    assert_eq!(probe.poll_calls(), 0);
    assert_eq!(sink.count(), 0);
    assert_eq!(handle.snapshot().phase, MonitorPhase::Degraded);

    // Controls still answer in the degraded state.
    handle.increase_threshold();
    settle().await;
    assert_eq!(handle.snapshot().config.threshold_km, 550.0);

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn zero_distance_fires_once_for_the_tick() {
    let probe = Probe::new(Some(ORIGIN), Some(ORIGIN));
    let sink = Recorder::default();
    let mut handle =
        session(&probe, Permissions::all_granted(), default_monitor(), sink.clone()).spawn();

    settle().await;
    assert_eq!(probe.own_calls(), 1);
    assert_eq!(probe.poll_calls(), 1);
    assert_eq!(sink.count(), 1);
    assert_eq!(
        sink.attempts.lock().unwrap()[0].body,
        "The ISS is 0 km away from you. Look up!"
    );

    // Not edge-triggered: the next tick notifies again.
    sleep(Duration::from_secs(10)).await;
    assert_eq!(probe.poll_calls(), 2);
    assert_eq!(sink.count(), 2);

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn alerts_disabled_never_notify() {
    let probe = Probe::new(Some(ORIGIN), Some(ORIGIN));
    let sink = Recorder::default();
    let monitor = ProximityMonitor::new(MonitorConfig {
        alerts_enabled: false,
        threshold_km: 500.0,
    });
    let mut handle = session(&probe, Permissions::all_granted(), monitor, sink.clone()).spawn();

    sleep(Duration::from_secs(95)).await;

    assert_eq!(probe.poll_calls(), 10);
    assert_eq!(sink.count(), 0);
    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn notifications_denied_never_notify() {
    let probe = Probe::new(Some(ORIGIN), Some(ORIGIN));
    let sink = Recorder::default();
    let permissions = Permissions::new(PermissionState::Granted, PermissionState::Denied);
    let mut handle = session(&probe, permissions, default_monitor(), sink.clone()).spawn();

    sleep(Duration::from_secs(35)).await;

    assert_eq!(probe.poll_calls(), 4);
    assert_eq!(sink.count(), 0);
    // Distance is still computed for display.
    assert_eq!(handle.snapshot().distance_km, Some(0.0));
    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn enabling_alerts_evaluates_immediately() {
    let probe = Probe::new(Some(ORIGIN), Some(ORIGIN));
    let sink = Recorder::default();
    let monitor = ProximityMonitor::new(MonitorConfig {
        alerts_enabled: false,
        threshold_km: 500.0,
    });
    let mut handle = session(&probe, Permissions::all_granted(), monitor, sink.clone()).spawn();

    settle().await;
    assert_eq!(sink.count(), 0);

    assert!(handle.set_alerts_enabled(true));
    settle().await;
    assert_eq!(sink.count(), 1);
    assert_eq!(probe.poll_calls(), 1);

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn threshold_floor_holds_through_the_handle() {
    let probe = Probe::new(Some(ORIGIN), Some(FAR));
    let mut handle = session(
        &probe,
        Permissions::all_granted(),
        default_monitor(),
        Recorder::default(),
    )
    .spawn();

    for _ in 0..25 {
        handle.decrease_threshold();
    }
    settle().await;
    assert_eq!(handle.snapshot().config.threshold_km, 50.0);

    handle.set_threshold(1_200.0);
    settle().await;
    assert_eq!(handle.snapshot().config.threshold_km, 1_200.0);

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn poll_failure_keeps_last_target_and_keeps_polling() {
    let probe = Probe::new(Some(ORIGIN), Some(FAR));
    let session = session(
        &probe,
        Permissions::all_granted(),
        default_monitor(),
        Recorder::default(),
    );
    let mut events = session.subscribe();
    let mut handle = session.spawn();

    settle().await;
    assert_eq!(handle.snapshot().target_position, Some(FAR));

    probe.set_failing(true);
    sleep(Duration::from_secs(30)).await;
    assert_eq!(probe.poll_calls(), 4);
    assert_eq!(handle.snapshot().target_position, Some(FAR));

    let failures: Vec<u32> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            Event::PollFailed {
                consecutive_failures,
                ..
            } => Some(consecutive_failures),
            _ => None,
        })
        .collect();
    assert_eq!(failures, vec![1, 2, 3]);

    probe.set_failing(false);
    probe.move_target(ORIGIN);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(handle.snapshot().target_position, Some(ORIGIN));

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn acquisition_failure_still_polls() {
    let probe = Probe::new(None, Some(ORIGIN));
    let sink = Recorder::default();
    let session = session(&probe, Permissions::all_granted(), default_monitor(), sink.clone());
    let mut events = session.subscribe();
    let mut handle = session.spawn();

    sleep(Duration::from_secs(25)).await;

    let snap = handle.snapshot();
    assert_eq!(snap.phase, MonitorPhase::Active);
    assert_eq!(snap.user_position, None);
    assert_eq!(snap.target_position, Some(ORIGIN));
    assert_eq!(snap.distance_km, None);
    assert_eq!(probe.poll_calls(), 3);
    assert_eq!(sink.count(), 0);
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, Event::UserPositionUnavailable { .. })));

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn sink_failure_does_not_interrupt_polling() {
    let probe = Probe::new(Some(ORIGIN), Some(ORIGIN));
    let sink = Recorder::broken();
    let session = session(&probe, Permissions::all_granted(), default_monitor(), sink.clone());
    let mut events = session.subscribe();
    let mut handle = session.spawn();

    sleep(Duration::from_secs(25)).await;

    assert_eq!(probe.poll_calls(), 3);
    assert_eq!(sink.count(), 3);
    let failed = drain(&mut events)
        .iter()
        .filter(|e| matches!(e, Event::NotificationFailed { .. }))
        .count();
    assert_eq!(failed, 3);
    assert_eq!(handle.snapshot().phase, MonitorPhase::Active);

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn once_per_episode_policy_notifies_per_crossing() {
    let probe = Probe::new(Some(ORIGIN), Some(ORIGIN));
    let sink = Recorder::default();
    let monitor = default_monitor().with_policy(AlertPolicy::OncePerEpisode);
    let mut handle = session(&probe, Permissions::all_granted(), monitor, sink.clone()).spawn();

    sleep(Duration::from_secs(35)).await;
    assert_eq!(sink.count(), 1);

    probe.move_target(FAR);
    sleep(Duration::from_secs(10)).await;
    probe.move_target(ORIGIN);
    sleep(Duration::from_secs(10)).await;
    assert_eq!(sink.count(), 2);

    handle.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn teardown_cancels_further_ticks() {
    let probe = Probe::new(Some(ORIGIN), Some(ORIGIN));
    let sink = Recorder::default();
    let session = session(&probe, Permissions::all_granted(), default_monitor(), sink.clone());
    let mut events = session.subscribe();
    let mut handle = session.spawn();

    sleep(Duration::from_secs(15)).await;
    let monitor = handle.stop().await.expect("first stop returns the monitor");
    assert_eq!(monitor.phase(), MonitorPhase::Active);

    let polls = probe.poll_calls();
    let sent = sink.count();
    assert_eq!(polls, 2);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(probe.poll_calls(), polls);
    assert_eq!(sink.count(), sent);

    // Idempotent.
    assert!(handle.stop().await.is_none());
    assert!(handle.is_stopped());
    assert!(!handle.set_alerts_enabled(false));

    let stopped = drain(&mut events)
        .iter()
        .filter(|e| matches!(e, Event::MonitorStopped { .. }))
        .count();
    assert_eq!(stopped, 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_before_active_is_safe() {
    let probe = Probe::new(Some(ORIGIN), Some(ORIGIN));
    let mut handle = MonitorSession::new(
        default_monitor(),
        Source(Arc::clone(&probe)),
        PendingGate,
        Recorder::default(),
    )
    .spawn();

    sleep(Duration::from_secs(30)).await;
    let monitor = handle.stop().await.unwrap();

    assert_eq!(monitor.phase(), MonitorPhase::Initializing);
    assert_eq!(probe.own_calls(), 0);
    assert_eq!(probe.poll_calls(), 0);
    assert!(handle.stop().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_stops_polling() {
    let probe = Probe::new(Some(ORIGIN), Some(ORIGIN));
    let handle = session(
        &probe,
        Permissions::all_granted(),
        default_monitor(),
        Recorder::default(),
    )
    .spawn();

    settle().await;
    drop(handle);
    settle().await;
    let polls = probe.poll_calls();

    sleep(Duration::from_secs(60)).await;
    assert_eq!(probe.poll_calls(), polls);
}
