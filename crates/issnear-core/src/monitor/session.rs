//! Monitoring session: the task that drives a [`ProximityMonitor`].
//!
//! One spawned task owns the monitor, the position source, the permission
//! gate and the notification sink. Startup is sequential (permissions, then
//! the device fix); afterwards the task selects over the poll timer, the
//! control channel and the shutdown signal. Every monitor mutation happens
//! on that task, so a tick's update and its evaluation are never
//! interleaved with another tick.
//!
//! The [`MonitorHandle`] returned by [`MonitorSession::spawn`] is the only
//! way in: runtime controls, snapshots, event subscriptions and teardown.
//! Dropping the handle also tears the session down.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::events::Event;
use crate::notify::{self, NotificationSink};
use crate::permissions::{resolve_permissions, PermissionGate};
use crate::position::PositionSource;

use super::engine::{MonitorPhase, MonitorSnapshot, ProximityMonitor};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub poll_interval: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Runtime adjustments sent from the user-facing layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Control {
    SetAlertsEnabled(bool),
    SetThreshold(f64),
    IncreaseThreshold,
    DecreaseThreshold,
}

pub struct MonitorSession<P, G, N> {
    monitor: ProximityMonitor,
    source: P,
    gate: G,
    sink: N,
    settings: SessionSettings,
    events: broadcast::Sender<Event>,
}

impl<P, G, N> MonitorSession<P, G, N>
where
    P: PositionSource + 'static,
    G: PermissionGate + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(monitor: ProximityMonitor, source: P, gate: G, sink: N) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            monitor,
            source,
            gate,
            sink,
            settings: SessionSettings::default(),
            events,
        }
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Subscribe before spawning to see the startup events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Start the session on the current tokio runtime.
    pub fn spawn(self) -> MonitorHandle {
        let (controls, control_rx) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let (snapshot_tx, snapshot) = watch::channel(self.monitor.snapshot());
        let events = self.events.clone();

        let task = tokio::spawn(self.run(control_rx, shutdown_rx, snapshot_tx));

        MonitorHandle {
            controls,
            shutdown,
            events,
            snapshot,
            task: Some(task),
        }
    }

    async fn run(
        mut self,
        mut controls: mpsc::UnboundedReceiver<Control>,
        mut shutdown: watch::Receiver<bool>,
        snapshot: watch::Sender<MonitorSnapshot>,
    ) -> ProximityMonitor {
        let permissions = tokio::select! {
            permissions = resolve_permissions(&self.gate) => permissions,
            _ = shutdown_requested(&mut shutdown) => return self.finish(&snapshot),
        };
        let events = self.monitor.resolve_permissions(permissions);
        self.publish(events, &snapshot).await;

        if self.monitor.phase() == MonitorPhase::Degraded {
            // Nothing to poll; keep accepting controls so the UI stays responsive.
            loop {
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown) => break,
                    Some(control) = controls.recv() => {
                        let events = self.apply(control);
                        self.publish(events, &snapshot).await;
                    }
                }
            }
            return self.finish(&snapshot);
        }

        let fix = tokio::select! {
            fix = self.source.acquire_own_position() => fix,
            _ = shutdown_requested(&mut shutdown) => return self.finish(&snapshot),
        };
        let events = self.monitor.record_own_position(fix);
        self.publish(events, &snapshot).await;

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_requested(&mut shutdown) => break,
                Some(control) = controls.recv() => {
                    let events = self.apply(control);
                    self.publish(events, &snapshot).await;
                }
                _ = ticker.tick() => {
                    let polled = tokio::select! {
                        result = self.source.poll_target_position() => Some(result),
                        _ = shutdown_requested(&mut shutdown) => None,
                    };
                    let Some(result) = polled else { break };
                    let events = self.monitor.apply_poll(result);
                    self.publish(events, &snapshot).await;
                }
            }
        }

        self.finish(&snapshot)
    }

    fn apply(&mut self, control: Control) -> Vec<Event> {
        match control {
            Control::SetAlertsEnabled(enabled) => self.monitor.set_alerts_enabled(enabled),
            Control::SetThreshold(km) => self.monitor.set_threshold(km),
            Control::IncreaseThreshold => self.monitor.increase_threshold(),
            Control::DecreaseThreshold => self.monitor.decrease_threshold(),
        }
    }

    async fn publish(&self, events: Vec<Event>, snapshot: &watch::Sender<MonitorSnapshot>) {
        snapshot.send_replace(self.monitor.snapshot());

        for event in events {
            let alert = match &event {
                Event::ProximityAlert { distance_km, .. } => Some(*distance_km),
                _ => None,
            };
            // No subscribers is fine.
            let _ = self.events.send(event);

            if let Some(distance_km) = alert {
                if let Err(e) = notify::fire(&self.sink, distance_km).await {
                    let _ = self.events.send(Event::NotificationFailed {
                        reason: e.to_string(),
                        at: Utc::now(),
                    });
                }
            }
        }
    }

    fn finish(self, snapshot: &watch::Sender<MonitorSnapshot>) -> ProximityMonitor {
        snapshot.send_replace(self.monitor.snapshot());
        let _ = self.events.send(Event::MonitorStopped { at: Utc::now() });
        info!("proximity monitor stopped");
        self.monitor
    }
}

/// Resolves once shutdown has been signalled or the handle is gone.
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        let stop = *rx.borrow_and_update();
        if stop {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Control surface of a running session.
pub struct MonitorHandle {
    controls: mpsc::UnboundedSender<Control>,
    shutdown: watch::Sender<bool>,
    events: broadcast::Sender<Event>,
    snapshot: watch::Receiver<MonitorSnapshot>,
    task: Option<JoinHandle<ProximityMonitor>>,
}

impl MonitorHandle {
    // ── Controls ─────────────────────────────────────────────────────

    /// Returns false once the session has stopped.
    pub fn send(&self, control: Control) -> bool {
        self.controls.send(control).is_ok()
    }

    pub fn set_alerts_enabled(&self, enabled: bool) -> bool {
        self.send(Control::SetAlertsEnabled(enabled))
    }

    pub fn set_threshold(&self, km: f64) -> bool {
        self.send(Control::SetThreshold(km))
    }

    pub fn increase_threshold(&self) -> bool {
        self.send(Control::IncreaseThreshold)
    }

    pub fn decrease_threshold(&self) -> bool {
        self.send(Control::DecreaseThreshold)
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn snapshot(&self) -> MonitorSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver that wakes on every snapshot change.
    pub fn watch(&self) -> watch::Receiver<MonitorSnapshot> {
        self.snapshot.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_none()
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Stop polling and wait for the session task to finish.
    ///
    /// Returns the final monitor on the first call and `None` afterwards.
    /// Safe at any point, including while permissions or the device fix are
    /// still pending.
    pub async fn stop(&mut self) -> Option<ProximityMonitor> {
        let task = self.task.take()?;
        // Errors only if the task already exited.
        let _ = self.shutdown.send(true);
        match task.await {
            Ok(monitor) => Some(monitor),
            Err(e) => {
                warn!(error = %e, "monitor task ended abnormally");
                None
            }
        }
    }
}
