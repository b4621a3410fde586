use std::time::Duration;

use clap::Args;
use issnear_core::{
    CompositeSource, Config, Event, FixedLocation, LogSink, MonitorHandle, MonitorSession,
    MonitorSnapshot, Notification, NotificationSink, NotifyError, OpenNotifyClient,
    PresetPermissionGate, WebhookSink,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use super::{runtime, CommandResult};

#[derive(Args)]
pub struct WatchArgs {
    /// Proximity threshold in km (overrides config)
    #[arg(long)]
    threshold: Option<f64>,
    /// Start with alerts switched off
    #[arg(long)]
    no_alerts: bool,
    /// Device latitude (overrides config)
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,
    /// Device longitude (overrides config)
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
    /// Poll interval in seconds (overrides config)
    #[arg(long)]
    interval: Option<u64>,
    /// Stop after this many seconds
    #[arg(long = "for", value_name = "SECS")]
    duration: Option<u64>,
    /// Print events as JSON lines instead of status text
    #[arg(long)]
    json: bool,
}

/// Alerts go to the webhook when one is configured, otherwise to the log.
enum ConfiguredSink {
    Log(LogSink),
    Webhook(WebhookSink),
}

impl NotificationSink for ConfiguredSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        match self {
            ConfiguredSink::Log(sink) => sink.deliver(notification).await,
            ConfiguredSink::Webhook(sink) => sink.deliver(notification).await,
        }
    }
}

pub fn run(args: WatchArgs) -> CommandResult {
    let mut config = Config::load()?;
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        config.location.enabled = true;
        config.location.latitude = Some(lat);
        config.location.longitude = Some(lon);
    }
    if let Some(km) = args.threshold {
        config.monitor.threshold_km = km;
    }
    if args.no_alerts {
        config.monitor.alerts_enabled = false;
    }
    if let Some(secs) = args.interval {
        config.monitor.poll_interval_secs = secs;
    }
    config.validate()?;

    let duration = args.duration.map(Duration::from_secs);
    let rt = runtime()?;
    let result = rt.block_on(watch(config, duration, args.json));
    // The stdin reader sits on a blocking thread until the next line, so
    // dropping the runtime normally would wait for the user to press Enter.
    rt.shutdown_background();
    result
}

async fn watch(config: Config, duration: Option<Duration>, json: bool) -> CommandResult {
    let feed = OpenNotifyClient::new(config.feed.endpoint.clone(), config.feed_timeout())?;
    let source = CompositeSource::new(FixedLocation::new(config.home_location()), feed);
    let gate = PresetPermissionGate::new(config.permissions());
    let sink = match &config.notifications.webhook_url {
        Some(url) => ConfiguredSink::Webhook(WebhookSink::new(
            url.clone(),
            config.notification_timeout(),
        )?),
        None => ConfiguredSink::Log(LogSink),
    };
    let session = MonitorSession::new(config.build_monitor(), source, gate, sink)
        .with_settings(config.session_settings());
    let mut events = session.subscribe();
    let mut handle = session.spawn();
    info!(endpoint = %config.feed.endpoint, "watching");

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event, json)?,
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output fell behind"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !apply_command(line.trim(), &handle, json)? {
                        break;
                    }
                }
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    stdin_open = false;
                }
            },
        }
    }

    handle.stop().await;
    while let Ok(event) = events.try_recv() {
        print_event(&event, json)?;
    }
    Ok(())
}

/// Handle one stdin line. Returns false when the user asked to quit.
fn apply_command(line: &str, handle: &MonitorHandle, json: bool) -> Result<bool, serde_json::Error> {
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (None, _) => {}
        (Some("+"), None) => {
            handle.increase_threshold();
        }
        (Some("-"), None) => {
            handle.decrease_threshold();
        }
        (Some("on"), None) => {
            handle.set_alerts_enabled(true);
        }
        (Some("off"), None) => {
            handle.set_alerts_enabled(false);
        }
        (Some("threshold" | "t"), Some(km)) => match km.parse::<f64>() {
            Ok(km) => {
                handle.set_threshold(km);
            }
            Err(_) => eprintln!("not a number: {km}"),
        },
        (Some("status" | "s"), None) => print_status(&handle.snapshot(), json)?,
        (Some("quit" | "q"), None) => return Ok(false),
        _ => eprintln!("commands: + | - | on | off | threshold <km> | status | quit"),
    }
    Ok(true)
}

fn print_event(event: &Event, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    let at = event.at().format("%H:%M:%S");
    for line in describe_event(event) {
        println!("[{at}] {line}");
    }
    Ok(())
}

/// Human-readable lines for one event, built from the event alone.
fn describe_event(event: &Event) -> Vec<String> {
    match event {
        Event::Degraded { .. } => {
            vec!["Location permission not granted; position tracking unavailable".into()]
        }
        Event::UserPositionAcquired { position, .. } => {
            vec![format!("Your location: {position}")]
        }
        Event::UserPositionUnavailable { reason, .. } => {
            vec![format!("Your location is not available: {reason}")]
        }
        Event::TargetUpdated {
            position,
            distance_km,
            ..
        } => {
            let mut lines = vec![format!("ISS position: {position}")];
            if let Some(d) = distance_km {
                lines.push(format!("Distance: {d:.1} km"));
            }
            lines
        }
        Event::PollFailed {
            consecutive_failures,
            ..
        } => vec![format!(
            "ISS position update failed ({consecutive_failures} in a row)"
        )],
        Event::ConfigChanged {
            alerts_enabled,
            threshold_km,
            ..
        } => vec![format!(
            "Alerts {}, threshold {threshold_km:.0} km",
            if *alerts_enabled { "on" } else { "off" }
        )],
        Event::ProximityAlert { distance_km, .. } => {
            vec![Notification::proximity(*distance_km).body]
        }
        Event::NotificationFailed { reason, .. } => {
            vec![format!("Notification failed: {reason}")]
        }
        Event::MonitorStopped { .. } => vec!["Stopped".into()],
        Event::PermissionsResolved { .. } | Event::MonitorActive { .. } => Vec::new(),
    }
}

fn print_status(snapshot: &MonitorSnapshot, json: bool) -> Result<(), serde_json::Error> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }
    println!("Your location: {}", snapshot.user_status());
    println!("ISS position:  {}", snapshot.target_status());
    if let Some(d) = snapshot.distance_status() {
        println!("{d}");
    }
    println!(
        "Alerts: {} | threshold: {:.0} km",
        if snapshot.config.alerts_enabled { "on" } else { "off" },
        snapshot.config.threshold_km
    );
    Ok(())
}
