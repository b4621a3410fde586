//! TOML-based application configuration.
//!
//! Stores the startup values for a monitoring session:
//! - Alert toggle, threshold and its floor/step, poll cadence, alert policy
//! - The device location used in place of a GPS fix
//! - Position feed endpoint and timeout
//! - Notification permission and optional webhook
//!
//! Runtime changes made during a session are not written back.
//! Configuration is stored at `~/.config/issnear/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::geo::Coordinate;
use crate::monitor::{
    AlertPolicy, MonitorConfig, ProximityMonitor, SessionSettings, ThresholdLimits, DEFAULT_THRESHOLD_KM,
    THRESHOLD_FLOOR_KM, THRESHOLD_STEP_KM,
};
use crate::permissions::{PermissionState, Permissions};
use crate::position::DEFAULT_ENDPOINT;

/// Monitor defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSection {
    #[serde(default = "default_true")]
    pub alerts_enabled: bool,
    #[serde(default = "default_threshold_km")]
    pub threshold_km: f64,
    #[serde(default = "default_threshold_floor_km")]
    pub threshold_floor_km: f64,
    #[serde(default = "default_threshold_step_km")]
    pub threshold_step_km: f64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default)]
    pub alert_policy: AlertPolicy,
}

/// Device location. Location permission counts as granted only when
/// enabled and both coordinates are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Tracked object feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// When set, alerts are POSTed here instead of written to the log.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/issnear/config.toml`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub monitor: MonitorSection,
    #[serde(default)]
    pub location: LocationConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_true() -> bool {
    true
}
fn default_threshold_km() -> f64 {
    DEFAULT_THRESHOLD_KM
}
fn default_threshold_floor_km() -> f64 {
    THRESHOLD_FLOOR_KM
}
fn default_threshold_step_km() -> f64 {
    THRESHOLD_STEP_KM
}
fn default_poll_interval_secs() -> u64 {
    10
}
fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.into()
}
fn default_timeout_secs() -> u64 {
    10
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            alerts_enabled: true,
            threshold_km: default_threshold_km(),
            threshold_floor_km: default_threshold_floor_km(),
            threshold_step_km: default_threshold_step_km(),
            poll_interval_secs: default_poll_interval_secs(),
            alert_policy: AlertPolicy::default(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            latitude: None,
            longitude: None,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webhook_url: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() || key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => value
                        .parse::<bool>()
                        .map(serde_json::Value::Bool)
                        .map_err(|e| invalid(e.to_string()))?,
                    serde_json::Value::Number(_) => parse_number(value).ok_or_else(|| {
                        invalid(format!("cannot parse '{value}' as number"))
                    })?,
                    // Optional values: "none" clears, numbers stay numbers.
                    serde_json::Value::Null => {
                        if value.eq_ignore_ascii_case("none") || value.is_empty() {
                            serde_json::Value::Null
                        } else {
                            parse_number(value)
                                .unwrap_or_else(|| serde_json::Value::String(value.into()))
                        }
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    serde_json::Value::String(_) => {
                        if value.eq_ignore_ascii_case("none") {
                            serde_json::Value::Null
                        } else {
                            serde_json::Value::String(value.into())
                        }
                    }
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Location of the config file, creating its directory if needed.
    pub fn file_path() -> Result<PathBuf, ConfigError> {
        Self::path()
    }

    /// Load from disk or write and return the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed, or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value in memory. The result is validated; on error the
    /// config is left untouched.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a config value by key and save. Returns error if key is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed
    /// or fails validation, or the config cannot be saved.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Check ranges and URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let positive = |key: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(invalid(key, format!("{v} must be a positive number")))
            }
        };

        positive("monitor.threshold_km", self.monitor.threshold_km)?;
        positive("monitor.threshold_floor_km", self.monitor.threshold_floor_km)?;
        positive("monitor.threshold_step_km", self.monitor.threshold_step_km)?;
        if self.monitor.poll_interval_secs == 0 {
            return Err(invalid("monitor.poll_interval_secs", "must be at least 1".into()));
        }
        if self.feed.timeout_secs == 0 {
            return Err(invalid("feed.timeout_secs", "must be at least 1".into()));
        }
        if self.notifications.timeout_secs == 0 {
            return Err(invalid("notifications.timeout_secs", "must be at least 1".into()));
        }

        // A half-configured location is allowed; it just counts as absent.
        if let Some(lat) = self.location.latitude {
            Coordinate::try_new(lat, 0.0).map_err(|e| invalid("location.latitude", e.to_string()))?;
        }
        if let Some(lon) = self.location.longitude {
            Coordinate::try_new(0.0, lon).map_err(|e| invalid("location.longitude", e.to_string()))?;
        }

        url::Url::parse(&self.feed.endpoint)
            .map_err(|e| invalid("feed.endpoint", e.to_string()))?;
        if let Some(webhook) = &self.notifications.webhook_url {
            url::Url::parse(webhook)
                .map_err(|e| invalid("notifications.webhook_url", e.to_string()))?;
        }
        Ok(())
    }

    // ── Session wiring ───────────────────────────────────────────────

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            alerts_enabled: self.monitor.alerts_enabled,
            threshold_km: self.monitor.threshold_km,
        }
    }

    pub fn threshold_limits(&self) -> ThresholdLimits {
        ThresholdLimits {
            floor_km: self.monitor.threshold_floor_km,
            step_km: self.monitor.threshold_step_km,
        }
    }

    /// A fresh monitor with this config's threshold, limits and policy.
    pub fn build_monitor(&self) -> ProximityMonitor {
        ProximityMonitor::bounded(self.monitor_config(), self.threshold_limits())
            .with_policy(self.monitor.alert_policy)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            poll_interval: Duration::from_secs(self.monitor.poll_interval_secs),
        }
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed.timeout_secs)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_secs(self.notifications.timeout_secs)
    }

    pub fn home_location(&self) -> Option<Coordinate> {
        match (self.location.latitude, self.location.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    /// Permission answers implied by the configuration.
    pub fn permissions(&self) -> Permissions {
        let location = self.location.enabled && self.home_location().is_some();
        Permissions::new(
            PermissionState::from_granted(location),
            PermissionState::from_granted(self.notifications.enabled),
        )
    }
}

fn parse_number(value: &str) -> Option<serde_json::Value> {
    if let Ok(n) = value.parse::<u64>() {
        return Some(serde_json::Value::Number(n.into()));
    }
    value
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let cfg = Config::default();
        assert!(cfg.monitor.alerts_enabled);
        assert_eq!(cfg.monitor.threshold_km, 500.0);
        assert_eq!(cfg.monitor.threshold_floor_km, 50.0);
        assert_eq!(cfg.monitor.threshold_step_km, 50.0);
        assert_eq!(cfg.monitor.poll_interval_secs, 10);
        assert_eq!(cfg.feed.endpoint, "http://api.open-notify.org/iss-now.json");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let cfg: Config = toml::from_str("[monitor]\nthreshold_km = 750.0\n").unwrap();
        assert_eq!(cfg.monitor.threshold_km, 750.0);
        assert!(cfg.monitor.alerts_enabled);
        assert_eq!(cfg.feed, FeedConfig::default());
    }

    #[test]
    fn load_writes_default_when_missing_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg, Config::default());

        cfg.set_value("location.latitude", "51.5074").unwrap();
        cfg.set_value("location.longitude", "-0.1278").unwrap();
        cfg.set_value("monitor.alert_policy", "once_per_episode").unwrap();
        cfg.save_to(&path).unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.home_location(), Some(Coordinate::new(51.5074, -0.1278)));
        assert_eq!(reloaded.monitor.alert_policy, AlertPolicy::OncePerEpisode);
    }

    #[test]
    fn get_by_dotted_key() {
        let cfg = Config::default();
        assert_eq!(cfg.get("monitor.threshold_km").as_deref(), Some("500.0"));
        assert_eq!(cfg.get("monitor.alerts_enabled").as_deref(), Some("true"));
        assert_eq!(cfg.get("location.latitude").as_deref(), Some("null"));
        assert_eq!(cfg.get("nope"), None);
    }

    #[test]
    fn set_rejects_unknown_and_invalid() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set_value("monitor.colour", "red"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.set_value("monitor.threshold_km", "lots"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.set_value("monitor.threshold_km", "-5").is_err());
        assert!(cfg.set_value("feed.endpoint", "not a url").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn half_a_location_counts_as_absent() {
        let mut cfg = Config::default();
        cfg.location.latitude = Some(10.0);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.home_location(), None);
        assert_eq!(cfg.permissions().location, PermissionState::Denied);

        cfg.location.latitude = Some(95.0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn webhook_can_be_set_and_cleared() {
        let mut cfg = Config::default();
        cfg.set_value("notifications.webhook_url", "https://example.com/hook")
            .unwrap();
        assert_eq!(
            cfg.notifications.webhook_url.as_deref(),
            Some("https://example.com/hook")
        );
        cfg.set_value("notifications.webhook_url", "none").unwrap();
        assert_eq!(cfg.notifications.webhook_url, None);
    }

    #[test]
    fn built_monitor_uses_configured_floor() {
        let mut cfg = Config::default();
        cfg.set_value("monitor.threshold_floor_km", "10").unwrap();
        cfg.set_value("monitor.threshold_km", "20").unwrap();
        cfg.set_value("monitor.alert_policy", "once_per_episode").unwrap();

        let monitor = cfg.build_monitor();
        assert_eq!(monitor.config().threshold_km, 20.0);
        assert_eq!(monitor.limits().floor_km, 10.0);
        assert_eq!(monitor.policy(), AlertPolicy::OncePerEpisode);
    }

    #[test]
    fn permissions_follow_location_and_notifications() {
        let mut cfg = Config::default();
        assert_eq!(cfg.permissions().location, PermissionState::Denied);
        assert_eq!(cfg.permissions().notifications, PermissionState::Granted);

        cfg.location.latitude = Some(1.0);
        cfg.location.longitude = Some(2.0);
        assert_eq!(cfg.permissions().location, PermissionState::Granted);

        cfg.location.enabled = false;
        cfg.notifications.enabled = false;
        assert_eq!(
            cfg.permissions(),
            Permissions::new(PermissionState::Denied, PermissionState::Denied)
        );
    }
}
