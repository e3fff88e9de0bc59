//! YAML configuration for hostwatch.
//!
//! Every section has defaults matching the reference dashboard, so an empty
//! file (or no file at all) yields a working simulator setup:
//!
//! ```yaml
//! feed:
//!   kind: tail
//!   path: /var/log/mylog.log
//! stream:
//!   history_capacity: 100
//!   alert_timeout_ms: 10000
//! sound:
//!   asset: /usr/share/hostwatch/alert.wav
//!   volume: 0.8
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HostwatchError, Result};

/// Hosts the simulator draws nagios notifications from.
pub const DEFAULT_IMPORTANT_HOSTS: &[&str] = &[
    "UFO_MOVIEZ_PVT_LTD_1Gig_ILL",
    "Pharma_Access_Pvt_Ltd_10G_SW",
    "Infinity_Cars_Pvt_Ltd_Turbhe_CKT_5503_Primay_Nerul_10G_SW",
    "AR_Gold_Pvt_Ltd_Primary_Fiber_MKT",
    "Skanem_10G_SW",
    "Work_Store_Limited_Primary_From_BMC_SW",
];

/// Log file the tail feed follows when none is configured.
pub const DEFAULT_TAIL_PATH: &str = "/var/log/mylog.log";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostwatchConfig {
    /// Where events come from
    pub feed: FeedConfig,

    /// History and alert policy
    pub stream: StreamConfig,

    /// Audible notification
    pub sound: SoundConfig,
}

impl HostwatchConfig {
    /// Default config file location: `~/.hostwatch/config.yaml`.
    pub fn default_path() -> Result<PathBuf> {
        Ok(crate::logging::default_home_dir()?.join("config.yaml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default location is
    /// tried and a missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HostwatchError::ConfigNotFound {
                    path,
                    source: Some(e),
                });
            }
            Err(e) => return Err(HostwatchError::io("reading config", path, e)),
        };

        let config = Self::from_yaml(&text).map_err(|e| match e {
            HostwatchError::ConfigInvalid { message, .. } => HostwatchError::ConfigInvalid {
                path: path.clone(),
                message,
            },
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| HostwatchError::ConfigInvalid {
                path: PathBuf::new(),
                message: e.to_string(),
            })?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        self.stream.validate()?;
        self.sound.validate()?;
        self.feed.validate()
    }

    /// Replace the feed section.
    pub fn with_feed(mut self, feed: FeedConfig) -> Self {
        self.feed = feed;
        self
    }

    /// Set the history capacity.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.stream.history_capacity = capacity;
        self
    }

    /// Set the alert auto-expiry timeout.
    pub fn with_alert_timeout(mut self, timeout: Duration) -> Self {
        self.stream.alert_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Disable sound entirely.
    pub fn muted(mut self) -> Self {
        self.sound.enabled = false;
        self
    }
}

/// Feed source selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedConfig {
    /// Local simulator with the reference emission policy
    Simulator(SimulatorConfig),

    /// Follow a log file, classifying lines by error patterns
    Tail {
        path: PathBuf,
        #[serde(default = "default_tail_poll_ms")]
        poll_interval_ms: u64,
    },

    /// Newline-delimited JSON messages over TCP
    Stream { address: String },

    /// HTTP listener for Nagios webhooks
    Webhook { bind: SocketAddr },
}

fn default_tail_poll_ms() -> u64 {
    1000
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig::Simulator(SimulatorConfig::default())
    }
}

impl FeedConfig {
    fn validate(&self) -> Result<()> {
        match self {
            FeedConfig::Simulator(sim) => sim.validate(),
            FeedConfig::Tail {
                poll_interval_ms, ..
            } if *poll_interval_ms == 0 => Err(HostwatchError::validation(
                "feed.poll_interval_ms must be non-zero",
            )),
            FeedConfig::Stream { address } if address.trim().is_empty() => Err(
                HostwatchError::validation("feed.address must not be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Short label used in logs.
    pub fn label(&self) -> String {
        match self {
            FeedConfig::Simulator(_) => "simulator".to_string(),
            FeedConfig::Tail { path, .. } => format!("tail:{}", path.display()),
            FeedConfig::Stream { address } => format!("tcp://{address}"),
            FeedConfig::Webhook { bind } => format!("webhook:{bind}"),
        }
    }
}

impl FromStr for FeedConfig {
    type Err = HostwatchError;

    /// Parse the compact `--feed` form: `simulator`, `tail:PATH`,
    /// `tcp://HOST:PORT`, `webhook:ADDR`.
    fn from_str(spec: &str) -> Result<Self> {
        let invalid = |message: &str| HostwatchError::FeedSpec {
            spec: spec.to_string(),
            message: message.to_string(),
        };

        if spec == "simulator" || spec == "sim" {
            return Ok(FeedConfig::Simulator(SimulatorConfig::default()));
        }
        if let Some(path) = spec.strip_prefix("tail:") {
            if path.is_empty() {
                return Err(invalid("missing file path"));
            }
            return Ok(FeedConfig::Tail {
                path: PathBuf::from(path),
                poll_interval_ms: default_tail_poll_ms(),
            });
        }
        if spec == "tail" {
            return Ok(FeedConfig::Tail {
                path: PathBuf::from(DEFAULT_TAIL_PATH),
                poll_interval_ms: default_tail_poll_ms(),
            });
        }
        if let Some(address) = spec.strip_prefix("tcp://") {
            if !address.contains(':') {
                return Err(invalid("expected HOST:PORT"));
            }
            return Ok(FeedConfig::Stream {
                address: address.to_string(),
            });
        }
        if let Some(bind) = spec.strip_prefix("webhook:") {
            let bind = bind
                .parse::<SocketAddr>()
                .map_err(|e| invalid(&format!("bad listen address: {e}")))?;
            return Ok(FeedConfig::Webhook { bind });
        }
        Err(invalid("unknown feed kind"))
    }
}

/// Simulator emission policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// RNG seed for reproducible runs
    pub seed: Option<u64>,
    /// Interval between generic log events
    pub log_interval_ms: u64,
    /// Interval between alert rolls
    pub alert_interval_ms: u64,
    /// Chance an alert roll produces a critical event
    pub alert_probability: f64,
    /// Share of critical events attributed to nagios (rest are system)
    pub nagios_share: f64,
    /// Chance a critical event is followed by a recovery
    pub recovery_probability: f64,
    /// Lower bound of the recovery delay
    pub recovery_delay_min_ms: u64,
    /// Upper bound of the recovery delay
    pub recovery_delay_max_ms: u64,
    /// Nagios host roster
    pub hosts: Vec<String>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            log_interval_ms: 3_000,
            alert_interval_ms: 15_000,
            alert_probability: 0.3,
            nagios_share: 0.7,
            recovery_probability: 0.7,
            recovery_delay_min_ms: 5_000,
            recovery_delay_max_ms: 20_000,
            hosts: DEFAULT_IMPORTANT_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl SimulatorConfig {
    /// Use a fixed RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("alert_probability", self.alert_probability),
            ("nagios_share", self.nagios_share),
            ("recovery_probability", self.recovery_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(HostwatchError::validation(format!(
                    "simulator.{name} must be within 0..=1, got {p}"
                )));
            }
        }
        if self.log_interval_ms == 0 || self.alert_interval_ms == 0 {
            return Err(HostwatchError::validation("simulator intervals must be non-zero"));
        }
        if self.recovery_delay_min_ms > self.recovery_delay_max_ms {
            return Err(HostwatchError::validation(
                "simulator.recovery_delay_min_ms exceeds recovery_delay_max_ms",
            ));
        }
        if self.hosts.is_empty() {
            return Err(HostwatchError::validation("simulator.hosts must not be empty"));
        }
        Ok(())
    }
}

/// History and alert policy for the stream controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Maximum events kept in history
    pub history_capacity: usize,
    /// Auto-expiry of the active alert
    pub alert_timeout_ms: u64,
    /// Buffer of the change-notification channel
    pub update_buffer: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            alert_timeout_ms: 10_000,
            update_buffer: 256,
        }
    }
}

impl StreamConfig {
    /// Alert auto-expiry as a duration.
    pub fn alert_timeout(&self) -> Duration {
        Duration::from_millis(self.alert_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(HostwatchError::validation("stream.history_capacity must be at least 1"));
        }
        if self.alert_timeout_ms == 0 {
            return Err(HostwatchError::validation("stream.alert_timeout_ms must be non-zero"));
        }
        if self.update_buffer == 0 {
            return Err(HostwatchError::validation("stream.update_buffer must be at least 1"));
        }
        Ok(())
    }
}

/// Audible notification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundConfig {
    /// Whether to open an audio output at all
    pub enabled: bool,
    /// File path or http(s) URL of the alert sound
    pub asset: String,
    /// Master volume (0..=1)
    pub volume: f32,
    /// Stereo offset (-1 left ..= 1 right)
    pub pan: f32,
    /// Gain ramp from quiet to full at the start of each play
    pub attack_ms: u64,
    /// Extra plays for the highest urgency, relative to the first
    pub repeat_offsets_ms: Vec<u64>,
    /// Terminal bell as a second channel
    pub bell: BellConfig,
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            asset: "/alert.mp3".to_string(),
            volume: 1.0,
            pan: 0.0,
            attack_ms: 150,
            repeat_offsets_ms: vec![500, 1000],
            bell: BellConfig::default(),
        }
    }
}

impl SoundConfig {
    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(HostwatchError::validation(format!(
                "sound.volume must be within 0..=1, got {}",
                self.volume
            )));
        }
        if !(-1.0..=1.0).contains(&self.pan) {
            return Err(HostwatchError::validation(format!(
                "sound.pan must be within -1..=1, got {}",
                self.pan
            )));
        }
        Ok(())
    }
}

/// Terminal bell channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BellConfig {
    pub enabled: bool,
    /// Minimum seconds between two bells
    pub min_interval_secs: u64,
}

impl Default for BellConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_interval_secs: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_dashboard() {
        let config = HostwatchConfig::default();
        assert_eq!(config.stream.history_capacity, 100);
        assert_eq!(config.stream.alert_timeout(), Duration::from_secs(10));
        assert_eq!(config.sound.repeat_offsets_ms, vec![500, 1000]);
        assert!(matches!(config.feed, FeedConfig::Simulator(_)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = HostwatchConfig::from_yaml("").unwrap();
        assert_eq!(config.stream, StreamConfig::default());
    }

    #[test]
    fn test_yaml_feed_tail() {
        let yaml = "feed:\n  kind: tail\n  path: /tmp/x.log\nstream:\n  history_capacity: 5\n";
        let config = HostwatchConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.feed,
            FeedConfig::Tail {
                path: PathBuf::from("/tmp/x.log"),
                poll_interval_ms: 1000
            }
        );
        assert_eq!(config.stream.history_capacity, 5);
        assert_eq!(config.stream.alert_timeout_ms, 10_000);
    }

    #[test]
    fn test_validation_rejects_zero_capacity() {
        let err = HostwatchConfig::default().with_capacity(0).validate().unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_validation_rejects_zero_tail_poll() {
        let yaml = "feed:\n  kind: tail\n  path: /var/log/mylog.log\n  poll_interval_ms: 0\n";
        let err = HostwatchConfig::from_yaml(yaml).unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("poll_interval_ms"));

        let ok = "feed:\n  kind: tail\n  path: /var/log/mylog.log\n  poll_interval_ms: 250\n";
        assert!(HostwatchConfig::from_yaml(ok).is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_volume() {
        let err = HostwatchConfig::from_yaml("sound:\n  volume: 1.5\n").unwrap_err();
        assert!(err.to_string().contains("sound.volume"));
    }

    #[test]
    fn test_feed_spec_parsing() {
        assert!(matches!("simulator".parse::<FeedConfig>().unwrap(), FeedConfig::Simulator(_)));
        assert_eq!(
            "tcp://10.0.0.5:9000".parse::<FeedConfig>().unwrap(),
            FeedConfig::Stream {
                address: "10.0.0.5:9000".into()
            }
        );
        assert!(matches!(
            "webhook:0.0.0.0:5000".parse::<FeedConfig>().unwrap(),
            FeedConfig::Webhook { .. }
        ));
        assert!("tail:".parse::<FeedConfig>().is_err());
        assert!("ws://host/ws".parse::<FeedConfig>().is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_errors() {
        let err = HostwatchConfig::load(Some(Path::new("/nonexistent/hostwatch.yaml"))).unwrap_err();
        assert!(matches!(err, HostwatchError::ConfigNotFound { .. }));
    }

    #[test]
    fn test_load_from_file_reports_path_on_invalid_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"stream: [not, a, map]\n").unwrap();
        let err = HostwatchConfig::load(Some(file.path())).unwrap_err();
        match err {
            HostwatchError::ConfigInvalid { path, .. } => assert_eq!(path, file.path()),
            other => panic!("unexpected error: {other}"),
        }
    }
}
