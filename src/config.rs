use chrono::{DateTime, Utc};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::LogBounds;
use crate::error::ControlError;
use crate::output::DEFAULT_NMEA_PORT;

/// NMEA log replay configuration
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Log file containing NMEA0183/AIS sentences
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Host to send sentences to (default from settings, else localhost)
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port to send sentences to (default from settings, else 10110)
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Playback speed multiplier, 1.0 is real time
    #[arg(long, default_value_t = 1.0)]
    pub speed: f64,

    /// Longest gap between fixes replayed as recorded, in seconds; longer
    /// gaps are shortened to it
    #[arg(long, value_name = "SECONDS", default_value = "60", value_parser = parse_seconds)]
    pub max_gap: Duration,

    /// Only replay after this point: an RFC 3339 time or a percentage like 25%
    #[arg(long, value_name = "TIME|PERCENT")]
    pub window_start: Option<TimePoint>,

    /// Only replay before this point: an RFC 3339 time or a percentage like 75%
    #[arg(long, value_name = "TIME|PERCENT")]
    pub window_end: Option<TimePoint>,

    /// Skip ahead to this point before emitting anything
    #[arg(long, value_name = "TIME|PERCENT")]
    pub target: Option<TimePoint>,

    /// Start paused
    #[arg(long, default_value_t = false)]
    pub paused: bool,

    /// Seconds between status log lines, 0 to disable
    #[arg(long, default_value_t = 30)]
    pub status_interval: u64,

    /// Verbose logging (DEBUG level)
    #[arg(long, short, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// `host:port` to connect to, falling back to persisted settings
    pub fn destination(&self, settings: &ReplaySettings) -> String {
        let host = self.host.as_deref().unwrap_or(&settings.host);
        let port = self.port.unwrap_or(settings.port);
        format!("{}:{}", host, port)
    }
}

/// Parse a positive number of seconds
fn parse_seconds(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.trim().parse().map_err(|e| format!("invalid seconds '{}': {}", s, e))?;
    if secs <= 0.0 {
        return Err(format!("must be positive, got {}", s));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("invalid seconds '{}': {}", s, e))
}

/// A point in the log given either absolutely or as a scrubber percentage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimePoint {
    At(DateTime<Utc>),
    Percent(f64),
}

impl TimePoint {
    /// Resolve to an absolute time within a scanned log
    pub fn resolve(&self, bounds: &LogBounds) -> Result<DateTime<Utc>, ControlError> {
        match *self {
            TimePoint::At(ts) => Ok(ts),
            TimePoint::Percent(p) => bounds.at_percentage(p),
        }
    }
}

impl FromStr for TimePoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(percent) = s.strip_suffix('%') {
            return percent
                .trim()
                .parse::<f64>()
                .map(TimePoint::Percent)
                .map_err(|e| format!("invalid percentage '{}': {}", s, e));
        }
        DateTime::parse_from_rfc3339(s)
            .map(|ts| TimePoint::At(ts.with_timezone(&Utc)))
            .map_err(|e| format!("invalid time '{}': {}", s, e))
    }
}

/// Persisted connection defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    pub host: String,
    pub port: u16,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_NMEA_PORT,
        }
    }
}

impl ReplaySettings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("nmea-replay").join("settings.json"))
    }

    /// Load settings, falling back to defaults when missing or unreadable
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::default(),
        }
    }

    fn load_from(path: &std::path::Path) -> Self {
        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|contents| serde_json::from_str(&contents).map_err(|e| e.to_string()));
        match parsed {
            Ok(settings) => {
                debug!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("Ignoring settings in {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}
