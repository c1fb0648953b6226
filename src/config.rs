//! Configuration for lineboard, read from `lineboard.toml`.
//!
//! Layering is file → environment → CLI. The file is optional; every field
//! has a default so an empty file (or none at all) yields a working setup.
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! port = 8001
//! db_path = ".lineboard/lineboard.db"
//! dev = false
//! broadcast_capacity = 256
//!
//! [dashboard]
//! base_url = "http://127.0.0.1:8001"
//! poll_interval_secs = 5
//! fetch_timeout_secs = 10
//! percent_cap = 100.0   # 0 shows the raw percentage
//! top_performers = 5
//!
//! [targets]
//! "1" = 1000
//! "2" = 800
//! ```

use anyhow::{Context, Result};
use lineboard_common::{LineNumber, LineTargets};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "lineboard.toml";

/// Shift targets used when `[targets]` is absent.
pub const DEFAULT_TARGETS: [(LineNumber, u64); 8] = [
    (1, 1000),
    (2, 800),
    (3, 900),
    (4, 1100),
    (5, 950),
    (6, 1050),
    (7, 700),
    (8, 850),
];

/// Event Source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Enables permissive CORS for a locally served dashboard.
    #[serde(default)]
    pub dev: bool,
    /// Capacity of the WebSocket/SSE fan-out channel.
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
}

fn default_port() -> u16 {
    8001
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".lineboard/lineboard.db")
}

fn default_broadcast_capacity() -> usize {
    256
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            db_path: default_db_path(),
            dev: false,
            broadcast_capacity: default_broadcast_capacity(),
        }
    }
}

/// Dashboard client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Fallback refresh period when no push arrives.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Presentation cap for percent complete. `0` shows the raw value; read
    /// it through `percent_cap()`.
    #[serde(default = "default_percent_cap")]
    pub percent_cap: f64,
    #[serde(default = "default_top_performers")]
    pub top_performers: usize,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8001".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_percent_cap() -> f64 {
    100.0
}

fn default_top_performers() -> usize {
    5
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            poll_interval_secs: default_poll_interval_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            percent_cap: default_percent_cap(),
            top_performers: default_top_performers(),
        }
    }
}

impl DashboardSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// The cap to apply, or `None` for uncapped. Only a positive, finite
    /// `percent_cap` caps; `validate` warns about anything else but zero.
    pub fn percent_cap(&self) -> Option<f64> {
        (self.percent_cap.is_finite() && self.percent_cap > 0.0).then_some(self.percent_cap)
    }
}

/// Root of `lineboard.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineboardToml {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub dashboard: DashboardSection,
    /// Line number (as a TOML key) to shift target.
    #[serde(default)]
    pub targets: BTreeMap<String, u64>,
}

impl LineboardToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse lineboard.toml")
    }

    /// Load from `path`, or defaults if the file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize lineboard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `LINEBOARD_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("LINEBOARD_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = lookup("LINEBOARD_DB_PATH") {
            self.server.db_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("LINEBOARD_BASE_URL") {
            self.dashboard.base_url = url;
        }
    }

    /// The effective target table. Unparseable keys are skipped (see `validate`).
    pub fn line_targets(&self) -> LineTargets {
        if self.targets.is_empty() {
            return DEFAULT_TARGETS.into_iter().collect();
        }
        self.targets
            .iter()
            .filter_map(|(key, target)| parse_line_key(key).map(|line| (line, *target)))
            .collect()
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for key in self.targets.keys() {
            if parse_line_key(key).is_none() {
                warnings.push(format!(
                    "Invalid line '{}' in [targets]: expected a positive line number",
                    key
                ));
            }
        }

        if self.dashboard.poll_interval_secs == 0 {
            warnings.push("poll_interval_secs is 0; using 1 second".to_string());
        }
        if self.dashboard.fetch_timeout_secs == 0 {
            warnings.push("fetch_timeout_secs is 0; using 1 second".to_string());
        }
        let cap = self.dashboard.percent_cap;
        if !cap.is_finite() || cap < 0.0 {
            warnings.push(format!(
                "percent_cap {} is not a positive number; showing raw percentages",
                cap
            ));
        }
        if self.server.broadcast_capacity == 0 {
            warnings.push("broadcast_capacity must be at least 1".to_string());
        }

        warnings
    }
}

fn parse_line_key(key: &str) -> Option<LineNumber> {
    key.trim().parse::<LineNumber>().ok().filter(|line| *line > 0)
}
