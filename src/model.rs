use serde::Deserialize;
use std::time::Duration;
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://lofigirl.com/wp-content/uploads/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Loaded,
    Playing,
    Paused,
}

impl TransportState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Loaded => "Ready",
            Self::Playing => "Playing",
            Self::Paused => "Paused",
        }
    }
}

/// Read-only settings loaded from `settings.json` in the config root.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub noise_base: Option<String>,
    #[serde(default = "default_volume")]
    pub volume: f32,
    #[serde(default = "default_volume")]
    pub noise_volume: f32,
    #[serde(default = "default_fetch_limit_bytes")]
    pub fetch_limit_bytes: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_volume() -> f32 {
    1.0
}

fn default_fetch_limit_bytes() -> u64 {
    64 * 1024 * 1024
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    String::from("info")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            catalog_path: None,
            noise_base: None,
            volume: default_volume(),
            noise_volume: default_volume(),
            fetch_limit_bytes: default_fetch_limit_bytes(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Deadline for a whole track download; zero is bumped to one second.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}
