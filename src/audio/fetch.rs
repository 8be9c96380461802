use anyhow::{Context, Result};
use std::fs;
use std::time::Duration;
use ureq::Agent;

pub fn is_remote(location: &str) -> bool {
    let lower = location.get(..8).unwrap_or(location).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Reads track locations into memory.
///
/// Remote locations are downloaded with `limit` as the maximum body size and
/// `timeout` as the deadline for the whole request; anything else is treated
/// as a local file path.
#[derive(Clone)]
pub struct Fetcher {
    agent: Agent,
    limit: u64,
}

impl Fetcher {
    pub fn new(limit: u64, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .timeout_connect(Some(timeout.min(Duration::from_secs(10))))
            .build()
            .into();
        Self { agent, limit }
    }

    pub fn fetch(&self, location: &str) -> Result<Vec<u8>> {
        if !is_remote(location) {
            return fs::read(location).with_context(|| format!("failed to read {location}"));
        }

        tracing::debug!(location, "downloading track");
        let mut response = self
            .agent
            .get(location)
            .call()
            .with_context(|| format!("failed to request {location}"))?;
        response
            .body_mut()
            .with_config()
            .limit(self.limit)
            .read_to_vec()
            .with_context(|| format!("failed to download {location}"))
    }
}
