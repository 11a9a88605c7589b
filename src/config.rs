use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cache::ComplementPolicy;

/// Tunables of the viewer, persisted as JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig
{
    /// Fetches answered later than this are rejected
    pub fetch_timeout_ms: u64,
    /// Extra bases fetched and packed on each side of the visible window
    pub prefetch_flank: u64,
    /// Longest read expected; range queries look back this far
    pub max_read_length: u64,
    pub track_width_px: f32,
    /// Above this many stored reads, reads outside the rendered region are evicted
    pub max_stored_records: usize,
    pub complement_policy: ComplementPolicy,
}

impl ViewerConfig
{
    pub fn new() -> Self
    {
        Self {
            fetch_timeout_ms: 5000,
            prefetch_flank: 0,
            max_read_length: 1000,
            track_width_px: 800.0,
            max_stored_records: 500_000,
            complement_policy: ComplementPolicy::OneSided,
        }
    }

    pub fn fetch_timeout(&self) -> Duration
    {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn to_json(&self) -> Result<String>
    {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self>
    {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_to_file(&self, path: &str) -> Result<()>
    {
        let json = self.to_json()?;
        std::fs::write(path, json).with_context(|| format!("Failed to write config: {}", path))?;
        Ok(())
    }

    pub fn load_from_file(path: &str) -> Result<Self>
    {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path))?;
        Self::from_json(&json).with_context(|| format!("Invalid config: {}", path))
    }
}

impl Default for ViewerConfig
{
    fn default() -> Self
    {
        Self::new()
    }
}
