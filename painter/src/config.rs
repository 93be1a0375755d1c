//! Engine configuration.

use serde::Deserialize;
use std::time::Duration;

/// Tunables for the painter engine.
///
/// Every `*_ms` deadline of `0` means "wait forever".
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PainterConfig {
    /// Suspension deadlines
    pub deadlines: DeadlineConfig,

    /// Delays between synthetic input events
    pub pacing: PacingConfig,

    /// Window in which repeated identical intercepted URLs are dropped (milliseconds)
    pub dedupe_window_ms: u64,

    /// Number of distinct URLs remembered for de-duplication
    pub dedupe_capacity: usize,

    /// Seed for the RANDOM traversal; a fresh seed per pass when absent
    pub shuffle_seed: Option<u64>,

    /// How long an error status stays up before the previous one returns (milliseconds)
    pub status_hold_ms: u64,

    /// Image scale used until the operator picks another, in percent
    pub default_scale: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeadlineConfig {
    pub marker_ms: u64,
    pub file_ms: u64,
    pub focus_ms: u64,
    pub fact_ms: u64,
    pub tile_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Pause after every synthetic input event
    pub input_delay_ms: u64,

    /// Pause after the window blurs before dispatching anything
    pub focus_settle_ms: u64,
}

fn bounded(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl DeadlineConfig {
    pub fn marker(&self) -> Option<Duration> {
        bounded(self.marker_ms)
    }

    pub fn file(&self) -> Option<Duration> {
        bounded(self.file_ms)
    }

    pub fn focus(&self) -> Option<Duration> {
        bounded(self.focus_ms)
    }

    pub fn fact(&self) -> Option<Duration> {
        bounded(self.fact_ms)
    }

    pub fn tile(&self) -> Option<Duration> {
        bounded(self.tile_ms)
    }
}

impl PacingConfig {
    pub fn input_delay(&self) -> Duration {
        Duration::from_millis(self.input_delay_ms)
    }

    pub fn focus_settle(&self) -> Duration {
        Duration::from_millis(self.focus_settle_ms)
    }
}

impl PainterConfig {
    pub fn dedupe_window(&self) -> Duration {
        Duration::from_millis(self.dedupe_window_ms)
    }

    pub fn status_hold(&self) -> Duration {
        Duration::from_millis(self.status_hold_ms)
    }
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            marker_ms: 300_000, // 5 minutes for the operator to place the marker
            file_ms: 300_000,
            focus_ms: 300_000,
            fact_ms: 15_000,
            tile_ms: 30_000,
        }
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            input_delay_ms: 1,
            focus_settle_ms: 1,
        }
    }
}

impl Default for PainterConfig {
    fn default() -> Self {
        Self {
            deadlines: DeadlineConfig::default(),
            pacing: PacingConfig::default(),
            dedupe_window_ms: 1_000,
            dedupe_capacity: 256,
            shuffle_seed: None,
            status_hold_ms: 3_000,
            default_scale: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_deadline_is_unbounded() {
        let config: PainterConfig =
            serde_json::from_str(r#"{"deadlines":{"marker_ms":0,"fact_ms":250}}"#).unwrap();
        assert_eq!(config.deadlines.marker(), None);
        assert_eq!(config.deadlines.fact(), Some(Duration::from_millis(250)));
        assert_eq!(config.deadlines.tile(), Some(Duration::from_secs(30)));
        assert_eq!(config.dedupe_window(), Duration::from_secs(1));
    }
}
