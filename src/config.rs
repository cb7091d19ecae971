//! Focus configuration with builder pattern
//!
//! Timings, shortcut settle behaviour and speech history in one place, with
//! defaults matching desktop browser behaviour. Loadable from TOML.

use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Global configuration for one focus context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FocusConfig {
    /// Desktop shell: Alt must be held to enter shortcuts instead of tapped
    pub desktop_mode: bool,
    pub timings: TimingConfig,
    pub shortcuts: ShortcutConfig,
    pub speech: SpeechConfig,
}

/// Deferred task delays, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Focus leaving to nothing reverts to `default` after this delay
    pub blur_revert_ms: u64,
    /// Re-announcement of the mode after a frame regains focus
    pub broadcast_ms: u64,
    /// Mode flips that must wait for the current key or pointer event
    pub deferred_mode_ms: u64,
    pub alt_hold_ms: u64,
    pub frame_refocus_ms: u64,
    pub hover_focus_ms: u64,
}

/// Access-key settle and key-cap placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Key-cap offset from the anchor point, in pixels
    pub label_offset: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// The announcement region is cleared once it holds more than this
    pub history_cap: usize,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            desktop_mode: false,
            timings: TimingConfig::default(),
            shortcuts: ShortcutConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            blur_revert_ms: 0,
            broadcast_ms: 0,
            deferred_mode_ms: 0,
            alt_hold_ms: 1000,
            frame_refocus_ms: 100, // cross-frame focus is unreliable on the first attempt
            hover_focus_ms: 300,
        }
    }
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            retry_delay_ms: 50,
            label_offset: 15.0,
        }
    }
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self { history_cap: 20 }
    }
}

impl TimingConfig {
    pub fn blur_revert(&self) -> Duration {
        Duration::from_millis(self.blur_revert_ms)
    }

    pub fn broadcast(&self) -> Duration {
        Duration::from_millis(self.broadcast_ms)
    }

    pub fn deferred_mode(&self) -> Duration {
        Duration::from_millis(self.deferred_mode_ms)
    }

    pub fn alt_hold(&self) -> Duration {
        Duration::from_millis(self.alt_hold_ms)
    }

    pub fn frame_refocus(&self) -> Duration {
        Duration::from_millis(self.frame_refocus_ms)
    }

    pub fn hover_focus(&self) -> Duration {
        Duration::from_millis(self.hover_focus_ms)
    }
}

impl ShortcutConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl FocusConfig {
    /// Create a new builder for FocusConfig
    pub fn builder() -> FocusConfigBuilder {
        FocusConfigBuilder::new()
    }

    /// Desktop shell defaults: hold Alt to reveal access keys
    pub fn desktop() -> Self {
        Self {
            desktop_mode: true,
            ..Self::default()
        }
    }

    /// No settle retries and no hover delay (for testing)
    pub fn immediate() -> Self {
        Self {
            desktop_mode: false,
            timings: TimingConfig {
                blur_revert_ms: 0,
                broadcast_ms: 0,
                deferred_mode_ms: 0,
                alt_hold_ms: 0,
                frame_refocus_ms: 0,
                hover_focus_ms: 0,
            },
            shortcuts: ShortcutConfig {
                max_retries: 0,
                retry_delay_ms: 0,
                label_offset: 15.0,
            },
            speech: SpeechConfig::default(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: FocusConfig = toml::from_str(content).context("Failed to parse focus config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading focus config from: {:?}", path);

        if !path.exists() {
            info!("Focus config {:?} doesn't exist, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read focus config: {:?}", path))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid focus config: {:?}", path))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.shortcuts.label_offset.is_finite() || self.shortcuts.label_offset < 0.0 {
            anyhow::bail!("shortcuts.label_offset must be a non-negative number");
        }
        if self.speech.history_cap == 0 {
            anyhow::bail!("speech.history_cap must be at least 1");
        }
        Ok(())
    }
}

/// Builder for FocusConfig
#[derive(Debug)]
pub struct FocusConfigBuilder {
    config: FocusConfig,
}

impl FocusConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: FocusConfig::default(),
        }
    }

    pub fn desktop_mode(mut self, enabled: bool) -> Self {
        self.config.desktop_mode = enabled;
        self
    }

    pub fn timings(mut self, timings: TimingConfig) -> Self {
        self.config.timings = timings;
        self
    }

    pub fn alt_hold(mut self, delay: Duration) -> Self {
        self.config.timings.alt_hold_ms = delay.as_millis() as u64;
        self
    }

    pub fn hover_focus(mut self, delay: Duration) -> Self {
        self.config.timings.hover_focus_ms = delay.as_millis() as u64;
        self
    }

    /// Set shortcut settle retries
    pub fn shortcut_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.config.shortcuts.max_retries = retries;
        self.config.shortcuts.retry_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn label_offset(mut self, offset: f64) -> Self {
        self.config.shortcuts.label_offset = offset;
        self
    }

    pub fn speech_history(mut self, cap: usize) -> Self {
        self.config.speech.history_cap = cap;
        self
    }

    pub fn build(self) -> FocusConfig {
        self.config
    }
}

impl Default for FocusConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
