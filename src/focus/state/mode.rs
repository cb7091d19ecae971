use crate::focus::error::FocusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interaction mode governing how focus is shown and moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FocusMode {
    /// Alias for the window's current focus default.
    /// - Requesting it applies whatever `focus_default` holds
    /// - When the default is itself `Default`, loops ignore navigation keys
    Default,

    /// Pointer-driven interaction
    /// - Focus follows clicks and hover items
    /// - Keyboard navigation inside a loop promotes to `Keyboard`
    Hover,

    /// Arrow keys and Tab are moving focus
    /// - Mouse movement inside a hover-focus loop demotes to `Hover`
    Keyboard,

    /// Full accessibility presentation without key-caps
    Accessible,

    /// Access-key mode: typed characters walk the shortcut tree and
    /// key-cap labels are drawn over matching elements
    Shortcuts,
}

impl Default for FocusMode {
    fn default() -> Self {
        FocusMode::Default
    }
}

impl FocusMode {
    pub const ALL: [FocusMode; 5] = [
        FocusMode::Default,
        FocusMode::Hover,
        FocusMode::Keyboard,
        FocusMode::Accessible,
        FocusMode::Shortcuts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusMode::Default => "default",
            FocusMode::Hover => "hover",
            FocusMode::Keyboard => "keyboard",
            FocusMode::Accessible => "accessible",
            FocusMode::Shortcuts => "shortcuts",
        }
    }

    pub fn is_accessibility(&self) -> bool {
        matches!(self, FocusMode::Accessible | FocusMode::Shortcuts)
    }

    pub fn is_keyboard(&self) -> bool {
        matches!(self, FocusMode::Accessible | FocusMode::Shortcuts | FocusMode::Keyboard)
    }

    /// Modes that stay local to a window when broadcast: they are announced
    /// without pulling OS focus to the main window
    pub fn is_local_ambience(&self) -> bool {
        matches!(self, FocusMode::Keyboard | FocusMode::Hover)
    }
}

impl fmt::Display for FocusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FocusMode {
    type Err = FocusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FocusMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| FocusError::InvalidMode(s.to_string()))
    }
}

/// Options accepted by mode and default changes, also carried over the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModeOptions {
    /// Skip the mode-changed notification
    pub silent: bool,
    /// Broadcast without moving OS focus to the main window
    pub no_transfer: bool,
}

impl ModeOptions {
    pub fn silent() -> Self {
        Self { silent: true, no_transfer: false }
    }

    pub fn no_transfer() -> Self {
        Self { silent: false, no_transfer: true }
    }
}

/// Body-level presentation state derived from the effective mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub accessible: bool,
    pub keyboard_focus: bool,
    pub focus_mode: FocusMode,
}

impl From<FocusMode> for Presentation {
    fn from(mode: FocusMode) -> Self {
        Self {
            accessible: mode.is_accessibility(),
            keyboard_focus: mode.is_keyboard(),
            focus_mode: mode,
        }
    }
}
