//! Access-key tokens, prefix matching and key-cap placement
//!
//! Elements advertise access keys through two attributes: the key itself and,
//! for keys nested under a scope, the full path. Matching works on those
//! attributes so elements without a registered token still participate.

use super::dom::{Document, NodeId};
use super::error::FocusError;
use super::geometry::Rect;
use super::runtime::FocusContext;
use std::str::FromStr;

pub type ShortcutAction = Box<dyn FnMut(&mut FocusContext, &mut ShortcutEvent)>;

/// Passed to a shortcut action when its access key is typed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShortcutEvent {
    pub target: NodeId,
    pub default_prevented: bool,
}

impl ShortcutEvent {
    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }
}

/// Label coordinate: a fraction of the element box or a pixel offset
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Percent(f64),
    Pixels(f64),
}

impl Length {
    /// Fraction of `extent` this length designates
    pub fn fraction(&self, extent: f64) -> f64 {
        match self {
            Length::Percent(value) => value / 100.0,
            Length::Pixels(_) if extent == 0.0 => 0.0,
            Length::Pixels(value) => value / extent,
        }
    }
}

impl FromStr for Length {
    type Err = FocusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || FocusError::MissingPositionUnits(s.to_string());
        let text = s.trim();
        if let Some(value) = text.strip_suffix('%') {
            value.trim().parse().map(Length::Percent).map_err(|_| invalid())
        } else if let Some(value) = text.strip_suffix("px") {
            value.trim().parse().map(Length::Pixels).map_err(|_| invalid())
        } else {
            Err(invalid())
        }
    }
}

/// Placement hint for an element's key-cap label
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelPosition {
    pub x: Length,
    pub y: Length,
    /// Position relative to the element and attach the label inside it
    pub internal: bool,
}

impl Default for LabelPosition {
    fn default() -> Self {
        Self {
            x: Length::Percent(50.0),
            y: Length::Percent(75.0),
            internal: false,
        }
    }
}

impl LabelPosition {
    pub fn parse(x: &str, y: &str, internal: bool) -> Result<Self, FocusError> {
        Ok(Self {
            x: x.parse()?,
            y: y.parse()?,
            internal,
        })
    }
}

/// A key-cap label to draw over a remaining candidate
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCapLabel {
    pub host: NodeId,
    pub text: String,
    pub top: f64,
    pub left: f64,
    pub internal: bool,
}

fn axis_offset(fraction: f64, internal: bool, offset: f64) -> f64 {
    if !internal && fraction > 0.5 {
        0.0
    } else if internal && fraction < 0.5 {
        0.0
    } else if fraction == 0.5 {
        offset / 2.0
    } else {
        offset
    }
}

/// Place a label so it never hangs off the near edge of its element.
///
/// The offset is dropped on the far half of an external anchor (and the near
/// half of an internal one) and halved exactly at the centre.
pub fn place_label(host: NodeId, text: String, rect: Rect, position: &LabelPosition, offset: f64) -> KeyCapLabel {
    let (origin_x, origin_y) = if position.internal { (0.0, 0.0) } else { (rect.x, rect.y) };
    let fy = position.y.fraction(rect.height);
    let fx = position.x.fraction(rect.width);

    KeyCapLabel {
        host,
        text,
        top: origin_y + rect.height * fy - axis_offset(fy, position.internal, offset),
        left: origin_x + rect.width * fx - axis_offset(fx, position.internal, offset),
        internal: position.internal,
    }
}

/// Registration options for an access key; unset fields keep their current value
#[derive(Default)]
pub struct ShortcutOptions {
    pub key: Option<String>,
    pub path: Option<String>,
    pub action: Option<ShortcutAction>,
    /// Announced before the action runs
    pub label: Option<String>,
    pub position: Option<LabelPosition>,
    /// Matching this key stops descent
    pub blocking: Option<bool>,
    /// Stay in accessible mode after activation
    pub maintain_accessibility: Option<bool>,
}

impl ShortcutOptions {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn on_action(mut self, action: impl FnMut(&mut FocusContext, &mut ShortcutEvent) + 'static) -> Self {
        self.action = Some(Box::new(action));
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn position(mut self, position: LabelPosition) -> Self {
        self.position = Some(position);
        self
    }

    pub fn blocking(mut self) -> Self {
        self.blocking = Some(true);
        self
    }

    pub fn maintain_accessibility(mut self) -> Self {
        self.maintain_accessibility = Some(true);
        self
    }
}

pub struct ShortcutToken {
    pub key: String,
    pub path: Option<String>,
    pub full_path: String,
    pub label: Option<String>,
    pub position: Option<LabelPosition>,
    pub blocking: bool,
    pub maintain_accessibility: bool,
    pub(crate) action: Option<ShortcutAction>,
}

impl ShortcutToken {
    /// Check the key a registration would end up with
    pub fn validate_key(key: Option<&str>) -> Result<(), FocusError> {
        let key = key.ok_or(FocusError::MissingShortcutKey)?;
        if key.contains('-') {
            return Err(FocusError::ReservedShortcutCharacter(key.to_string()));
        }
        Ok(())
    }

    /// Build a token, or merge `options` into `existing`
    pub(crate) fn merge(existing: Option<ShortcutToken>, options: ShortcutOptions) -> Result<ShortcutToken, FocusError> {
        let key = options.key.or_else(|| existing.as_ref().map(|t| t.key.clone()));
        Self::validate_key(key.as_deref())?;
        let key = key.unwrap_or_default();

        let mut token = existing.unwrap_or(ShortcutToken {
            key: String::new(),
            path: None,
            full_path: String::new(),
            label: None,
            position: None,
            blocking: false,
            maintain_accessibility: false,
            action: None,
        });

        if let Some(path) = options.path {
            token.path = Some(path).filter(|p| !p.is_empty());
        }
        token.full_path = match &token.path {
            Some(path) => format!("{}{}", path, key),
            None => key.clone(),
        };
        token.key = key;

        if options.action.is_some() {
            token.action = options.action;
        }
        if options.label.is_some() {
            token.label = options.label;
        }
        if options.position.is_some() {
            token.position = options.position;
        }
        if let Some(blocking) = options.blocking {
            token.blocking = blocking;
        }
        if let Some(maintain) = options.maintain_accessibility {
            token.maintain_accessibility = maintain;
        }
        Ok(token)
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }
}

/// Result of matching the typed path against the visible access keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutMatch {
    /// Element whose full path equals the typed path
    pub exact: Option<NodeId>,
    /// Elements whose path extends the typed path
    pub candidates: Vec<NodeId>,
}

impl ShortcutMatch {
    /// The exact match, once nothing remains to descend into
    pub fn actionable(&self) -> Option<NodeId> {
        self.exact.filter(|_| self.candidates.is_empty())
    }
}

fn prefix_chars(text: &str, count: usize) -> String {
    text.chars().take(count).collect()
}

/// Match `typed` against the access keys below `root`
pub fn match_shortcuts(doc: &Document, root: NodeId, typed: &str) -> ShortcutMatch {
    let mut result = ShortcutMatch::default();

    for id in doc.descendants(root) {
        let Some(key) = doc.attr(id, super::SHORTCUT_KEY_ATTR) else {
            continue;
        };
        let path = doc.attr(id, super::SHORTCUT_PATH_ATTR);

        let selected = match path {
            _ if typed.is_empty() => path.is_none(),
            Some(path) => path.starts_with(typed),
            None => key == typed,
        };
        if !selected || !doc.is_rendered(id) {
            continue;
        }

        if path == Some(typed) || (path.is_none() && key == typed) {
            result.exact = Some(id);
            continue;
        }

        if let Some(path) = path {
            let path_len = path.chars().count();
            let extends = (1..=key.chars().count()).any(|i| prefix_chars(path, path_len.saturating_sub(i)) == typed);
            if !extends {
                continue;
            }
        }
        result.candidates.push(id);
    }

    result
}

/// Part of `key` still to be typed once `typed` has been entered
pub fn remaining_keys(key: &str, full_path: Option<&str>, typed: &str) -> String {
    let Some(full_path) = full_path else {
        return key.to_string();
    };
    let remaining = full_path.chars().count().saturating_sub(typed.chars().count());
    let key_len = key.chars().count();
    if remaining >= key_len {
        key.to_string()
    } else {
        key.chars().skip(key_len - remaining).collect()
    }
}

/// What an access-key update did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutOutcome {
    /// Not in shortcuts mode; labels were cleared
    Inactive,
    /// A blocking key matched
    Blocked,
    /// Nothing matched after settling
    NoMatch,
    /// Waiting for layout before retrying
    Settling,
    /// Path and labels updated
    Updated,
}

impl ShortcutOutcome {
    /// Whether the key that caused the update should be considered handled
    pub fn consumed(&self) -> bool {
        matches!(self, ShortcutOutcome::Settling | ShortcutOutcome::Updated)
    }
}
