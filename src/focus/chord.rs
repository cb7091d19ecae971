//! Key chords and the global chord router
//!
//! A chord is a base key plus any of Ctrl/Alt/Shift. Its key path form
//! (`"Ctrl+Shift+keys"`) is what gets registered, displayed and shared with
//! other windows; the struct form is what travels in `processKeyObj`.

use crate::focus::error::FocusError;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, ModifierKeyCode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Canonical key combination used for global keyboard dispatch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyChord {
    #[serde(rename = "ctrlKey")]
    pub ctrl: bool,
    #[serde(rename = "altKey")]
    pub alt: bool,
    #[serde(rename = "shiftKey")]
    pub shift: bool,
    /// Lower-cased physical key name, e.g. `keys`, `digit1`, `arrowup`, `f5`
    pub key: String,
}

impl KeyChord {
    /// Create a chord with no modifiers
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            ctrl: false,
            alt: false,
            shift: false,
            key: key.into().to_lowercase(),
        }
    }

    /// Create a chord with Ctrl
    pub fn ctrl(key: impl Into<String>) -> Self {
        Self { ctrl: true, ..Self::new(key) }
    }

    /// Create a chord with Alt
    pub fn alt(key: impl Into<String>) -> Self {
        Self { alt: true, ..Self::new(key) }
    }

    /// Create a chord with Shift
    pub fn shift(key: impl Into<String>) -> Self {
        Self { shift: true, ..Self::new(key) }
    }

    /// Create a chord from a key event; Meta/Super count as Ctrl
    pub fn from_key_event(event: &KeyEvent) -> Option<Self> {
        let key = key_name(event.code)?;
        let modifiers = event.modifiers;
        Some(Self {
            ctrl: modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER | KeyModifiers::META),
            alt: modifiers.contains(KeyModifiers::ALT),
            shift: modifiers.contains(KeyModifiers::SHIFT) || event.code == KeyCode::BackTab,
            key,
        })
    }

    pub fn modifiers(&self) -> KeyModifiers {
        let mut modifiers = KeyModifiers::empty();
        if self.ctrl {
            modifiers |= KeyModifiers::CONTROL;
        }
        if self.alt {
            modifiers |= KeyModifiers::ALT;
        }
        if self.shift {
            modifiers |= KeyModifiers::SHIFT;
        }
        modifiers
    }

    /// Same chord ignoring Shift, as used for loop exit keys
    pub fn matches_ignoring_shift(&self, other: &KeyChord) -> bool {
        self.ctrl == other.ctrl && self.alt == other.alt && self.key == other.key
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl");
        }
        if self.alt {
            parts.push("Alt");
        }
        if self.shift {
            parts.push("Shift");
        }
        parts.push(&self.key);
        write!(f, "{}", parts.join("+"))
    }
}

impl FromStr for KeyChord {
    type Err = FocusError;

    /// Parse a key path. Modifier names are case-sensitive as written by
    /// `Display`; the last segment is the key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // A literal '+' key leaves an empty segment before it
        let (head, key) = match s.strip_suffix('+') {
            Some("") => ("", "+"),
            Some(rest) if rest.ends_with('+') => (&rest[..rest.len() - 1], "+"),
            _ => match s.rsplit_once('+') {
                Some((head, key)) => (head, key.trim()),
                None => ("", s.trim()),
            },
        };
        if key.is_empty() {
            return Err(FocusError::InvalidKeyPath(s.to_string()));
        }
        let modifiers: Vec<&str> = head.split('+').collect();

        Ok(Self {
            ctrl: modifiers.contains(&"Ctrl"),
            alt: modifiers.contains(&"Alt"),
            shift: modifiers.contains(&"Shift"),
            key: key.to_lowercase(),
        })
    }
}

/// Physical key name for a key code, lower-cased in the style of DOM `code`
pub fn key_name(code: KeyCode) -> Option<String> {
    let name = match code {
        KeyCode::Char(' ') => "space".to_string(),
        KeyCode::Char(c) if c.is_ascii_alphabetic() => format!("key{}", c.to_ascii_lowercase()),
        KeyCode::Char(c) if c.is_ascii_digit() => format!("digit{}", c),
        KeyCode::Char('-') | KeyCode::Char('_') => "minus".to_string(),
        KeyCode::Char('=') | KeyCode::Char('+') => "equal".to_string(),
        KeyCode::Char(',') | KeyCode::Char('<') => "comma".to_string(),
        KeyCode::Char('.') | KeyCode::Char('>') => "period".to_string(),
        KeyCode::Char('/') | KeyCode::Char('?') => "slash".to_string(),
        KeyCode::Char(';') | KeyCode::Char(':') => "semicolon".to_string(),
        KeyCode::Char('\'') | KeyCode::Char('"') => "quote".to_string(),
        KeyCode::Char('[') | KeyCode::Char('{') => "bracketleft".to_string(),
        KeyCode::Char(']') | KeyCode::Char('}') => "bracketright".to_string(),
        KeyCode::Char('\\') | KeyCode::Char('|') => "backslash".to_string(),
        KeyCode::Char('`') | KeyCode::Char('~') => "backquote".to_string(),
        KeyCode::Char(c) => c.to_lowercase().to_string(),
        KeyCode::Up => "arrowup".to_string(),
        KeyCode::Down => "arrowdown".to_string(),
        KeyCode::Left => "arrowleft".to_string(),
        KeyCode::Right => "arrowright".to_string(),
        KeyCode::Esc => "escape".to_string(),
        KeyCode::Enter => "enter".to_string(),
        KeyCode::Tab | KeyCode::BackTab => "tab".to_string(),
        KeyCode::Backspace => "backspace".to_string(),
        KeyCode::Delete => "delete".to_string(),
        KeyCode::Insert => "insert".to_string(),
        KeyCode::Home => "home".to_string(),
        KeyCode::End => "end".to_string(),
        KeyCode::PageUp => "pageup".to_string(),
        KeyCode::PageDown => "pagedown".to_string(),
        KeyCode::F(n) => format!("f{}", n),
        KeyCode::Modifier(modifier) => match modifier {
            ModifierKeyCode::LeftAlt => "altleft".to_string(),
            ModifierKeyCode::RightAlt => "altright".to_string(),
            ModifierKeyCode::LeftControl => "controlleft".to_string(),
            ModifierKeyCode::RightControl => "controlright".to_string(),
            ModifierKeyCode::LeftShift => "shiftleft".to_string(),
            ModifierKeyCode::RightShift => "shiftright".to_string(),
            _ => return None,
        },
        _ => return None,
    };
    Some(name)
}

/// The Alt key pressed on its own (not as a modifier of another key)
pub fn is_alt_key(code: KeyCode) -> bool {
    matches!(
        code,
        KeyCode::Modifier(ModifierKeyCode::LeftAlt) | KeyCode::Modifier(ModifierKeyCode::RightAlt)
    )
}

pub fn is_ctrl_key(code: KeyCode) -> bool {
    matches!(
        code,
        KeyCode::Modifier(ModifierKeyCode::LeftControl) | KeyCode::Modifier(ModifierKeyCode::RightControl)
    )
}

/// Callback for a registered chord; returning `false` leaves the key unconsumed
pub type KeyHandle<C> = Box<dyn FnMut(&mut C) -> bool>;

pub struct KeyHandler<C> {
    pub handle: KeyHandle<C>,
    pub description: String,
    /// Modal scope the handler was registered in (`None` outside any modal)
    pub modal_id: Option<u64>,
    /// Only fire while exactly `modal_id` is the active modal
    pub modal_specific: bool,
}

impl<C> KeyHandler<C> {
    pub fn is_eligible(&self, active_modal: Option<u64>) -> bool {
        !self.modal_specific || self.modal_id == active_modal
    }
}

/// Registry of global chord handlers
pub struct KeyRouter<C> {
    handlers: HashMap<KeyChord, KeyHandler<C>>,
    key_paths: BTreeMap<String, String>,
}

impl<C> KeyRouter<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            key_paths: BTreeMap::new(),
        }
    }

    /// Register `handle` for `chord`, replacing any previous handler
    pub fn register(&mut self, chord: KeyChord, handler: KeyHandler<C>) {
        log::debug!("Registered key path {} ({})", chord, handler.description);
        self.key_paths.insert(chord.to_string(), handler.description.clone());
        self.handlers.insert(chord, handler);
    }

    /// Normalized key paths and their descriptions
    pub fn key_paths(&self) -> &BTreeMap<String, String> {
        &self.key_paths
    }

    /// Bindings for a help overlay, sorted by key path
    pub fn bindings(&self) -> Vec<(String, String)> {
        self.key_paths
            .iter()
            .map(|(path, description)| (path.clone(), description.clone()))
            .collect()
    }

    pub fn is_eligible(&self, chord: &KeyChord, active_modal: Option<u64>) -> bool {
        self.handlers
            .get(chord)
            .map_or(false, |handler| handler.is_eligible(active_modal))
    }

    /// Take the handler out while it runs against its owner
    pub fn take(&mut self, chord: &KeyChord) -> Option<KeyHandler<C>> {
        self.handlers.remove(chord)
    }

    /// Put a handler back after it ran, unless it was replaced meanwhile
    pub fn restore(&mut self, chord: KeyChord, handler: KeyHandler<C>) {
        self.handlers.entry(chord).or_insert(handler);
    }

    pub fn clear(&mut self) {
        self.handlers.clear();
        self.key_paths.clear();
    }
}

impl<C> Default for KeyRouter<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    fn handler(modal_id: Option<u64>, modal_specific: bool) -> KeyHandler<u32> {
        KeyHandler {
            handle: Box::new(|count: &mut u32| {
                *count += 1;
                true
            }),
            description: "count".to_string(),
            modal_id,
            modal_specific,
        }
    }

    #[test]
    fn test_key_path_case() {
        // Modifiers are matched as written, the key is normalized
        let chord: KeyChord = "ctrl+KeyQ".parse().unwrap();
        assert_eq!(chord, KeyChord::new("keyq"));
        assert_eq!("Ctrl+Alt+KeyQ".parse::<KeyChord>().unwrap().to_string(), "Ctrl+Alt+keyq");
    }

    #[test]
    fn test_key_path_format() {
        let chord = KeyChord { ctrl: true, alt: false, shift: true, key: "keys".to_string() };
        assert_eq!(chord.to_string(), "Ctrl+Shift+keys");
        assert_eq!("Alt+F4".parse::<KeyChord>().unwrap(), KeyChord::alt("f4"));
        assert!("Ctrl+".parse::<KeyChord>().is_err());
    }

    #[test]
    fn test_key_event_paths_parse_back() {
        let codes = [
            KeyCode::Char('q'),
            KeyCode::Char('7'),
            KeyCode::Char('+'),
            KeyCode::Char('-'),
            KeyCode::Char('/'),
            KeyCode::Char(' '),
            KeyCode::F(5),
            KeyCode::Up,
            KeyCode::PageDown,
            KeyCode::Esc,
        ];

        for code in codes {
            for mask in 0..8u8 {
                let mut modifiers = KeyModifiers::NONE;
                for (bit, modifier) in [KeyModifiers::CONTROL, KeyModifiers::ALT, KeyModifiers::SHIFT].into_iter().enumerate() {
                    if mask & (1 << bit) != 0 {
                        modifiers |= modifier;
                    }
                }
                let chord = KeyChord::from_key_event(&KeyEvent::new(code, modifiers)).unwrap();
                let path = chord.to_string();
                assert_eq!(path.parse::<KeyChord>().unwrap(), chord, "{}", path);
            }
        }
    }

    #[test]
    fn test_plus_key() {
        let event = KeyEvent::new(KeyCode::Char('+'), KeyModifiers::CONTROL);
        assert_eq!(KeyChord::from_key_event(&event).unwrap(), KeyChord::ctrl("equal"));

        // A chord built by hand around a literal '+' still parses back
        let plus = KeyChord::ctrl("+");
        assert_eq!(plus.to_string(), "Ctrl++");
        assert_eq!("Ctrl++".parse::<KeyChord>().unwrap(), plus);
        assert_eq!("+".parse::<KeyChord>().unwrap(), KeyChord::new("+"));
        assert!("Ctrl+".parse::<KeyChord>().is_err());
    }

    #[test]
    fn test_from_key_event() {
        let event = KeyEvent::new(KeyCode::Char('S'), KeyModifiers::CONTROL | KeyModifiers::SHIFT);
        let chord = KeyChord::from_key_event(&event).unwrap();
        assert_eq!(chord.to_string(), "Ctrl+Shift+keys");

        let back_tab = KeyEvent::new(KeyCode::BackTab, KeyModifiers::NONE);
        assert_eq!(KeyChord::from_key_event(&back_tab).unwrap(), KeyChord::shift("tab"));

        let mut release = KeyEvent::new(KeyCode::Up, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(KeyChord::from_key_event(&release).unwrap().key, "arrowup");
    }

    #[test]
    fn test_modal_specific_eligibility() {
        let mut router: KeyRouter<u32> = KeyRouter::new();
        router.register(KeyChord::ctrl("keyo"), handler(None, true));
        router.register(KeyChord::ctrl("keyw"), handler(Some(3), true));
        router.register(KeyChord::new("f1"), handler(Some(3), false));

        assert!(router.is_eligible(&KeyChord::ctrl("keyo"), None));
        assert!(!router.is_eligible(&KeyChord::ctrl("keyo"), Some(3)));
        assert!(router.is_eligible(&KeyChord::ctrl("keyw"), Some(3)));
        assert!(router.is_eligible(&KeyChord::new("f1"), None));
        assert!(router.is_eligible(&KeyChord::new("f1"), Some(7)));
    }

    #[test]
    fn test_take_and_restore() {
        let mut router: KeyRouter<u32> = KeyRouter::new();
        let chord = KeyChord::ctrl("keyo");
        router.register(chord.clone(), handler(None, true));

        let mut count = 0;
        let mut taken = router.take(&chord).unwrap();
        assert!((taken.handle)(&mut count));
        router.restore(chord.clone(), taken);

        assert_eq!(count, 1);
        assert!(router.is_eligible(&chord, None));
        assert_eq!(router.key_paths().get("Ctrl+keyo").map(String::as_str), Some("count"));
    }
}
