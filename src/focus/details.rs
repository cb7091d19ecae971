use super::dom::Document;
use super::dom::NodeId;
use std::collections::BTreeSet;

/// Navigation keys an element may keep for itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NavKey {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
    Escape,
    Tab,
    Enter,
    Space,
}

impl NavKey {
    /// Map a chord key name (`arrowleft`, `tab`, ...) to a navigation key
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "arrowleft" => Some(NavKey::ArrowLeft),
            "arrowright" => Some(NavKey::ArrowRight),
            "arrowup" => Some(NavKey::ArrowUp),
            "arrowdown" => Some(NavKey::ArrowDown),
            "escape" => Some(NavKey::Escape),
            "tab" => Some(NavKey::Tab),
            "enter" => Some(NavKey::Enter),
            "space" => Some(NavKey::Space),
            _ => None,
        }
    }
}

/// How an element participates in keyboard interaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusDetails {
    pub shortcut_key: Option<String>,
    /// Typing into or operating the element needs the keyboard
    pub uses_keyboard: bool,
    /// The element or a descendant carries an access key
    pub contains_shortcut_keys: bool,
    /// `Some(false)` for plain input controls that should take focus when
    /// activated by an access key; `None` when the element is not classified
    pub is_focus_controller: Option<bool>,
    pub reserved: BTreeSet<NavKey>,
}

impl FocusDetails {
    pub fn reserves(&self, key: NavKey) -> bool {
        self.reserved.contains(&key)
    }
}

pub fn focus_details(doc: &Document, element: NodeId) -> FocusDetails {
    let shortcut_key = doc.attr(element, super::SHORTCUT_KEY_ATTR).map(str::to_string);
    let contains_shortcut_keys = shortcut_key.is_some()
        || doc
            .descendants(element)
            .into_iter()
            .any(|id| doc.has_attr(id, super::SHORTCUT_KEY_ATTR));

    let mut details = FocusDetails {
        uses_keyboard: doc.closest(element, |e| e.attr("aria-haspopup") == Some("true")).is_some(),
        shortcut_key,
        contains_shortcut_keys,
        ..FocusDetails::default()
    };

    let Some(el) = doc.element(element) else {
        return details;
    };

    use NavKey::*;
    let (controller, reserved) = match el.tag.as_str() {
        "input" if matches!(el.attr("type"), None | Some("") | Some("text") | Some("search")) => {
            (false, vec![ArrowLeft, ArrowRight])
        }
        "textarea" => (false, vec![ArrowLeft, ArrowRight]),
        "select" => (false, vec![ArrowLeft, ArrowRight, ArrowUp, ArrowDown]),
        _ if el.attr("aria-haspopup").map_or(false, |v| !v.is_empty()) => (true, vec![Enter, Space]),
        _ if el.has_class(super::MENU_LEVEL_CLASS) => (true, Vec::new()),
        _ if el.has_class("selectable-list") => (true, vec![ArrowUp, ArrowDown]),
        _ if el.content_editable => (true, vec![ArrowLeft, ArrowRight, ArrowUp, ArrowDown, Enter, Space]),
        _ => return details,
    };

    details.is_focus_controller = Some(controller);
    details.reserved = reserved.into_iter().collect();
    details.uses_keyboard = true;
    details
}
