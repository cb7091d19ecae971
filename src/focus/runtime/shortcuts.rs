use super::FocusContext;
use crate::focus::details::focus_details;
use crate::focus::dom::NodeId;
use crate::focus::error::FocusError;
use crate::focus::events::{ShortcutActivated, ShortcutPathChanged};
use crate::focus::shortcuts::{
    LabelPosition, ShortcutEvent, ShortcutOptions, ShortcutOutcome, ShortcutToken, match_shortcuts, place_label,
    remaining_keys,
};
use crate::focus::state::FocusMode;
use crate::focus::timers::TimerKind;
use crate::focus::{KEY_TAG_CLASS, SHORTCUT_KEY_ATTR, SHORTCUT_PATH_ATTR};

/// One pass of access-key matching
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShortcutRequest {
    /// Path to match; the current path when unset
    pub path: Option<String>,
    /// Appended to the path before matching
    pub append: Option<String>,
    /// Do not run the matched action
    pub silent: bool,
    pub retries: u32,
    /// An earlier attempt of the same settle found an exact match
    pub last_actionable: bool,
}

impl ShortcutRequest {
    pub fn append(typed: impl Into<String>) -> Self {
        Self {
            append: Some(typed.into()),
            ..Self::default()
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }
}

impl FocusContext {
    /// Register or update the access key of `element`
    pub fn apply_shortcut_options(&mut self, element: NodeId, options: ShortcutOptions) -> Result<(), FocusError> {
        if !self.document.is_live(element) {
            return Err(FocusError::NotRegistered(element.to_string()));
        }
        let key = options
            .key
            .clone()
            .or_else(|| self.shortcut_tree.get(&element).map(|token| token.key.clone()));
        ShortcutToken::validate_key(key.as_deref())?;

        let path_given = options.path.is_some();
        let existing = self.shortcut_tree.remove(&element);
        let token = ShortcutToken::merge(existing, options)?;

        self.document.set_attr(element, SHORTCUT_KEY_ATTR, token.key.clone());
        if path_given {
            match token.path {
                Some(_) => self.document.set_attr(element, SHORTCUT_PATH_ATTR, token.full_path.clone()),
                None => self.document.remove_attr(element, SHORTCUT_PATH_ATTR),
            }
        }
        log::trace!("Access key {} on {}", token.full_path, element);
        self.shortcut_tree.insert(element, token);
        Ok(())
    }

    pub fn remove_shortcut(&mut self, element: NodeId) -> bool {
        self.document.remove_attr(element, SHORTCUT_KEY_ATTR);
        self.document.remove_attr(element, SHORTCUT_PATH_ATTR);
        self.shortcut_tree.remove(&element).is_some()
    }

    pub fn shortcut_token(&self, element: NodeId) -> Option<&ShortcutToken> {
        self.shortcut_tree.get(&element)
    }

    /// Match the typed path against the visible access keys and act on it.
    ///
    /// An exact match runs its action unless the request is silent. When
    /// nothing is left to descend into, the match is retried while layout
    /// settles; once settled an exact match leaves shortcuts mode.
    pub fn update_shortcuts(&mut self, request: ShortcutRequest) -> ShortcutOutcome {
        let mut path = request.path.unwrap_or_else(|| self.shortcut_path.clone());
        if let Some(append) = &request.append {
            path.push_str(append);
        }

        if self.focus_mode != FocusMode::Shortcuts {
            self.clear_key_caps();
            return ShortcutOutcome::Inactive;
        }

        let root = self
            .active_modal
            .as_ref()
            .map_or(self.document.body(), |modal| modal.container);
        let found = match_shortcuts(&self.document, root, &path);
        let blocking = found
            .exact
            .and_then(|id| self.shortcut_tree.get(&id))
            .map_or(false, |token| token.blocking);

        if let Some(exact) = found.exact {
            if !request.silent {
                self.activate_shortcut(exact, &path);
            }
        }
        if blocking {
            return ShortcutOutcome::Blocked;
        }

        if found.candidates.is_empty() {
            if request.retries < self.config.shortcuts.max_retries {
                let delay = self.config.shortcuts.retry_delay();
                let kind = TimerKind::ShortcutSettle {
                    path,
                    retries: request.retries + 1,
                    last_actionable: request.last_actionable || found.exact.is_some(),
                };
                self.timers.schedule(delay, kind);
                return ShortcutOutcome::Settling;
            }

            match found.exact.filter(|id| self.document.is_live(*id)) {
                Some(exact) => {
                    let details = focus_details(&self.document, exact);
                    let maintain = self
                        .shortcut_tree
                        .get(&exact)
                        .map_or(false, |token| token.maintain_accessibility);
                    if maintain || details.uses_keyboard {
                        self.set_focus_mode(FocusMode::Accessible);
                        if details.is_focus_controller == Some(false) {
                            self.focus(exact);
                        }
                    } else {
                        self.set_focus_mode(FocusMode::Default);
                    }
                }
                None if !request.last_actionable => return ShortcutOutcome::NoMatch,
                None => {}
            }
        }

        self.clear_key_caps();
        if self.focus_mode == FocusMode::Shortcuts {
            if path != self.shortcut_path {
                self.shortcut_path = path.clone();
                self.observers
                    .shortcut_path_changed
                    .emit(&ShortcutPathChanged { path: path.clone() });
            }
            self.render_key_caps(&found.candidates, &path);
        }
        ShortcutOutcome::Updated
    }

    fn activate_shortcut(&mut self, element: NodeId, path: &str) {
        let (action, label) = match self.shortcut_tree.get_mut(&element) {
            Some(token) => (token.action.take(), token.label.clone()),
            None => (None, None),
        };

        let Some(mut action) = action else {
            self.observers.shortcut_activated.emit(&ShortcutActivated {
                element,
                path: path.to_string(),
            });
            return;
        };

        log::debug!("Access key {} activated {}", path, element);
        if let Some(label) = label {
            self.speak_message(&label);
        }
        let mut event = ShortcutEvent {
            target: element,
            default_prevented: false,
        };
        action(self, &mut event);

        if let Some(token) = self.shortcut_tree.get_mut(&element) {
            token.action.get_or_insert(action);
        }
    }

    /// Remove every key-cap label
    pub fn clear_key_caps(&mut self) {
        for label in self.key_caps() {
            self.document.remove(label);
        }
    }

    /// Generated key-cap label elements, in document order
    pub fn key_caps(&self) -> Vec<NodeId> {
        let body = self.document.body();
        self.document
            .descendants(body)
            .into_iter()
            .filter(|id| self.document.has_class(*id, KEY_TAG_CLASS))
            .collect()
    }

    fn render_key_caps(&mut self, candidates: &[NodeId], typed: &str) {
        let offset = self.config.shortcuts.label_offset;
        let body = self.document.body();

        for &host in candidates {
            let (key, full_path, position) = match self.shortcut_tree.get(&host) {
                Some(token) => (
                    token.key.clone(),
                    token.path.as_ref().map(|_| token.full_path.clone()),
                    token.position.unwrap_or_default(),
                ),
                None => (
                    self.document.attr(host, SHORTCUT_KEY_ATTR).unwrap_or_default().to_string(),
                    self.document.attr(host, SHORTCUT_PATH_ATTR).map(str::to_string),
                    LabelPosition::default(),
                ),
            };

            let text = remaining_keys(&key, full_path.as_deref(), typed);
            let label = place_label(host, text, self.document.rect(host), &position, offset);

            let tag = self.document.create_element("div");
            self.document.add_class(tag, KEY_TAG_CLASS);
            self.document.set_attr(tag, "aria-hidden", "true");
            if let Some(element) = self.document.element_mut(tag) {
                element.text = label.text;
                element.style.insert("top".to_string(), format!("{}px", label.top));
                element.style.insert("left".to_string(), format!("{}px", label.left));
            }
            self.document.append_child(if label.internal { host } else { body }, tag);
        }
    }
}
