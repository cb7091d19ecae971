use super::{FocusContext, ShortcutRequest};
use crate::focus::broadcast::Operation;
use crate::focus::chord::{KeyChord, KeyHandler, is_alt_key};
use crate::focus::details::{NavKey, focus_details};
use crate::focus::dom::NodeId;
use crate::focus::error::FocusError;
use crate::focus::geometry::Direction;
use crate::focus::navigator;
use crate::focus::registry::EnterOptions;
use crate::focus::state::{FocusMode, ModeOptions};
use crate::focus::timers::TimerKind;
use crate::focus::{FOCUS_LISTENER_CLASS, MENU_LEVEL_CLASS};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use serde_json::json;

/// How far a key press got
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyFlow {
    /// The default action should be suppressed
    pub consumed: bool,
    /// Outer handlers, including the window handler, must not see the key
    pub stopped: bool,
}

impl KeyFlow {
    fn merge(&mut self, other: KeyFlow) {
        self.consumed |= other.consumed;
        self.stopped |= other.stopped;
    }
}

impl FocusContext {
    /// Feed a terminal key event; returns whether it was consumed
    pub fn handle_key_event(&mut self, event: KeyEvent) -> bool {
        match event.kind {
            KeyEventKind::Release => self.handle_key_up(&event),
            KeyEventKind::Press | KeyEventKind::Repeat => self.handle_key_down(&event).consumed,
        }
    }

    /// Key pressed on the active element.
    ///
    /// Loop listeners around the active element see the key first, innermost
    /// first; the window handler runs last unless a loop stopped the key.
    pub fn handle_key_down(&mut self, event: &KeyEvent) -> KeyFlow {
        let mut flow = KeyFlow::default();
        let Some(chord) = KeyChord::from_key_event(event) else {
            return flow;
        };

        if let Some(target) = self.document.active_element() {
            let listeners: Vec<NodeId> = self
                .document
                .ancestors(target)
                .into_iter()
                .filter(|id| self.document.has_class(*id, FOCUS_LISTENER_CLASS))
                .collect();
            // Innermost first. A stale nested listener hands the key on to the
            // next one out; the first listener that keeps its class handles the
            // key for the target's nearest loop, once.
            for listener in listeners {
                if !self.document.is_live(target) || !self.document.has_class(listener, FOCUS_LISTENER_CLASS) {
                    continue;
                }
                if self.demote_stale_listener(target) {
                    continue;
                }
                flow.merge(self.handle_loop_key(target, &chord, event));
                break;
            }
        }

        if !flow.stopped && !self.role.is_shadow() {
            flow.consumed |= self.handle_window_key_down(&chord, event);
        }
        flow
    }

    /// Key released; only the Alt toggle cares
    pub fn handle_key_up(&mut self, event: &KeyEvent) -> bool {
        if self.role.is_shadow() {
            return false;
        }
        if self.config.desktop_mode {
            return self.desktop_key_up(event);
        }

        if !self.alt_starting {
            return false;
        }
        self.alt_starting = false;
        if !is_alt_key(event.code) {
            return false;
        }

        if !event.modifiers.contains(KeyModifiers::CONTROL) {
            if self.focus_mode == FocusMode::Shortcuts {
                self.set_focus_mode(FocusMode::Default);
            } else {
                self.set_focus_mode(FocusMode::Shortcuts);
            }
        }
        true
    }

    fn handle_window_key_down(&mut self, chord: &KeyChord, event: &KeyEvent) -> bool {
        let consumed = self.dispatch_chord(chord);
        if self.config.desktop_mode {
            return self.desktop_key_down(chord, event) || consumed;
        }

        if chord.alt && !is_alt_key(event.code) {
            self.alt_starting = false;
        } else if is_alt_key(event.code) && self.key_paths_allowed() {
            self.alt_starting = true;
        }
        consumed
    }

    /// Run a registered handler, or forward a main-window key path
    fn dispatch_chord(&mut self, chord: &KeyChord) -> bool {
        if self.process_key_chord(chord) {
            return true;
        }
        if self.role.is_main_window() {
            return false;
        }
        let forward = self
            .base_key_paths
            .as_ref()
            .map_or(false, |paths| paths.contains_key(&chord.to_string()));
        if forward {
            log::trace!("{:?}: forwarding {} to the main window", self.role, chord);
            self.broadcast(Operation::ProcessKeyObj, vec![json!(chord)], false);
        }
        forward
    }

    fn key_paths_allowed(&self) -> bool {
        self.active_modal.as_ref().map_or(true, |modal| modal.allow_key_paths)
    }

    fn desktop_key_down(&mut self, chord: &KeyChord, event: &KeyEvent) -> bool {
        if chord.alt && event.code == KeyCode::F(4) {
            return false;
        }
        if chord.ctrl {
            self.ctrl_down = true;
            return false;
        }
        if !self.key_paths_allowed() {
            return false;
        }
        if !chord.alt && !is_alt_key(event.code) {
            return false;
        }

        if self.focus_mode != FocusMode::Shortcuts {
            self.alt_down = true;
            if !self.timers.is_scheduled(&TimerKind::AltHold) {
                self.alt_path.clear();
                let delay = self.config.timings.alt_hold();
                self.timers.schedule(delay, TimerKind::AltHold);
            }
            if let KeyCode::Char(c) = event.code {
                self.alt_path.extend(c.to_uppercase());
            }
        }
        true
    }

    fn desktop_key_up(&mut self, event: &KeyEvent) -> bool {
        if event.modifiers.contains(KeyModifiers::CONTROL) {
            self.ctrl_down = true;
        }
        if !is_alt_key(event.code) {
            return false;
        }

        self.alt_down = false;
        self.timers.cancel(&TimerKind::AltHold);

        let mut consumed = false;
        if !self.ctrl_down {
            if !self.turned_on {
                if self.focus_mode == FocusMode::Shortcuts {
                    self.set_focus_mode(FocusMode::Default);
                } else {
                    self.enter_shortcuts_with_alt_path();
                }
            }
            self.turned_on = false;
            consumed = true;
        }
        self.ctrl_down = false;
        self.alt_path.clear();
        consumed
    }

    /// Alt held long enough: enter shortcuts and apply what was typed meanwhile
    pub(super) fn finish_alt_hold(&mut self) {
        if self.ctrl_down {
            return;
        }
        self.enter_shortcuts_with_alt_path();
        self.turned_on = true;
    }

    fn enter_shortcuts_with_alt_path(&mut self) {
        self.set_focus_mode(FocusMode::Shortcuts);
        let typed = std::mem::take(&mut self.alt_path);
        if !typed.is_empty() && self.focus_mode == FocusMode::Shortcuts {
            self.update_shortcuts(ShortcutRequest::append(typed));
        }
    }

    /// Run the handler registered for `chord`; returns whether it consumed
    /// the key. Chords replayed from another window only run in the main
    /// window.
    pub fn process_key_chord(&mut self, chord: &KeyChord) -> bool {
        if self.from_broadcast && !self.role.is_main_window() {
            return false;
        }
        let active = self.active_modal.as_ref().map(|modal| modal.modal_id);
        if !self.router.is_eligible(chord, active) {
            return false;
        }
        let Some(mut handler) = self.router.take(chord) else {
            return false;
        };
        let handled = (handler.handle)(self);
        self.router.restore(chord.clone(), handler);
        handled
    }

    /// Bind a global key path such as `"Ctrl+Shift+keyf"`.
    ///
    /// A modal-specific handler registered here only fires while no modal
    /// is active.
    pub fn add_keyboard_listener(
        &mut self,
        key_path: &str,
        handle: impl FnMut(&mut FocusContext) -> bool + 'static,
        description: &str,
        modal_specific: bool,
    ) -> Result<(), FocusError> {
        self.register_chord(key_path, Box::new(handle), description, modal_specific, None)
    }

    /// Bind a key path scoped to a loop's modal id. Returns false when the
    /// container is not registered.
    pub fn add_loop_keyboard_listener(
        &mut self,
        container: NodeId,
        key_path: &str,
        handle: impl FnMut(&mut FocusContext) -> bool + 'static,
        description: &str,
        modal_specific: bool,
    ) -> Result<bool, FocusError> {
        let Some(token) = self.loops.get(&container) else {
            return Ok(false);
        };
        let modal_id = token.modal_id;
        self.register_chord(key_path, Box::new(handle), description, modal_specific, modal_id)?;
        Ok(true)
    }

    fn register_chord(
        &mut self,
        key_path: &str,
        handle: Box<dyn FnMut(&mut FocusContext) -> bool>,
        description: &str,
        modal_specific: bool,
        modal_id: Option<u64>,
    ) -> Result<(), FocusError> {
        let chord: KeyChord = key_path.parse()?;
        self.router.register(
            chord,
            KeyHandler {
                handle,
                description: description.to_string(),
                modal_id,
                modal_specific,
            },
        );
        if self.role.is_main_window() {
            self.update_base_key_paths();
        }
        Ok(())
    }

    /// Registered key paths and their descriptions, sorted by key path
    pub fn key_bindings(&self) -> Vec<(String, String)> {
        self.router.bindings()
    }

    /// Alt is down and counting towards shortcuts (desktop mode)
    pub fn is_alt_held(&self) -> bool {
        self.alt_down
    }

    fn handle_loop_key(&mut self, target: NodeId, chord: &KeyChord, event: &KeyEvent) -> KeyFlow {
        self.mouse_clicked = false;
        let mut flow = KeyFlow::default();
        if self.focus_mode == FocusMode::Default {
            return flow;
        }

        let details = focus_details(&self.document, target);
        let Some(mut parent) = self.document.closest_with_class(target, MENU_LEVEL_CLASS) else {
            return flow;
        };

        let Some(token) = self.loops.get(&parent) else {
            return flow;
        };
        let is_exit = token.is_exit_key(chord);
        let token_key_to_enter = token.key_to_enter;

        let mut left = false;
        if is_exit {
            self.leave_focus_loop(parent, false);
            flow.consumed = true;
            left = true;
        }

        let mut key_to_enter = false;
        if target == parent {
            key_to_enter = token_key_to_enter;
            if key_to_enter {
                parent = self
                    .document
                    .parent(target)
                    .and_then(|above| self.document.closest_with_class(above, MENU_LEVEL_CLASS))
                    .unwrap_or(target);
            }
        }

        if NavKey::from_key(&chord.key).map_or(false, |key| details.reserves(key)) {
            return flow;
        }
        if chord.alt {
            return flow;
        }

        if self.focus_mode == FocusMode::Hover {
            self.set_focus_mode_with(FocusMode::Keyboard, ModeOptions::no_transfer());
        }

        let level = self.loop_level(parent);
        match chord.key.as_str() {
            "arrowup" | "arrowdown" | "arrowleft" | "arrowright" => {
                let direction = match chord.key.as_str() {
                    "arrowup" => Direction::Up,
                    "arrowdown" => Direction::Down,
                    "arrowleft" => Direction::Left,
                    _ => Direction::Right,
                };
                if self.focus_mode == FocusMode::Shortcuts {
                    self.set_focus_mode_with(FocusMode::Accessible, ModeOptions::no_transfer());
                }

                if target == parent {
                    self.enter_focus_loop(parent, EnterOptions::keyboard().direction(direction));
                } else {
                    let axis = if direction.is_vertical() { "vloop" } else { "hloop" };
                    let container = self
                        .document
                        .closest(target, |e| e.attr(axis) == Some("true"))
                        .unwrap_or(parent);
                    let list = self.document.keyboard_focusable(container, level, false);
                    if self.focus_next_element(target, &list, direction) {
                        flow.consumed = true;
                        flow.stopped = true;
                    }
                }
            }
            "escape" => {
                if self.focus_mode == FocusMode::Shortcuts {
                    if self.shortcut_path.is_empty() {
                        self.set_focus_mode_with(FocusMode::Accessible, ModeOptions::no_transfer());
                    } else {
                        let mut path = self.shortcut_path.clone();
                        path.pop();
                        self.update_shortcuts(ShortcutRequest::path(path));
                    }
                }
                if !left && self.focus_mode != FocusMode::Shortcuts {
                    let delay = self.config.timings.deferred_mode();
                    self.timers.schedule(delay, TimerKind::DeferredMode(FocusMode::Default));
                }
            }
            "tab" => {
                if self.focus_mode == FocusMode::Shortcuts {
                    self.set_focus_mode_with(FocusMode::Accessible, ModeOptions::no_transfer());
                }
                let list = self.document.keyboard_focusable(parent, level, true);
                let index = list.iter().position(|id| *id == target);
                let next = if chord.shift {
                    match index {
                        Some(i) if i > 0 => list.get(i - 1),
                        _ => list.last(),
                    }
                } else {
                    index.and_then(|i| list.get(i + 1)).or(list.first())
                };
                match next.copied() {
                    Some(next) => self.focus(next),
                    None => self.focus(parent),
                };
                flow.consumed = true;
                flow.stopped = true;
            }
            "enter" if key_to_enter => {
                self.enter_focus_loop(target, EnterOptions::keyboard());
                flow.consumed = true;
            }
            _ => {
                if is_alt_key(event.code) || self.focus_mode != FocusMode::Shortcuts || chord.ctrl {
                    return flow;
                }
                if let KeyCode::Char(c) = event.code {
                    let typed: String = c.to_uppercase().collect();
                    if self.update_shortcuts(ShortcutRequest::append(typed)).consumed() {
                        flow.consumed = true;
                        flow.stopped = true;
                    }
                }
            }
        }
        flow
    }

    /// An inner loop registered before its outer loop keeps a stale listener;
    /// drop it the first time it sees a key. Returns whether one was dropped.
    fn demote_stale_listener(&mut self, target: NodeId) -> bool {
        if self.focus_mode == FocusMode::Default {
            return false;
        }
        let Some(parent) = self.document.closest_with_class(target, MENU_LEVEL_CLASS) else {
            return false;
        };
        if !self.document.has_class(parent, FOCUS_LISTENER_CLASS) {
            return false;
        }
        let upper = self
            .document
            .parent(parent)
            .and_then(|above| self.document.closest_with_class(above, FOCUS_LISTENER_CLASS));
        if upper.is_none() {
            return false;
        }
        log::debug!("Demoting nested key listener {}", parent);
        self.document.remove_class(parent, FOCUS_LISTENER_CLASS);
        true
    }

    /// Move focus from `target` to the next element of `list` in `direction`
    fn focus_next_element(&mut self, target: NodeId, list: &[NodeId], direction: Direction) -> bool {
        let blocking = direction.blocking_class();
        let doc = &self.document;
        let source = doc.navigation_rect(target);
        let candidates = list
            .iter()
            .copied()
            .filter(|id| !doc.contains(*id, target) && !doc.contains(target, *id) && !doc.has_class(*id, &blocking))
            .map(|id| (id, doc.navigation_rect(id)));

        match navigator::find_next(source, candidates, direction) {
            Some(next) => {
                self.focus(next);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FocusConfig;
    use crate::focus::geometry::Rect;
    use crate::focus::registry::FocusLoopOptions;
    use crate::focus::shortcuts::ShortcutOptions;
    use crossterm::event::{KeyEventState, ModifierKeyCode};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn release(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        }
    }

    const ALT: KeyCode = KeyCode::Modifier(ModifierKeyCode::LeftAlt);

    fn grid(ctx: &mut FocusContext) -> (NodeId, Vec<NodeId>) {
        let body = ctx.document().body();
        let menu = ctx.document_mut().create_child(body, "div");
        let rects = [
            Rect::new(0.0, 0.0, 10.0, 10.0),
            Rect::new(0.0, 20.0, 10.0, 10.0),
            Rect::new(30.0, 15.0, 10.0, 10.0),
        ];
        let items = rects
            .iter()
            .map(|rect| {
                let item = ctx.document_mut().create_child(menu, "button");
                ctx.document_mut().set_rect(item, *rect);
                item
            })
            .collect();
        ctx.add_focus_loop(menu, FocusLoopOptions::new()).unwrap();
        (menu, items)
    }

    #[test]
    fn test_arrow_prefers_aligned_candidate() {
        let mut ctx = FocusContext::standalone(FocusConfig::default());
        let (_, items) = grid(&mut ctx);
        ctx.focus(items[0]);
        ctx.set_focus_mode(FocusMode::Keyboard);

        let flow = ctx.handle_key_down(&press(KeyCode::Down));
        assert!(flow.consumed && flow.stopped);
        assert_eq!(ctx.active_element(), Some(items[1]));
    }

    #[test]
    fn test_keys_ignored_in_default_mode() {
        let mut ctx = FocusContext::standalone(FocusConfig::default());
        let (_, items) = grid(&mut ctx);
        ctx.focus(items[0]);
        assert_eq!(ctx.focus_mode(), FocusMode::Default);

        assert!(!ctx.handle_key_event(press(KeyCode::Down)));
        assert_eq!(ctx.active_element(), Some(items[0]));
    }

    #[test]
    fn test_hover_promotes_to_keyboard() {
        let mut ctx = FocusContext::standalone(FocusConfig::default());
        let (_, items) = grid(&mut ctx);
        ctx.focus(items[0]);
        ctx.set_focus_mode(FocusMode::Hover);

        ctx.handle_key_down(&press(KeyCode::Right));
        assert_eq!(ctx.focus_mode(), FocusMode::Keyboard);
    }

    #[test]
    fn test_tab_wraps_within_loop() {
        let mut ctx = FocusContext::standalone(FocusConfig::default());
        let (_, items) = grid(&mut ctx);
        ctx.focus(items[2]);
        ctx.set_focus_mode(FocusMode::Keyboard);

        ctx.handle_key_down(&press(KeyCode::Tab));
        assert_eq!(ctx.active_element(), Some(items[0]));

        ctx.handle_key_down(&KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT));
        assert_eq!(ctx.active_element(), Some(items[2]));
    }

    #[test]
    fn test_exit_key_leaves_loop() {
        let mut ctx = FocusContext::standalone(FocusConfig::default());
        let body = ctx.document().body();
        let opener = ctx.document_mut().create_child(body, "button");
        let menu = ctx.document_mut().create_child(body, "div");
        let item = ctx.document_mut().create_child(menu, "button");
        ctx.document_mut().set_rect(item, Rect::new(0.0, 0.0, 10.0, 10.0));
        ctx.add_focus_loop(menu, FocusLoopOptions::new().exit_key(KeyChord::new("escape")).exit_to(opener))
            .unwrap();
        ctx.focus(item);
        ctx.set_focus_mode(FocusMode::Keyboard);

        assert!(ctx.handle_key_event(press(KeyCode::Esc)));
        assert_eq!(ctx.active_element(), Some(opener));
    }

    #[tokio::test(start_paused = true)]
    async fn test_escape_reverts_to_default_after_event() {
        let mut ctx = FocusContext::standalone(FocusConfig::default());
        let (_, items) = grid(&mut ctx);
        ctx.focus(items[0]);
        ctx.set_focus_mode(FocusMode::Accessible);

        ctx.handle_key_down(&press(KeyCode::Esc));
        assert_eq!(ctx.focus_mode(), FocusMode::Accessible);
        ctx.run_until_idle().await;
        assert_eq!(ctx.focus_mode(), FocusMode::Default);
    }

    #[test]
    fn test_reserved_keys_left_to_element() {
        let mut ctx = FocusContext::standalone(FocusConfig::default());
        let (menu, items) = grid(&mut ctx);
        let input = ctx.document_mut().create_child(menu, "input");
        ctx.document_mut().set_rect(input, Rect::new(20.0, 0.0, 10.0, 10.0));
        ctx.focus(input);
        ctx.set_focus_mode(FocusMode::Keyboard);

        assert!(!ctx.handle_key_down(&press(KeyCode::Left)).consumed);
        assert_eq!(ctx.active_element(), Some(input));
        assert!(ctx.handle_key_down(&press(KeyCode::Down)).consumed);
        assert_ne!(ctx.active_element(), Some(input));
        assert!(items.contains(&ctx.active_element().unwrap()));
    }

    #[test]
    fn test_stale_inner_listener_demoted() {
        let mut ctx = FocusContext::standalone(FocusConfig::default());
        let body = ctx.document().body();
        let outer = ctx.document_mut().create_child(body, "div");
        let inner = ctx.document_mut().create_child(outer, "div");
        let item = ctx.document_mut().create_child(inner, "button");
        ctx.document_mut().set_rect(item, Rect::new(0.0, 0.0, 10.0, 10.0));
        ctx.add_focus_loop(inner, FocusLoopOptions::new().level(1)).unwrap();
        ctx.add_focus_loop(outer, FocusLoopOptions::new()).unwrap();
        assert!(ctx.document().has_class(inner, FOCUS_LISTENER_CLASS));

        ctx.focus(item);
        ctx.set_focus_mode(FocusMode::Keyboard);
        ctx.handle_key_down(&press(KeyCode::Down));
        assert!(!ctx.document().has_class(inner, FOCUS_LISTENER_CLASS));
        assert!(ctx.document().has_class(outer, FOCUS_LISTENER_CLASS));
    }

    #[test]
    fn test_nested_listeners_handle_a_key_once() {
        let mut ctx = FocusContext::standalone(FocusConfig::immediate());
        let body = ctx.document().body();
        let outer = ctx.document_mut().create_child(body, "div");
        let middle = ctx.document_mut().create_child(outer, "div");
        let inner = ctx.document_mut().create_child(middle, "div");
        let file = ctx.document_mut().create_child(inner, "button");
        let open = ctx.document_mut().create_child(inner, "button");
        ctx.document_mut().set_rect(file, Rect::new(0.0, 0.0, 10.0, 10.0));
        ctx.document_mut().set_rect(open, Rect::new(0.0, 20.0, 10.0, 10.0));
        ctx.add_focus_loop(inner, FocusLoopOptions::new().level(2)).unwrap();
        ctx.add_focus_loop(middle, FocusLoopOptions::new().level(1)).unwrap();
        ctx.add_focus_loop(outer, FocusLoopOptions::new()).unwrap();
        ctx.apply_shortcut_options(file, ShortcutOptions::key("F")).unwrap();
        ctx.apply_shortcut_options(open, ShortcutOptions::key("O").path("F")).unwrap();

        ctx.focus(file);
        ctx.set_focus_mode(FocusMode::Shortcuts);
        ctx.handle_key_down(&press(KeyCode::Char('f')));
        assert_eq!(ctx.shortcut_path(), "F");

        // One step back, not two
        ctx.handle_key_down(&press(KeyCode::Esc));
        assert!(!ctx.document().has_class(inner, FOCUS_LISTENER_CLASS));
        assert_eq!(ctx.shortcut_path(), "");
        assert_eq!(ctx.focus_mode(), FocusMode::Shortcuts);
    }

    #[test]
    fn test_typed_keys_feed_shortcut_path() {
        let mut ctx = FocusContext::standalone(FocusConfig::immediate());
        let (_, items) = grid(&mut ctx);
        ctx.apply_shortcut_options(items[0], ShortcutOptions::key("F")).unwrap();
        ctx.apply_shortcut_options(items[1], ShortcutOptions::key("O").path("F")).unwrap();
        ctx.apply_shortcut_options(items[2], ShortcutOptions::key("S").path("F")).unwrap();
        ctx.focus(items[0]);
        ctx.set_focus_mode(FocusMode::Shortcuts);

        let flow = ctx.handle_key_down(&press(KeyCode::Char('f')));
        assert!(flow.consumed);
        assert_eq!(ctx.shortcut_path(), "F");

        ctx.handle_key_down(&press(KeyCode::Esc));
        assert_eq!(ctx.shortcut_path(), "");
        assert_eq!(ctx.focus_mode(), FocusMode::Shortcuts);
    }

    #[test]
    fn test_alt_tap_toggles_shortcuts() {
        let mut ctx = FocusContext::standalone(FocusConfig::default());
        ctx.handle_key_event(press(ALT));
        assert!(ctx.handle_key_event(release(ALT, KeyModifiers::NONE)));
        assert_eq!(ctx.focus_mode(), FocusMode::Shortcuts);

        ctx.handle_key_event(press(ALT));
        ctx.handle_key_event(release(ALT, KeyModifiers::NONE));
        assert_eq!(ctx.focus_mode(), FocusMode::Default);

        // Alt used as a modifier does not toggle
        ctx.handle_key_event(press(ALT));
        ctx.handle_key_event(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT));
        assert!(!ctx.handle_key_event(release(ALT, KeyModifiers::NONE)));
        assert_eq!(ctx.focus_mode(), FocusMode::Default);
    }

    #[tokio::test(start_paused = true)]
    async fn test_desktop_alt_hold_enters_shortcuts() {
        let config = FocusConfig::builder().desktop_mode(true).build();
        let mut ctx = FocusContext::standalone(config);
        ctx.handle_key_event(press(ALT));
        assert_eq!(ctx.focus_mode(), FocusMode::Default);

        ctx.run_until_idle().await;
        assert_eq!(ctx.focus_mode(), FocusMode::Shortcuts);

        // Releasing after the hold keeps shortcuts on
        ctx.handle_key_event(release(ALT, KeyModifiers::NONE));
        assert_eq!(ctx.focus_mode(), FocusMode::Shortcuts);
    }

    #[test]
    fn test_global_handlers_respect_modal_scope() {
        let mut ctx = FocusContext::standalone(FocusConfig::default());
        let hits = Rc::new(RefCell::new(Vec::new()));

        let sink = hits.clone();
        ctx.add_keyboard_listener("Ctrl+keys", move |_| { sink.borrow_mut().push("save"); true }, "Save", true)
            .unwrap();
        let body = ctx.document().body();
        let dialog = ctx.document_mut().create_child(body, "div");
        ctx.add_focus_loop(dialog, FocusLoopOptions::new().modal()).unwrap();
        let sink = hits.clone();
        let added = ctx
            .add_loop_keyboard_listener(dialog, "Ctrl+keyw", move |_| { sink.borrow_mut().push("close"); true }, "Close", true)
            .unwrap();
        assert!(added);

        let save = KeyChord::ctrl("keys");
        let close = KeyChord::ctrl("keyw");
        assert!(ctx.process_key_chord(&save));
        assert!(!ctx.process_key_chord(&close));

        ctx.enter_focus_loop(dialog, EnterOptions::keyboard());
        assert!(!ctx.process_key_chord(&save));
        assert!(ctx.process_key_chord(&close));

        assert_eq!(*hits.borrow(), vec!["save", "close"]);
        assert_eq!(
            ctx.key_bindings(),
            vec![
                ("Ctrl+keys".to_string(), "Save".to_string()),
                ("Ctrl+keyw".to_string(), "Close".to_string())
            ]
        );
    }

    #[test]
    fn test_invalid_key_path() {
        let mut ctx = FocusContext::standalone(FocusConfig::default());
        let result = ctx.add_keyboard_listener("Ctrl+", |_| true, "Nothing", false);
        assert!(matches!(result, Err(FocusError::InvalidKeyPath(_))));
    }
}
