use super::{FocusAction, FocusContext, HoverItem};
use crate::focus::details::focus_details;
use crate::focus::dom::NodeId;
use crate::focus::events::WindowEvent;
use crate::focus::state::{FocusMode, ModeOptions};
use crate::focus::timers::TimerKind;
use crate::focus::{FOCUS_LISTENER_CLASS, HOVER_FOCUS_CLASS, LEVEL_ATTR, MENU_LEVEL_CLASS};

/// Class of transient cells that take focus without affecting the mode
const TEMP_FOCUS_CLASS: &str = "temp-focus-cell";

impl FocusContext {
    /// Focus an element, running focus-out and focus-in handling.
    ///
    /// Returns false when the element cannot take focus or a handler moved
    /// focus elsewhere.
    pub fn focus(&mut self, element: NodeId) -> bool {
        if !self.document.is_focusable(element) {
            return false;
        }
        let previous = self.document.active_element();
        if previous == Some(element) {
            return true;
        }

        self.document.set_active(Some(element));
        if let Some(previous) = previous {
            self.handle_focus_out(previous, Some(element));
            if self.document.active_element() != Some(element) {
                return false;
            }
        }
        self.handle_focus_in(element);
        self.document.active_element() == Some(element)
    }

    /// Drop focus from the active element to nothing
    pub fn blur_active(&mut self) {
        if let Some(previous) = self.document.active_element() {
            self.document.set_active(None);
            self.handle_focus_out(previous, None);
        }
    }

    /// Focus the first tabbable element of the loop around `element`, or
    /// the element itself outside any loop
    fn find_focusable_element(&mut self, element: NodeId) {
        match self.document.closest_with_class(element, MENU_LEVEL_CLASS) {
            Some(parent) => {
                let level = self.loop_level(parent);
                let list = self.document.keyboard_focusable(parent, level, true);
                if let Some(first) = list.first() {
                    self.focus(*first);
                }
            }
            None => {
                self.focus(element);
            }
        }
    }

    pub(super) fn loop_level(&self, container: NodeId) -> Option<i64> {
        self.document.attr(container, LEVEL_ATTR).and_then(|level| level.parse().ok())
    }

    fn handle_focus_out(&mut self, target: NodeId, related: Option<NodeId>) {
        if self.role.is_shadow() {
            return;
        }

        if let Some(paused) = self.focus_control_paused {
            if related != Some(paused) {
                self.focus(paused);
            }
            return;
        }

        if self.focus_passing || self.is_bluring {
            return;
        }

        if related.is_none() {
            if let Some(container) = self.active_modal.as_ref().map(|modal| modal.container) {
                self.find_focusable_element(container);
                return;
            }
        }

        // The default focus control takes focus back when it loses it to nothing
        if Some(target) == self.default_focus_control && related.is_none() && self.in_default_mode {
            self.focus(target);
        }

        if related.is_none() && self.focus_mode != FocusMode::Shortcuts {
            let delay = self.config.timings.blur_revert();
            self.timers.schedule(delay, TimerKind::BlurRevert);
        }
    }

    fn handle_focus_in(&mut self, element: NodeId) {
        if self.role.is_shadow() {
            return;
        }

        if let Some(paused) = self.focus_control_paused {
            if element != paused {
                self.focus(paused);
            }
            return;
        }

        if let Some(container) = self.active_modal.as_ref().map(|modal| modal.container) {
            if !self.document.contains(container, element) {
                self.find_focusable_element(container);
                return;
            }
        }

        if element == self.document.body() {
            self.set_focus_mode(FocusMode::Default);
        } else if !self.document.has_class(element, TEMP_FOCUS_CLASS) {
            if self.passed_focus == Some(element) {
                self.passed_focus = None;
                self.focus_passing = false;
            } else if !self.in_accessibility_mode() {
                let details = focus_details(&self.document, element);
                let keyboard_context = self.in_keyboard_mode() && !self.mouse_clicked;
                if details.uses_keyboard || self.in_focusable_menu_level(element) || keyboard_context {
                    let mode = if !self.document.has_class(element, MENU_LEVEL_CLASS) && !self.mouse_clicked {
                        FocusMode::Keyboard
                    } else {
                        FocusMode::Hover
                    };
                    self.set_focus_mode(mode);
                } else {
                    self.set_focus_mode(FocusMode::Default);
                }
            } else if self.focus_mode == FocusMode::Shortcuts {
                let details = focus_details(&self.document, element);
                if !details.contains_shortcut_keys {
                    self.set_focus_mode(FocusMode::Accessible);
                }
            }
        } else if self.focus_mode != self.focus_default {
            self.set_focus_mode(FocusMode::Default);
        }

        self.mouse_clicked = false;
    }

    /// `element` sits in a loop container that can itself take focus
    fn in_focusable_menu_level(&self, element: NodeId) -> bool {
        let body = self.document.body();
        for id in self.document.ancestors(element) {
            if id == body {
                return false;
            }
            if self.document.has_class(id, MENU_LEVEL_CLASS) && self.document.has_attr(id, "tabindex") {
                return true;
            }
        }
        false
    }

    /// The window received OS focus
    pub fn handle_window_focus(&mut self) {
        if self.role.is_shadow() {
            return;
        }
        self.observers.window.emit(&WindowEvent::Focus);
        self.is_bluring = false;
        self.is_blured = false;

        if self.focus_mode == FocusMode::Default && !self.role.is_main_window() {
            let delay = self.config.timings.broadcast();
            self.timers.schedule(delay, TimerKind::BroadcastMode);
        }
    }

    /// The window lost OS focus
    pub fn handle_window_blur(&mut self) {
        if self.role.is_shadow() {
            return;
        }
        self.timers.cancel(&TimerKind::BlurRevert);
        self.is_bluring = false;
        self.is_blured = true;
        self.observers.window.emit(&WindowEvent::Blur);
    }

    /// Pointer pressed on `target` (or outside any element)
    pub fn handle_pointer_down(&mut self, target: Option<NodeId>) {
        if let Some(target) = target {
            self.cancel_hover_items(target);
        }
        if self.role.is_shadow() {
            return;
        }
        self.mouse_clicked = true;
        if self.in_accessibility_mode() {
            let delay = self.config.timings.deferred_mode();
            self.timers.schedule(delay, TimerKind::PointerSettle { target });
        }
    }

    pub(super) fn settle_pointer(&mut self, target: Option<NodeId>) {
        let uses_keyboard = target
            .filter(|id| self.document.is_live(*id))
            .map_or(false, |id| focus_details(&self.document, id).uses_keyboard);
        if uses_keyboard {
            self.set_focus_mode(FocusMode::Hover);
        } else {
            self.set_focus_mode(FocusMode::Default);
        }
    }

    /// The main window was hidden or shown
    pub fn handle_visibility_change(&mut self) {
        if self.role.is_main_window() {
            self.set_focus_mode(FocusMode::Default);
        }
    }

    /// Pointer moved over `target`
    pub fn handle_mouse_move(&mut self, target: NodeId) {
        let listener = self.document.closest_with_class(target, FOCUS_LISTENER_CLASS);
        let hover_loop = listener.map_or(false, |id| self.document.has_class(id, HOVER_FOCUS_CLASS));
        if hover_loop && self.focus_mode == FocusMode::Keyboard {
            self.set_focus_mode_with(FocusMode::Hover, ModeOptions::no_transfer());
        }

        let active = self.document.active_element();
        let items: Vec<NodeId> = self
            .document
            .ancestors(target)
            .into_iter()
            .filter(|id| self.hover_items.contains_key(id))
            .collect();
        for item in items {
            if active.map_or(false, |active| self.document.contains(item, active)) {
                continue;
            }
            let kind = TimerKind::HoverFocus { item };
            if !self.timers.is_scheduled(&kind) {
                let delay = self.config.timings.hover_focus();
                self.timers.schedule(delay, kind);
            }
        }
    }

    /// Pointer left a hover item
    pub fn handle_mouse_leave(&mut self, item: NodeId) {
        self.timers.cancel(&TimerKind::HoverFocus { item });
    }

    fn cancel_hover_items(&mut self, target: NodeId) {
        for id in self.document.ancestors(target) {
            if self.hover_items.contains_key(&id) {
                self.timers.cancel(&TimerKind::HoverFocus { item: id });
            }
        }
    }

    /// Make `item` take focus once the pointer rests on it; `focus_action`
    /// replaces the plain focus call
    pub fn create_hover_item(&mut self, item: NodeId, focus_action: Option<FocusAction>) {
        self.hover_items.insert(item, HoverItem { focus_action });
    }

    pub fn remove_hover_item(&mut self, item: NodeId) -> bool {
        self.timers.cancel(&TimerKind::HoverFocus { item });
        self.hover_items.remove(&item).is_some()
    }

    pub(super) fn focus_hover_item(&mut self, item: NodeId) {
        let Some(hover) = self.hover_items.get_mut(&item) else {
            return;
        };
        match hover.focus_action.take() {
            Some(mut action) => {
                action(self);
                if let Some(hover) = self.hover_items.get_mut(&item) {
                    hover.focus_action.get_or_insert(action);
                }
            }
            None => {
                self.focus(item);
            }
        }
    }

    /// Keep focus pinned on `element` until resumed
    pub fn pause_focus_control(&mut self, element: NodeId) {
        self.focus_control_paused = Some(element);
    }

    pub fn resume_focus_control(&mut self) {
        self.focus_control_paused = None;
    }

    /// Element that holds focus while in `default` mode
    pub fn set_default_focus_control(&mut self, control: Option<NodeId>) {
        self.default_focus_control = control;
        if let Some(control) = control {
            if self.in_default_mode {
                self.focus(control);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FocusConfig;
    use crate::focus::geometry::Rect;

    fn context() -> FocusContext {
        FocusContext::standalone(FocusConfig::default())
    }

    fn button(ctx: &mut FocusContext, parent: NodeId) -> NodeId {
        let id = ctx.document_mut().create_child(parent, "button");
        ctx.document_mut().set_rect(id, Rect::new(0.0, 0.0, 10.0, 10.0));
        id
    }

    #[test]
    fn test_keyboard_input_focus_switches_mode() {
        let mut ctx = context();
        let body = ctx.document().body();
        let input = ctx.document_mut().create_child(body, "input");
        assert!(ctx.focus(input));
        assert_eq!(ctx.focus_mode(), FocusMode::Keyboard);

        let plain = button(&mut ctx, body);
        ctx.set_focus_mode(FocusMode::Hover);
        ctx.handle_pointer_down(Some(plain));
        assert!(ctx.focus(plain));
        assert_eq!(ctx.focus_mode(), FocusMode::Default);
    }

    #[test]
    fn test_non_focusable_ignored() {
        let mut ctx = context();
        let body = ctx.document().body();
        let div = ctx.document_mut().create_child(body, "div");
        assert!(!ctx.focus(div));
        assert_eq!(ctx.active_element(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blur_to_nothing_reverts_to_default() {
        let mut ctx = context();
        let body = ctx.document().body();
        let input = ctx.document_mut().create_child(body, "input");
        ctx.focus(input);
        assert_eq!(ctx.focus_mode(), FocusMode::Keyboard);

        ctx.blur_active();
        assert_eq!(ctx.focus_mode(), FocusMode::Keyboard);
        ctx.run_until_idle().await;
        assert_eq!(ctx.focus_mode(), FocusMode::Default);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_blur_cancels_revert() {
        let mut ctx = context();
        let body = ctx.document().body();
        let input = ctx.document_mut().create_child(body, "input");
        ctx.focus(input);
        ctx.blur_active();
        ctx.handle_window_blur();
        ctx.run_until_idle().await;
        assert_eq!(ctx.focus_mode(), FocusMode::Keyboard);
        assert!(ctx.is_blured());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pointer_down_leaves_accessibility_mode() {
        let mut ctx = context();
        let body = ctx.document().body();
        let target = button(&mut ctx, body);
        ctx.set_focus_mode(FocusMode::Accessible);

        ctx.handle_pointer_down(Some(target));
        assert_eq!(ctx.focus_mode(), FocusMode::Accessible);
        ctx.run_until_idle().await;
        assert_eq!(ctx.focus_mode(), FocusMode::Default);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hover_item_focuses_after_delay() {
        let mut ctx = context();
        let body = ctx.document().body();
        let item = button(&mut ctx, body);
        let other = button(&mut ctx, body);
        ctx.create_hover_item(item, None);
        ctx.create_hover_item(other, None);

        ctx.handle_mouse_move(other);
        ctx.handle_mouse_leave(other);
        ctx.handle_mouse_move(item);

        tokio::time::advance(std::time::Duration::from_millis(299)).await;
        ctx.poll_timers();
        assert_eq!(ctx.active_element(), None);

        ctx.run_until_idle().await;
        assert_eq!(ctx.active_element(), Some(item));
    }

    #[test]
    fn test_paused_focus_control_holds_focus() {
        let mut ctx = context();
        let body = ctx.document().body();
        let pinned = button(&mut ctx, body);
        let other = button(&mut ctx, body);
        ctx.focus(pinned);
        ctx.pause_focus_control(pinned);

        assert!(!ctx.focus(other));
        assert_eq!(ctx.active_element(), Some(pinned));

        ctx.resume_focus_control();
        assert!(ctx.focus(other));
    }
}
