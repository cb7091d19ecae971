use super::FocusContext;
use crate::focus::dom::NodeId;
use crate::focus::error::FocusError;
use crate::focus::events::SubscriptionId;
use crate::focus::geometry::Direction;
use crate::focus::registry::{EnterOptions, FocusLoopOptions, FocusLoopToken, LeaveEvent};
use crate::focus::state::next_modal_id;
use crate::focus::{FOCUS_LISTENER_CLASS, HOVER_FOCUS_CLASS, LEVEL_ATTR, MENU_LEVEL_CLASS};

impl FocusContext {
    /// Register `container` as a navigable group.
    ///
    /// Re-registering replaces the previous token. The container only becomes
    /// a key listener when no ancestor already listens for it.
    pub fn add_focus_loop(&mut self, container: NodeId, options: FocusLoopOptions) -> Result<(), FocusError> {
        if !self.document.is_live(container) {
            return Err(FocusError::NotRegistered(container.to_string()));
        }

        let modal_id = if options.modal {
            self.document.set_attr(container, "aria-modal", "true");
            if !self.document.has_attr(container, "tabindex") {
                self.document.set_attr(container, "tabindex", "-1");
            }
            Some(next_modal_id())
        } else {
            None
        };

        let token = FocusLoopToken::new(container, options, modal_id);
        self.document.set_attr(container, LEVEL_ATTR, token.level.to_string());
        self.document.add_class(container, MENU_LEVEL_CLASS);
        if token.hover_focus {
            self.document.add_class(container, HOVER_FOCUS_CLASS);
        }
        if self.document.closest_with_class(container, FOCUS_LISTENER_CLASS).is_none() {
            self.document.add_class(container, FOCUS_LISTENER_CLASS);
        }

        log::debug!("Registered focus loop {} at level {} (modal {:?})", container, token.level, modal_id);
        self.loops.insert(container, token);
        Ok(())
    }

    pub fn remove_focus_loop(&mut self, container: NodeId) -> Result<(), FocusError> {
        let token = self
            .loops
            .remove(&container)
            .ok_or_else(|| FocusError::NotRegistered(container.to_string()))?;

        self.document.remove_attr(container, LEVEL_ATTR);
        self.document.remove_class(container, MENU_LEVEL_CLASS);
        if token.hover_focus {
            self.document.remove_class(container, HOVER_FOCUS_CLASS);
        }
        self.document.remove_class(container, FOCUS_LISTENER_CLASS);

        let active = self
            .active_modal
            .as_ref()
            .map_or(false, |modal| modal.container == container);
        if active {
            self.end_modal_mode();
        }
        log::debug!("Removed focus loop {}", container);
        Ok(())
    }

    pub fn change_level(&mut self, container: NodeId, level: i64) -> bool {
        let Some(token) = self.loops.get_mut(&container) else {
            return false;
        };
        token.level = level;
        self.document.set_attr(container, LEVEL_ATTR, level.to_string());
        true
    }

    pub fn focus_token(&self, container: NodeId) -> Option<&FocusLoopToken> {
        self.loops.get(&container)
    }

    /// Enter a registered loop, beginning modal mode for modal loops.
    ///
    /// Keyboard entry focuses the first tabbable element of the enclosing
    /// loop, or the last one when moving up; mouse entry focuses the
    /// container itself. Returns false for unregistered containers.
    pub fn enter_focus_loop(&mut self, container: NodeId, options: EnterOptions) -> bool {
        let mode = self.focus_mode;
        let Some(token) = self.loops.get_mut(&container) else {
            return false;
        };
        self.mouse_clicked = options.with_mouse;

        token.initial_focus_mode = Some(mode);
        if let Some(close_mode) = options.close_focus_mode {
            token.close_focus_mode = Some(close_mode);
        }
        if let Some(target) = options.exit_target {
            token.exit_target = Some(target);
        }
        if let Some(modal) = token.modal_token() {
            self.begin_modal_mode(modal);
        }

        if options.with_mouse {
            self.focus(container);
        } else if let Some(parent) = self.document.closest_with_class(container, MENU_LEVEL_CLASS) {
            let level = self.loop_level(parent);
            let list = self.document.keyboard_focusable(parent, level, true);
            let next = match options.direction {
                Some(Direction::Up) => list.last(),
                _ => list.first(),
            };
            if let Some(next) = next.copied() {
                self.focus(next);
            }
        }
        true
    }

    /// Leave a loop.
    ///
    /// Returns false when the container is unregistered, a leave is already
    /// running, or a leave listener cancelled. Otherwise returns whether a
    /// close handler or a live exit target existed.
    pub fn leave_focus_loop(&mut self, container: NodeId, with_mouse: bool) -> bool {
        let Some(token) = self.loops.get_mut(&container) else {
            return false;
        };
        if token.leaving {
            return false;
        }
        token.leaving = true;

        let mut event = LeaveEvent {
            cancel: false,
            pass_focus: false,
            with_mouse,
        };
        let mut listeners = std::mem::take(&mut token.leave_listeners);
        for (_, listener) in listeners.iter_mut() {
            listener(self, &mut event);
        }

        let Some(token) = self.loops.get_mut(&container) else {
            return false;
        };
        let added = std::mem::replace(&mut token.leave_listeners, listeners);
        token.leave_listeners.extend(added);

        if event.cancel {
            token.leaving = false;
            log::debug!("Leave of {} cancelled", container);
            return false;
        }

        let is_modal = token.is_modal();
        let exit_target = token.exit_target.clone();
        let close_focus_mode = token.close_focus_mode;
        let initial_focus_mode = token.initial_focus_mode;
        let mut close_handler = token.close_handler.take();

        if is_modal {
            self.end_modal_mode();
        }

        let mut valid_exit = false;
        if !with_mouse {
            if let Some(element) = exit_target.and_then(|target| target.resolve(&self.document)) {
                valid_exit = true;
                let tabbable_parent = self
                    .document
                    .closest_with_class(element, MENU_LEVEL_CLASS)
                    .map_or(false, |parent| self.document.has_attr(parent, "tabindex"));
                self.focus_passing = self.in_keyboard_mode() || tabbable_parent || event.pass_focus;
                if self.focus_passing {
                    self.passed_focus = Some(element);
                }
            }
        }

        let has_close = close_handler.is_some();
        if let Some(handler) = close_handler.as_mut() {
            handler(self);
        }
        if let Some(token) = self.loops.get_mut(&container) {
            if token.close_handler.is_none() {
                token.close_handler = close_handler;
            }
        }

        let passed = self.passed_focus;
        if let Some(element) = passed {
            self.focus(element);
            if self.passed_focus == Some(element) {
                self.passed_focus = None;
                self.focus_passing = false;
            }
        }

        if let Some(token) = self.loops.get_mut(&container) {
            token.leaving = false;
        }

        if let Some(mode) = close_focus_mode {
            self.set_focus_mode(mode);
        } else if is_modal && passed.is_none() && !has_close {
            if let Some(mode) = initial_focus_mode {
                self.set_focus_mode(mode);
            }
        }

        log::debug!("Left focus loop {}", container);
        has_close || valid_exit
    }

    /// Listen for leaves of `container`; the listener may cancel or request
    /// that focus be passed to the exit target
    pub fn on_focus_leave(
        &mut self,
        container: NodeId,
        listener: impl FnMut(&mut FocusContext, &mut LeaveEvent) + 'static,
    ) -> Option<SubscriptionId> {
        let token = self.loops.get_mut(&container)?;
        let id = SubscriptionId::next();
        token.leave_listeners.push((id, Box::new(listener)));
        Some(id)
    }

    pub fn off_focus_leave(&mut self, container: NodeId, id: SubscriptionId) -> bool {
        let Some(token) = self.loops.get_mut(&container) else {
            return false;
        };
        let before = token.leave_listeners.len();
        token.leave_listeners.retain(|(listener, _)| *listener != id);
        before != token.leave_listeners.len()
    }
}
