//! The focus context: one window's focus state and its event handlers
//!
//! A `FocusContext` owns the window's document, registries, timers and bus
//! endpoint. Hosts feed it keyboard, pointer, focus and window events and
//! poll its timers; widgets register loops and access keys on it.

mod keyboard;
mod loops;
mod remote;
mod shortcuts;
mod window;

pub use keyboard::KeyFlow;
pub use shortcuts::ShortcutRequest;

use super::broadcast::{MessageBus, NullBus, WindowId, WindowRole, next_shadow_id};
use super::chord::KeyRouter;
use super::dom::{Document, NodeId};
use super::events::{ModeChanged, Observers, ShortcutPathChanged, SubscriptionId};
use super::registry::FocusLoopToken;
use super::shortcuts::ShortcutToken;
use super::speech::SpeechBox;
use super::state::{FocusMode, ModalToken, ModeOptions, Presentation};
use super::timers::{TimerKind, TimerQueue};
use crate::config::FocusConfig;
use std::collections::{BTreeMap, HashMap};
use tokio::time::Instant;

pub type FocusAction = Box<dyn FnMut(&mut FocusContext)>;

/// Pointer-driven item that takes focus after the pointer rests on it
pub(crate) struct HoverItem {
    pub(crate) focus_action: Option<FocusAction>,
}

pub struct FocusContext {
    role: WindowRole,
    window: WindowId,
    config: FocusConfig,
    document: Document,
    bus: Box<dyn MessageBus>,
    timers: TimerQueue,
    observers: Observers,

    focus_mode: FocusMode,
    focus_default: FocusMode,
    /// The last request was for `default` rather than a concrete mode
    in_default_mode: bool,
    shortcut_path: String,

    is_bluring: bool,
    is_blured: bool,
    /// Applying a change received from another window
    from_broadcast: bool,

    active_modal: Option<ModalToken>,
    loops: HashMap<NodeId, FocusLoopToken>,
    shortcut_tree: HashMap<NodeId, ShortcutToken>,
    router: KeyRouter<FocusContext>,
    base_key_paths: Option<BTreeMap<String, String>>,
    hover_items: HashMap<NodeId, HoverItem>,
    speech: Option<SpeechBox>,

    default_focus_control: Option<NodeId>,
    focus_control_paused: Option<NodeId>,
    focus_passing: bool,
    passed_focus: Option<NodeId>,
    mouse_clicked: bool,

    // Alt toggling
    alt_starting: bool,
    alt_down: bool,
    ctrl_down: bool,
    turned_on: bool,
    alt_path: String,

    next_focus_id: u64,
}

impl FocusContext {
    pub fn new(role: WindowRole, bus: Box<dyn MessageBus>, config: FocusConfig) -> Self {
        let speech = role
            .is_main_window()
            .then(|| SpeechBox::new(config.speech.history_cap));
        let window = bus.local_window();

        let mut context = Self {
            role,
            window,
            config,
            document: Document::new(),
            bus,
            timers: TimerQueue::new(),
            observers: Observers::default(),
            focus_mode: FocusMode::Default,
            focus_default: FocusMode::Default,
            in_default_mode: true,
            shortcut_path: String::new(),
            is_bluring: false,
            is_blured: false,
            from_broadcast: false,
            active_modal: None,
            loops: HashMap::new(),
            shortcut_tree: HashMap::new(),
            router: KeyRouter::new(),
            base_key_paths: None,
            hover_items: HashMap::new(),
            speech,
            default_focus_control: None,
            focus_control_paused: None,
            focus_passing: false,
            passed_focus: None,
            mouse_clicked: false,
            alt_starting: false,
            alt_down: false,
            ctrl_down: false,
            turned_on: false,
            alt_path: String::new(),
            next_focus_id: 0,
        };
        context.update_body_attributes();

        log::debug!("Created focus context {:?} on {}", role, window);
        if !role.is_main_window() {
            context.update_base_key_paths();
        }
        context
    }

    /// The application's main window
    pub fn main_window(bus: Box<dyn MessageBus>, config: FocusConfig) -> Self {
        Self::new(WindowRole::MainWindow, bus, config)
    }

    /// A frame embedded in the main window; asks the main window for its key paths
    pub fn child_frame(bus: Box<dyn MessageBus>, config: FocusConfig) -> Self {
        Self::new(WindowRole::ChildFrame, bus, config)
    }

    /// A single window with no other windows to talk to
    pub fn standalone(config: FocusConfig) -> Self {
        Self::new(WindowRole::MainWindow, Box::new(NullBus), config)
    }

    /// Additional context sharing the main window, with a fresh shadow id
    pub fn shadow(&self, bus: Box<dyn MessageBus>) -> FocusContext {
        FocusContext::new(WindowRole::MainWindowShadow(next_shadow_id()), bus, self.config.clone())
    }

    /// Drop all registrations, pending timers and subscriptions
    pub fn teardown(&mut self) {
        self.timers.clear();
        self.clear_key_caps();
        // Dropping the modal first keeps loop removal from broadcasting a mode change
        self.active_modal = None;
        let containers: Vec<NodeId> = self.loops.keys().copied().collect();
        for container in containers {
            if let Err(err) = self.remove_focus_loop(container) {
                log::warn!("Teardown: {}", err);
            }
        }
        self.shortcut_tree.clear();
        self.hover_items.clear();
        self.router.clear();
        self.observers = Observers::default();
        log::debug!("Tore down focus context {:?}", self.role);
    }

    // Accessors

    pub fn role(&self) -> WindowRole {
        self.role
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn config(&self) -> &FocusConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn focus_mode(&self) -> FocusMode {
        self.focus_mode
    }

    pub fn focus_default(&self) -> FocusMode {
        self.focus_default
    }

    pub fn shortcut_path(&self) -> &str {
        &self.shortcut_path
    }

    pub fn in_accessibility_mode(&self) -> bool {
        self.focus_mode.is_accessibility()
    }

    pub fn in_keyboard_mode(&self) -> bool {
        self.focus_mode.is_keyboard()
    }

    pub fn presentation(&self) -> Presentation {
        Presentation::from(self.focus_mode)
    }

    pub fn active_modal(&self) -> Option<&ModalToken> {
        self.active_modal.as_ref()
    }

    pub fn is_blured(&self) -> bool {
        self.is_blured
    }

    pub fn active_element(&self) -> Option<NodeId> {
        self.document.active_element()
    }

    /// Messages announced in the main window's speech region
    pub fn announcements(&self) -> &[String] {
        self.speech.as_ref().map_or(&[], |speech| speech.messages())
    }

    pub fn observers_mut(&mut self) -> &mut Observers {
        &mut self.observers
    }

    pub fn on_mode_changed(&mut self, observer: impl FnMut(&ModeChanged) + 'static) -> SubscriptionId {
        self.observers.mode_changed.subscribe(observer)
    }

    pub fn on_shortcut_path_changed(&mut self, observer: impl FnMut(&ShortcutPathChanged) + 'static) -> SubscriptionId {
        self.observers.shortcut_path_changed.subscribe(observer)
    }

    pub fn next_aria_element_id(&mut self, prefix: &str) -> String {
        let id = self.next_focus_id;
        self.next_focus_id += 1;
        format!("{}-{}", prefix, id)
    }

    /// Remove an element from the document along with any registration
    /// keyed by it or by one of its descendants
    pub fn remove_element(&mut self, node: NodeId) {
        self.document.remove(node);
        let document = &self.document;
        self.loops.retain(|id, _| document.is_live(*id));
        self.shortcut_tree.retain(|id, _| document.is_live(*id));
        self.hover_items.retain(|id, _| document.is_live(*id));
        for slot in [&mut self.default_focus_control, &mut self.focus_control_paused, &mut self.passed_focus] {
            if slot.map_or(false, |id| !document.is_live(id)) {
                *slot = None;
            }
        }
        if self.passed_focus.is_none() {
            self.focus_passing = false;
        }

        let modal_removed = self
            .active_modal
            .as_ref()
            .map_or(false, |modal| !self.document.is_live(modal.container));
        if modal_removed {
            self.end_modal_mode();
        }
    }

    // Mode state machine

    /// Parse and apply a mode by name
    pub fn set_focus_mode_named(&mut self, mode: &str, options: ModeOptions) -> Result<(), super::FocusError> {
        let mode: FocusMode = mode.parse()?;
        self.set_focus_mode_with(mode, options);
        Ok(())
    }

    pub fn set_focus_mode(&mut self, mode: FocusMode) {
        self.set_focus_mode_with(mode, ModeOptions::default());
    }

    pub fn set_focus_mode_with(&mut self, requested: FocusMode, options: ModeOptions) {
        self.timers.cancel(&TimerKind::BlurRevert);

        self.in_default_mode = requested == FocusMode::Default;
        let mode = if self.in_default_mode { self.focus_default } else { requested };
        if self.focus_mode == mode {
            return;
        }

        let previous = std::mem::replace(&mut self.focus_mode, mode);
        log::debug!("{:?}: focus mode {} -> {}", self.role, previous, mode);

        let shortcuts_toggled = previous == FocusMode::Shortcuts || mode == FocusMode::Shortcuts;
        if shortcuts_toggled {
            self.shortcut_path.clear();
        }

        if mode == FocusMode::Default {
            if let Some(control) = self.default_focus_control {
                self.focus(control);
            }
        }

        if shortcuts_toggled {
            if self.role.is_main_window() {
                self.update_shortcuts(ShortcutRequest::default());
            } else if previous == FocusMode::Shortcuts {
                self.clear_key_caps();
            }
        }

        if !self.from_broadcast && !self.is_bluring && !self.is_blured {
            self.broadcast_focus_mode(mode, options);
        }

        if !options.silent {
            self.observers.mode_changed.emit(&ModeChanged {
                mode,
                previous,
                options,
            });
        }

        self.update_body_attributes();
    }

    /// Change what `default` resolves to
    pub fn set_focus_default(&mut self, mode: FocusMode, options: ModeOptions) {
        if mode == self.focus_default {
            return;
        }
        self.focus_default = mode;
        log::debug!("{:?}: focus default -> {}", self.role, mode);

        if !self.from_broadcast && !self.is_bluring && !self.is_blured {
            self.broadcast(
                super::Operation::SetFocusDefault,
                vec![serde_json::json!(mode), serde_json::json!(options)],
                !options.no_transfer,
            );
        }

        if self.in_default_mode {
            self.set_focus_mode(FocusMode::Default);
        }
    }

    pub fn set_focus_default_named(&mut self, mode: &str, options: ModeOptions) -> Result<(), super::FocusError> {
        let mode: FocusMode = mode.parse()?;
        self.set_focus_default(mode, options);
        Ok(())
    }

    /// Step down from shortcuts to accessible
    pub fn downgrade_shortcuts(&mut self) {
        if self.focus_mode == FocusMode::Shortcuts {
            self.set_focus_mode(FocusMode::Accessible);
        }
    }

    fn begin_modal_mode(&mut self, modal: ModalToken) {
        log::debug!("Modal {} active on {}", modal.modal_id, modal.container);
        self.active_modal = Some(modal);
        self.set_focus_default(FocusMode::Hover, ModeOptions::default());
    }

    fn end_modal_mode(&mut self) {
        self.set_focus_default(FocusMode::Default, ModeOptions::default());
        if let Some(modal) = self.active_modal.take() {
            log::debug!("Modal {} ended", modal.modal_id);
        }
    }

    fn update_body_attributes(&mut self) {
        let presentation = self.presentation();
        let body = self.document.body();
        self.document.set_attr(body, "accessible", presentation.accessible.to_string());
        self.document.set_attr(body, "keyboardfocus", presentation.keyboard_focus.to_string());
        self.document.set_attr(body, "focusMode", presentation.focus_mode.as_str());
    }

    // Timers

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    /// Fire every timer that is due; returns how many fired
    pub fn poll_timers(&mut self) -> usize {
        let now = Instant::now();
        let mut fired = 0;
        while let Some(kind) = self.timers.pop_due(now) {
            self.fire_timer(kind);
            fired += 1;
        }
        fired
    }

    /// Sleep through pending timers until none remain
    pub async fn run_until_idle(&mut self) {
        loop {
            self.poll_timers();
            let Some(deadline) = self.timers.next_deadline() else {
                break;
            };
            tokio::time::sleep_until(deadline).await;
        }
    }

    fn fire_timer(&mut self, kind: TimerKind) {
        log::trace!("{:?}: timer {:?}", self.role, kind);
        match kind {
            TimerKind::BlurRevert => self.set_focus_mode(FocusMode::Default),
            TimerKind::BroadcastMode => self.broadcast_focus_mode(self.focus_mode, ModeOptions::default()),
            TimerKind::DeferredMode(mode) => self.set_focus_mode(mode),
            TimerKind::PointerSettle { target } => self.settle_pointer(target),
            TimerKind::ShortcutSettle {
                path,
                retries,
                last_actionable,
            } => {
                self.update_shortcuts(ShortcutRequest {
                    path: Some(path),
                    append: None,
                    silent: true,
                    retries,
                    last_actionable,
                });
            }
            TimerKind::AltHold => self.finish_alt_hold(),
            TimerKind::RefocusWindow(window) => self.bus.focus_window(window),
            TimerKind::HoverFocus { item } => self.focus_hover_item(item),
        }
    }
}
