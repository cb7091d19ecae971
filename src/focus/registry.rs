//! Focus-loop tokens: per-container navigation settings
//!
//! Tokens live in the context's registry keyed by container [`NodeId`]. Exit
//! targets hold ids, not elements, and are checked for liveness before use.

use super::chord::KeyChord;
use super::dom::{Document, NodeId};
use super::events::SubscriptionId;
use super::runtime::FocusContext;
use super::state::{FocusMode, ModalToken};

pub type CloseHandler = Box<dyn FnMut(&mut FocusContext)>;
pub type LeaveListener = Box<dyn FnMut(&mut FocusContext, &mut LeaveEvent)>;

/// Where focus goes when a loop is left
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitTarget {
    /// First element matching the selector at leave time
    Selector(String),
    /// A specific element, ignored once it has been removed
    Element(NodeId),
}

impl ExitTarget {
    pub fn resolve(&self, doc: &Document) -> Option<NodeId> {
        match self {
            ExitTarget::Selector(selector) => match doc.query_selector(selector) {
                Ok(found) => found,
                Err(err) => {
                    log::warn!("Exit target: {}", err);
                    None
                }
            },
            ExitTarget::Element(id) => Some(*id).filter(|id| doc.is_live(*id)),
        }
    }
}

impl From<NodeId> for ExitTarget {
    fn from(id: NodeId) -> Self {
        ExitTarget::Element(id)
    }
}

impl From<&str> for ExitTarget {
    fn from(selector: &str) -> Self {
        ExitTarget::Selector(selector.to_string())
    }
}

/// Notification sent to leave listeners before a loop is left
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeaveEvent {
    /// Set by a listener to abort the leave
    pub cancel: bool,
    pub pass_focus: bool,
    pub with_mouse: bool,
}

/// Registration options for a focus loop
#[derive(Default)]
pub struct FocusLoopOptions {
    pub level: i64,
    /// Chords that force-leave the loop (Shift is ignored when matching)
    pub exit_keys: Vec<KeyChord>,
    pub exit_target: Option<ExitTarget>,
    /// Pointer movement inside the loop demotes keyboard mode to hover
    pub hover_focus: bool,
    /// Focusing the container does not enter it; Enter does
    pub key_to_enter: bool,
    pub modal: bool,
    /// Global key paths and the Alt toggle stay usable while this modal is active
    pub allow_key_paths: bool,
    pub close_focus_mode: Option<FocusMode>,
    pub close_handler: Option<CloseHandler>,
}

impl FocusLoopOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(mut self, level: i64) -> Self {
        self.level = level;
        self
    }

    pub fn exit_key(mut self, chord: KeyChord) -> Self {
        self.exit_keys.push(chord);
        self
    }

    pub fn exit_to(mut self, target: impl Into<ExitTarget>) -> Self {
        self.exit_target = Some(target.into());
        self
    }

    pub fn hover_focus(mut self) -> Self {
        self.hover_focus = true;
        self
    }

    pub fn key_to_enter(mut self) -> Self {
        self.key_to_enter = true;
        self
    }

    pub fn modal(mut self) -> Self {
        self.modal = true;
        self
    }

    pub fn allow_key_paths(mut self) -> Self {
        self.allow_key_paths = true;
        self
    }

    pub fn close_focus_mode(mut self, mode: FocusMode) -> Self {
        self.close_focus_mode = Some(mode);
        self
    }

    pub fn on_close(mut self, handler: impl FnMut(&mut FocusContext) + 'static) -> Self {
        self.close_handler = Some(Box::new(handler));
        self
    }
}

/// Options for entering a loop
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnterOptions {
    pub with_mouse: bool,
    /// `Up` focuses the last element, anything else the first
    pub direction: Option<super::geometry::Direction>,
    pub exit_target: Option<ExitTarget>,
    pub close_focus_mode: Option<FocusMode>,
}

impl EnterOptions {
    pub fn keyboard() -> Self {
        Self::default()
    }

    pub fn mouse() -> Self {
        Self {
            with_mouse: true,
            ..Self::default()
        }
    }

    pub fn direction(mut self, direction: super::geometry::Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn exit_to(mut self, target: impl Into<ExitTarget>) -> Self {
        self.exit_target = Some(target.into());
        self
    }

    pub fn close_focus_mode(mut self, mode: FocusMode) -> Self {
        self.close_focus_mode = Some(mode);
        self
    }
}

pub struct FocusLoopToken {
    container: NodeId,
    pub level: i64,
    pub exit_keys: Vec<KeyChord>,
    pub exit_target: Option<ExitTarget>,
    pub hover_focus: bool,
    pub key_to_enter: bool,
    /// Assigned on registration for modal loops
    pub modal_id: Option<u64>,
    pub allow_key_paths: bool,
    pub close_focus_mode: Option<FocusMode>,
    /// Mode active when the loop was last entered
    pub initial_focus_mode: Option<FocusMode>,
    pub(crate) close_handler: Option<CloseHandler>,
    pub(crate) leave_listeners: Vec<(SubscriptionId, LeaveListener)>,
    pub(crate) leaving: bool,
}

impl FocusLoopToken {
    pub(crate) fn new(container: NodeId, options: FocusLoopOptions, modal_id: Option<u64>) -> Self {
        Self {
            container,
            level: options.level,
            exit_keys: options.exit_keys,
            exit_target: options.exit_target,
            hover_focus: options.hover_focus,
            key_to_enter: options.key_to_enter,
            modal_id,
            allow_key_paths: options.allow_key_paths,
            close_focus_mode: options.close_focus_mode,
            initial_focus_mode: None,
            close_handler: options.close_handler,
            leave_listeners: Vec::new(),
            leaving: false,
        }
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn is_modal(&self) -> bool {
        self.modal_id.is_some()
    }

    pub fn has_close_handler(&self) -> bool {
        self.close_handler.is_some()
    }

    /// Leave in progress
    pub fn is_leaving(&self) -> bool {
        self.leaving
    }

    pub fn modal_token(&self) -> Option<ModalToken> {
        self.modal_id
            .map(|id| ModalToken::new(id, self.container, self.allow_key_paths))
    }

    pub fn is_exit_key(&self, chord: &KeyChord) -> bool {
        self.exit_keys.iter().any(|exit| exit.matches_ignoring_shift(chord))
    }
}
