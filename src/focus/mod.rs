//! Keyboard focus management for multi-window user interfaces

pub mod broadcast;
pub mod chord;
pub mod details;
pub mod dom;
pub mod error;
pub mod events;
pub mod geometry;
pub mod navigator;
pub mod registry;
pub mod runtime;
pub mod shortcuts;
pub mod speech;
pub mod state;
pub mod timers;

pub use broadcast::{BroadcastMessage, Envelope, LocalBus, MessageBus, MessageHub, NullBus, Operation, WindowId, WindowRole};
pub use chord::{KeyChord, KeyHandler, KeyRouter};
pub use details::{FocusDetails, NavKey, focus_details};
pub use dom::{Document, Element, NodeId, Selector};
pub use error::FocusError;
pub use events::{ModeChanged, ObserverList, ShortcutActivated, ShortcutPathChanged, SubscriptionId, WindowEvent};
pub use geometry::{Direction, Rect};
pub use registry::{EnterOptions, ExitTarget, FocusLoopOptions, FocusLoopToken, LeaveEvent};
pub use runtime::{FocusContext, KeyFlow, ShortcutRequest};
pub use shortcuts::{KeyCapLabel, LabelPosition, Length, ShortcutEvent, ShortcutMatch, ShortcutOptions, ShortcutOutcome, ShortcutToken};
pub use state::{FocusMode, ModalToken, ModeOptions, Presentation};

/// Class marking a registered loop container
pub const MENU_LEVEL_CLASS: &str = "menu-level";
/// Nesting level of a loop container
pub const LEVEL_ATTR: &str = "data-level";
/// Class marking the container that owns key handling for nested loops
pub const FOCUS_LISTENER_CLASS: &str = "focus-listener";
pub const HOVER_FOCUS_CLASS: &str = "hover-focus";
/// Class of generated key-cap label elements
pub const KEY_TAG_CLASS: &str = "shortcut-key-tag";
pub const SHORTCUT_KEY_ATTR: &str = "shortcut-key";
pub const SHORTCUT_PATH_ATTR: &str = "shortcut-path";
