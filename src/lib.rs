//! Keyboard focus management for multi-window user interfaces
//!
//! One [`FocusContext`] per window tracks the interaction mode, focus loops,
//! access keys and global key chords, and keeps the other windows in step
//! through a [`MessageBus`].

pub mod config;
pub mod focus;

pub use config::FocusConfig;
pub use focus::{
    Direction, EnterOptions, FocusContext, FocusError, FocusLoopOptions, FocusMode, KeyChord, MessageBus, MessageHub,
    ModeOptions, NodeId, Operation, ShortcutOptions, WindowId, WindowRole,
};
