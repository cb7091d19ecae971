//! Deferred work for one focus context
//!
//! Every suspension point is a typed timer. Scheduling a kind cancels the
//! pending timer of the same kind first, so a newer request always supersedes
//! an older one.

use super::broadcast::WindowId;
use super::dom::NodeId;
use super::state::FocusMode;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum TimerKind {
    /// Revert to `default` after focus left to nothing
    BlurRevert,
    /// Re-announce the current mode once the window settled after focus
    BroadcastMode,
    /// Apply a mode once the current key event finished propagating
    DeferredMode(FocusMode),
    /// Resolve the mode after a pointer press in accessibility mode
    PointerSettle { target: Option<NodeId> },
    /// Retry access-key matching while layout settles
    ShortcutSettle {
        path: String,
        retries: u32,
        last_actionable: bool,
    },
    /// Alt held long enough to enter shortcuts (desktop mode)
    AltHold,
    /// Second focus attempt for a frame
    RefocusWindow(WindowId),
    /// Pointer rested on a hover item
    HoverFocus { item: NodeId },
}

/// Supersession key: kinds sharing a slot replace each other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    BlurRevert,
    BroadcastMode,
    DeferredMode,
    PointerSettle,
    ShortcutSettle,
    AltHold,
    RefocusWindow(WindowId),
    HoverFocus(NodeId),
}

impl TimerKind {
    fn slot(&self) -> Slot {
        match self {
            TimerKind::BlurRevert => Slot::BlurRevert,
            TimerKind::BroadcastMode => Slot::BroadcastMode,
            TimerKind::DeferredMode(_) => Slot::DeferredMode,
            TimerKind::PointerSettle { .. } => Slot::PointerSettle,
            TimerKind::ShortcutSettle { .. } => Slot::ShortcutSettle,
            TimerKind::AltHold => Slot::AltHold,
            TimerKind::RefocusWindow(window) => Slot::RefocusWindow(*window),
            TimerKind::HoverFocus { item } => Slot::HoverFocus(*item),
        }
    }
}

#[derive(Debug)]
struct Scheduled {
    seq: u64,
    due: Instant,
    kind: TimerKind,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    next_seq: u64,
    entries: Vec<Scheduled>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` after `delay`, replacing a pending timer of the same kind
    pub fn schedule(&mut self, delay: Duration, kind: TimerKind) {
        self.schedule_at(Instant::now() + delay, kind);
    }

    pub fn schedule_at(&mut self, due: Instant, kind: TimerKind) {
        if self.cancel(&kind) {
            log::trace!("Superseded pending {:?}", kind.slot());
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push(Scheduled { seq, due, kind });
    }

    /// Cancel the pending timer of the same kind; fields are ignored
    pub fn cancel(&mut self, kind: &TimerKind) -> bool {
        let slot = kind.slot();
        let before = self.entries.len();
        self.entries.retain(|entry| entry.kind.slot() != slot);
        before != self.entries.len()
    }

    pub fn is_scheduled(&self, kind: &TimerKind) -> bool {
        let slot = kind.slot();
        self.entries.iter().any(|entry| entry.kind.slot() == slot)
    }

    /// Remove and return the earliest timer due at `now`, in scheduling order
    /// among timers due at the same instant
    pub fn pop_due(&mut self, now: Instant) -> Option<TimerKind> {
        let index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.due <= now)
            .min_by_key(|(_, entry)| (entry.due, entry.seq))
            .map(|(index, _)| index)?;
        Some(self.entries.remove(index).kind)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.iter().map(|entry| entry.due).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
