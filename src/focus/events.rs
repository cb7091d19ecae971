//! Typed notifications with explicit unsubscribe

use super::dom::NodeId;
use super::state::{FocusMode, ModeOptions};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(0);

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn next() -> Self {
        SubscriptionId(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub struct ObserverList<E> {
    observers: Vec<(SubscriptionId, Box<dyn FnMut(&E)>)>,
}

impl<E> ObserverList<E> {
    pub fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        before != self.observers.len()
    }

    pub fn emit(&mut self, event: &E) {
        for (_, observer) in self.observers.iter_mut() {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl<E> Default for ObserverList<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModeChanged {
    pub mode: FocusMode,
    pub previous: FocusMode,
    pub options: ModeOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShortcutPathChanged {
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    Focus,
    Blur,
}

/// An access-key target without a registered action was activated
#[derive(Debug, Clone, PartialEq)]
pub struct ShortcutActivated {
    pub element: NodeId,
    pub path: String,
}

/// Subscription lists owned by a focus context
#[derive(Default)]
pub struct Observers {
    pub mode_changed: ObserverList<ModeChanged>,
    pub shortcut_path_changed: ObserverList<ShortcutPathChanged>,
    pub window: ObserverList<WindowEvent>,
    pub shortcut_activated: ObserverList<ShortcutActivated>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut list: ObserverList<ShortcutPathChanged> = ObserverList::new();

        let sink = seen.clone();
        let id = list.subscribe(move |event| sink.borrow_mut().push(event.path.clone()));
        list.emit(&ShortcutPathChanged { path: "A".into() });

        assert!(list.unsubscribe(id));
        assert!(!list.unsubscribe(id));
        list.emit(&ShortcutPathChanged { path: "AB".into() });

        assert_eq!(*seen.borrow(), vec!["A".to_string()]);
        assert!(list.is_empty());
    }
}
