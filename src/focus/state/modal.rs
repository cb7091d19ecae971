use crate::focus::dom::NodeId;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_MODAL_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-wide, monotonically increasing modal id
pub fn next_modal_id() -> u64 {
    NEXT_MODAL_ID.fetch_add(1, Ordering::Relaxed)
}

/// The modal scope currently capturing focus in a window.
///
/// At most one is active; entering another modal loop replaces it and the
/// mode before entry is restored from the loop's `initial_focus_mode`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModalToken {
    pub modal_id: u64,
    pub container: NodeId,
    /// Global access keys and the Alt toggle stay usable inside this modal
    pub allow_key_paths: bool,
}

impl ModalToken {
    pub fn new(modal_id: u64, container: NodeId, allow_key_paths: bool) -> Self {
        Self {
            modal_id,
            container,
            allow_key_paths,
        }
    }
}
