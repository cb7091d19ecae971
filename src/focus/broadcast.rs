//! Cross-window message protocol and bus abstraction
//!
//! A focus context talks to other windows only through [`MessageBus`]. The
//! wire payload is `{type: "focusLoop", id, args, shadowId}`; `id` names the
//! operation to replay in the receiving window.

use super::error::FocusError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

pub const MESSAGE_TYPE: &str = "focusLoop";

static NEXT_SHADOW_ID: AtomicU32 = AtomicU32::new(0);

/// Allocate a process-wide shadow id
pub fn next_shadow_id() -> u32 {
    NEXT_SHADOW_ID.fetch_add(1, Ordering::Relaxed)
}

/// Identity of a window (top-level or frame) on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u32);

impl WindowId {
    pub const MAIN: WindowId = WindowId(0);
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// Role of a focus context within the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowRole {
    MainWindow,
    /// Additional context living in the main window, addressed by shadow id
    MainWindowShadow(u32),
    ChildFrame,
}

impl WindowRole {
    /// The one authoritative main window context (shadows excluded)
    pub fn is_main_window(&self) -> bool {
        matches!(self, WindowRole::MainWindow)
    }

    pub fn is_shadow(&self) -> bool {
        matches!(self, WindowRole::MainWindowShadow(_))
    }

    pub fn shadow_id(&self) -> Option<u32> {
        match self {
            WindowRole::MainWindowShadow(id) => Some(*id),
            _ => None,
        }
    }
}

/// State-mutating operations that may be replayed remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    SetFocusMode,
    SetFocusDefault,
    SpeakMessage,
    ProcessKeyObj,
    /// Child asks the main window to publish its base key paths
    UpdateBaseKeyPaths,
    /// Main window publishes its base key paths
    SetBaseKeyPaths,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::SetFocusMode => "setFocusMode",
            Operation::SetFocusDefault => "setFocusDefault",
            Operation::SpeakMessage => "speakMessage",
            Operation::ProcessKeyObj => "processKeyObj",
            Operation::UpdateBaseKeyPaths => "updateBaseKeyPaths",
            Operation::SetBaseKeyPaths => "setBaseKeyPaths",
        }
    }

    /// Whether a context with `role` applies this operation when received
    pub fn accepted_by(&self, role: WindowRole) -> bool {
        match self {
            Operation::SetFocusMode
            | Operation::SetFocusDefault
            | Operation::SpeakMessage
            | Operation::ProcessKeyObj => true,
            Operation::UpdateBaseKeyPaths => role.is_main_window(),
            Operation::SetBaseKeyPaths => !role.is_main_window(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = FocusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            Operation::SetFocusMode,
            Operation::SetFocusDefault,
            Operation::SpeakMessage,
            Operation::ProcessKeyObj,
            Operation::UpdateBaseKeyPaths,
            Operation::SetBaseKeyPaths,
        ]
        .into_iter()
        .find(|op| op.as_str() == s)
        .ok_or_else(|| FocusError::MalformedMessage(format!("unknown operation \"{}\"", s)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: Operation,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub shadow_id: Option<u32>,
}

impl BroadcastMessage {
    pub fn new(id: Operation, args: Vec<Value>, shadow_id: Option<u32>) -> Self {
        Self {
            kind: MESSAGE_TYPE.to_string(),
            id,
            args,
            shadow_id,
        }
    }

    /// Decode a raw window message.
    ///
    /// Messages of another `type` and unknown operations yield `Ok(None)`;
    /// a focus-loop message with a broken shape is an error.
    pub fn from_value(value: &Value) -> Result<Option<Self>, FocusError> {
        if value.get("type").and_then(Value::as_str) != Some(MESSAGE_TYPE) {
            return Ok(None);
        }

        let id = value
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| FocusError::MalformedMessage("missing operation id".to_string()))?;
        let id = match id.parse::<Operation>() {
            Ok(id) => id,
            Err(_) => {
                log::debug!("Ignoring unknown focus-loop operation {}", id);
                return Ok(None);
            }
        };

        let args = match value.get("args") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(args)) => args.clone(),
            Some(other) => {
                return Err(FocusError::MalformedMessage(format!("args must be a list, got {}", other)));
            }
        };

        let shadow_id = match value.get("shadowId") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.is_empty() => None,
            Some(other) => {
                let id = match other {
                    Value::String(s) => s.parse::<u32>().ok(),
                    _ => other.as_u64().and_then(|id| u32::try_from(id).ok()),
                };
                if id.is_none() {
                    log::debug!("Ignoring unrecognized shadowId {}", other);
                }
                id
            }
        };

        Ok(Some(Self::new(id, args, shadow_id)))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// A message together with the window that posted it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: WindowId,
    pub message: BroadcastMessage,
}

/// Transport between windows
pub trait MessageBus {
    /// The window this bus endpoint belongs to
    fn local_window(&self) -> WindowId;

    fn main_window(&self) -> WindowId;

    /// Frames embedded in the main window
    fn frames(&self) -> Vec<WindowId>;

    fn post(&mut self, target: WindowId, envelope: Envelope);

    /// Native focus primitive of the target window
    fn focus_window(&mut self, target: WindowId);

    /// Messages delivered to this endpoint since the last call
    fn receive(&mut self) -> Vec<Envelope> {
        Vec::new()
    }
}

/// Bus for a single standalone window: nothing is ever delivered
#[derive(Debug, Default)]
pub struct NullBus;

impl MessageBus for NullBus {
    fn local_window(&self) -> WindowId {
        WindowId::MAIN
    }

    fn main_window(&self) -> WindowId {
        WindowId::MAIN
    }

    fn frames(&self) -> Vec<WindowId> {
        Vec::new()
    }

    fn post(&mut self, target: WindowId, envelope: Envelope) {
        log::trace!("Dropping {} for {}", envelope.message.id, target);
    }

    fn focus_window(&mut self, _target: WindowId) {}
}

struct Listener {
    window: WindowId,
    inbox: VecDeque<Envelope>,
}

#[derive(Default)]
struct HubState {
    frames: Vec<WindowId>,
    listeners: Vec<Listener>,
    sent: Vec<(WindowId, Envelope)>,
    focus_requests: Vec<WindowId>,
}

/// In-process message hub connecting the contexts of several windows.
///
/// Every context connected to a window receives its own copy of each
/// message posted to that window, like `message` listeners sharing a window.
#[derive(Clone, Default)]
pub struct MessageHub {
    state: Rc<RefCell<HubState>>,
}

impl MessageHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new frame inside the main window
    pub fn add_frame(&self) -> WindowId {
        let mut state = self.state.borrow_mut();
        let id = WindowId(state.frames.len() as u32 + 1);
        state.frames.push(id);
        id
    }

    /// Create a bus endpoint listening on `window`
    pub fn connect(&self, window: WindowId) -> LocalBus {
        let mut state = self.state.borrow_mut();
        state.listeners.push(Listener {
            window,
            inbox: VecDeque::new(),
        });
        LocalBus {
            hub: self.clone(),
            window,
            listener: state.listeners.len() - 1,
        }
    }

    /// Every message posted so far, with its target window
    pub fn sent(&self) -> Vec<(WindowId, Envelope)> {
        self.state.borrow().sent.clone()
    }

    /// Count of posts of `op` made by `source`
    pub fn sent_count(&self, source: WindowId, op: Operation) -> usize {
        self.state
            .borrow()
            .sent
            .iter()
            .filter(|(_, envelope)| envelope.source == source && envelope.message.id == op)
            .count()
    }

    pub fn clear_sent(&self) {
        self.state.borrow_mut().sent.clear();
    }

    pub fn focus_requests(&self) -> Vec<WindowId> {
        self.state.borrow().focus_requests.clone()
    }

    /// Messages waiting in any inbox
    pub fn pending(&self) -> usize {
        self.state.borrow().listeners.iter().map(|l| l.inbox.len()).sum()
    }
}

/// Endpoint of a [`MessageHub`] for one context
pub struct LocalBus {
    hub: MessageHub,
    window: WindowId,
    listener: usize,
}

impl MessageBus for LocalBus {
    fn local_window(&self) -> WindowId {
        self.window
    }

    fn main_window(&self) -> WindowId {
        WindowId::MAIN
    }

    fn frames(&self) -> Vec<WindowId> {
        self.hub.state.borrow().frames.clone()
    }

    fn post(&mut self, target: WindowId, envelope: Envelope) {
        let mut state = self.hub.state.borrow_mut();
        for listener in state.listeners.iter_mut().filter(|l| l.window == target) {
            listener.inbox.push_back(envelope.clone());
        }
        state.sent.push((target, envelope));
    }

    fn focus_window(&mut self, target: WindowId) {
        self.hub.state.borrow_mut().focus_requests.push(target);
    }

    fn receive(&mut self) -> Vec<Envelope> {
        let mut state = self.hub.state.borrow_mut();
        match state.listeners.get_mut(self.listener) {
            Some(listener) => listener.inbox.drain(..).collect(),
            None => Vec::new(),
        }
    }
}
