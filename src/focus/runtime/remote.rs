use super::FocusContext;
use crate::focus::broadcast::{BroadcastMessage, Envelope, Operation, WindowId};
use crate::focus::chord::KeyChord;
use crate::focus::error::FocusError;
use crate::focus::state::{FocusMode, ModeOptions};
use crate::focus::timers::TimerKind;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::BTreeMap;

fn arg<T: DeserializeOwned>(args: &[Value], index: usize, op: Operation) -> Result<T, FocusError> {
    let value = args.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|err| FocusError::MalformedMessage(format!("{} argument {}: {}", op, index, err)))
}

fn mode_arg(args: &[Value], op: Operation) -> Result<FocusMode, FocusError> {
    let name: String = arg(args, 0, op)?;
    name.parse()
}

fn options_arg(args: &[Value], op: Operation) -> Result<ModeOptions, FocusError> {
    let options: Option<ModeOptions> = arg(args, 1, op)?;
    Ok(options.unwrap_or_default())
}

impl FocusContext {
    /// Post to the main window and every frame
    pub fn broadcast(&mut self, id: Operation, args: Vec<Value>, transfer_focus: bool) {
        let envelope = Envelope {
            source: self.window,
            message: BroadcastMessage::new(id, args, self.role.shadow_id()),
        };
        let main = self.bus.main_window();

        if !self.role.is_main_window() && transfer_focus {
            self.transfer_focus(main);
        }

        log::trace!("{:?}: broadcasting {}", self.role, id);
        self.bus.post(main, envelope.clone());
        for frame in self.bus.frames() {
            self.bus.post(frame, envelope.clone());
        }
    }

    pub(super) fn broadcast_focus_mode(&mut self, mode: FocusMode, options: ModeOptions) {
        self.timers.cancel(&TimerKind::BroadcastMode);
        let transfer = !options.no_transfer && !mode.is_local_ambience();
        self.broadcast(Operation::SetFocusMode, vec![json!(mode), json!(options)], transfer);
    }

    /// Post to a single window. Posting to the own window is only allowed
    /// from a shadow, whose peers share that window.
    pub fn invoke(&mut self, target: WindowId, id: Operation, args: Vec<Value>, transfer_focus: bool) -> Result<(), FocusError> {
        if target == self.window && !self.role.is_shadow() {
            return Err(FocusError::SelfInvoke);
        }
        if transfer_focus {
            self.transfer_focus(target);
        }
        let envelope = Envelope {
            source: self.window,
            message: BroadcastMessage::new(id, args, self.role.shadow_id()),
        };
        self.bus.post(target, envelope);
        Ok(())
    }

    /// Move OS focus to another window before messaging it
    pub fn transfer_focus(&mut self, target: WindowId) {
        self.is_bluring = true;
        self.bus.focus_window(target);
        if target != self.bus.main_window() {
            let delay = self.config.timings.frame_refocus();
            self.timers.schedule(delay, TimerKind::RefocusWindow(target));
        }
    }

    /// Apply an inbound message.
    ///
    /// Returns whether it was applied; own messages and operations this role
    /// does not accept are skipped. Nothing applied here is re-broadcast.
    pub fn handle_message(&mut self, envelope: &Envelope) -> Result<bool, FocusError> {
        let message = &envelope.message;
        if envelope.source == self.window && message.shadow_id == self.role.shadow_id() {
            return Ok(false);
        }
        if !message.id.accepted_by(self.role) {
            return Ok(false);
        }

        log::trace!("{:?}: applying {} from {}", self.role, message.id, envelope.source);
        let previous = std::mem::replace(&mut self.from_broadcast, true);
        let result = self.apply_operation(message.id, &message.args);
        self.from_broadcast = previous;
        result.map(|_| true)
    }

    /// Decode and apply a raw window message; foreign messages are ignored
    pub fn handle_raw_message(&mut self, source: WindowId, data: &Value) -> Result<bool, FocusError> {
        match BroadcastMessage::from_value(data)? {
            Some(message) => self.handle_message(&Envelope { source, message }),
            None => Ok(false),
        }
    }

    /// Drain the bus and apply everything delivered; returns how many
    /// messages were received
    pub fn process_inbox(&mut self) -> usize {
        let envelopes = self.bus.receive();
        for envelope in &envelopes {
            if let Err(err) = self.handle_message(envelope) {
                log::warn!("{:?}: dropped {} from {}: {}", self.role, envelope.message.id, envelope.source, err);
            }
        }
        envelopes.len()
    }

    fn apply_operation(&mut self, id: Operation, args: &[Value]) -> Result<(), FocusError> {
        match id {
            Operation::SetFocusMode => {
                let mode = mode_arg(args, id)?;
                let options = options_arg(args, id)?;
                self.set_focus_mode_with(mode, options);
            }
            Operation::SetFocusDefault => {
                let mode = mode_arg(args, id)?;
                let options = options_arg(args, id)?;
                self.set_focus_default(mode, options);
            }
            Operation::SpeakMessage => {
                let message: String = arg(args, 0, id)?;
                self.speak_message(&message);
            }
            Operation::ProcessKeyObj => {
                let chord: KeyChord = arg(args, 0, id)?;
                self.process_key_chord(&chord);
            }
            Operation::UpdateBaseKeyPaths => self.update_base_key_paths(),
            Operation::SetBaseKeyPaths => {
                let paths: Option<BTreeMap<String, String>> = arg(args, 0, id)?;
                self.set_base_key_paths(paths.unwrap_or_default());
            }
        }
        Ok(())
    }

    /// Announce text to screen readers through the main window
    pub fn speak_message(&mut self, message: &str) {
        if let Some(speech) = self.speech.as_mut() {
            speech.announce(message);
            return;
        }
        if self.from_broadcast {
            return;
        }
        let main = self.bus.main_window();
        if let Err(err) = self.invoke(main, Operation::SpeakMessage, vec![json!(message)], false) {
            log::warn!("{:?}: could not forward announcement: {}", self.role, err);
        }
    }

    /// Publish (main window) or request (other windows) the base key paths
    pub fn update_base_key_paths(&mut self) {
        if self.role.is_main_window() {
            let paths = json!(self.router.key_paths());
            self.broadcast(Operation::SetBaseKeyPaths, vec![paths], false);
        } else {
            self.broadcast(Operation::UpdateBaseKeyPaths, Vec::new(), false);
        }
    }

    pub fn set_base_key_paths(&mut self, paths: BTreeMap<String, String>) {
        if self.role.is_main_window() {
            return;
        }
        log::debug!("{:?}: received {} base key paths", self.role, paths.len());
        self.base_key_paths = Some(paths);
    }

    /// Key paths registered in the main window, as last received
    pub fn base_key_paths(&self) -> Option<&BTreeMap<String, String>> {
        self.base_key_paths.as_ref()
    }
}
