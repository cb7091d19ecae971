//! Shared fixtures for integration tests
#![allow(dead_code)]

use focusloop::focus::geometry::Rect;
use focusloop::{FocusConfig, FocusContext, MessageHub, NodeId, WindowId};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A main window with two embedded frames on one hub
pub struct Windows {
    pub hub: MessageHub,
    pub main: FocusContext,
    pub first: FocusContext,
    pub second: FocusContext,
}

impl Windows {
    pub fn new(config: FocusConfig) -> Self {
        init_logging();
        let hub = MessageHub::new();
        let first_id = hub.add_frame();
        let second_id = hub.add_frame();
        let main = FocusContext::main_window(Box::new(hub.connect(WindowId::MAIN)), config.clone());
        let first = FocusContext::child_frame(Box::new(hub.connect(first_id)), config.clone());
        let second = FocusContext::child_frame(Box::new(hub.connect(second_id)), config);

        let mut windows = Self { hub, main, first, second };
        windows.pump();
        windows.hub.clear_sent();
        windows
    }

    /// Deliver messages until every inbox is empty
    pub fn pump(&mut self) {
        pump(&mut [&mut self.main, &mut self.first, &mut self.second]);
    }
}

pub fn pump(contexts: &mut [&mut FocusContext]) {
    loop {
        let delivered: usize = contexts.iter_mut().map(|ctx| ctx.process_inbox()).sum();
        if delivered == 0 {
            break;
        }
    }
}

/// Append a rendered element
pub fn element(ctx: &mut FocusContext, parent: NodeId, tag: &str, rect: Rect) -> NodeId {
    let id = ctx.document_mut().create_child(parent, tag);
    ctx.document_mut().set_rect(id, rect);
    id
}

pub fn button(ctx: &mut FocusContext, parent: NodeId, x: f64, y: f64) -> NodeId {
    element(ctx, parent, "button", Rect::new(x, y, 10.0, 10.0))
}
