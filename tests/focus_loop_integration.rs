//! Integration tests for focus loops and modal containment

mod common;

use common::{button, element, init_logging};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use focusloop::focus::geometry::Rect;
use focusloop::{EnterOptions, FocusConfig, FocusContext, FocusError, FocusLoopOptions, FocusMode, KeyChord, NodeId};
use std::cell::RefCell;
use std::rc::Rc;

/// A page with an opener button and a modal dialog holding two buttons
struct Page {
    ctx: FocusContext,
    opener: NodeId,
    dialog: NodeId,
    ok: NodeId,
    outside: NodeId,
}

fn page() -> Page {
    init_logging();
    let mut ctx = FocusContext::standalone(FocusConfig::default());
    let body = ctx.document().body();
    let opener = button(&mut ctx, body, 0.0, 0.0);
    let dialog = element(&mut ctx, body, "div", Rect::new(0.0, 40.0, 100.0, 40.0));
    let ok = button(&mut ctx, dialog, 0.0, 50.0);
    let _cancel = button(&mut ctx, dialog, 50.0, 50.0);
    let outside = button(&mut ctx, body, 0.0, 100.0);

    ctx.add_focus_loop(
        dialog,
        FocusLoopOptions::new()
            .modal()
            .exit_key(KeyChord::new("escape"))
            .exit_to(opener),
    )
    .unwrap();

    Page {
        ctx,
        opener,
        dialog,
        ok,
        outside,
    }
}

/// Test a keyboard-driven dialog from opening to dismissal
#[test]
fn test_modal_lifecycle() {
    let Page {
        mut ctx,
        opener,
        dialog,
        ok,
        outside,
    } = page();
    assert_eq!(ctx.document().attr(dialog, "aria-modal"), Some("true"));
    assert_eq!(ctx.document().attr(dialog, "tabindex"), Some("-1"));

    ctx.focus(opener);
    ctx.set_focus_mode(FocusMode::Keyboard);
    assert!(ctx.enter_focus_loop(dialog, EnterOptions::keyboard()));
    assert_eq!(ctx.active_element(), Some(ok));
    assert_eq!(ctx.active_modal().map(|modal| modal.container), Some(dialog));
    assert_eq!(ctx.focus_default(), FocusMode::Hover);

    // Focus cannot leave the dialog
    assert!(!ctx.focus(outside));
    assert_eq!(ctx.active_element(), Some(ok));
    ctx.blur_active();
    assert_eq!(ctx.active_element(), Some(ok));

    assert!(ctx.handle_key_event(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)));
    assert_eq!(ctx.active_element(), Some(opener));
    assert!(ctx.active_modal().is_none());
    assert_eq!(ctx.focus_default(), FocusMode::Default);
    assert_eq!(ctx.focus_mode(), FocusMode::Keyboard);

    // Outside focus works again
    assert!(ctx.focus(outside));
}

/// Test that removing the dialog element ends modal mode
#[test]
fn test_removed_dialog_ends_modal() {
    let Page {
        mut ctx, dialog, ok, ..
    } = page();
    ctx.enter_focus_loop(dialog, EnterOptions::keyboard());
    assert_eq!(ctx.active_element(), Some(ok));

    ctx.remove_element(dialog);
    assert!(ctx.active_modal().is_none());
    assert!(ctx.focus_token(dialog).is_none());
    assert_eq!(
        ctx.remove_focus_loop(dialog),
        Err(FocusError::NotRegistered(dialog.to_string()))
    );
}

/// Test that a leave listener can ask for focus to be passed on
#[test]
fn test_leave_listener_passes_focus() {
    init_logging();
    let mut ctx = FocusContext::standalone(FocusConfig::default());
    let body = ctx.document().body();
    let opener = button(&mut ctx, body, 0.0, 0.0);
    let menu = element(&mut ctx, body, "div", Rect::new(0.0, 20.0, 100.0, 20.0));
    let item = button(&mut ctx, menu, 0.0, 20.0);
    ctx.add_focus_loop(menu, FocusLoopOptions::new().exit_to(opener)).unwrap();
    ctx.focus(item);
    assert!(!ctx.in_keyboard_mode());

    // Outside keyboard mode the exit target is left alone
    assert!(ctx.leave_focus_loop(menu, false));
    assert_eq!(ctx.active_element(), Some(item));

    ctx.on_focus_leave(menu, |_, event| event.pass_focus = true).unwrap();
    assert!(ctx.leave_focus_loop(menu, false));
    assert_eq!(ctx.active_element(), Some(opener));
}

/// Test that close handlers run once per leave and count as handled
#[test]
fn test_close_handler_runs() {
    init_logging();
    let mut ctx = FocusContext::standalone(FocusConfig::default());
    let body = ctx.document().body();
    let popup = element(&mut ctx, body, "div", Rect::new(0.0, 0.0, 50.0, 50.0));
    let _item = button(&mut ctx, popup, 0.0, 0.0);
    let closes = Rc::new(RefCell::new(0));
    let counter = closes.clone();
    ctx.add_focus_loop(
        popup,
        FocusLoopOptions::new().modal().on_close(move |_| *counter.borrow_mut() += 1),
    )
    .unwrap();

    ctx.set_focus_mode(FocusMode::Accessible);
    ctx.enter_focus_loop(popup, EnterOptions::keyboard());
    ctx.set_focus_mode(FocusMode::Keyboard);

    assert!(ctx.leave_focus_loop(popup, true));
    assert!(ctx.leave_focus_loop(popup, true));
    assert_eq!(*closes.borrow(), 2);
    // A close handler takes over, so the entry mode is not restored
    assert_eq!(ctx.focus_mode(), FocusMode::Keyboard);
}

/// Test that probing unknown containers is harmless
#[test]
fn test_unregistered_containers() {
    init_logging();
    let mut ctx = FocusContext::standalone(FocusConfig::default());
    let body = ctx.document().body();
    let stray = element(&mut ctx, body, "div", Rect::new(0.0, 0.0, 10.0, 10.0));

    assert!(!ctx.enter_focus_loop(stray, EnterOptions::keyboard()));
    assert!(!ctx.leave_focus_loop(stray, false));
    assert!(!ctx.change_level(stray, 2));
    assert!(ctx.on_focus_leave(stray, |_, _| {}).is_none());
    assert!(ctx.remove_focus_loop(stray).is_err());
}
