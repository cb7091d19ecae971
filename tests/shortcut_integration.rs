//! Integration tests for access keys
//!
//! Covers prefix descent through nested paths, the settle retries that wait
//! for layout, and key-cap placement.

mod common;

use common::{element, init_logging};
use focusloop::focus::geometry::Rect;
use focusloop::focus::shortcuts::match_shortcuts;
use focusloop::focus::{ShortcutOutcome, ShortcutRequest};
use focusloop::{FocusConfig, FocusContext, FocusMode, NodeId, ShortcutOptions};
use std::cell::RefCell;
use std::rc::Rc;

type Log = Rc<RefCell<Vec<&'static str>>>;

fn logging_action(log: &Log, name: &'static str) -> impl FnMut(&mut FocusContext, &mut focusloop::focus::ShortcutEvent) + 'static {
    let log = log.clone();
    move |_, _| log.borrow_mut().push(name)
}

/// A file menu `A` with two entries `AB` and `AC`
struct Menu {
    ctx: FocusContext,
    log: Log,
    file: NodeId,
    save: NodeId,
    close: NodeId,
}

fn menu(config: FocusConfig) -> Menu {
    init_logging();
    let mut ctx = FocusContext::standalone(config);
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let body = ctx.document().body();

    let file = element(&mut ctx, body, "button", Rect::new(0.0, 0.0, 40.0, 20.0));
    let save = element(&mut ctx, body, "button", Rect::new(0.0, 20.0, 40.0, 20.0));
    let close = element(&mut ctx, body, "button", Rect::new(0.0, 40.0, 40.0, 20.0));

    ctx.apply_shortcut_options(file, ShortcutOptions::key("A").on_action(logging_action(&log, "file")))
        .unwrap();
    ctx.apply_shortcut_options(
        save,
        ShortcutOptions::key("B").path("A").label("Save").on_action(logging_action(&log, "save")),
    )
    .unwrap();
    ctx.apply_shortcut_options(close, ShortcutOptions::key("C").path("A").on_action(logging_action(&log, "close")))
        .unwrap();

    Menu {
        ctx,
        log,
        file,
        save,
        close,
    }
}

fn key_cap_texts(ctx: &FocusContext) -> Vec<String> {
    ctx.key_caps()
        .into_iter()
        .filter_map(|id| ctx.document().element(id).map(|e| e.text.clone()))
        .collect()
}

/// Test prefix matching over the document directly
#[test]
fn test_match_nested_paths() {
    let Menu {
        ctx, file, save, close, ..
    } = menu(FocusConfig::immediate());
    let body = ctx.document().body();

    let top = match_shortcuts(ctx.document(), body, "");
    assert_eq!(top.exact, None);
    assert_eq!(top.candidates, vec![file]);

    let scoped = match_shortcuts(ctx.document(), body, "A");
    assert_eq!(scoped.exact, Some(file));
    assert_eq!(scoped.candidates, vec![save, close]);

    let leaf = match_shortcuts(ctx.document(), body, "AB");
    assert_eq!(leaf.actionable(), Some(save));
}

/// Test descending through a menu and activating an entry
#[test]
fn test_descend_and_activate() {
    let Menu { mut ctx, log, .. } = menu(FocusConfig::immediate());

    ctx.set_focus_mode(FocusMode::Shortcuts);
    assert_eq!(key_cap_texts(&ctx), vec!["A"]);

    let outcome = ctx.update_shortcuts(ShortcutRequest::append("A"));
    assert_eq!(outcome, ShortcutOutcome::Updated);
    assert_eq!(ctx.shortcut_path(), "A");
    assert_eq!(key_cap_texts(&ctx), vec!["B", "C"]);
    assert_eq!(*log.borrow(), vec!["file"]);

    let outcome = ctx.update_shortcuts(ShortcutRequest::append("B"));
    assert_eq!(outcome, ShortcutOutcome::Updated);
    assert_eq!(*log.borrow(), vec!["file", "save"]);
    assert_eq!(ctx.focus_mode(), FocusMode::Default);
    assert_eq!(ctx.shortcut_path(), "");
    assert!(ctx.key_caps().is_empty());
    assert_eq!(ctx.announcements(), ["Save".to_string()]);
}

/// Test that a path nobody answers to is reported and leaves the path alone
#[test]
fn test_unknown_key() {
    let Menu { mut ctx, log, .. } = menu(FocusConfig::immediate());
    ctx.set_focus_mode(FocusMode::Shortcuts);

    assert_eq!(ctx.update_shortcuts(ShortcutRequest::append("Z")), ShortcutOutcome::NoMatch);
    assert_eq!(ctx.focus_mode(), FocusMode::Shortcuts);
    assert_eq!(ctx.shortcut_path(), "");
    assert_eq!(key_cap_texts(&ctx), vec!["A"]);
    assert!(log.borrow().is_empty());
}

/// Test that path changes are published to observers
#[test]
fn test_path_change_notifications() {
    let Menu { mut ctx, .. } = menu(FocusConfig::immediate());
    let paths = Rc::new(RefCell::new(Vec::new()));
    let sink = paths.clone();
    ctx.on_shortcut_path_changed(move |event| sink.borrow_mut().push(event.path.clone()));

    ctx.set_focus_mode(FocusMode::Shortcuts);
    ctx.update_shortcuts(ShortcutRequest::append("A"));
    ctx.update_shortcuts(ShortcutRequest::path(""));

    assert_eq!(*paths.borrow(), vec!["A".to_string(), String::new()]);
    assert_eq!(key_cap_texts(&ctx), vec!["A"]);
}

/// Test that a leaf key waits for layout before leaving shortcuts mode
#[tokio::test(start_paused = true)]
async fn test_settle_then_leave_shortcuts() {
    init_logging();
    let mut ctx = FocusContext::standalone(FocusConfig::default());
    let body = ctx.document().body();
    let runs = Rc::new(RefCell::new(0));
    let counter = runs.clone();
    let print = element(&mut ctx, body, "button", Rect::new(0.0, 0.0, 40.0, 20.0));
    ctx.apply_shortcut_options(print, ShortcutOptions::key("P").on_action(move |_, _| *counter.borrow_mut() += 1))
        .unwrap();

    ctx.set_focus_mode(FocusMode::Shortcuts);
    assert_eq!(ctx.update_shortcuts(ShortcutRequest::append("P")), ShortcutOutcome::Settling);
    assert_eq!(*runs.borrow(), 1);
    assert_eq!(ctx.focus_mode(), FocusMode::Shortcuts);

    ctx.run_until_idle().await;
    // Retries are silent
    assert_eq!(*runs.borrow(), 1);
    assert_eq!(ctx.focus_mode(), FocusMode::Default);
    assert_eq!(ctx.pending_timers(), 0);
}

/// Test that entries appearing while settling get their labels
#[tokio::test(start_paused = true)]
async fn test_settle_picks_up_late_entries() {
    let Menu {
        mut ctx, log, save, close, ..
    } = menu(FocusConfig::default());
    ctx.document_mut().set_visible(save, false);
    ctx.document_mut().set_visible(close, false);

    ctx.set_focus_mode(FocusMode::Shortcuts);
    assert_eq!(ctx.update_shortcuts(ShortcutRequest::append("A")), ShortcutOutcome::Settling);
    assert_eq!(*log.borrow(), vec!["file"]);

    ctx.document_mut().set_visible(save, true);
    ctx.document_mut().set_visible(close, true);
    ctx.run_until_idle().await;

    assert_eq!(ctx.focus_mode(), FocusMode::Shortcuts);
    assert_eq!(ctx.shortcut_path(), "A");
    assert_eq!(key_cap_texts(&ctx), vec!["B", "C"]);
    assert_eq!(*log.borrow(), vec!["file"]);
}

/// Test that an unmatched key keeps retrying before giving up
#[tokio::test(start_paused = true)]
async fn test_no_match_after_retries() {
    let Menu { mut ctx, .. } = menu(FocusConfig::default());
    ctx.set_focus_mode(FocusMode::Shortcuts);

    assert_eq!(ctx.update_shortcuts(ShortcutRequest::append("Q")), ShortcutOutcome::Settling);
    assert_eq!(ctx.pending_timers(), 1);
    ctx.run_until_idle().await;

    assert_eq!(ctx.focus_mode(), FocusMode::Shortcuts);
    assert_eq!(ctx.shortcut_path(), "");
}

/// Test key-cap placement against the element box
#[test]
fn test_label_placement() {
    init_logging();
    let mut ctx = FocusContext::standalone(FocusConfig::immediate());
    let body = ctx.document().body();
    let target = element(&mut ctx, body, "button", Rect::new(100.0, 50.0, 40.0, 20.0));
    ctx.apply_shortcut_options(target, ShortcutOptions::key("A")).unwrap();

    ctx.set_focus_mode(FocusMode::Shortcuts);
    let caps = ctx.key_caps();
    assert_eq!(caps.len(), 1);

    let cap = ctx.document().element(caps[0]).unwrap();
    assert_eq!(cap.text, "A");
    assert_eq!(cap.style.get("top").map(String::as_str), Some("65px"));
    assert_eq!(cap.style.get("left").map(String::as_str), Some("112.5px"));
    assert_eq!(cap.attr("aria-hidden"), Some("true"));
    assert_eq!(ctx.document().parent(caps[0]), Some(body));
}
