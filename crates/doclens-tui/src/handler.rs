use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use doclens_core::{InputMode, ViewState};

use crate::app::{App, EditMode};
use crate::tui::AppEvent;

pub fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Paste(text) => app.handle_paste(&text),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Session(event) => app.controller.handle_event(event),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // A configuration error blocks everything else
    if app.controller.fatal_error().is_some() {
        if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
            app.should_quit = true;
        }
        return;
    }

    if app.show_help {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')) {
            app.show_help = false;
        }
        return;
    }

    match app.edit_mode {
        EditMode::Editing => handle_editing(app, key),
        EditMode::Normal => match app.controller.view() {
            ViewState::Initial => handle_initial_normal(app, key),
            ViewState::Conversation => handle_conversation_normal(app, key),
        },
    }
}

/// Keys shared by both views in normal mode. Returns true if handled.
fn handle_common(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('?') => app.show_help = true,
        KeyCode::Char('n') => app.new_task(),
        _ => return false,
    }
    true
}

fn handle_initial_normal(app: &mut App, key: KeyEvent) {
    if handle_common(app, key) {
        return;
    }

    let mode = app.controller.input().mode();
    match key.code {
        KeyCode::Esc => {
            if app.controller.is_camera_active() || app.controller.input().is_camera_open() {
                app.controller.close_camera();
            } else {
                app.controller.input_mut().dismiss_error();
            }
        }
        KeyCode::Tab => app.switch_mode(mode.next()),
        KeyCode::BackTab => app.switch_mode(mode.next().next()),
        KeyCode::Char('1') => app.switch_mode(InputMode::Upload),
        KeyCode::Char('2') => app.switch_mode(InputMode::Paste),
        KeyCode::Char('3') => app.switch_mode(InputMode::Camera),
        KeyCode::Char('i') | KeyCode::Char('e') if mode != InputMode::Camera => {
            app.edit_mode = EditMode::Editing;
        }
        KeyCode::Char('x') => match mode {
            InputMode::Upload => app.controller.input_mut().clear_file(),
            InputMode::Paste => {
                app.controller.input_mut().set_paste_text("");
                app.paste_cursor = 0;
            }
            InputMode::Camera => app.controller.input_mut().clear_capture(),
        },
        KeyCode::Char('o') if mode == InputMode::Camera => app.controller.open_camera(),
        KeyCode::Char(' ') if app.controller.is_camera_active() => app.controller.take_photo(),
        KeyCode::Enter => {
            if app.controller.is_camera_active() {
                app.controller.take_photo();
            } else if mode == InputMode::Camera
                && !app.controller.input().is_camera_open()
                && app.controller.input().captured_image().is_none()
            {
                app.controller.open_camera();
            } else if app.controller.input().is_submittable() {
                app.submit();
            } else if mode != InputMode::Camera {
                app.edit_mode = EditMode::Editing;
            }
        }
        _ => {}
    }
}

fn handle_conversation_normal(app: &mut App, key: KeyEvent) {
    if handle_common(app, key) {
        return;
    }

    match key.code {
        KeyCode::Char('i') | KeyCode::Enter => app.edit_mode = EditMode::Editing,
        KeyCode::Tab => app.cycle_selection(true),
        KeyCode::BackTab => app.cycle_selection(false),
        KeyCode::Char('d') => app.export_selected(),
        KeyCode::Char('j') | KeyCode::Down => app.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => app.scroll_up(1),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::Char('G') | KeyCode::End => app.follow_output = true,
        KeyCode::Esc => app.notice = None,
        _ => {}
    }
}

fn handle_editing(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Esc {
        app.edit_mode = EditMode::Normal;
        return;
    }

    match app.controller.view() {
        ViewState::Conversation => edit_follow_up(app, key),
        ViewState::Initial => match app.controller.input().mode() {
            InputMode::Paste => edit_paste(app, key),
            InputMode::Upload => edit_path(app, key),
            InputMode::Camera => app.edit_mode = EditMode::Normal,
        },
    }
}

fn edit_follow_up(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            if !app.controller.is_busy() {
                app.send_follow_up();
            }
        }
        KeyCode::Backspace => app.follow_up.backspace(),
        KeyCode::Delete => app.follow_up.delete(),
        KeyCode::Left => app.follow_up.left(),
        KeyCode::Right => app.follow_up.right(),
        KeyCode::Home => app.follow_up.home(),
        KeyCode::End => app.follow_up.end(),
        KeyCode::Char(c) => app.follow_up.insert(c),
        _ => {}
    }
}

fn edit_path(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => {
            let raw = app.path_input.text.clone();
            app.stage_path(&raw);
        }
        KeyCode::Backspace => app.path_input.backspace(),
        KeyCode::Delete => app.path_input.delete(),
        KeyCode::Left => app.path_input.left(),
        KeyCode::Right => app.path_input.right(),
        KeyCode::Home => app.path_input.home(),
        KeyCode::End => app.path_input.end(),
        KeyCode::Char(c) => app.path_input.insert(c),
        _ => {}
    }
}

fn edit_paste(app: &mut App, key: KeyEvent) {
    // Ctrl+S submits; plain Enter is a newline in the document
    if key.code == KeyCode::Char('s') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.submit();
        return;
    }

    match key.code {
        KeyCode::Enter => app.paste_insert("\n"),
        KeyCode::Tab => app.paste_insert("\t"),
        KeyCode::Backspace => app.paste_backspace(),
        KeyCode::Left => app.paste_move(-1),
        KeyCode::Right => app.paste_move(1),
        KeyCode::Home => app.paste_cursor = 0,
        KeyCode::End => app.paste_move(isize::MAX),
        KeyCode::Char(c) => {
            let mut buf = [0u8; 4];
            app.paste_insert(c.encode_utf8(&mut buf));
        }
        _ => {}
    }
}
