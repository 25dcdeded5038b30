use std::path::PathBuf;

use doclens_core::{InputMode, SelectedFile, SessionController, ViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Normal,
    Editing,
}

/// Single-line or multi-line text buffer with a character cursor.
#[derive(Debug, Default, Clone)]
pub struct TextInput {
    pub text: String,
    /// Cursor position in characters, not bytes
    pub cursor: usize,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl TextInput {
    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_str(&mut self, s: &str) {
        let byte_pos = char_to_byte_index(&self.text, self.cursor);
        self.text.insert_str(byte_pos, s);
        self.cursor += s.chars().count();
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let byte_pos = char_to_byte_index(&self.text, self.cursor);
            self.text.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }
}

/// Turn a pasted or dropped path into a filesystem path. Terminals quote or
/// escape dropped paths, and some send a `file://` URI.
pub fn normalize_dropped_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let unquoted = ['\'', '"']
        .iter()
        .find_map(|q| trimmed.strip_prefix(*q).and_then(|s| s.strip_suffix(*q)))
        .unwrap_or(trimmed);
    let without_scheme = unquoted.strip_prefix("file://").unwrap_or(unquoted);
    PathBuf::from(without_scheme.replace("\\ ", " "))
}

pub struct App {
    pub controller: SessionController,
    pub should_quit: bool,
    pub edit_mode: EditMode,
    pub show_help: bool,

    /// Path field of the upload tab
    pub path_input: TextInput,
    /// Cursor inside the paste tab's text (the text itself lives in the controller)
    pub paste_cursor: usize,
    pub follow_up: TextInput,

    /// Position within the log's non-empty model messages
    pub selected_response: Option<usize>,
    pub chat_scroll: u16,
    pub follow_output: bool,
    pub chat_height: u16,
    pub chat_width: u16,

    /// One-shot feedback such as export results
    pub notice: Option<String>,
    pub animation_frame: usize,
}

impl App {
    pub fn new(controller: SessionController) -> Self {
        Self {
            controller,
            should_quit: false,
            edit_mode: EditMode::Normal,
            show_help: false,
            path_input: TextInput::default(),
            paste_cursor: 0,
            follow_up: TextInput::default(),
            selected_response: None,
            chat_scroll: 0,
            follow_output: true,
            chat_height: 0,
            chat_width: 0,
            notice: None,
            animation_frame: 0,
        }
    }

    pub fn tick_animation(&mut self) {
        if self.controller.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 4;
        }
    }

    pub fn spinner(&self) -> char {
        ['|', '/', '-', '\\'][self.animation_frame % 4]
    }

    pub fn switch_mode(&mut self, mode: InputMode) {
        self.edit_mode = EditMode::Normal;
        self.controller.switch_mode(mode);
        if mode == InputMode::Paste {
            self.paste_cursor = self.controller.input().paste_text().chars().count();
        }
    }

    /// Stage the file named by `raw` (typed or dropped).
    pub fn stage_path(&mut self, raw: &str) {
        if raw.trim().is_empty() {
            return;
        }
        let path = normalize_dropped_path(raw);
        let accepted = self
            .controller
            .input_mut()
            .select_file(SelectedFile::from_path(&path));
        if accepted {
            self.path_input.clear();
            self.edit_mode = EditMode::Normal;
        }
    }

    pub fn paste_insert(&mut self, s: &str) {
        let text = self.controller.input_mut().paste_text_mut();
        let byte_pos = char_to_byte_index(text, self.paste_cursor);
        text.insert_str(byte_pos, s);
        self.paste_cursor += s.chars().count();
    }

    pub fn paste_backspace(&mut self) {
        if self.paste_cursor == 0 {
            return;
        }
        self.paste_cursor -= 1;
        let text = self.controller.input_mut().paste_text_mut();
        let byte_pos = char_to_byte_index(text, self.paste_cursor);
        text.remove(byte_pos);
    }

    pub fn paste_move(&mut self, delta: isize) {
        let len = self.controller.input().paste_text().chars().count();
        self.paste_cursor = self.paste_cursor.saturating_add_signed(delta).min(len);
    }

    /// Bracketed paste goes to whatever field the user is looking at.
    pub fn handle_paste(&mut self, text: &str) {
        if self.controller.fatal_error().is_some() {
            return;
        }
        match self.controller.view() {
            ViewState::Conversation => self.follow_up.insert_str(text.trim_end_matches('\n')),
            ViewState::Initial => match self.controller.input().mode() {
                InputMode::Paste => self.paste_insert(text),
                InputMode::Upload => self.stage_path(text),
                InputMode::Camera => {}
            },
        }
    }

    pub fn submit(&mut self) {
        self.notice = None;
        if let Err(e) = self.controller.submit() {
            self.controller.input_mut().set_error(e.to_string());
        } else {
            self.edit_mode = EditMode::Normal;
        }
    }

    pub fn send_follow_up(&mut self) {
        if self.follow_up.text.trim().is_empty() {
            return;
        }
        match self.controller.submit_follow_up(&self.follow_up.text) {
            Ok(()) => {
                self.follow_up.clear();
                self.follow_output = true;
            }
            Err(e) => self.notice = Some(e.to_string()),
        }
    }

    /// Log indices of model responses that can be exported.
    fn exportable(&self) -> Vec<usize> {
        self.controller.log().model_indices()
    }

    /// Log index of the selected response, defaulting to the latest.
    pub fn selected_message_index(&self) -> Option<usize> {
        let indices = self.exportable();
        match self.selected_response {
            Some(pos) => indices.get(pos).copied(),
            None => indices.last().copied(),
        }
    }

    pub fn cycle_selection(&mut self, forward: bool) {
        let count = self.exportable().len();
        if count == 0 {
            self.selected_response = None;
            return;
        }
        let current = self.selected_response.unwrap_or(count - 1).min(count - 1);
        self.selected_response = Some(if forward {
            (current + 1) % count
        } else {
            (current + count - 1) % count
        });
    }

    pub fn export_selected(&mut self) {
        let Some(index) = self.selected_message_index() else {
            self.notice = Some("No response to export yet.".to_string());
            return;
        };
        self.notice = Some(match self.controller.export_response(index) {
            Ok(path) => format!("Exported to {}", path.display()),
            Err(e) => e.to_string(),
        });
    }

    pub fn new_task(&mut self) {
        self.controller.new_task();
        self.edit_mode = EditMode::Normal;
        self.path_input.clear();
        self.paste_cursor = 0;
        self.follow_up.clear();
        self.selected_response = None;
        self.chat_scroll = 0;
        self.follow_output = true;
        self.notice = None;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_output = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }
}
