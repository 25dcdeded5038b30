use doclens_core::render::{self, LineKind, SpanStyle};
use doclens_core::{ChatRole, InlineImage, InputMode, ViewState};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Frame,
};

use crate::app::{App, EditMode};

/// Drop control characters so model or document text can never drive the
/// terminal.
fn sanitize(text: &str) -> String {
    text.chars()
        .map(|c| if c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect()
}

fn span_style(style: SpanStyle) -> Style {
    match style {
        SpanStyle::Plain => Style::default(),
        SpanStyle::Bold => Style::default().add_modifier(Modifier::BOLD),
        SpanStyle::Italic => Style::default().add_modifier(Modifier::ITALIC),
    }
}

/// Convert a model message to styled lines: headings, bullets, **bold** and *italic*.
pub fn markdown_lines(text: &str) -> Vec<Line<'static>> {
    render::parse_blocks(text)
        .into_iter()
        .map(|block| {
            let mut spans: Vec<Span<'static>> = Vec::new();
            let base = match block.kind {
                LineKind::Heading(1) => Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                LineKind::Heading(2) => Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
                LineKind::Heading(_) => Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
                LineKind::Bullet => {
                    spans.push(Span::styled("  • ", Style::default().fg(Color::Yellow)));
                    Style::default()
                }
                LineKind::Blank => return Line::default(),
                LineKind::Paragraph => Style::default(),
            };
            spans.extend(
                block
                    .spans
                    .into_iter()
                    .map(|span| Span::styled(sanitize(&span.text), base.patch(span_style(span.style)))),
            );
            Line::from(spans)
        })
        .collect()
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    if let Some(error) = app.controller.fatal_error() {
        let message = error.to_string();
        render_fatal(&message, frame, body_area);
        render_footer(app, frame, footer_area);
        return;
    }

    match app.controller.view() {
        ViewState::Initial => render_initial_screen(app, frame, body_area),
        ViewState::Conversation => render_conversation_screen(app, frame, body_area),
    }

    render_footer(app, frame, footer_area);

    if app.show_help {
        render_help(frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(" doclens ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {} ", app.controller.config().model()),
            Style::default().fg(Color::White),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.edit_mode {
        EditMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        EditMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };

    let mode_text = match app.controller.view() {
        ViewState::Initial => " INPUT ",
        ViewState::Conversation => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {key} "), key_style),
            Span::styled(format!(" {label} "), label_style),
        ]
    };

    let mut hints: Vec<Span> = Vec::new();
    if app.controller.fatal_error().is_some() {
        hints.extend(hint("q", "quit"));
    } else {
        let mode = app.controller.input().mode();
        match (app.controller.view(), app.edit_mode) {
            (ViewState::Initial, EditMode::Editing) if mode == InputMode::Paste => {
                hints.extend(hint("^S", "analyze"));
                hints.extend(hint("Esc", "stop typing"));
            }
            (ViewState::Initial, EditMode::Editing) => {
                hints.extend(hint("Enter", "select file"));
                hints.extend(hint("Esc", "stop typing"));
            }
            (ViewState::Initial, EditMode::Normal) => {
                hints.extend(hint("Tab", "mode"));
                match mode {
                    InputMode::Camera if app.controller.is_camera_active() => {
                        hints.extend(hint("Enter", "take photo"));
                        hints.extend(hint("Esc", "close camera"));
                    }
                    InputMode::Camera => {
                        hints.extend(hint("o", "open camera"));
                        hints.extend(hint("x", "discard"));
                    }
                    _ => {
                        hints.extend(hint("i", "edit"));
                        hints.extend(hint("x", "clear"));
                    }
                }
                hints.extend(hint("Enter", "analyze"));
                hints.extend(hint("?", "help"));
                hints.extend(hint("q", "quit"));
            }
            (ViewState::Conversation, EditMode::Editing) => {
                hints.extend(hint("Enter", "send"));
                hints.extend(hint("Esc", "stop typing"));
            }
            (ViewState::Conversation, EditMode::Normal) => {
                hints.extend(hint("i", "ask"));
                hints.extend(hint("j/k", "scroll"));
                hints.extend(hint("Tab", "select"));
                hints.extend(hint("d", "export"));
                hints.extend(hint("n", "new task"));
                hints.extend(hint("?", "help"));
                hints.extend(hint("q", "quit"));
            }
        }
    }

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

fn render_fatal(message: &str, frame: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Configuration error ");

    let text = Text::from(vec![
        Line::default(),
        Line::from(Span::styled(
            "The application cannot start.",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
        Line::from(sanitize(message)),
        Line::default(),
        Line::from(Span::styled(
            "Press q to quit.",
            Style::default().fg(Color::DarkGray),
        )),
    ]);

    let paragraph = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: true })
        .centered();
    frame.render_widget(paragraph, area);
}

fn render_initial_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let error = app.controller.input().error().map(sanitize);
    let banner_height = if error.is_some() { 3 } else { 0 };
    let status_height = if app.controller.status().is_some() { 1 } else { 0 };

    let [tabs_area, banner_area, panel_area, status_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(banner_height),
        Constraint::Min(0),
        Constraint::Length(status_height),
    ])
    .areas(area);

    let modes = InputMode::all();
    let mode = app.controller.input().mode();
    let selected = modes.iter().position(|m| *m == mode).unwrap_or(0);
    let titles: Vec<Line> = modes
        .iter()
        .enumerate()
        .map(|(i, m)| Line::from(format!(" {} {} ", i + 1, m.display_name())))
        .collect();
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title(" Document source "))
        .select(selected)
        .highlight_style(Style::default().fg(Color::Black).bg(Color::Cyan).bold());
    frame.render_widget(tabs, tabs_area);

    if let Some(error) = error {
        let banner = Paragraph::new(error)
            .style(Style::default().fg(Color::White).bg(Color::Red))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red))
                    .title(" Error (Esc to dismiss) "),
            );
        frame.render_widget(banner, banner_area);
    }

    match mode {
        InputMode::Upload => render_upload_panel(app, frame, panel_area),
        InputMode::Paste => render_paste_panel(app, frame, panel_area),
        InputMode::Camera => render_camera_panel(app, frame, panel_area),
    }

    if let Some(status) = app.controller.status() {
        let line = Line::from(vec![
            Span::styled(format!(" {} ", app.spinner()), Style::default().fg(Color::Cyan)),
            Span::styled(status.to_string(), Style::default().fg(Color::Cyan).italic()),
        ]);
        frame.render_widget(Paragraph::new(line), status_area);
    }
}

fn render_upload_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let [input_area, info_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Min(0)]).areas(area);

    let editing = app.edit_mode == EditMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" File path (type it, or drop a file onto the terminal) ");

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.path_input.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };
    let visible_text: String = app
        .path_input
        .text
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(sanitize(&visible_text))
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, input_area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }

    let info = match app.controller.input().selected_file() {
        Some(file) => vec![
            Line::from(vec![
                Span::styled("Selected: ", Style::default().fg(Color::Green).bold()),
                Span::raw(sanitize(&file.name)),
            ]),
            Line::from(Span::styled(
                format!("{} · {} KB", file.mime_type, file.size_kb()),
                Style::default().fg(Color::DarkGray),
            )),
            Line::default(),
            Line::from("Press Enter to analyze, or x to remove the file."),
        ],
        None => vec![
            Line::from(Span::styled(
                "No file selected.",
                Style::default().fg(Color::DarkGray),
            )),
            Line::from(Span::styled(
                "Supported: .pdf, .docx, and images (png, jpg, webp, ...).",
                Style::default().fg(Color::DarkGray),
            )),
        ],
    };
    let panel = Paragraph::new(info)
        .block(Block::default().borders(Borders::ALL).title(" Upload file "))
        .wrap(Wrap { trim: false });
    frame.render_widget(panel, info_area);
}

fn render_paste_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let editing = app.edit_mode == EditMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Paste or type the document text ");

    let text = app.controller.input().paste_text();
    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);

    // Cursor line and column from the character cursor
    let before: String = text.chars().take(app.paste_cursor).collect();
    let (cursor_line, cursor_col) = paste_cursor_position(&before);
    let scroll_y = cursor_line.saturating_sub(inner_height.saturating_sub(1));
    let scroll_x = cursor_col.saturating_sub(inner_width.saturating_sub(1));

    let content = if text.is_empty() && !editing {
        Text::from(Span::styled(
            "Press i to start typing, or paste with your terminal.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(
            text.split('\n')
                .map(|line| Line::from(sanitize(line)))
                .collect::<Vec<_>>(),
        )
    };

    let paragraph = Paragraph::new(content).block(block).scroll((scroll_y, scroll_x));
    frame.render_widget(paragraph, area);

    if editing {
        frame.set_cursor_position((
            area.x + 1 + (cursor_col - scroll_x),
            area.y + 1 + (cursor_line - scroll_y),
        ));
    }
}

fn render_camera_panel(app: &mut App, frame: &mut Frame, area: Rect) {
    let device = app.controller.config().camera_device().to_string();
    let input = app.controller.input();

    let lines = if app.controller.is_camera_active() {
        vec![
            Line::from(Span::styled(
                format!("● Camera live on {device}"),
                Style::default().fg(Color::Red).bold(),
            )),
            Line::default(),
            Line::from("Press Enter or Space to take the photo, Esc to close the camera."),
        ]
    } else if input.is_camera_open() {
        vec![Line::from(Span::styled(
            format!("{} Starting camera on {device}...", app.spinner()),
            Style::default().fg(Color::Cyan),
        ))]
    } else if let Some(photo) = input.captured_image() {
        let size_kb = InlineImage::from_data_uri(photo.data_uri())
            .map(|image| image.decoded_len() / 1024)
            .unwrap_or(0);
        vec![
            Line::from(Span::styled(
                format!("Photo captured ({size_kb} KB)."),
                Style::default().fg(Color::Green).bold(),
            )),
            Line::default(),
            Line::from("Press Enter to analyze it, o to retake, or x to discard."),
        ]
    } else {
        vec![
            Line::from("Take a photo of a printed document."),
            Line::default(),
            Line::from(Span::styled(
                format!("Press o or Enter to open the camera ({device})."),
                Style::default().fg(Color::DarkGray),
            )),
        ]
    };

    let panel = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Camera "))
        .wrap(Wrap { trim: false });
    frame.render_widget(panel, area);
}

/// Line and column of the end of `before`, saturating at the terminal's
/// coordinate range.
fn paste_cursor_position(before: &str) -> (u16, u16) {
    let line = before.matches('\n').count();
    let col = before.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0);
    (
        u16::try_from(line).unwrap_or(u16::MAX),
        u16::try_from(col).unwrap_or(u16::MAX),
    )
}

/// Rows a set of lines occupies once wrapped to `width`.
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = width.max(1) as usize;
    let rows: usize = lines
        .iter()
        .map(|line| line.width().max(1).div_ceil(width))
        .sum();
    rows.min(u16::MAX as usize) as u16
}

fn render_conversation_screen(app: &mut App, frame: &mut Frame, area: Rect) {
    let notice_height = if app.notice.is_some() { 1 } else { 0 };
    let [chat_area, notice_area, input_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(notice_height),
        Constraint::Length(3),
    ])
    .areas(area);

    // Store chat area dimensions for scroll calculations (inner size minus borders)
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    let selected = app.selected_message_index();
    let streaming = app.controller.log().is_streaming();
    let messages = app.controller.log().messages();
    let last = messages.len().saturating_sub(1);

    let mut lines: Vec<Line> = Vec::new();
    for (i, msg) in messages.iter().enumerate() {
        match msg.role {
            ChatRole::User => {
                lines.push(Line::from(Span::styled(
                    "You:",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
                for line in msg.text.lines() {
                    lines.push(Line::from(sanitize(line)));
                }
            }
            ChatRole::Model => {
                let mut header = vec![Span::styled(
                    "AI:",
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                )];
                if selected == Some(i) {
                    header.push(Span::styled(
                        "  [selected for export]",
                        Style::default().fg(Color::Green),
                    ));
                }
                lines.push(Line::from(header));

                if msg.text.is_empty() && streaming && i == last {
                    lines.push(Line::from(Span::styled(
                        format!("Thinking {}", app.spinner()),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                } else {
                    lines.extend(markdown_lines(&msg.text));
                }
            }
        }
        lines.push(Line::default());
    }

    let total = wrapped_height(&lines, app.chat_width);
    let max_scroll = total.saturating_sub(app.chat_height);
    if app.follow_output || app.chat_scroll >= max_scroll {
        app.chat_scroll = max_scroll;
        app.follow_output = true;
    }

    let title = match app.controller.status() {
        Some(status) => format!(" Conversation · {} {} ", app.spinner(), status),
        None => " Conversation ".to_string(),
    };
    let chat = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title(title),
        )
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, chat_area);

    if let Some(notice) = &app.notice {
        frame.render_widget(
            Paragraph::new(Span::styled(
                format!(" {}", sanitize(notice)),
                Style::default().fg(Color::Green),
            )),
            notice_area,
        );
    }

    // Follow-up input at the bottom - highlight when editing
    let editing = app.edit_mode == EditMode::Editing;
    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if editing { Color::Yellow } else { Color::DarkGray }))
        .title(if app.controller.is_busy() {
            " Ask a follow-up (waiting for the answer...) "
        } else {
            " Ask a follow-up (i to type) "
        });

    let inner_width = input_area.width.saturating_sub(2) as usize;
    let cursor_pos = app.follow_up.cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };
    let visible_text: String = app
        .follow_up
        .text
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(sanitize(&visible_text))
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, input_area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((input_area.x + cursor_x + 1, input_area.y + 1));
    }
}

fn render_help(frame: &mut Frame, area: Rect) {
    let popup_width = 70.min(area.width.saturating_sub(4));
    let popup_height = 22.min(area.height.saturating_sub(2));
    let popup_area = Rect::new(
        area.x + (area.width.saturating_sub(popup_width)) / 2,
        area.y + (area.height.saturating_sub(popup_height)) / 2,
        popup_width,
        popup_height,
    );

    // Clear the area behind the popup
    frame.render_widget(Clear, popup_area);

    let heading = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let lines = vec![
        Line::from(Span::styled("Analyze a document with AI", heading)),
        Line::default(),
        Line::from("Choose how to provide the document (Tab or 1/2/3):"),
        Line::from("  • Upload file: type a path or drop a PDF, DOCX or image file."),
        Line::from("  • Paste text: type or paste the text, then Ctrl+S."),
        Line::from("  • Take photo: open the camera and capture a printed page."),
        Line::default(),
        Line::from(Span::styled("Conversation", heading)),
        Line::from("  • Press i to ask follow-up questions about the document."),
        Line::from("  • Tab selects a response, d exports it as document-analysis.docx."),
        Line::from("  • j/k or PgUp/PgDn scroll, G jumps back to the latest output."),
        Line::default(),
        Line::from(Span::styled("Anywhere", heading)),
        Line::from("  • n starts a new task and clears the conversation."),
        Line::from("  • ? toggles this help, q quits."),
    ];

    let help = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(" Help "),
        )
        .wrap(Wrap { trim: false });
    frame.render_widget(help, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_markdown_lines_structure() {
        let lines = markdown_lines("# Title\n\n- **Key** point\nplain *it*");
        assert_eq!(lines.len(), 4);
        assert_eq!(line_text(&lines[0]), "Title");
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
        assert!(lines[1].spans.is_empty());
        assert_eq!(line_text(&lines[2]), "  • Key point");
        assert!(lines[2].spans[1].style.add_modifier.contains(Modifier::BOLD));
        assert!(lines[3].spans[1].style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn test_markup_is_shown_literally() {
        let lines = markdown_lines("<script>alert(1)</script>");
        assert_eq!(line_text(&lines[0]), "<script>alert(1)</script>");
    }

    #[test]
    fn test_control_sequences_stripped() {
        let lines = markdown_lines("\u{1b}[31mred\u{7}");
        assert_eq!(line_text(&lines[0]), "[31mred");
    }

    #[test]
    fn test_paste_cursor_position() {
        assert_eq!(paste_cursor_position(""), (0, 0));
        assert_eq!(paste_cursor_position("ab\ncde"), (1, 3));
        let long_line = "x".repeat(70_000);
        assert_eq!(paste_cursor_position(&long_line), (0, u16::MAX));
    }

    #[test]
    fn test_wrapped_height() {
        let lines = vec![Line::from("abcdef"), Line::default(), Line::from("ab")];
        assert_eq!(wrapped_height(&lines, 4), 4);
        assert_eq!(wrapped_height(&lines, 10), 3);
    }
}
