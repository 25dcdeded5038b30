//! Line-oriented markdown projection shared by the chat view and the exporter.
//!
//! Only the subset the model is asked to produce is recognised: `#`/`##`/`###`
//! headings, `* `/`- ` bullets, blank lines, `**bold**` and `*italic*`.

use std::sync::OnceLock;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Heading(u8),
    Bullet,
    Blank,
    Paragraph,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanStyle {
    Plain,
    Bold,
    Italic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineSpan {
    pub text: String,
    pub style: SpanStyle,
}

impl InlineSpan {
    fn new(text: &str, style: SpanStyle) -> Self {
        Self {
            text: text.to_string(),
            style,
        }
    }
}

/// One source line, classified, with its marker stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: LineKind,
    pub spans: Vec<InlineSpan>,
}

/// Classify a line and return the content after its marker.
pub fn classify_line(line: &str) -> (LineKind, &str) {
    let trimmed = line.trim_start();
    if trimmed.trim_end().is_empty() {
        return (LineKind::Blank, "");
    }

    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    if (1..=3).contains(&hashes) {
        let rest = &trimmed[hashes..];
        if rest.starts_with(char::is_whitespace) {
            return (LineKind::Heading(hashes as u8), rest.trim_start());
        }
    }

    if let Some(rest) = trimmed.strip_prefix("* ").or_else(|| trimmed.strip_prefix("- ")) {
        return (LineKind::Bullet, rest.trim_start());
    }

    (LineKind::Paragraph, line)
}

fn inline_regex() -> &'static Regex {
    static INLINE: OnceLock<Regex> = OnceLock::new();
    INLINE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*|\*(.+?)\*").expect("inline pattern is valid"))
}

fn bold_regex() -> &'static Regex {
    static BOLD: OnceLock<Regex> = OnceLock::new();
    BOLD.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold pattern is valid"))
}

fn italic_regex() -> &'static Regex {
    static ITALIC: OnceLock<Regex> = OnceLock::new();
    ITALIC.get_or_init(|| Regex::new(r"\*(.+?)\*").expect("italic pattern is valid"))
}

/// Split inline text into plain, bold and italic runs. Spans never nest.
pub fn parse_inline(text: &str) -> Vec<InlineSpan> {
    let mut spans = Vec::new();
    let mut last = 0;

    for caps in inline_regex().captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > last {
            spans.push(InlineSpan::new(&text[last..whole.start()], SpanStyle::Plain));
        }
        if let Some(bold) = caps.get(1) {
            spans.push(InlineSpan::new(bold.as_str(), SpanStyle::Bold));
        } else if let Some(italic) = caps.get(2) {
            spans.push(InlineSpan::new(italic.as_str(), SpanStyle::Italic));
        }
        last = whole.end();
    }

    if last < text.len() {
        spans.push(InlineSpan::new(&text[last..], SpanStyle::Plain));
    }
    spans
}

pub fn parse_blocks(text: &str) -> Vec<Block> {
    text.split('\n')
        .map(|line| {
            let (kind, content) = classify_line(line.trim_end_matches('\r'));
            Block {
                kind,
                spans: parse_inline(content),
            }
        })
        .collect()
}

pub fn escape_html(unsafe_text: &str) -> String {
    let mut out = String::with_capacity(unsafe_text.len());
    for c in unsafe_text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape first, then substitute emphasis, so text can never inject markup.
fn inline_html(content: &str) -> String {
    let escaped = escape_html(content);
    let bolded = bold_regex().replace_all(&escaped, "<strong>$1</strong>");
    italic_regex().replace_all(&bolded, "<em>$1</em>").into_owned()
}

/// HTML projection of a message.
pub fn render_html(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let (kind, content) = classify_line(line.trim_end_matches('\r'));
            match kind {
                LineKind::Heading(level) => {
                    format!("<h{level}>{}</h{level}>", inline_html(content))
                }
                LineKind::Bullet => format!("<li>{}</li>", inline_html(content)),
                LineKind::Blank => "<div class=\"gap\"></div>".to_string(),
                LineKind::Paragraph => format!("<p>{}</p>", inline_html(content)),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
