//! Raw text extraction from Word documents.
//!
//! A DOCX file is a ZIP archive; the body lives in `word/document.xml`.
//! Formatting is discarded: each paragraph becomes its text followed by a
//! blank line, tabs and breaks are kept as `\t` and `\n`.

use std::io::{Cursor, Read};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::ExtractionError;

const DOCUMENT_PART: &str = "word/document.xml";

pub fn extract_raw_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::UnreadableDocx(format!("not a ZIP archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|_| ExtractionError::UnreadableDocx(format!("missing {DOCUMENT_PART}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::UnreadableDocx(e.to_string()))?;

    let text = document_xml_to_text(&xml);
    tracing::info!(xml_len = xml.len(), text_len = text.len(), "DOCX text extraction complete");
    Ok(text)
}

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| {
        Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9:._-]*)([^>]*?)(/?)>").expect("tag pattern is valid")
    })
}

fn document_xml_to_text(xml: &str) -> String {
    let mut out = String::new();
    let mut in_text = false;
    let mut in_tab_stops = false;
    let mut last = 0;

    for caps in tag_regex().captures_iter(xml) {
        let Some(whole) = caps.get(0) else { continue };
        if in_text {
            out.push_str(&decode_entities(&xml[last..whole.start()]));
        }
        last = whole.end();

        let closing = !caps[1].is_empty();
        let self_closing = !caps[4].is_empty();
        match &caps[2] {
            "w:t" if !closing && !self_closing => in_text = true,
            "w:t" if closing => in_text = false,
            "w:tabs" if !self_closing => in_tab_stops = !closing,
            // <w:tab/> inside <w:tabs> is a tab stop definition, not content
            "w:tab" if !closing && !in_tab_stops => out.push('\t'),
            "w:br" | "w:cr" if !closing => out.push('\n'),
            "w:p" if closing => out.push_str("\n\n"),
            _ => {}
        }
    }

    out
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let entity = &rest[1..semi];
            let ch = match entity {
                "lt" => Some('<'),
                "gt" => Some('>'),
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
