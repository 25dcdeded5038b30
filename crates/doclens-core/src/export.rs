//! Word document export of a single model response.
//!
//! Each source line becomes one paragraph. Classification and inline runs come
//! from [`crate::render`], so the exported document matches the chat view.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::render::{self, LineKind, SpanStyle};

pub const EXPORT_FILE_NAME: &str = "document-analysis.docx";

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Nothing to export: the response is empty.")]
    EmptyResponse,

    #[error("Could not build the Word document: {0}")]
    Archive(#[from] ZipError),

    #[error("Could not write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphStyle {
    Heading(u8),
    Bullet,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub style: ParagraphStyle,
    pub runs: Vec<Run>,
}

impl Paragraph {
    pub fn is_blank(&self) -> bool {
        self.runs.is_empty()
    }
}

/// Paragraph model of a response, one entry per source line.
pub fn build_paragraphs(text: &str) -> Vec<Paragraph> {
    render::parse_blocks(text)
        .into_iter()
        .map(|block| {
            let style = match block.kind {
                LineKind::Heading(level) => ParagraphStyle::Heading(level),
                LineKind::Bullet => ParagraphStyle::Bullet,
                LineKind::Blank | LineKind::Paragraph => ParagraphStyle::Plain,
            };
            let runs = block
                .spans
                .into_iter()
                .map(|span| Run {
                    bold: span.style == SpanStyle::Bold,
                    italic: span.style == SpanStyle::Italic,
                    text: span.text,
                })
                .collect();
            Paragraph { style, runs }
        })
        .collect()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // control characters are not allowed in XML 1.0
            c if c.is_control() && c != '\t' && c != '\n' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}

fn run_xml(run: &Run) -> String {
    let mut props = String::new();
    if run.bold {
        props.push_str("<w:b/>");
    }
    if run.italic {
        props.push_str("<w:i/>");
    }
    let props = if props.is_empty() {
        String::new()
    } else {
        format!("<w:rPr>{props}</w:rPr>")
    };
    format!(
        "<w:r>{props}<w:t xml:space=\"preserve\">{}</w:t></w:r>",
        escape_xml(&run.text)
    )
}

fn paragraph_xml(paragraph: &Paragraph) -> String {
    let props = match paragraph.style {
        ParagraphStyle::Heading(level) => {
            format!("<w:pPr><w:pStyle w:val=\"Heading{level}\"/></w:pPr>")
        }
        ParagraphStyle::Bullet => concat!(
            "<w:pPr><w:pStyle w:val=\"ListBullet\"/>",
            "<w:numPr><w:ilvl w:val=\"0\"/><w:numId w:val=\"1\"/></w:numPr></w:pPr>"
        )
        .to_string(),
        ParagraphStyle::Plain => String::new(),
    };
    let runs: String = paragraph.runs.iter().map(run_xml).collect();
    format!("<w:p>{props}{runs}</w:p>")
}

fn document_xml(paragraphs: &[Paragraph]) -> String {
    let body: String = paragraphs.iter().map(paragraph_xml).collect();
    format!(
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>",
            "<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">",
            "<w:body>{}<w:sectPr/></w:body></w:document>"
        ),
        body
    )
}

const CONTENT_TYPES_XML: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>",
    "<Types xmlns=\"http://schemas.openxmlformats.org/package/2006/content-types\">",
    "<Default Extension=\"rels\" ContentType=\"application/vnd.openxmlformats-package.relationships+xml\"/>",
    "<Default Extension=\"xml\" ContentType=\"application/xml\"/>",
    "<Override PartName=\"/word/document.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml\"/>",
    "<Override PartName=\"/word/styles.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml\"/>",
    "<Override PartName=\"/word/numbering.xml\" ContentType=\"application/vnd.openxmlformats-officedocument.wordprocessingml.numbering+xml\"/>",
    "</Types>"
);

const PACKAGE_RELS_XML: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>",
    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument\" Target=\"word/document.xml\"/>",
    "</Relationships>"
);

const DOCUMENT_RELS_XML: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>",
    "<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
    "<Relationship Id=\"rId1\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\" Target=\"styles.xml\"/>",
    "<Relationship Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering\" Target=\"numbering.xml\"/>",
    "</Relationships>"
);

const STYLES_XML: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>",
    "<w:styles xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">",
    "<w:style w:type=\"paragraph\" w:default=\"1\" w:styleId=\"Normal\"><w:name w:val=\"Normal\"/></w:style>",
    "<w:style w:type=\"paragraph\" w:styleId=\"Heading1\"><w:name w:val=\"heading 1\"/><w:basedOn w:val=\"Normal\"/>",
    "<w:pPr><w:outlineLvl w:val=\"0\"/></w:pPr><w:rPr><w:b/><w:sz w:val=\"32\"/></w:rPr></w:style>",
    "<w:style w:type=\"paragraph\" w:styleId=\"Heading2\"><w:name w:val=\"heading 2\"/><w:basedOn w:val=\"Normal\"/>",
    "<w:pPr><w:outlineLvl w:val=\"1\"/></w:pPr><w:rPr><w:b/><w:sz w:val=\"28\"/></w:rPr></w:style>",
    "<w:style w:type=\"paragraph\" w:styleId=\"Heading3\"><w:name w:val=\"heading 3\"/><w:basedOn w:val=\"Normal\"/>",
    "<w:pPr><w:outlineLvl w:val=\"2\"/></w:pPr><w:rPr><w:b/><w:sz w:val=\"24\"/></w:rPr></w:style>",
    "<w:style w:type=\"paragraph\" w:styleId=\"ListBullet\"><w:name w:val=\"List Bullet\"/><w:basedOn w:val=\"Normal\"/></w:style>",
    "</w:styles>"
);

const NUMBERING_XML: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>",
    "<w:numbering xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">",
    "<w:abstractNum w:abstractNumId=\"0\"><w:lvl w:ilvl=\"0\"><w:start w:val=\"1\"/>",
    "<w:numFmt w:val=\"bullet\"/><w:lvlText w:val=\"\u{2022}\"/><w:lvlJc w:val=\"left\"/>",
    "<w:pPr><w:ind w:left=\"720\" w:hanging=\"360\"/></w:pPr></w:lvl></w:abstractNum>",
    "<w:num w:numId=\"1\"><w:abstractNumId w:val=\"0\"/></w:num>",
    "</w:numbering>"
);

/// Serialize a response into DOCX bytes.
pub fn build_docx(text: &str) -> Result<Vec<u8>, ExportError> {
    let paragraphs = build_paragraphs(text);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    let parts: [(&str, &str); 5] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML),
        ("_rels/.rels", PACKAGE_RELS_XML),
        ("word/_rels/document.xml.rels", DOCUMENT_RELS_XML),
        ("word/styles.xml", STYLES_XML),
        ("word/numbering.xml", NUMBERING_XML),
    ];
    for (name, body) in parts {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes()).map_err(ZipError::Io)?;
    }

    zip.start_file("word/document.xml", options)?;
    zip.write_all(document_xml(&paragraphs).as_bytes())
        .map_err(ZipError::Io)?;

    let bytes = zip.finish()?.into_inner();
    tracing::debug!(paragraphs = paragraphs.len(), byte_len = bytes.len(), "DOCX built");
    Ok(bytes)
}

/// Write the export into `dir` under the fixed file name.
pub fn export_to_file(text: &str, dir: &Path) -> Result<PathBuf, ExportError> {
    if text.trim().is_empty() {
        return Err(ExportError::EmptyResponse);
    }
    let bytes = build_docx(text)?;
    let path = dir.join(EXPORT_FILE_NAME);
    std::fs::write(&path, bytes).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })?;
    tracing::info!(path = %path.display(), "response exported");
    Ok(path)
}
