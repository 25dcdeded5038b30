use std::time::Duration;

use lopdf::Document;

use crate::error::ExtractionError;

const EXTRACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Separator placed between consecutive pages' text.
pub const PAGE_SEPARATOR: &str = "\n";

/// Extract the text of every page, in page order, as one blob.
pub async fn extract_text(bytes: Vec<u8>) -> Result<String, ExtractionError> {
    let byte_len = bytes.len();

    let pages = tokio::time::timeout(
        EXTRACTION_TIMEOUT,
        tokio::task::spawn_blocking(move || extract_pages(&bytes)),
    )
    .await
    .map_err(|_| ExtractionError::Read("PDF extraction timed out".to_string()))?
    .map_err(|e| ExtractionError::Read(format!("task join error: {e}")))??;

    tracing::info!(page_count = pages.len(), byte_len, "PDF text extraction complete");

    Ok(join_pages(&pages))
}

fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let doc = Document::load_mem(bytes).map_err(|e| {
        tracing::warn!(error = %e, "failed to parse PDF");
        ExtractionError::UnreadablePdf
    })?;

    if doc.trailer.get(b"Encrypt").is_ok() {
        tracing::warn!("PDF is encrypted");
        return Err(ExtractionError::UnreadablePdf);
    }

    // get_pages is keyed by page number, so iteration is in page order
    let pages = doc.get_pages();
    let mut texts = Vec::with_capacity(pages.len());
    for page_number in pages.keys() {
        let text = doc.extract_text(&[*page_number]).unwrap_or_else(|e| {
            tracing::warn!(page_number, error = %e, "page text extraction failed");
            String::new()
        });
        texts.push(text);
    }

    Ok(texts)
}

fn join_pages(pages: &[String]) -> String {
    pages
        .iter()
        .map(|p| p.trim_end())
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR)
}
