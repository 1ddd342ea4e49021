use async_trait::async_trait;

use crate::error::RagError;

/// Turns a raw document blob into one plain-text string.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, data: &[u8]) -> Result<String, RagError>;
}

/// Format-sniffing extractor: PDF bytes go through lopdf with a
/// `pdftotext` subprocess fallback, anything else must be UTF-8 text.
///
/// A structurally valid PDF with no text layer yields `Ok` with empty
/// text; the pipeline turns that into `EmptyDocument` so the user sees
/// a different message than for a corrupt file.
pub struct DocumentExtractor;

const PDF_MAGIC: &[u8] = b"%PDF-";

#[async_trait]
impl TextExtractor for DocumentExtractor {
    async fn extract(&self, data: &[u8]) -> Result<String, RagError> {
        if data.starts_with(PDF_MAGIC) {
            extract_pdf(data.to_vec()).await
        } else {
            String::from_utf8(data.to_vec()).map_err(|_| {
                RagError::Extraction(
                    "document is neither a PDF nor valid UTF-8 text".to_string(),
                )
            })
        }
    }
}

/// PDF extraction with two backends, run off the async executor.
/// lopdf handles most files in pure Rust; pdftotext covers the ones it
/// cannot parse, and gets a second look when lopdf finds no text layer.
async fn extract_pdf(data: Vec<u8>) -> Result<String, RagError> {
    let data_for_fallback = data.clone();

    let lopdf_result = tokio::task::spawn_blocking(move || lopdf_extract_sync(&data))
        .await
        .map_err(|e| RagError::Extraction(format!("extraction task failed: {e}")))?;

    match lopdf_result {
        Ok(text) if !text.trim().is_empty() => {
            tracing::info!(
                chars = text.chars().count(),
                "PDF extracted using pure-Rust backend (lopdf)"
            );
            Ok(text)
        }
        Ok(text) => {
            // Parsed fine but no text layer. pdftotext occasionally
            // recovers text lopdf misses; if it cannot, report the
            // empty (not corrupt) result to the caller.
            tracing::warn!("lopdf found no text layer, trying pdftotext");
            match run_pdftotext(data_for_fallback).await {
                Ok(fallback_text) if !fallback_text.trim().is_empty() => {
                    tracing::info!(
                        chars = fallback_text.chars().count(),
                        "PDF extracted using pdftotext fallback"
                    );
                    Ok(fallback_text)
                }
                _ => Ok(text),
            }
        }
        Err(lopdf_err) => {
            tracing::warn!(error = %lopdf_err, "lopdf failed to parse PDF, falling back to pdftotext");
            match run_pdftotext(data_for_fallback).await {
                Ok(text) => {
                    tracing::info!(
                        chars = text.chars().count(),
                        "PDF extracted using pdftotext fallback"
                    );
                    Ok(text)
                }
                Err(pdftotext_err) => Err(RagError::Extraction(format!(
                    "both PDF backends failed: lopdf: {lopdf_err}; pdftotext: {pdftotext_err}"
                ))),
            }
        }
    }
}

async fn run_pdftotext(data: Vec<u8>) -> Result<String, RagError> {
    tokio::task::spawn_blocking(move || pdftotext_extract_sync(&data))
        .await
        .map_err(|e| RagError::Extraction(format!("extraction task failed: {e}")))?
}

/// Walks the document page by page, concatenating extractable text in
/// document order. Pages that fail individually are skipped so one bad
/// page does not sink the whole document.
fn lopdf_extract_sync(data: &[u8]) -> Result<String, RagError> {
    use lopdf::Document;

    let doc = Document::load_mem(data)
        .map_err(|e| RagError::Extraction(format!("lopdf failed to parse PDF: {e}")))?;

    let mut all_text = String::new();
    for (page_num, _page_id) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                if !all_text.is_empty() && !page_text.is_empty() {
                    all_text.push('\n');
                }
                all_text.push_str(&page_text);
            }
            Err(e) => {
                tracing::debug!("lopdf: failed to extract text from page {page_num}: {e}");
            }
        }
    }

    Ok(all_text)
}

/// Temp path for a single pdftotext invocation. Named with a fresh
/// UUID rather than the process id: concurrent extractions in one
/// process must never write or delete each other's file.
fn temp_pdf_path() -> std::path::PathBuf {
    std::env::temp_dir().join(format!("ragchat_{}.pdf", uuid::Uuid::new_v4()))
}

/// Invokes the pdftotext binary on a temp file. Sync so it can run
/// under spawn_blocking.
fn pdftotext_extract_sync(data: &[u8]) -> Result<String, RagError> {
    use std::process::Command;

    let temp_file = temp_pdf_path();

    std::fs::write(&temp_file, data)
        .map_err(|e| RagError::Extraction(format!("failed to write temp PDF: {e}")))?;

    let output = Command::new("pdftotext")
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(&temp_file)
        .arg("-")
        .output();
    let _ = std::fs::remove_file(&temp_file);

    match output {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).to_string())
        }
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(RagError::Extraction(format!("pdftotext failed: {stderr}")))
        }
        Err(e) => Err(RagError::Extraction(format!(
            "pdftotext command failed: {e} (is poppler installed?)"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_text_passes_through() {
        let extractor = DocumentExtractor;
        let text = extractor
            .extract("Just some plain text.".as_bytes())
            .await
            .unwrap();
        assert_eq!(text, "Just some plain text.");
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_extraction_error() {
        let extractor = DocumentExtractor;
        let result = extractor.extract(&[0xff, 0xfe, 0x00, 0x9f]).await;
        assert!(matches!(result, Err(RagError::Extraction(_))));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_extraction_error() {
        // Carries the PDF magic but no valid structure; both backends
        // must fail and the error must name extraction, not emptiness.
        let extractor = DocumentExtractor;
        let result = extractor.extract(b"%PDF-1.7 this is not a real pdf").await;
        assert!(matches!(result, Err(RagError::Extraction(_))));
    }

    #[test]
    fn test_temp_pdf_paths_are_unique_per_call() {
        let a = temp_pdf_path();
        let b = temp_pdf_path();
        assert_ne!(a, b, "concurrent extractions must not share a temp file");
    }

    #[tokio::test]
    async fn test_concurrent_extractions_do_not_interfere() {
        // Both inputs route through the pdftotext fallback at the same
        // time; each call must operate on its own temp file and fail
        // (or succeed) on its own input only.
        let extractor = DocumentExtractor;
        let first = extractor.extract(b"%PDF-1.7 broken one");
        let second = extractor.extract(b"%PDF-1.4 broken two");
        let (first, second) = tokio::join!(first, second);
        assert!(matches!(first, Err(RagError::Extraction(_))));
        assert!(matches!(second, Err(RagError::Extraction(_))));
    }

    #[tokio::test]
    async fn test_whitespace_only_text_is_not_an_error_here() {
        // Emptiness is the pipeline's call, not the extractor's.
        let extractor = DocumentExtractor;
        let text = extractor.extract(b"   \n\t  ").await.unwrap();
        assert!(text.trim().is_empty());
    }
}
