//! Document text extraction and passage preparation.
//!
//! A [`TextExtractor`] turns raw document bytes into plain text. Formats it
//! does not handle are skipped (`Ok(None)`); a document it claims but cannot
//! decode aborts the ingest.

use anyhow::Result;
use tracing::info;

use crate::chunk::{chunk_document, ChunkParams};
use crate::error::BuildError;
use crate::models::{Passage, RawDocument};

/// Extracts plain UTF-8 text from a [`RawDocument`].
pub trait TextExtractor: Send + Sync {
    /// `Ok(None)` means the format is unsupported and the document is skipped.
    fn extract(&self, doc: &RawDocument) -> Result<Option<String>>;
}

/// Extensions accepted by [`PlainTextExtractor`].
pub const PLAIN_TEXT_EXTENSIONS: &[&str] = &["txt", "md"];

/// Accepts `.txt` and `.md` files as strict UTF-8.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, doc: &RawDocument) -> Result<Option<String>> {
        match doc.extension() {
            Some(ext) if PLAIN_TEXT_EXTENSIONS.contains(&ext.as_str()) => {
                let text = std::str::from_utf8(&doc.bytes)?;
                Ok(Some(text.to_string()))
            }
            _ => Ok(None),
        }
    }
}

/// Extract and chunk every document, in order.
///
/// Unsupported documents are skipped with a log line. The first extraction
/// error aborts with [`BuildError::Document`].
pub fn documents_to_passages(
    documents: &[RawDocument],
    extractor: &dyn TextExtractor,
    params: &ChunkParams,
) -> Result<Vec<Passage>, BuildError> {
    let mut passages = Vec::new();

    for doc in documents {
        let text = extractor
            .extract(doc)
            .map_err(|source| BuildError::Document {
                filename: doc.filename.clone(),
                source,
            })?;

        match text {
            Some(text) => {
                let chunks = chunk_document(Some(&doc.filename), &text, params);
                info!(file = %doc.filename, passages = chunks.len(), "document chunked");
                passages.extend(chunks);
            }
            None => info!(file = %doc.filename, "unsupported document skipped"),
        }
    }

    Ok(passages)
}
