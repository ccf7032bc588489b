//! Paragraph splitting and chunk construction.
//!
//! Page text is split on paragraph boundaries: a run of two or more
//! newlines, or a newline followed by a whitespace-only line and another
//! newline. Paragraphs whose trimmed length does not exceed the minimum
//! are dropped, which removes headers, page numbers, and other fragments.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::paragraph::split_paragraphs;
//!
//! let text = "Short line.\n\nThis paragraph is comfortably longer than fifty characters in total.";
//! let paras = split_paragraphs(text, 50);
//! assert_eq!(paras.len(), 1);
//! ```

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, PageParagraph};

/// Paragraphs must be strictly longer than this many characters (after trimming).
pub const MIN_PARAGRAPH_CHARS: usize = 50;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}|\n\s*\n").expect("paragraph break pattern"));

/// Split page text into trimmed paragraphs longer than `min_chars` characters.
pub fn split_paragraphs(text: &str, min_chars: usize) -> Vec<String> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| p.chars().count() > min_chars)
        .map(str::to_string)
        .collect()
}

/// Split every page and tag each surviving paragraph with its 1-based page number.
///
/// `pages[0]` is page 1.
pub fn paragraphs_from_pages(pages: &[String], min_chars: usize) -> Vec<PageParagraph> {
    pages
        .iter()
        .enumerate()
        .flat_map(|(i, page)| {
            let page_number = i as u32 + 1;
            split_paragraphs(page, min_chars)
                .into_iter()
                .map(move |text| PageParagraph { page_number, text })
        })
        .collect()
}

/// Module name for a document: its filename without the final extension.
pub fn module_name(document_id: &str) -> String {
    match document_id.rfind('.') {
        Some(pos) if pos > 0 => document_id[..pos].to_string(),
        _ => document_id.to_string(),
    }
}

/// Build chunks for one document from its paragraphs.
///
/// Every chunk carries the same `source_url`, resolved once per document.
/// Indices are contiguous from 0 in paragraph order.
pub fn build_chunks(
    document_id: &str,
    source_url: Option<&str>,
    paragraphs: &[PageParagraph],
) -> Vec<Chunk> {
    let module = module_name(document_id);
    paragraphs
        .iter()
        .enumerate()
        .map(|(i, para)| make_chunk(document_id, &module, source_url, para, i as i64))
        .collect()
}

fn make_chunk(
    document_id: &str,
    module_name: &str,
    source_url: Option<&str>,
    para: &PageParagraph,
    index: i64,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(para.text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        module_name: module_name.to_string(),
        source_url: source_url.map(str::to_string),
        page_number: para.page_number,
        chunk_index: index,
        text: para.text.clone(),
        hash,
    }
}
