//! PDF text extraction.
//!
//! Text comes from one of two strategies, tried in a fixed order:
//!
//! 1. [`EmbeddedText`]: the PDF's own text layer, page by page (`pdf-extract`).
//! 2. [`OcrText`]: each page rendered to PNG with `pdftoppm` and recognised
//!    with `tesseract`.
//!
//! The first strategy that returns at least one non-blank page wins and its
//! pages alone are split into paragraphs; strategies are never mixed within
//! one document. A strategy that errors or finds only blank pages hands over
//! to the next; a panic inside the PDF parser counts as an error.

use anyhow::{bail, Context, Result};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::process::Command;

use docqa_core::models::PageParagraph;
use docqa_core::paragraph::paragraphs_from_pages;

use crate::config::ExtractionConfig;

/// A way of getting raw per-page text out of a PDF.
pub trait TextExtraction: Send + Sync {
    fn name(&self) -> &'static str;
    /// Text of every page in order; element 0 is page 1.
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// Reads the PDF's embedded text layer.
pub struct EmbeddedText;

impl TextExtraction for EmbeddedText {
    fn name(&self) -> &'static str {
        "embedded"
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
            .map_err(|e| anyhow::anyhow!("PDF text extraction failed: {}", e))
    }
}

/// Renders pages with `pdftoppm` and recognises them with `tesseract`.
pub struct OcrText {
    pdftoppm: PathBuf,
    tesseract: PathBuf,
    dpi: u32,
    language: String,
}

impl OcrText {
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            pdftoppm: config.pdftoppm_path.clone(),
            tesseract: config.tesseract_path.clone(),
            dpi: config.ocr_dpi,
            language: config.ocr_language.clone(),
        }
    }

    fn render_pages(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
        let output = Command::new(&self.pdftoppm)
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf)
            .arg(out_dir.join("page"))
            .output()
            .with_context(|| format!("Failed to run {}", self.pdftoppm.display()))?;

        if !output.status.success() {
            bail!(
                "pdftoppm error: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(out_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
            .filter_map(|p| page_number_from_image(&p).map(|n| (n, p)))
            .collect();
        pages.sort_by_key(|(n, _)| *n);

        if pages.is_empty() {
            bail!("pdftoppm produced no images");
        }
        Ok(pages)
    }

    fn recognise(&self, image: &Path) -> Result<String> {
        let output = Command::new(&self.tesseract)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .with_context(|| format!("Failed to run {}", self.tesseract.display()))?;

        if !output.status.success() {
            bail!(
                "tesseract error on {}: {}",
                image.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TextExtraction for OcrText {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let tmp = tempfile::Builder::new()
            .prefix("docqa-ocr-")
            .tempdir()
            .context("Failed to create OCR temp dir")?;

        let images = self.render_pages(path, tmp.path())?;
        let last = images.last().map(|(n, _)| *n).unwrap_or(0) as usize;

        // Keep page numbers aligned with the PDF even if a render is missing.
        let mut pages = vec![String::new(); last];
        for (n, image) in &images {
            let text = self.recognise(image)?;
            pages[*n as usize - 1] = text;
        }
        Ok(pages)
    }
}

/// `page-07.png` -> 7. pdftoppm zero-pads to the width of the page count.
fn page_number_from_image(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    let digits = stem.rsplit('-').next()?;
    digits.parse::<u32>().ok().filter(|n| *n >= 1)
}

/// Run one strategy, turning a panic inside the PDF parser into an error.
fn run_strategy(strategy: &dyn TextExtraction, path: &Path) -> Result<Vec<String>> {
    match panic::catch_unwind(AssertUnwindSafe(|| strategy.extract_pages(path))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(anyhow::anyhow!("{} extraction panicked: {}", strategy.name(), message))
        }
    }
}

/// Outcome of running the extractor over one PDF.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Strategy that produced the text, or `None` when every strategy came up empty.
    pub method: Option<&'static str>,
    pub paragraphs: Vec<PageParagraph>,
}

/// Strategy chain plus the paragraph filter.
pub struct Extractor {
    strategies: Vec<Box<dyn TextExtraction>>,
    min_paragraph_chars: usize,
}

impl Extractor {
    pub fn new(strategies: Vec<Box<dyn TextExtraction>>, min_paragraph_chars: usize) -> Self {
        Self {
            strategies,
            min_paragraph_chars,
        }
    }

    /// Embedded text, then OCR unless disabled.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        let mut strategies: Vec<Box<dyn TextExtraction>> = vec![Box::new(EmbeddedText)];
        if config.ocr {
            strategies.push(Box::new(OcrText::new(config)));
        }
        Self::new(strategies, config.min_paragraph_chars)
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extract paragraphs from the PDF at `path`.
    ///
    /// Never fails: strategy errors are logged and the next strategy is
    /// tried. An empty paragraph list means nothing usable was found.
    pub fn extract(&self, path: &Path) -> Extraction {
        for strategy in &self.strategies {
            match run_strategy(strategy.as_ref(), path) {
                Ok(pages) if pages.iter().any(|p| !p.trim().is_empty()) => {
                    let paragraphs = paragraphs_from_pages(&pages, self.min_paragraph_chars);
                    tracing::debug!(
                        path = %path.display(),
                        method = strategy.name(),
                        pages = pages.len(),
                        paragraphs = paragraphs.len(),
                        "extracted text"
                    );
                    return Extraction {
                        method: Some(strategy.name()),
                        paragraphs,
                    };
                }
                Ok(_) => {
                    tracing::info!(
                        path = %path.display(),
                        method = strategy.name(),
                        "no text found, trying next strategy"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        method = strategy.name(),
                        error = %e,
                        "extraction failed, trying next strategy"
                    );
                }
            }
        }
        Extraction {
            method: None,
            paragraphs: Vec::new(),
        }
    }
}
