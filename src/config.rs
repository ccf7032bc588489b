//! Configuration file parsing and validation.
//!
//! docqa reads a single TOML file (default `./config/docqa.toml`). Every
//! section has defaults, so an empty file is a valid configuration that
//! keeps its data under `./data` and uses the offline hashing embedder.
//!
//! ```toml
//! [paths]
//! documents_dir = "./data/pdfs"
//! db = "./data/index.sqlite"
//! sources = "./data/links.json"
//!
//! [extraction]
//! min_paragraph_chars = 50
//! ocr = true
//!
//! [embedding]
//! provider = "local"          # hash | local | openai | ollama | disabled
//!
//! [retrieval]
//! k = 4
//!
//! [generation]
//! provider = "gemini"         # gemini | ollama | disabled
//! model = "gemini-2.5-flash-lite"
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where the document collection, index and source mapping live.
#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_documents_dir")]
    pub documents_dir: PathBuf,
    #[serde(default = "default_db_path")]
    pub db: PathBuf,
    #[serde(default = "default_sources_path")]
    pub sources: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents_dir: default_documents_dir(),
            db: default_db_path(),
            sources: default_sources_path(),
        }
    }
}

fn default_documents_dir() -> PathBuf {
    PathBuf::from("./data/pdfs")
}
fn default_db_path() -> PathBuf {
    PathBuf::from("./data/index.sqlite")
}
fn default_sources_path() -> PathBuf {
    PathBuf::from("./data/links.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_min_paragraph_chars")]
    pub min_paragraph_chars: usize,
    /// Fall back to OCR when a PDF has no embedded text.
    #[serde(default = "default_true")]
    pub ocr: bool,
    #[serde(default = "default_ocr_dpi")]
    pub ocr_dpi: u32,
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,
    #[serde(default = "default_pdftoppm")]
    pub pdftoppm_path: PathBuf,
    #[serde(default = "default_tesseract")]
    pub tesseract_path: PathBuf,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            min_paragraph_chars: default_min_paragraph_chars(),
            ocr: true,
            ocr_dpi: default_ocr_dpi(),
            ocr_language: default_ocr_language(),
            pdftoppm_path: default_pdftoppm(),
            tesseract_path: default_tesseract(),
        }
    }
}

fn default_min_paragraph_chars() -> usize {
    docqa_core::paragraph::MIN_PARAGRAPH_CHARS
}
fn default_true() -> bool {
    true
}
fn default_ocr_dpi() -> u32 {
    300
}
fn default_ocr_language() -> String {
    "eng".to_string()
}
fn default_pdftoppm() -> PathBuf {
    PathBuf::from("pdftoppm")
}
fn default_tesseract() -> PathBuf {
    PathBuf::from("tesseract")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hash".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

fn default_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    /// Environment variable holding the Gemini API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Base URL override (Ollama server, or a Gemini-compatible endpoint).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            api_key_env: default_api_key_env(),
            url: None,
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "disabled".to_string()
}
fn default_generation_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}
fn default_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_output_tokens() -> u32 {
    2048
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    #[serde(default = "default_audience")]
    pub audience: String,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            audience: default_audience(),
            excerpt_chars: default_excerpt_chars(),
        }
    }
}

fn default_audience() -> String {
    docqa_core::prompt::DEFAULT_AUDIENCE.to_string()
}
fn default_excerpt_chars() -> usize {
    docqa_core::citation::EXCERPT_MAX_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// Parse and validate a configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Read, parse and validate the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

fn validate(config: &Config) -> Result<()> {
    if config.retrieval.k == 0 {
        anyhow::bail!("retrieval.k must be >= 1");
    }

    if config.answer.excerpt_chars == 0 {
        anyhow::bail!("answer.excerpt_chars must be > 0");
    }

    if config.extraction.ocr_dpi == 0 {
        anyhow::bail!("extraction.ocr_dpi must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hash" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                anyhow::bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                anyhow::bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hash, local, openai, ollama, or disabled.",
            other
        ),
    }

    if config.embedding.dims == Some(0) {
        anyhow::bail!("embedding.dims must be > 0");
    }

    match config.generation.provider.as_str() {
        "disabled" | "gemini" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be gemini, ollama, or disabled.",
            other
        ),
    }

    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }

    Ok(())
}
