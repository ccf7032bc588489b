//! Generative model abstraction.
//!
//! A [`Generator`] turns a prompt into a completion. Completions may fail
//! or come back empty; callers degrade to a placeholder answer instead of
//! surfacing the error (see [`crate::answer`]).
//!
//! Network-backed generators (Gemini, Ollama) live in the `docqa` app crate.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for text generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;
    /// Complete `prompt`. An empty string is a valid (degenerate) answer.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generator used when generation is disabled; every call fails.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        anyhow::bail!("generation is disabled; set [generation] provider in config")
    }
}
