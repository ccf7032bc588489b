//! Generator implementations.
//!
//! Implements [`docqa_core::generation::Generator`] for:
//! - **[`GeminiGenerator`]**: Google Generative Language API `generateContent`.
//! - **[`OllamaGenerator`]**: a local Ollama server's `/api/generate`.
//! - **[`DisabledGenerator`]**: always fails, so answers degrade to the placeholder.
//!
//! A missing API key is reported when generating, not when constructing, so
//! `ask` still returns retrieval results and citations without credentials.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use docqa_core::generation::{DisabledGenerator, Generator};

use crate::config::GenerationConfig;
use crate::error::QaError;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============ Gemini ============

pub struct GeminiGenerator {
    model: String,
    base_url: String,
    api_key_env: String,
    temperature: f32,
    max_output_tokens: u32,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key_env: config.api_key_env.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

/// Concatenated text of the first candidate; empty when the model returned none.
fn gemini_text(resp: GenerateResponse) -> String {
    resp.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", self.api_key_env))?;

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .context("Gemini request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QaError::GenerationFailure(format!("Gemini returned {}: {}", status, body)).into());
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;
        Ok(gemini_text(parsed))
    }
}

// ============ Ollama ============

pub struct OllamaGenerator {
    model: String,
    url: String,
    temperature: f32,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature: config.temperature,
            client,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.url))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(QaError::GenerationFailure(format!("Ollama returned {}: {}", status, text)).into());
        }

        let json: serde_json::Value = response.json().await?;
        Ok(json
            .get("response")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

/// Create the [`Generator`] named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "gemini" => Ok(Box::new(GeminiGenerator::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
