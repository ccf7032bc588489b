//! The query path: question → retrieval → prompt → generation → rendered answer.
//!
//! Only an unavailable index is an error here. A failing embedder or
//! generator degrades to the placeholder answer; whatever citations
//! retrieval produced are still returned.

use anyhow::Result;

use docqa_core::answer::{AnswerPlan, PLACEHOLDER_ANSWER};
use docqa_core::embedding::EmbeddingProvider;
use docqa_core::generation::Generator;
use docqa_core::index::retrieve;
use docqa_core::models::Answer;

use crate::config::Config;
use crate::state::{AppContext, IndexHandle};

#[derive(Debug, Clone)]
pub struct AskOptions {
    pub k: usize,
    pub audience: String,
    pub excerpt_chars: usize,
}

impl AskOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            k: config.retrieval.k,
            audience: config.answer.audience.clone(),
            excerpt_chars: config.answer.excerpt_chars,
        }
    }

    pub fn with_k(mut self, k: Option<usize>) -> Self {
        if let Some(k) = k {
            self.k = k;
        }
        self
    }
}

/// Answer `question` against the current snapshot in `index`.
pub async fn ask(
    index: &IndexHandle,
    embedder: &dyn EmbeddingProvider,
    generator: &dyn Generator,
    question: &str,
    opts: &AskOptions,
) -> Result<Answer> {
    let snapshot = index.snapshot()?;

    let retrieved = match retrieve(&snapshot, embedder, question, opts.k).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "retrieval failed, returning placeholder");
            return Ok(Answer {
                answer_text: PLACEHOLDER_ANSWER.to_string(),
                citations: Vec::new(),
            });
        }
    };
    tracing::debug!(retrieved = retrieved.len(), k = opts.k, "retrieved chunks");

    let plan = AnswerPlan::new(question, retrieved, &opts.audience);
    let raw = match generator.generate(&plan.prompt).await {
        Ok(text) if !text.trim().is_empty() => Some(text),
        Ok(_) => {
            tracing::warn!(model = generator.model_name(), "generator returned an empty answer");
            None
        }
        Err(e) => {
            tracing::warn!(model = generator.model_name(), error = %e, "generation failed");
            None
        }
    };

    Ok(plan.render(raw.as_deref(), opts.excerpt_chars))
}

impl AppContext {
    /// [`ask`] with this context's components and configured options.
    pub async fn ask(&self, question: &str, k: Option<usize>) -> Result<Answer> {
        let opts = AskOptions::from_config(&self.config).with_k(k);
        ask(
            &self.index,
            self.embedder.as_ref(),
            self.generator.as_ref(),
            question,
            &opts,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{find_qa_error, QaError};
    use async_trait::async_trait;
    use docqa_core::embedding::HashingEmbedder;
    use docqa_core::generation::DisabledGenerator;
    use docqa_core::index::IndexSnapshot;
    use docqa_core::models::{Chunk, IndexedChunk};
    use std::sync::Mutex;

    struct Canned {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for Canned {
        fn model_name(&self) -> &str {
            "canned"
        }
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn canned(reply: &str) -> Canned {
        Canned {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn handle(embedder: &HashingEmbedder, docs: &[(&str, Option<&str>, &str)]) -> IndexHandle {
        let chunks = docs
            .iter()
            .map(|(doc, url, text)| IndexedChunk {
                chunk: Chunk {
                    id: doc.to_string(),
                    document_id: doc.to_string(),
                    module_name: doc.trim_end_matches(".pdf").to_string(),
                    source_url: url.map(str::to_string),
                    page_number: 1,
                    chunk_index: 0,
                    text: text.to_string(),
                    hash: String::new(),
                },
                vector: embedder.embed_one(text),
            })
            .collect();
        IndexHandle::with_snapshot(IndexSnapshot::new(None, chunks))
    }

    fn opts(k: usize) -> AskOptions {
        AskOptions {
            k,
            audience: String::new(),
            excerpt_chars: 420,
        }
    }

    #[tokio::test]
    async fn test_unloaded_index_is_hard_error() {
        let e = HashingEmbedder::new(16);
        let err = ask(&IndexHandle::unloaded(), &e, &canned("x"), "q", &opts(4))
            .await
            .unwrap_err();
        assert!(matches!(find_qa_error(&err), Some(QaError::IndexUnavailable(_))));
    }

    #[tokio::test]
    async fn test_generation_failure_keeps_citations() {
        let e = HashingEmbedder::new(64);
        let h = handle(&e, &[("Fees.pdf", Some("https://fees.example"), "Tuition fees are paid each term.")]);
        let answer = ask(&h, &e, &DisabledGenerator, "tuition fees", &opts(4))
            .await
            .unwrap();
        assert_eq!(answer.answer_text, PLACEHOLDER_ANSWER);
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].url, "https://fees.example");
    }

    #[tokio::test]
    async fn test_shared_source_numbered_once() {
        let e = HashingEmbedder::new(64);
        let h = handle(
            &e,
            &[
                ("A.pdf", Some("https://u1.example"), "thesis format thesis format"),
                ("B.pdf", Some("https://u2.example"), "thesis format guidance"),
                ("C.pdf", Some("https://u1.example"), "thesis format appendix and extra words"),
            ],
        );
        let gen = canned("Follow the rules [1, 2].");
        let answer = ask(&h, &e, &gen, "thesis format", &opts(3)).await.unwrap();
        assert_eq!(answer.citations.len(), 2);
        assert_eq!(answer.citations[0].n, 1);
        assert_eq!(answer.citations[1].n, 2);
        assert!(answer.answer_text.contains("[[1]](https://u1.example)[[2]](https://u2.example)"));

        let prompt = gen.prompts.lock().unwrap()[0].clone();
        assert_eq!(prompt.matches("[1] (module=").count(), 2);
        assert_eq!(prompt.matches("[2] (module=").count(), 1);
    }

    #[tokio::test]
    async fn test_empty_index_answers_without_citations() {
        let e = HashingEmbedder::new(16);
        let h = IndexHandle::with_snapshot(IndexSnapshot::default());
        let answer = ask(&h, &e, &canned("Nothing found."), "anything", &opts(4))
            .await
            .unwrap();
        assert_eq!(answer.answer_text, "Nothing found.");
        assert!(answer.citations.is_empty());
    }
}
