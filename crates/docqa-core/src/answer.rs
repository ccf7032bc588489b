//! Answer planning and rendering.
//!
//! An [`AnswerPlan`] is everything derived from a retrieval result before
//! the generator is called: the source numbering and the prompt. Once the
//! generator has answered (or failed), [`AnswerPlan::render`] produces the
//! final [`Answer`]. The citation list depends only on retrieval, so it is
//! returned even when generation degrades to the placeholder.

use crate::citation::{build_citations, build_context, render_answer, SourceNumbering};
use crate::models::{Answer, RetrievedChunk};
use crate::prompt::build_prompt;

/// Answer text used when the generator errors or returns nothing.
pub const PLACEHOLDER_ANSWER: &str =
    "Sorry, I couldn't generate an answer right now. The sources below may still help.";

/// Prompt and numbering for one question.
#[derive(Debug, Clone)]
pub struct AnswerPlan {
    pub question: String,
    pub retrieved: Vec<RetrievedChunk>,
    pub numbering: SourceNumbering,
    pub prompt: String,
}

impl AnswerPlan {
    pub fn new(question: &str, retrieved: Vec<RetrievedChunk>, audience: &str) -> Self {
        let numbering = SourceNumbering::assign(retrieved.iter().map(|rc| &rc.chunk));
        let context = build_context(&retrieved, &numbering);
        let prompt = build_prompt(&context, question, audience);
        Self {
            question: question.to_string(),
            retrieved,
            numbering,
            prompt,
        }
    }

    /// Build the final answer from the generator's raw output.
    ///
    /// `None` or a blank completion yields [`PLACEHOLDER_ANSWER`].
    pub fn render(&self, raw: Option<&str>, excerpt_chars: usize) -> Answer {
        let answer_text = match raw.map(str::trim) {
            Some(text) if !text.is_empty() => render_answer(text, &self.numbering),
            _ => PLACEHOLDER_ANSWER.to_string(),
        };
        Answer {
            answer_text,
            citations: build_citations(
                &self.retrieved,
                &self.numbering,
                &self.question,
                excerpt_chars,
            ),
        }
    }
}
