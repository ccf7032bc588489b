//! Generation prompt assembly.
//!
//! The prompt fixes the assistant's audience, restricts answers to the
//! supplied context, asks for a synthesized answer rather than quoted
//! excerpts, and states the citation rules the post-processing in
//! [`crate::citation`] relies on: bracketed numbers that appear in the
//! context, one number per bracket.

/// Audience line used when none is configured.
pub const DEFAULT_AUDIENCE: &str = "postgraduate students in the Department of Chemistry";

/// Build the full generation prompt.
pub fn build_prompt(context: &str, question: &str, audience: &str) -> String {
    let audience = if audience.trim().is_empty() {
        DEFAULT_AUDIENCE
    } else {
        audience.trim()
    };
    format!(
        "You are a helpful assistant for {audience}.\n\
         Answer the question using ONLY the context below. If the context does not \
         contain the answer, say that you could not find it in the documents.\n\
         Combine and paraphrase the relevant points into one coherent answer. \
         Do not just repeat raw excerpts or quote blocks verbatim.\n\
         \n\
         Citation rules:\n\
         - Each context block starts with its citation tag, e.g. [1].\n\
         - After every sentence that uses a numbered block, cite it with exactly that number.\n\
         - Use only numbers that appear in the context. Never invent a number.\n\
         - Put one number per bracket: write [1][2], never [1, 2].\n\
         - Blocks tagged [N/A] have no source; you may use them, but never cite them.\n\
         - Never write URLs or a reference list; sources are listed separately.\n\
         \n\
         Format the answer in Markdown. Be concise and precise.\n\
         \n\
         Context:\n\
         {context}\n\
         \n\
         Question: {question}\n\
         Answer:"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_context_and_question() {
        let p = build_prompt("[1] (module=A, page=1)\nText.", "What is A?", "");
        assert!(p.contains("[1] (module=A, page=1)\nText."));
        assert!(p.contains("Question: What is A?"));
        assert!(p.contains(DEFAULT_AUDIENCE));
        assert!(p.ends_with("Answer:"));
    }

    #[test]
    fn test_prompt_asks_for_synthesis_not_quotes() {
        let p = build_prompt("ctx", "q", "").to_lowercase();
        assert!(p.contains("combine and paraphrase"));
        assert!(p.contains("do not just repeat raw excerpts"));
    }

    #[test]
    fn test_prompt_citation_rules() {
        let p = build_prompt("ctx", "q", "");
        assert!(p.contains("write [1][2], never [1, 2]"));
        assert!(p.contains("Never invent a number"));
        // Unsourced blocks are never cited, so the answer holds only integer tags.
        assert!(!p.contains("Use [N/A]"));
        assert!(p.contains("never cite them"));
    }

    #[test]
    fn test_prompt_custom_audience() {
        let p = build_prompt("", "q", "  new staff ");
        assert!(p.starts_with("You are a helpful assistant for new staff."));
    }
}
