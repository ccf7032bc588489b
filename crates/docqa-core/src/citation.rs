//! Citation assignment and answer rendering.
//!
//! Turns a retrieval result into numbered sources, the model-facing context,
//! and, after generation, a rendered answer plus citation list.
//!
//! # Numbering
//!
//! Retrieved chunks are visited in retrieval order. Every chunk whose
//! `source_url` is an http(s) URL contributes that URL; the first time a URL
//! is seen it gets the next number starting at 1. A URL therefore has
//! exactly one number per answer, decided by first occurrence alone.
//!
//! # Post-processing
//!
//! 1. [`normalize_citation_groups`]: `[1, 2]`, `[1 2]`, `[1;2]`, `[1, 2, 3]`
//!    become adjacent tags (`[1][2]`, `[1][2][3]`).
//! 2. [`linkify_citations`]: `[n]` with `1 ≤ n ≤ sources` becomes the
//!    Markdown link `[[n]](url)`. Other numbers are left as written.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::citation::{linkify_citations, normalize_citation_groups};
//!
//! let raw = "Submit online [1, 2]. See also [7].";
//! let text = normalize_citation_groups(raw);
//! assert_eq!(text, "Submit online [1][2]. See also [7].");
//!
//! let sources = vec!["https://a.example".to_string(), "https://b.example".to_string()];
//! let linked = linkify_citations(&text, &sources);
//! assert_eq!(
//!     linked,
//!     "Submit online [[1]](https://a.example)[[2]](https://b.example). See also [7]."
//! );
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::models::{Chunk, Citation, RetrievedChunk};

/// Default excerpt length limit, in characters.
pub const EXCERPT_MAX_CHARS: usize = 420;
/// Appended to a truncated excerpt.
pub const ELLIPSIS: &str = "…";
/// Excerpt used when the source chunk has no text.
pub const NO_EXCERPT: &str = "(no excerpt)";
/// Tag given to context blocks whose chunk has no citable source.
pub const NO_SOURCE_TAG: &str = "[N/A]";

static CITATION_GROUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s*\d+(?:\s*[,; ]\s*\d+)+\s*\]").expect("citation group pattern")
});
static CITATION_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("citation tag pattern"));
static GROUP_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("group number pattern"));
static QUERY_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]{3,}").expect("query token pattern"));

/// Returns the trimmed URL if it is an absolute http or https URL.
pub fn citable_url(url: Option<&str>) -> Option<&str> {
    let url = url?.trim();
    let lower = url.to_ascii_lowercase();
    let rest = lower
        .strip_prefix("http://")
        .or_else(|| lower.strip_prefix("https://"))?;
    if rest.is_empty() || rest.starts_with('/') {
        return None;
    }
    Some(url)
}

/// Per-query mapping from source URL to citation number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceNumbering {
    sources: Vec<String>,
    numbers: HashMap<String, usize>,
}

impl SourceNumbering {
    /// Number the sources of `chunks` by first occurrence.
    pub fn assign<'a, I>(chunks: I) -> Self
    where
        I: IntoIterator<Item = &'a Chunk>,
    {
        let mut numbering = Self::default();
        for chunk in chunks {
            if let Some(url) = citable_url(chunk.source_url.as_deref()) {
                if !numbering.numbers.contains_key(url) {
                    numbering.sources.push(url.to_string());
                    numbering
                        .numbers
                        .insert(url.to_string(), numbering.sources.len());
                }
            }
        }
        numbering
    }

    /// Sources in number order; `sources()[0]` is citation 1.
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Citation number of `url`, if it was assigned one.
    pub fn number_of(&self, url: &str) -> Option<usize> {
        self.numbers.get(url.trim()).copied()
    }

    /// The tags a chunk may be cited with: `[n]`, or `[N/A]` when it has no source.
    pub fn allowed_tags(&self, chunk: &Chunk) -> String {
        citable_url(chunk.source_url.as_deref())
            .and_then(|url| self.number_of(url))
            .map(|n| format!("[{}]", n))
            .unwrap_or_else(|| NO_SOURCE_TAG.to_string())
    }
}

/// Build the model-facing context block.
///
/// Each chunk becomes `"<tags> (module=<module>, page=<page>)\n<text>"`;
/// blocks are separated by a blank line.
pub fn build_context(chunks: &[RetrievedChunk], numbering: &SourceNumbering) -> String {
    chunks
        .iter()
        .map(|rc| {
            format!(
                "{} (module={}, page={})\n{}",
                numbering.allowed_tags(&rc.chunk),
                rc.chunk.module_name,
                rc.chunk.page_number,
                rc.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Split grouped citations such as `[1, 2]`, `[1 2]` or `[3;4]` into adjacent tags.
///
/// Applied until the text stops changing, so the result is a fixed point.
pub fn normalize_citation_groups(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = CITATION_GROUP
            .replace_all(&current, |caps: &Captures| {
                GROUP_NUMBER
                    .find_iter(&caps[0])
                    .map(|m| format!("[{}]", m.as_str()))
                    .collect::<String>()
            })
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Link every in-range `[n]` to `sources[n - 1]`.
///
/// Numbers outside `1..=sources.len()` (including ones too large to parse)
/// are left verbatim.
pub fn linkify_citations(text: &str, sources: &[String]) -> String {
    CITATION_TAG
        .replace_all(text, |caps: &Captures| {
            match caps[1].parse::<usize>() {
                Ok(n) if n >= 1 && n <= sources.len() => {
                    format!("[[{}]]({})", n, sources[n - 1])
                }
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Normalize then link citation markers in a raw model answer.
pub fn render_answer(raw: &str, numbering: &SourceNumbering) -> String {
    linkify_citations(&normalize_citation_groups(raw), numbering.sources())
}

/// Bold every alphabetic query token of three or more letters.
///
/// Matching is case-insensitive and whole-word; longer tokens are applied
/// first so a shorter token never splits an already bolded word.
pub fn bold_keywords(text: &str, query: &str) -> String {
    let tokens: BTreeSet<String> = QUERY_TOKEN
        .find_iter(query)
        .map(|m| m.as_str().to_ascii_lowercase())
        .collect();
    let mut tokens: Vec<String> = tokens.into_iter().collect();
    tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let mut out = text.to_string();
    for token in tokens {
        let pattern = format!(r"(?i)\b({})\b", regex::escape(&token));
        if let Ok(re) = Regex::new(&pattern) {
            out = re.replace_all(&out, "**${1}**").into_owned();
        }
    }
    out
}

/// Truncate to at most `max_chars` characters, appending [`ELLIPSIS`] when cut.
///
/// A bold span cut in half is closed before the ellipsis.
pub fn truncate_excerpt(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    let mut cut = cut.trim_end_matches('*').trim_end().to_string();
    // A cut inside a bold span leaves an odd number of markers.
    if cut.matches("**").count() % 2 == 1 {
        cut.push_str("**");
    }
    format!("{}{}", cut, ELLIPSIS)
}

/// Single-line excerpt of a chunk with query terms bolded.
pub fn make_excerpt(raw: &str, query: &str, max_chars: usize) -> String {
    let flat = raw.trim().replace(['\r', '\n'], " ");
    if flat.is_empty() {
        return NO_EXCERPT.to_string();
    }
    truncate_excerpt(&bold_keywords(&flat, query), max_chars)
}

/// Build the citation list: one entry per numbered source, in number order,
/// with provenance from the first retrieved chunk carrying that URL.
pub fn build_citations(
    chunks: &[RetrievedChunk],
    numbering: &SourceNumbering,
    query: &str,
    max_chars: usize,
) -> Vec<Citation> {
    numbering
        .sources()
        .iter()
        .enumerate()
        .filter_map(|(i, url)| {
            let first = chunks
                .iter()
                .find(|rc| citable_url(rc.chunk.source_url.as_deref()) == Some(url.as_str()))?;
            Some(Citation {
                n: i + 1,
                url: url.clone(),
                module: first.chunk.module_name.clone(),
                page: first.chunk.page_number,
                excerpt: make_excerpt(&first.chunk.text, query, max_chars),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retrieved(module: &str, page: u32, url: Option<&str>, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk: Chunk {
                id: format!("{}-{}", module, page),
                document_id: format!("{}.pdf", module),
                module_name: module.to_string(),
                source_url: url.map(str::to_string),
                page_number: page,
                chunk_index: 0,
                text: text.to_string(),
                hash: String::new(),
            },
            score: 1.0,
        }
    }

    #[test]
    fn test_numbering_by_first_occurrence() {
        let chunks = vec![
            retrieved("A", 1, Some("https://u1.example"), "a"),
            retrieved("B", 1, Some("https://u2.example"), "b"),
            retrieved("C", 1, Some("https://u1.example"), "c"),
        ];
        let numbering = SourceNumbering::assign(chunks.iter().map(|rc| &rc.chunk));
        assert_eq!(numbering.sources(), &["https://u1.example", "https://u2.example"]);
        assert_eq!(numbering.number_of("https://u1.example"), Some(1));
        assert_eq!(numbering.number_of("https://u2.example"), Some(2));
    }

    #[test]
    fn test_numbering_skips_missing_and_invalid_urls() {
        let chunks = vec![
            retrieved("A", 1, None, "a"),
            retrieved("B", 1, Some("/static/pdfs/B.pdf"), "b"),
            retrieved("C", 1, Some("ftp://c.example"), "c"),
            retrieved("D", 1, Some("  HTTPS://d.example/page  "), "d"),
        ];
        let numbering = SourceNumbering::assign(chunks.iter().map(|rc| &rc.chunk));
        assert_eq!(numbering.sources(), &["HTTPS://d.example/page"]);
        assert_eq!(numbering.allowed_tags(&chunks[0].chunk), "[N/A]");
        assert_eq!(numbering.allowed_tags(&chunks[1].chunk), "[N/A]");
        assert_eq!(numbering.allowed_tags(&chunks[3].chunk), "[1]");
    }

    #[test]
    fn test_citable_url() {
        assert_eq!(citable_url(Some("https://x.org")), Some("https://x.org"));
        assert_eq!(citable_url(Some("http://x.org/a")), Some("http://x.org/a"));
        assert_eq!(citable_url(Some("https://")), None);
        assert_eq!(citable_url(Some("N/A")), None);
        assert_eq!(citable_url(Some("")), None);
        assert_eq!(citable_url(None), None);
    }

    #[test]
    fn test_context_tags_and_metadata() {
        let chunks = vec![
            retrieved("Ethics", 3, Some("https://e.example"), "Ethics approval is required."),
            retrieved("Welcome", 1, None, "Welcome to the department."),
        ];
        let numbering = SourceNumbering::assign(chunks.iter().map(|rc| &rc.chunk));
        let ctx = build_context(&chunks, &numbering);
        assert_eq!(
            ctx,
            "[1] (module=Ethics, page=3)\nEthics approval is required.\n\n\
             [N/A] (module=Welcome, page=1)\nWelcome to the department."
        );
    }

    #[test]
    fn test_normalize_grouped_citations() {
        assert_eq!(
            normalize_citation_groups("See [1, 2] and [3;4]"),
            "See [1][2] and [3][4]"
        );
        assert_eq!(normalize_citation_groups("[1 2]"), "[1][2]");
        assert_eq!(normalize_citation_groups("[1, 2, 3; 4]"), "[1][2][3][4]");
        assert_eq!(normalize_citation_groups("[1][2] stays"), "[1][2] stays");
        assert_eq!(normalize_citation_groups("[N/A] and [a, b]"), "[N/A] and [a, b]");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_citation_groups("x [5 ,6] y [7; 8 ;9]");
        assert_eq!(once, "x [5][6] y [7][8][9]");
        assert_eq!(normalize_citation_groups(&once), once);
    }

    #[test]
    fn test_out_of_range_citation_left_verbatim() {
        let sources = vec!["https://a.example".to_string(), "https://b.example".to_string()];
        let out = linkify_citations("Claim [5]. Other [0]. Real [2].", &sources);
        assert_eq!(out, "Claim [5]. Other [0]. Real [[2]](https://b.example).");
    }

    #[test]
    fn test_huge_citation_number_does_not_panic() {
        let sources = vec!["https://a.example".to_string()];
        let text = "Odd [99999999999999999999999].";
        assert_eq!(linkify_citations(text, &sources), text);
    }

    #[test]
    fn test_render_answer_normalizes_then_links() {
        let chunks = vec![
            retrieved("A", 1, Some("https://a.example"), "a"),
            retrieved("B", 1, Some("https://b.example"), "b"),
        ];
        let numbering = SourceNumbering::assign(chunks.iter().map(|rc| &rc.chunk));
        let out = render_answer("Both apply [1, 2].", &numbering);
        assert_eq!(
            out,
            "Both apply [[1]](https://a.example)[[2]](https://b.example)."
        );
    }

    #[test]
    fn test_bold_keywords_whole_word_case_insensitive() {
        let out = bold_keywords("Assessment is assessed. ASSESSED again.", "how is it assessed?");
        assert_eq!(out, "Assessment is **assessed**. **ASSESSED** again.");
    }

    #[test]
    fn test_bold_keywords_longest_first() {
        let out = bold_keywords("The thesis and the theses.", "the thesis");
        assert_eq!(out, "**The** **thesis** and **the** theses.");
    }

    #[test]
    fn test_excerpt_truncation() {
        let long = "a".repeat(500);
        let out = truncate_excerpt(&long, EXCERPT_MAX_CHARS);
        assert_eq!(out.chars().count(), EXCERPT_MAX_CHARS + 1);
        assert!(out.ends_with(ELLIPSIS));

        let short = "b".repeat(100);
        assert_eq!(truncate_excerpt(&short, EXCERPT_MAX_CHARS), short);
    }

    #[test]
    fn test_truncation_inside_bold_span_closes_it() {
        let text = format!("{} **assessed** by coursework", "x".repeat(10));
        // Cut lands between "ass" and "essed".
        let out = truncate_excerpt(&text, 16);
        assert_eq!(out, format!("{} **ass**{}", "x".repeat(10), ELLIPSIS));

        // Cut lands between the two closing markers.
        let out = truncate_excerpt(&text, 22);
        assert_eq!(out, format!("{} **assessed**{}", "x".repeat(10), ELLIPSIS));

        // Cut lands right after an opening marker.
        let out = truncate_excerpt(&text, 13);
        assert_eq!(out, format!("{}{}", "x".repeat(10), ELLIPSIS));
    }

    #[test]
    fn test_make_excerpt_flattens_and_placeholder() {
        assert_eq!(make_excerpt("  line one\nline two ", "", 420), "line one line two");
        assert_eq!(make_excerpt("   ", "query", 420), NO_EXCERPT);
    }

    #[test]
    fn test_build_citations_uses_first_chunk_per_url() {
        let chunks = vec![
            retrieved("Guide", 2, Some("https://g.example"), "First mention of deadlines."),
            retrieved("Other", 1, None, "No source here."),
            retrieved("Guide", 5, Some("https://g.example"), "Later mention."),
        ];
        let numbering = SourceNumbering::assign(chunks.iter().map(|rc| &rc.chunk));
        let cites = build_citations(&chunks, &numbering, "deadlines", 420);
        assert_eq!(cites.len(), 1);
        assert_eq!(cites[0].n, 1);
        assert_eq!(cites[0].module, "Guide");
        assert_eq!(cites[0].page, 2);
        assert_eq!(cites[0].excerpt, "First mention of **deadlines**.");
    }
}
