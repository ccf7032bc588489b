//! Citation source mapping.
//!
//! A JSON object maps PDF filenames to the canonical URL citations should
//! link to:
//!
//! ```json
//! {
//!   "Module X.pdf": "https://example.ac.uk/modules/x"
//! }
//! ```
//!
//! The file is re-read on every lookup, so edits take effect for the next
//! ingestion without a restart. A missing or malformed file is an empty
//! mapping. Only absolute `http`/`https` URLs are ever returned; anything
//! else means the document has no citation source.

use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Reads and maintains the filename → URL mapping file.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    path: PathBuf,
}

impl SourceResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Canonical citation URL for `filename`, if one is mapped and valid.
    pub fn resolve(&self, filename: &str) -> Option<String> {
        let raw = self.read_map().remove(filename)?;
        match validate_url(&raw) {
            Some(url) => Some(url),
            None => {
                tracing::warn!(filename, value = %raw, "ignoring non-http(s) source mapping");
                None
            }
        }
    }

    /// All entries, sorted by filename. Values are returned as stored.
    pub fn list(&self) -> BTreeMap<String, String> {
        self.read_map()
    }

    /// Map `filename` to `url`, replacing any existing entry.
    pub fn set(&self, filename: &str, url: &str) -> Result<()> {
        let url = match validate_url(url) {
            Some(url) => url,
            None => bail!("source URL must be an absolute http(s) URL: {}", url),
        };
        let mut map = self.read_map();
        map.insert(filename.to_string(), url);
        self.write_map(&map)
    }

    /// Remove the entry for `filename`. Returns whether one existed.
    pub fn remove(&self, filename: &str) -> Result<bool> {
        let mut map = self.read_map();
        let existed = map.remove(filename).is_some();
        if existed {
            self.write_map(&map)?;
        }
        Ok(existed)
    }

    fn read_map(&self) -> BTreeMap<String, String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return BTreeMap::new(),
        };
        let value: serde_json::Value = match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "malformed source mapping, treating as empty");
                return BTreeMap::new();
            }
        };
        // Non-string values are skipped rather than failing the whole file.
        value
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, json + "\n")
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

/// Trimmed URL if it parses as an absolute http or https URL with a host.
pub fn validate_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let parsed = reqwest::Url::parse(trimmed).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some_and(|h| !h.is_empty()) => {
            Some(trimmed.to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn resolver_with(content: &str) -> (TempDir, SourceResolver) {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("links.json");
        std::fs::write(&path, content).unwrap();
        (tmp, SourceResolver::new(path))
    }

    #[test]
    fn test_resolve_valid_and_invalid_entries() {
        let (_tmp, r) = resolver_with(
            r#"{
                "Module X.pdf": " https://x.example/module ",
                "Local.pdf": "/static/pdfs/Local.pdf",
                "Ftp.pdf": "ftp://files.example/a.pdf",
                "Number.pdf": 42
            }"#,
        );
        assert_eq!(
            r.resolve("Module X.pdf").as_deref(),
            Some("https://x.example/module")
        );
        assert_eq!(r.resolve("Local.pdf"), None);
        assert_eq!(r.resolve("Ftp.pdf"), None);
        assert_eq!(r.resolve("Number.pdf"), None);
        assert_eq!(r.resolve("Unmapped.pdf"), None);
    }

    #[test]
    fn test_missing_or_malformed_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let r = SourceResolver::new(tmp.path().join("none.json"));
        assert!(r.list().is_empty());
        assert_eq!(r.resolve("a.pdf"), None);

        let (_tmp2, bad) = resolver_with("{ not json");
        assert!(bad.list().is_empty());
    }

    #[test]
    fn test_reads_fresh_on_every_call() {
        let (_tmp, r) = resolver_with(r#"{"a.pdf": "https://old.example"}"#);
        assert_eq!(r.resolve("a.pdf").as_deref(), Some("https://old.example"));
        std::fs::write(r.path(), r#"{"a.pdf": "https://new.example"}"#).unwrap();
        assert_eq!(r.resolve("a.pdf").as_deref(), Some("https://new.example"));
    }

    #[test]
    fn test_set_and_remove_rewrite_file() {
        let tmp = TempDir::new().unwrap();
        let r = SourceResolver::new(tmp.path().join("sub").join("links.json"));
        r.set("b.pdf", "https://b.example").unwrap();
        r.set("a.pdf", "http://a.example").unwrap();
        r.set("b.pdf", "https://b2.example").unwrap();

        let list = r.list();
        assert_eq!(list.keys().collect::<Vec<_>>(), vec!["a.pdf", "b.pdf"]);
        assert_eq!(list["b.pdf"], "https://b2.example");

        let text = std::fs::read_to_string(r.path()).unwrap();
        assert!(text.contains("\n  \"a.pdf\""));

        assert!(r.remove("a.pdf").unwrap());
        assert!(!r.remove("a.pdf").unwrap());
        assert_eq!(r.list().len(), 1);
    }

    #[test]
    fn test_set_rejects_non_http_url() {
        let tmp = TempDir::new().unwrap();
        let r = SourceResolver::new(tmp.path().join("links.json"));
        assert!(r.set("a.pdf", "N/A").is_err());
        assert!(r.set("a.pdf", "file:///etc/passwd").is_err());
        assert!(r.list().is_empty());
    }
}
