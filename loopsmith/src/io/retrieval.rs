//! Local reference retrieval over text files.
//!
//! Scoring is plain keyword overlap: documents are ranked by how often the
//! query's terms occur in them. Good enough to put the right README or notes
//! file in front of the model.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "rs", "toml", "py", "json"];
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];
const MAX_FILE_BYTES: u64 = 512 * 1024;
const SNIPPET_RADIUS: usize = 50;
const FRAGMENT_CHARS: usize = 4_000;

static TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z0-9_]{2,}").expect("term regex is valid"));

/// Given a query, return an ordered list of text fragments.
pub trait Retriever {
    fn retrieve(&self, query: &str) -> Vec<String>;
}

/// Retriever that never returns anything.
pub struct NoRetrieval;

impl Retriever for NoRetrieval {
    fn retrieve(&self, _query: &str) -> Vec<String> {
        Vec::new()
    }
}

/// A loaded reference document.
#[derive(Debug, Clone)]
struct Document {
    path: PathBuf,
    name: String,
    text: String,
}

/// Keyword retriever over the text files below a directory.
#[derive(Debug, Clone)]
pub struct KeywordRetriever {
    dir: PathBuf,
    top_k: usize,
}

impl KeywordRetriever {
    pub fn new(dir: impl Into<PathBuf>, top_k: usize) -> Self {
        Self {
            dir: dir.into(),
            top_k,
        }
    }

    /// Up to `top_k` `path:snippet` strings around the first case-insensitive
    /// match of `query` in each file.
    pub fn search_snippets(&self, query: &str, top_k: usize) -> Vec<String> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() || top_k == 0 {
            return Vec::new();
        }
        let mut results = Vec::new();
        for doc in self.documents() {
            if let Some(snippet) = snippet_around(&doc.text, &needle) {
                results.push(format!("{}:{}", doc.path.display(), snippet));
            }
            if results.len() >= top_k {
                break;
            }
        }
        debug!(query, found = results.len(), "snippet search finished");
        results
    }

    fn documents(&self) -> Vec<Document> {
        let mut docs = Vec::new();
        let walker = WalkDir::new(&self.dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped(entry));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(err = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_text_extension(entry.path()) {
                continue;
            }
            if entry.metadata().map(|m| m.len()).unwrap_or(u64::MAX) > MAX_FILE_BYTES {
                continue;
            }
            let Ok(text) = fs::read_to_string(entry.path()) else {
                continue;
            };
            let path = entry
                .path()
                .strip_prefix(&self.dir)
                .unwrap_or(entry.path())
                .to_path_buf();
            docs.push(Document {
                name: path.display().to_string(),
                path,
                text,
            });
        }
        docs
    }
}

impl Retriever for KeywordRetriever {
    fn retrieve(&self, query: &str) -> Vec<String> {
        let terms = terms_of(query);
        if terms.is_empty() || self.top_k == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(usize, Document)> = self
            .documents()
            .into_iter()
            .map(|doc| (score(&doc.text, &terms), doc))
            .filter(|(score, _)| *score > 0)
            .collect();
        // Stable sort keeps file-name order among equal scores.
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, doc)| render_fragment(&doc))
            .collect()
    }
}

fn is_skipped(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || (entry.file_type().is_dir() && SKIPPED_DIRS.contains(&name.as_ref()))
}

fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext))
}

fn terms_of(text: &str) -> HashSet<String> {
    TERM_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn score(text: &str, terms: &HashSet<String>) -> usize {
    TERM_RE
        .find_iter(text)
        .filter(|m| terms.contains(&m.as_str().to_lowercase()))
        .count()
}

fn render_fragment(doc: &Document) -> String {
    let body: String = doc.text.chars().take(FRAGMENT_CHARS).collect();
    format!(
        "== Document: {name} ==\n{body}\n== End document: {name} ==",
        name = doc.name
    )
}

/// Up to [`SNIPPET_RADIUS`] chars either side of the first case-insensitive
/// match of the lowercase `needle`, sliced from the original text.
fn snippet_around(text: &str, needle: &str) -> Option<String> {
    let needle: Vec<char> = needle.chars().collect();
    if needle.is_empty() {
        return None;
    }
    // Lowercased chars tagged with the byte offset of the char they came from.
    let lowered: Vec<(usize, char)> = text
        .char_indices()
        .flat_map(|(offset, c)| c.to_lowercase().map(move |l| (offset, l)))
        .collect();
    let hit = lowered
        .windows(needle.len())
        .position(|window| window.iter().map(|(_, c)| *c).eq(needle.iter().copied()))?;

    let match_start = lowered[hit].0;
    let last = lowered[hit + needle.len() - 1].0;
    let match_end = last + text[last..].chars().next().map_or(0, char::len_utf8);

    let start = text[..match_start]
        .char_indices()
        .rev()
        .nth(SNIPPET_RADIUS - 1)
        .map_or(0, |(offset, _)| offset);
    let end = text[match_end..]
        .char_indices()
        .nth(SNIPPET_RADIUS)
        .map_or(text.len(), |(offset, _)| match_end + offset);
    Some(text[start..end].replace('\n', " ").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> tempfile::TempDir {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        fs::write(root.join("deploy.md"), "Deploy steps: build, deploy, verify deploy.")
            .expect("write");
        fs::write(root.join("notes.txt"), "Meeting notes about the deploy window.")
            .expect("write");
        fs::write(root.join("unrelated.txt"), "Nothing to see here.").expect("write");
        fs::write(root.join("image.png"), "deploy deploy deploy").expect("write");
        fs::create_dir_all(root.join(".hidden")).expect("mkdir");
        fs::write(root.join(".hidden/deploy.md"), "deploy deploy deploy deploy").expect("write");
        temp
    }

    #[test]
    fn retrieve_ranks_by_term_frequency() {
        let temp = corpus();
        let retriever = KeywordRetriever::new(temp.path(), 3);
        let fragments = retriever.retrieve("how do I deploy?");

        assert_eq!(fragments.len(), 2);
        assert!(fragments[0].starts_with("== Document: deploy.md =="));
        assert!(fragments[1].starts_with("== Document: notes.txt =="));
        assert!(fragments[0].ends_with("== End document: deploy.md =="));
    }

    #[test]
    fn retrieve_respects_top_k() {
        let temp = corpus();
        let retriever = KeywordRetriever::new(temp.path(), 1);
        assert_eq!(retriever.retrieve("deploy").len(), 1);
    }

    #[test]
    fn search_snippets_reports_path_and_context() {
        let temp = corpus();
        let retriever = KeywordRetriever::new(temp.path(), 3);
        let hits = retriever.search_snippets("MEETING", 5);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].starts_with("notes.txt:"));
        assert!(hits[0].contains("Meeting notes"));
    }

    #[test]
    fn snippet_handles_multibyte_text() {
        let text = format!("{}needle{}", "é".repeat(60), "ü".repeat(60));
        let snippet = snippet_around(&text, "needle").expect("match");
        assert!(snippet.contains("needle"));
    }

    #[test]
    fn snippet_window_is_measured_in_chars() {
        let text = format!("{}needle{}", "a".repeat(80), "b".repeat(80));
        let snippet = snippet_around(&text, "needle").expect("match");
        assert_eq!(snippet, format!("{}needle{}", "a".repeat(50), "b".repeat(50)));
    }

    /// Verifies text whose lowercase form is longer than the original still
    /// yields a snippet centred on the match.
    #[test]
    fn snippet_survives_lowercase_growing_the_text() {
        // 'İ' lowercases to two chars, shifting every later byte offset.
        let text = format!("{} Needle here", "İ".repeat(40));
        let snippet = snippet_around(&text, "needle").expect("match");
        assert!(snippet.ends_with("Needle here"));
        assert!(snippet.starts_with('İ'));
    }
}
