//! Keyword matching over an in-memory document list.
//!
//! A query is split into lower-cased keywords. A document matches when every
//! keyword occurs in its title or its tag-stripped content; documents keep
//! their index order. Each match carries an excerpt anchored near the first
//! keyword with all keyword occurrences marked.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::index::Document;

/// Total excerpt width, in UTF-16 code units.
pub const EXCERPT_LEN: usize = 100;
/// UTF-16 units of context kept ahead of the anchor keyword.
pub const EXCERPT_LEAD: usize = 20;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));

/// Input styling derived from a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryState {
    /// Blank query: neither valid nor invalid.
    Neutral,
    Valid,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "lowercase")]
pub enum Segment {
    Text(String),
    Highlight(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Excerpt {
    pub segments: Vec<Segment>,
}

impl Excerpt {
    /// The excerpt text without highlight markers.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Text(t) | Segment::Highlight(t) => t.as_str(),
            })
            .collect()
    }

    pub fn highlights(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Highlight(t) => Some(t.as_str()),
            Segment::Text(_) => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult<'a> {
    pub document: &'a Document,
    /// UTF-16 offset of the first keyword in the stripped content. A
    /// keyword found only in the title anchors at 0.
    pub first_keyword_position: Option<usize>,
    pub excerpt: Option<Excerpt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchOutcome<'a> {
    pub state: QueryState,
    pub keywords: Vec<String>,
    pub matches: Vec<MatchResult<'a>>,
    /// Set when the corpus had nothing searchable, so an `invalid` state
    /// means "no index" rather than "no match".
    pub index_empty: bool,
}

impl SearchOutcome<'_> {
    fn neutral(index_empty: bool) -> Self {
        Self {
            state: QueryState::Neutral,
            keywords: Vec::new(),
            matches: Vec::new(),
            index_empty,
        }
    }
}

struct Entry {
    document: Document,
    plain: String,
    lower_title: String,
    lower_content: String,
}

/// The searchable documents of one session. Documents whose content is empty
/// once tags are stripped can never match and are dropped up front.
pub struct Corpus {
    entries: Vec<Entry>,
    loaded: usize,
}

impl Corpus {
    pub fn new(documents: Vec<Document>) -> Self {
        let loaded = documents.len();
        let entries: Vec<Entry> = documents
            .into_iter()
            .filter_map(|document| {
                let plain = strip_tags(&document.content);
                if plain.is_empty() {
                    return None;
                }
                Some(Entry {
                    lower_title: document.title.trim().to_lowercase(),
                    lower_content: plain.to_lowercase(),
                    plain,
                    document,
                })
            })
            .collect();
        tracing::debug!(loaded, candidates = entries.len(), "corpus ready");
        Self { entries, loaded }
    }

    /// Number of documents that can match at all.
    pub fn candidates(&self) -> usize {
        self.entries.len()
    }

    /// Number of documents the index held, candidates or not.
    pub fn loaded(&self) -> usize {
        self.loaded
    }

    /// True when nothing is searchable, e.g. the index failed to load.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn search(&self, query: &str) -> SearchOutcome<'_> {
        if query.trim().is_empty() {
            return SearchOutcome::neutral(self.is_empty());
        }

        let keywords = keywords(query);
        let matches: Vec<MatchResult<'_>> = if keywords.is_empty() {
            Vec::new()
        } else {
            self.entries
                .iter()
                .filter_map(|entry| entry.matches(&keywords))
                .collect()
        };

        let state = if matches.is_empty() {
            QueryState::Invalid
        } else {
            QueryState::Valid
        };
        SearchOutcome {
            state,
            keywords,
            matches,
            index_empty: self.is_empty(),
        }
    }
}

impl Entry {
    fn matches(&self, keywords: &[String]) -> Option<MatchResult<'_>> {
        let mut first = None;
        for (i, keyword) in keywords.iter().enumerate() {
            let in_title = self.lower_title.contains(keyword.as_str());
            let in_content = utf16_index_of(&self.lower_content, keyword);
            if !in_title && in_content.is_none() {
                return None;
            }
            if i == 0 {
                first = Some(in_content.unwrap_or(0));
            }
        }

        let excerpt = first.map(|pos| build_excerpt(&self.plain, pos, keywords));
        Some(MatchResult {
            document: &self.document,
            first_keyword_position: first,
            excerpt,
        })
    }
}

/// Lower-cases the trimmed query and splits it on runs of whitespace and `-`.
pub fn keywords(query: &str) -> Vec<String> {
    query
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn strip_tags(content: &str) -> String {
    TAG_RE.replace_all(content.trim(), "").into_owned()
}

/// Start and end UTF-16 offsets of the excerpt for an anchor position.
pub fn excerpt_window(position: usize, len: usize) -> (usize, usize) {
    let start = position.saturating_sub(EXCERPT_LEAD);
    let end = (start + EXCERPT_LEN).min(len);
    (start.min(end), end)
}

pub fn build_excerpt(plain: &str, position: usize, keywords: &[String]) -> Excerpt {
    let (start, end) = excerpt_window(position, plain.encode_utf16().count());
    // A surrogate pair cut by either edge is left out whole.
    let mut offset = 0usize;
    let mut window = String::new();
    for c in plain.chars() {
        let width = c.len_utf16();
        if offset >= start && offset + width <= end {
            window.push(c);
        }
        offset += width;
        if offset >= end {
            break;
        }
    }
    Excerpt {
        segments: highlight(&window, keywords),
    }
}

/// Splits `text` into plain and highlighted runs, marking every
/// case-insensitive keyword occurrence. Longer keywords win on overlap.
pub fn highlight(text: &str, keywords: &[String]) -> Vec<Segment> {
    let mut alternatives: Vec<&str> = keywords
        .iter()
        .map(String::as_str)
        .filter(|k| !k.is_empty())
        .collect();
    if alternatives.is_empty() || text.is_empty() {
        return text_segment(text);
    }
    alternatives.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    alternatives.dedup();

    let pattern = format!(
        "(?i){}",
        alternatives
            .iter()
            .map(|k| regex::escape(k))
            .collect::<Vec<_>>()
            .join("|")
    );
    let re = match Regex::new(&pattern) {
        Ok(re) => re,
        Err(err) => {
            tracing::warn!(error = %err, "keyword pattern rejected; excerpt left unhighlighted");
            return text_segment(text);
        }
    };

    let mut segments = Vec::new();
    let mut last = 0usize;
    for m in re.find_iter(text) {
        if m.start() > last {
            segments.push(Segment::Text(text[last..m.start()].to_string()));
        }
        segments.push(Segment::Highlight(m.as_str().to_string()));
        last = m.end();
    }
    if last < text.len() {
        segments.push(Segment::Text(text[last..].to_string()));
    }
    segments
}

fn text_segment(text: &str) -> Vec<Segment> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Segment::Text(text.to_string())]
    }
}

fn utf16_index_of(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .find(needle)
        .map(|byte| haystack[..byte].encode_utf16().count())
}
