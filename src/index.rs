use std::path::PathBuf;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::Serialize;
use url::Url;

use crate::error::SearchError;
use crate::fetcher::Fetcher;

pub const DEFAULT_SEARCH_PATH: &str = "/local-search.xml";
pub const UNTITLED: &str = "Untitled";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub title: String,
    pub content: String,
    pub url: String,
}

impl Document {
    /// Builds a document, normalizing a missing or blank title to `Untitled`.
    pub fn new(title: Option<&str>, content: &str, url: &str) -> Self {
        let title = match title.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => UNTITLED.to_string(),
        };
        Self {
            title,
            content: content.to_string(),
            url: url.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum IndexSource {
    Local(PathBuf),
    Remote(Url),
}

impl IndexSource {
    /// Absolute URLs are fetched as-is. Anything else is joined onto
    /// `base_url` when one is given, otherwise read from disk.
    pub fn resolve(raw: &str, base_url: Option<&Url>) -> anyhow::Result<Self> {
        let r = raw.trim();
        if r.starts_with("http://") || r.starts_with("https://") {
            return Ok(Self::Remote(Url::parse(r)?));
        }
        match base_url {
            Some(base) => Ok(Self::Remote(base.join(r)?)),
            None => Ok(Self::Local(PathBuf::from(r))),
        }
    }

    pub fn location(&self) -> String {
        match self {
            Self::Local(p) => p.display().to_string(),
            Self::Remote(u) => u.to_string(),
        }
    }
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    Content,
    Url,
}

#[derive(Default)]
struct RawEntry {
    title: Option<String>,
    content: String,
    url: String,
}

impl RawEntry {
    fn push(&mut self, field: Field, text: &str) {
        match field {
            Field::Title => self.title.get_or_insert_with(String::new).push_str(text),
            Field::Content => self.content.push_str(text),
            Field::Url => self.url.push_str(text),
        }
    }
}

/// Parses a `<search><entry>…</entry></search>` index. Unknown elements are
/// skipped; content is usually wrapped in CDATA.
pub fn parse_index(xml: &str) -> Result<Vec<Document>, SearchError> {
    let mut reader = Reader::from_str(xml);
    let mut docs = Vec::new();
    let mut entry: Option<RawEntry> = None;
    let mut field: Option<Field> = None;

    loop {
        let event = reader.read_event().map_err(|e| {
            SearchError::IndexParse(format!(
                "at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;
        match event {
            Event::Start(e) => match e.local_name().as_ref() {
                b"entry" => entry = Some(RawEntry::default()),
                b"title" if entry.is_some() => field = Some(Field::Title),
                b"content" if entry.is_some() => field = Some(Field::Content),
                b"url" if entry.is_some() => field = Some(Field::Url),
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"entry" => {
                    if let Some(raw) = entry.take() {
                        docs.push(Document::new(raw.title.as_deref(), &raw.content, &raw.url));
                    }
                    field = None;
                }
                b"title" | b"content" | b"url" => field = None,
                _ => {}
            },
            Event::Text(t) => {
                if let (Some(raw), Some(f)) = (entry.as_mut(), field) {
                    let text = t
                        .unescape()
                        .map_err(|e| SearchError::IndexParse(e.to_string()))?;
                    raw.push(f, &text);
                }
            }
            Event::CData(c) => {
                if let (Some(raw), Some(f)) = (entry.as_mut(), field) {
                    raw.push(f, &String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(docs)
}

pub async fn load_documents(
    source: &IndexSource,
    fetcher: &Fetcher,
) -> Result<Vec<Document>, SearchError> {
    let text = match source {
        IndexSource::Local(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
            SearchError::IndexFetch {
                location: source.location(),
                reason: e.to_string(),
            }
        })?,
        IndexSource::Remote(url) => {
            let (bytes, _) =
                fetcher
                    .get_bytes(url.clone())
                    .await
                    .map_err(|e| SearchError::IndexFetch {
                        location: source.location(),
                        reason: format!("{e:#}"),
                    })?;
            String::from_utf8_lossy(&bytes).into_owned()
        }
    };
    parse_index(&text)
}

/// Loads the index, degrading to an empty document list on any failure.
pub async fn load_or_empty(source: &IndexSource, fetcher: &Fetcher) -> Vec<Document> {
    match load_documents(source, fetcher).await {
        Ok(docs) => {
            tracing::info!(count = docs.len(), source = %source.location(), "loaded search index");
            docs
        }
        Err(err) => {
            tracing::warn!(error = %err, "search index unavailable; searching zero documents");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<search>
  <entry>
    <title>Hello World</title>
    <link href="/a"/>
    <url>/a</url>
    <content type="html"><![CDATA[<p>the quick brown fox</p>]]></content>
    <categories><category>misc</category></categories>
  </entry>
  <entry>
    <title>   </title>
    <url>/b</url>
    <content type="html">&lt;b&gt;keyword&lt;/b&gt;</content>
  </entry>
  <entry>
    <url>/c</url>
    <content type="html"></content>
  </entry>
</search>"#;

    #[test]
    fn parses_entries_in_order() {
        let docs = parse_index(SAMPLE).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].title, "Hello World");
        assert_eq!(docs[0].url, "/a");
        assert_eq!(docs[0].content, "<p>the quick brown fox</p>");
        assert_eq!(docs[1].content, "<b>keyword</b>");
    }

    #[test]
    fn blank_or_missing_title_becomes_untitled() {
        let docs = parse_index(SAMPLE).unwrap();
        assert_eq!(docs[1].title, UNTITLED);
        assert_eq!(docs[2].title, UNTITLED);
        assert_eq!(Document::new(Some("  Trim me "), "", "/x").title, "Trim me");
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let err = parse_index("<search><entry><title>x</entry>").unwrap_err();
        assert!(matches!(err, SearchError::IndexParse(_)));
    }

    #[test]
    fn resolves_sources() {
        let base = Url::parse("https://blog.example.com/").unwrap();
        match IndexSource::resolve(DEFAULT_SEARCH_PATH, Some(&base)).unwrap() {
            IndexSource::Remote(u) => {
                assert_eq!(u.as_str(), "https://blog.example.com/local-search.xml")
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            IndexSource::resolve("public/local-search.xml", None).unwrap(),
            IndexSource::Local(_)
        ));
        assert!(matches!(
            IndexSource::resolve("http://x.test/i.xml", None).unwrap(),
            IndexSource::Remote(_)
        ));
    }
}
