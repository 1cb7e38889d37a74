use std::borrow::Cow;

use kuchiki::traits::TendrilSink as _;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde::Serialize;

use crate::builtin;
use crate::matcher::{Corpus, Excerpt, MatchResult, QueryState, SearchOutcome, Segment};

/// What the page should look like after a query event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderPlan {
    pub state: QueryState,
    /// New inner HTML of the result container. Empty clears it.
    pub results_html: String,
    pub match_count: usize,
    /// Whether the input value itself should be emptied.
    pub clear_input: bool,
}

/// Recomputes the result list for the current input value.
pub fn handle_query_changed(corpus: &Corpus, query: &str) -> RenderPlan {
    let outcome = corpus.search(query);
    tracing::debug!(
        query,
        state = ?outcome.state,
        matches = outcome.matches.len(),
        "query changed"
    );
    plan_for(&outcome)
}

pub fn plan_for(outcome: &SearchOutcome<'_>) -> RenderPlan {
    let results_html = match outcome.state {
        QueryState::Valid => render_results(&outcome.matches).into_string(),
        QueryState::Neutral | QueryState::Invalid => String::new(),
    };
    RenderPlan {
        state: outcome.state,
        results_html,
        match_count: outcome.matches.len(),
        clear_input: false,
    }
}

/// The plan applied when the search dialog closes.
pub fn reset_plan() -> RenderPlan {
    RenderPlan {
        state: QueryState::Neutral,
        results_html: String::new(),
        match_count: 0,
        clear_input: true,
    }
}

pub fn render_results(matches: &[MatchResult<'_>]) -> Markup {
    html! {
        @for m in matches {
            a href=(m.document.url) class=(builtin::RESULT_TITLE_CLASS) { (m.document.title) }
            @if let Some(excerpt) = &m.excerpt {
                (render_excerpt(excerpt))
            }
        }
    }
}

pub fn render_excerpt(excerpt: &Excerpt) -> Markup {
    html! {
        p class=(builtin::RESULT_CONTENT_CLASS) {
            @for seg in &excerpt.segments {
                @match seg {
                    Segment::Text(t) => { (&*decode_entities(t)) }
                    Segment::Highlight(t) => {
                        span class=(builtin::HIGHLIGHT_CLASS) { (&*decode_entities(t)) }
                    }
                }
            }
            (builtin::ELLIPSIS)
        }
    }
}

/// Resolves character references left in stripped content (`&lt;`, `&amp;`,
/// `&#39;`) to the characters a browser would show. Bare `<` stays literal.
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    let fragment = format!("<p>{}</p>", text.replace('<', "&lt;"));
    let parsed = kuchiki::parse_html().one(fragment);
    match parsed.select_first("p") {
        Ok(p) => Cow::Owned(p.text_contents()),
        Err(()) => Cow::Borrowed(text),
    }
}

/// Placeholder shown while the index is being fetched.
pub fn loading_placeholder() -> Markup {
    html! {
        div class="m-auto text-center" {
            div class="spinner-border" role="status" {
                span class="sr-only" { "Loading..." }
            }
            br;
            "Loading..."
        }
    }
}

/// Plain-text rendering for terminals: one block per match.
pub fn render_text(outcome: &SearchOutcome<'_>) -> String {
    let mut out = String::new();
    for m in &outcome.matches {
        out.push_str(&m.document.title);
        out.push_str("  ");
        out.push_str(&m.document.url);
        out.push('\n');
        if let Some(excerpt) = &m.excerpt {
            out.push_str("    ");
            for seg in &excerpt.segments {
                match seg {
                    Segment::Text(t) => out.push_str(&decode_entities(t)),
                    Segment::Highlight(t) => {
                        out.push('[');
                        out.push_str(&decode_entities(t));
                        out.push(']');
                    }
                }
            }
            out.push_str(builtin::ELLIPSIS);
            out.push('\n');
        }
    }
    out
}

/// A self-contained page with the search box, its current state and the
/// rendered results.
pub fn build_results_page(query: &str, plan: &RenderPlan) -> String {
    let input_class = match plan.state {
        QueryState::Neutral => None,
        QueryState::Valid => Some("valid"),
        QueryState::Invalid => Some("invalid"),
    };
    let markup: Markup = html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { "Search" }
                style { (PreEscaped(builtin::BUILTIN_CSS)) }
            }
            body {
                main class="fls-container" {
                    input type="search" id="local-search-input" class=[input_class] value=(query);
                    div id="local-search-result" class="list-group" {
                        (PreEscaped(&plan.results_html))
                    }
                }
            }
        }
    };
    markup.into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Document;

    fn corpus() -> Corpus {
        Corpus::new(vec![
            Document::new(Some("Hello World"), "<p>the quick brown fox</p>", "/a"),
            Document::new(None, "<b>keyword</b>", "/k"),
            Document::new(Some("Escapes"), "1 &lt; 2 <i>and</i> a<b", "/e"),
        ])
    }

    #[test]
    fn valid_plan_renders_links_and_highlights() {
        let plan = handle_query_changed(&corpus(), "quick fox");
        assert_eq!(plan.state, QueryState::Valid);
        assert_eq!(plan.match_count, 1);
        assert!(plan.results_html.contains(
            "<a href=\"/a\" class=\"list-group-item list-group-item-action font-weight-bolder search-list-title\">Hello World</a>"
        ));
        assert!(plan.results_html.contains(
            "<p class=\"search-list-content\">the <span class=\"search-word\">quick</span> brown <span class=\"search-word\">fox</span>...</p>"
        ));
    }

    #[test]
    fn untitled_excerpt_is_keyword_with_ellipsis() {
        let plan = handle_query_changed(&corpus(), "keyword");
        assert!(plan.results_html.contains(">Untitled</a>"));
        assert!(plan.results_html.contains(
            "<p class=\"search-list-content\"><span class=\"search-word\">keyword</span>...</p>"
        ));
    }

    #[test]
    fn neutral_and_invalid_clear_results() {
        let c = corpus();
        let neutral = handle_query_changed(&c, "  ");
        assert_eq!(neutral.state, QueryState::Neutral);
        assert!(neutral.results_html.is_empty());

        let invalid = handle_query_changed(&c, "zzz");
        assert_eq!(invalid.state, QueryState::Invalid);
        assert!(invalid.results_html.is_empty());
        assert!(!invalid.clear_input);
    }

    #[test]
    fn excerpt_entities_are_decoded_once() {
        let plan = handle_query_changed(&corpus(), "and");
        assert!(plan.results_html.contains("1 &lt; 2 <span class=\"search-word\">and</span> a&lt;b..."));
        assert!(!plan.results_html.contains("&amp;lt;"));
    }

    #[test]
    fn decodes_named_and_numeric_references() {
        assert_eq!(decode_entities("a &amp;&amp; b"), "a && b");
        assert_eq!(decode_entities("it&#39;s &quot;x&quot;"), "it's \"x\"");
        assert_eq!(decode_entities("if (a<b) &lt;T&gt;"), "if (a<b) <T>");
        assert_eq!(decode_entities("AT&T"), "AT&T");
        assert!(matches!(decode_entities("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn text_rendering_decodes_entities() {
        let c = corpus();
        let outcome = c.search("and");
        assert_eq!(render_text(&outcome), "Escapes  /e\n    1 < 2 [and] a<b...\n");
    }

    #[test]
    fn text_rendering_marks_highlights() {
        let c = corpus();
        let outcome = c.search("fox");
        assert_eq!(
            render_text(&outcome),
            "Hello World  /a\n    the quick brown [fox]...\n"
        );
    }

    #[test]
    fn page_reflects_state() {
        let c = corpus();
        let plan = handle_query_changed(&c, "zzz");
        let page = build_results_page("zzz", &plan);
        assert!(page.contains("class=\"invalid\""));
        assert!(page.contains("value=\"zzz\""));

        let page = build_results_page("", &reset_plan());
        assert!(!page.contains("class=\"valid\""));
        assert!(!page.contains("class=\"invalid\""));
    }
}
