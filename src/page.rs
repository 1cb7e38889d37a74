use anyhow::Context as _;
use kuchiki::NodeRef;
use kuchiki::traits::TendrilSink as _;

use crate::builtin;
use crate::error::SearchError;
use crate::matcher::QueryState;
use crate::render::{self, RenderPlan};
use crate::theme::{self, ThemeEnvironment, ThemePlan, WidgetMarker, WidgetPresence};

pub const DEFAULT_INPUT_SELECTOR: &str = "#local-search-input";
pub const DEFAULT_RESULT_SELECTOR: &str = "#local-search-result";

#[derive(Debug, Clone)]
pub struct Selectors {
    pub input: String,
    pub results: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            input: DEFAULT_INPUT_SELECTOR.to_string(),
            results: DEFAULT_RESULT_SELECTOR.to_string(),
        }
    }
}

/// A parsed HTML page that search and theme plans are applied to.
pub struct Page {
    document: NodeRef,
}

/// The search input and result container of a page.
pub struct SearchAnchors {
    input: NodeRef,
    results: NodeRef,
}

impl Page {
    pub fn parse(html: &str) -> Self {
        Self {
            document: kuchiki::parse_html().one(html),
        }
    }

    /// Locates the search anchors. A missing anchor is a configuration error.
    pub fn bind_search(&self, selectors: &Selectors) -> Result<SearchAnchors, SearchError> {
        let input = self
            .document
            .select_first(&selectors.input)
            .map_err(|()| SearchError::Configuration {
                role: "search",
                selector: selectors.input.clone(),
            })?;
        let results = self
            .document
            .select_first(&selectors.results)
            .map_err(|()| SearchError::Configuration {
                role: "result",
                selector: selectors.results.clone(),
            })?;
        Ok(SearchAnchors {
            input: input.as_node().clone(),
            results: results.as_node().clone(),
        })
    }

    /// Theme inputs readable from the page. The CSS color mode needs computed
    /// styles, so the caller supplies it.
    pub fn theme_environment(&self, color_mode: Option<String>) -> ThemeEnvironment {
        let default_attr = self.root_attr(theme::DEFAULT_SCHEME_ATTR);
        ThemeEnvironment::with_local_hour(default_attr, color_mode)
    }

    pub fn icon_data(&self) -> Option<String> {
        let icon = self.document.select_first(&format!("#{}", theme::ICON_ID)).ok()?;
        icon.attributes.borrow().get("data").map(str::to_string)
    }

    pub fn apply_theme(&self, plan: &ThemePlan) {
        if let Ok(root) = self.document.select_first("html") {
            root.attributes
                .borrow_mut()
                .insert(theme::SCHEME_ATTR, plan.root_scheme.to_string());
        }

        if let Some(icon_state) = &plan.icon {
            match self.document.select_first(&format!("#{}", theme::ICON_ID)) {
                Ok(icon) => {
                    let mut attrs = icon.attributes.borrow_mut();
                    attrs.insert("class", icon_state.class.clone());
                    attrs.insert("data", icon_state.data.to_string());
                }
                Err(()) => tracing::debug!("color toggle icon not on page; skipped"),
            }
        }

        for sheet in &plan.stylesheets {
            let Ok(node) = self.document.select_first(&format!("#{}", sheet.id)) else {
                continue;
            };
            let mut attrs = node.attributes.borrow_mut();
            if sheet.disabled {
                attrs.insert("disabled", String::new());
            } else {
                attrs.remove("disabled");
            }
        }
    }

    /// Swaps the toggle icon's class for a hover transition.
    pub fn hover_icon(&self, entering: bool) {
        let Ok(icon) = self.document.select_first(&format!("#{}", theme::ICON_ID)) else {
            return;
        };
        let data = icon.attributes.borrow().get("data").map(str::to_string);
        let Some((from, to)) = data.as_deref().and_then(|d| theme::hover_icon_swap(d, entering))
        else {
            return;
        };
        replace_class(icon.as_node(), &from, &to);
    }

    pub fn to_html(&self) -> anyhow::Result<String> {
        let mut out = Vec::new();
        self.document
            .serialize(&mut out)
            .context("serialize page")?;
        String::from_utf8(out).context("page html not utf-8")
    }

    fn root_attr(&self, name: &str) -> Option<String> {
        let root = self.document.select_first("html").ok()?;
        root.attributes.borrow().get(name).map(str::to_string)
    }
}

impl WidgetPresence for Page {
    fn has(&self, marker: WidgetMarker) -> bool {
        match marker {
            WidgetMarker::Selector(sel) => self.document.select_first(sel).is_ok(),
            WidgetMarker::Global(name) => {
                let needle = name.to_ascii_lowercase();
                let Ok(scripts) = self.document.select("script") else {
                    return false;
                };
                scripts.into_iter().any(|s| {
                    let src = s
                        .attributes
                        .borrow()
                        .get("src")
                        .map(|v| v.to_ascii_lowercase())
                        .unwrap_or_default();
                    src.contains(&needle) || s.as_node().text_contents().to_ascii_lowercase().contains(&needle)
                })
            }
        }
    }
}

impl SearchAnchors {
    /// Shows the loading block unless results are already on display.
    pub fn show_loading(&self) {
        if !self.has_results() {
            replace_children(&self.results, &render::loading_placeholder().into_string());
        }
    }

    /// Clears the loading block once the index is in memory.
    pub fn finish_loading(&self) {
        if !self.has_results() {
            replace_children(&self.results, "");
        }
    }

    pub fn set_query(&self, query: &str) {
        if let Some(el) = self.input.as_element() {
            el.attributes.borrow_mut().insert("value", query.to_string());
        }
    }

    pub fn apply(&self, plan: &RenderPlan) {
        if plan.clear_input {
            self.set_query("");
        }
        set_state_class(&self.input, plan.state);
        replace_children(&self.results, &plan.results_html);
    }

    fn has_results(&self) -> bool {
        let mut out = Vec::new();
        if self.results.serialize(&mut out).is_err() {
            return false;
        }
        String::from_utf8_lossy(&out).contains(builtin::RESULT_ITEM_CLASS)
    }
}

fn set_state_class(node: &NodeRef, state: QueryState) {
    let Some(el) = node.as_element() else { return };
    let mut attrs = el.attributes.borrow_mut();
    let mut classes: Vec<String> = attrs
        .get("class")
        .unwrap_or("")
        .split_whitespace()
        .filter(|c| *c != "valid" && *c != "invalid")
        .map(str::to_string)
        .collect();
    match state {
        QueryState::Neutral => {}
        QueryState::Valid => classes.push("valid".to_string()),
        QueryState::Invalid => classes.push("invalid".to_string()),
    }
    if classes.is_empty() {
        attrs.remove("class");
    } else {
        attrs.insert("class", classes.join(" "));
    }
}

fn replace_class(node: &NodeRef, from: &str, to: &str) {
    let Some(el) = node.as_element() else { return };
    let mut attrs = el.attributes.borrow_mut();
    let Some(current) = attrs.get("class").map(str::to_string) else {
        return;
    };
    if !current.split_whitespace().any(|c| c == from) {
        return;
    }
    let replaced: Vec<&str> = current
        .split_whitespace()
        .map(|c| if c == from { to } else { c })
        .collect();
    attrs.insert("class", replaced.join(" "));
}

fn replace_children(target: &NodeRef, fragment: &str) {
    for child in target.children().collect::<Vec<_>>() {
        child.detach();
    }
    if fragment.is_empty() {
        return;
    }
    let parsed = kuchiki::parse_html().one(fragment);
    if let Ok(body) = parsed.select_first("body") {
        for child in body.as_node().children().collect::<Vec<_>>() {
            target.append(child);
        }
    }
}
