use std::path::{Path, PathBuf};
use std::time::Duration;

use fluid_local_search::{
    CliArgs, CliCommand, CliSearchArgs, CliThemeArgs, Fetcher, IndexSource, OutputFormat,
    ProgressMode, QueryState, SearchError, SearchSession, ThemeAction,
};
use httpmock::Method::GET;
use httpmock::MockServer;
use tempfile::tempdir;
use url::Url;

const INDEX_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<search>
  <entry>
    <title>Hello World</title>
    <link href="/a/"/>
    <url>/a/</url>
    <content type="html"><![CDATA[<p>the quick brown fox</p>]]></content>
  </entry>
  <entry>
    <title></title>
    <url>/k/</url>
    <content type="html"><![CDATA[<b>keyword</b>]]></content>
  </entry>
  <entry>
    <title>Gallery</title>
    <url>/g/</url>
    <content type="html"><![CDATA[<img src="/x.png">]]></content>
  </entry>
</search>"#;

const PAGE_HTML: &str = r#"<!DOCTYPE html>
<html data-default-color-scheme="light">
<head>
<link id="highlight-css" rel="stylesheet" href="/css/hl.css">
<link id="highlight-css-dark" rel="stylesheet" href="/css/hl-dark.css" disabled>
</head>
<body>
<i id="color-toggle-icon" class="iconfont icon-light" data="dark"></i>
<input id="local-search-input" class="form-control">
<div id="local-search-result" class="list-group"></div>
<iframe class="utterances-frame" src="about:blank"></iframe>
</body>
</html>"#;

fn read_to_string(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

fn search_args(query: &str, index: &str) -> CliSearchArgs {
    CliSearchArgs {
        query: query.to_string(),
        index: index.to_string(),
        base_url: None,
        format: OutputFormat::Text,
        page: None,
        out: None,
        input_selector: "#local-search-input".to_string(),
        result_selector: "#local-search-result".to_string(),
        user_agent: "test-agent".to_string(),
        timeout_secs: 5,
    }
}

fn theme_args(action: ThemeAction, store: PathBuf) -> CliThemeArgs {
    CliThemeArgs {
        action,
        store,
        scheme: None,
        default_scheme: None,
        color_mode: None,
        hour: Some(12),
        icon_data: None,
        utterances_light: "github-light".to_string(),
        utterances_dark: "github-dark".to_string(),
        giscus_light: "light".to_string(),
        giscus_dark: "dark".to_string(),
        page: None,
        out: None,
    }
}

fn cli(command: CliCommand) -> CliArgs {
    CliArgs {
        command,
        progress: ProgressMode::Never,
    }
}

#[tokio::test]
async fn remote_index_fills_page_results() {
    let server = MockServer::start();
    let index_mock = server.mock(|when, then| {
        when.method(GET).path("/local-search.xml");
        then.status(200)
            .header("Content-Type", "application/xml")
            .body(INDEX_XML);
    });

    let tmp = tempdir().unwrap();
    let page = tmp.path().join("index.html");
    let out = tmp.path().join("out").join("search.html");
    std::fs::write(&page, PAGE_HTML).unwrap();

    let mut args = search_args("quick fox", "/local-search.xml");
    args.base_url = Some(Url::parse(&server.url("/")).unwrap());
    args.page = Some(page);
    args.out = Some(out.clone());
    fluid_local_search::run(cli(CliCommand::Search(args)))
        .await
        .unwrap();

    index_mock.assert_hits(1);
    let html = read_to_string(&out);
    assert!(html.contains("class=\"form-control valid\""));
    assert!(html.contains("value=\"quick fox\""));
    assert!(html.contains("href=\"/a/\""));
    assert!(html.contains("<span class=\"search-word\">quick</span>"));
    assert!(html.contains("<span class=\"search-word\">fox</span>"));
    assert!(!html.contains("spinner-border"));
    assert!(!html.contains("/k/"));
}

#[tokio::test]
async fn session_loads_index_once() {
    let server = MockServer::start();
    let index_mock = server.mock(|when, then| {
        when.method(GET).path("/local-search.xml");
        then.status(200).body(INDEX_XML);
    });

    let source = IndexSource::Remote(Url::parse(&server.url("/local-search.xml")).unwrap());
    let fetcher = Fetcher::new("test-agent", Duration::from_secs(5)).unwrap();
    let session = SearchSession::new(source, fetcher);
    assert!(!session.is_loaded());

    let corpus = session.activate().await;
    // The image-only entry has no text and is not searchable.
    assert_eq!(corpus.loaded(), 3);
    assert_eq!(corpus.candidates(), 2);
    session.activate().await;
    index_mock.assert_hits(1);

    let plan = session.handle_query_changed("keyword");
    assert_eq!(plan.state, QueryState::Valid);
    assert!(plan.results_html.contains(">Untitled</a>"));
    assert!(plan.results_html.contains("<span class=\"search-word\">keyword</span>..."));

    let first = session.handle_query_changed("brown");
    let second = session.handle_query_changed("brown");
    assert_eq!(first, second);

    assert_eq!(session.handle_query_changed("  ").state, QueryState::Neutral);
    assert_eq!(session.handle_query_changed("zzz").state, QueryState::Invalid);
    assert_eq!(session.handle_query_changed("gallery").state, QueryState::Invalid);

    let closed = session.close();
    assert!(closed.clear_input);
    assert_eq!(closed.state, QueryState::Neutral);
}

#[tokio::test]
async fn unreachable_index_searches_nothing() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/local-search.xml");
        then.status(404);
    });

    let source = IndexSource::Remote(Url::parse(&server.url("/local-search.xml")).unwrap());
    let fetcher = Fetcher::new("test-agent", Duration::from_secs(5)).unwrap();
    let session = SearchSession::new(source, fetcher);
    let corpus = session.activate().await;
    assert!(corpus.is_empty());
    assert_eq!(session.handle_query_changed("fox").state, QueryState::Invalid);

    let tmp = tempdir().unwrap();
    let out = tmp.path().join("result.json");
    let mut args = search_args("fox", tmp.path().join("missing.xml").to_str().unwrap());
    args.format = OutputFormat::Json;
    args.out = Some(out.clone());
    fluid_local_search::run(cli(CliCommand::Search(args)))
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_str(&read_to_string(&out)).unwrap();
    assert_eq!(json["state"], "invalid");
    assert_eq!(json["index_empty"], true);
    assert_eq!(json["matches"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn throttled_index_gives_up_after_five_attempts() {
    let server = MockServer::start();
    let index_mock = server.mock(|when, then| {
        when.method(GET).path("/local-search.xml");
        then.status(503).header("Retry-After", "0");
    });

    let source = IndexSource::Remote(Url::parse(&server.url("/local-search.xml")).unwrap());
    let fetcher = Fetcher::new("test-agent", Duration::from_secs(5)).unwrap();
    let session = SearchSession::new(source, fetcher);
    let corpus = session.activate().await;

    index_mock.assert_hits(5);
    assert!(corpus.is_empty());
    assert!(corpus.search("fox").index_empty);
}

#[tokio::test]
async fn local_index_json_output() {
    let tmp = tempdir().unwrap();
    let index = tmp.path().join("local-search.xml");
    let out = tmp.path().join("result.json");
    std::fs::write(&index, INDEX_XML).unwrap();

    let mut args = search_args("Quick-Fox", index.to_str().unwrap());
    args.format = OutputFormat::Json;
    args.out = Some(out.clone());
    fluid_local_search::run(cli(CliCommand::Search(args)))
        .await
        .unwrap();

    let json: serde_json::Value = serde_json::from_str(&read_to_string(&out)).unwrap();
    assert_eq!(json["state"], "valid");
    assert_eq!(json["index_empty"], false);
    assert_eq!(json["keywords"], serde_json::json!(["quick", "fox"]));
    let first = &json["matches"][0];
    assert_eq!(first["document"]["url"], "/a/");
    assert_eq!(first["first_keyword_position"], 4);
    assert_eq!(
        first["excerpt"]["segments"][1],
        serde_json::json!({ "kind": "highlight", "text": "quick" })
    );
}

#[tokio::test]
async fn missing_anchor_is_fatal() {
    let tmp = tempdir().unwrap();
    let index = tmp.path().join("local-search.xml");
    let page = tmp.path().join("page.html");
    std::fs::write(&index, INDEX_XML).unwrap();
    std::fs::write(&page, "<html><body><input id=\"local-search-input\"></body></html>").unwrap();

    let mut args = search_args("fox", index.to_str().unwrap());
    args.page = Some(page);
    args.out = Some(tmp.path().join("never.html"));
    let err = fluid_local_search::run(cli(CliCommand::Search(args)))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SearchError>(),
        Some(SearchError::Configuration { role: "result", .. })
    ));
    assert!(!tmp.path().join("never.html").exists());
}

#[tokio::test]
async fn theme_toggle_persists_and_updates_page() {
    let tmp = tempdir().unwrap();
    let store = tmp.path().join("prefs.json");
    let page = tmp.path().join("page.html");
    let out = tmp.path().join("themed.html");
    std::fs::write(&page, PAGE_HTML).unwrap();

    // Light default, icon offers dark: the first click stores dark.
    let mut args = theme_args(ThemeAction::Toggle, store.clone());
    args.page = Some(page.clone());
    args.out = Some(out.clone());
    fluid_local_search::run(cli(CliCommand::Theme(args)))
        .await
        .unwrap();

    let prefs: serde_json::Value = serde_json::from_str(&read_to_string(&store)).unwrap();
    assert_eq!(prefs["Fluid_Color_Scheme"], "dark");
    let html = read_to_string(&out);
    assert!(html.contains("data-user-color-scheme=\"dark\""));
    assert!(html.contains("class=\"iconfont icon-dark\""));

    // Second click returns to the default and forgets the preference.
    let mut args = theme_args(ThemeAction::Toggle, store.clone());
    args.page = Some(page);
    args.out = Some(out.clone());
    fluid_local_search::run(cli(CliCommand::Theme(args)))
        .await
        .unwrap();
    let prefs: serde_json::Value = serde_json::from_str(&read_to_string(&store)).unwrap();
    assert!(prefs.get("Fluid_Color_Scheme").is_none());
    assert!(read_to_string(&out).contains("data-user-color-scheme=\"light\""));
}

#[tokio::test]
async fn theme_apply_prints_plan() {
    let tmp = tempdir().unwrap();
    let store = tmp.path().join("prefs.json");
    let out = tmp.path().join("plan.json");
    std::fs::write(&store, r#"{"Fluid_Color_Scheme":"dark"}"#).unwrap();

    let mut args = theme_args(ThemeAction::Apply, store);
    args.default_scheme = Some("light".to_string());
    args.out = Some(out.clone());
    fluid_local_search::run(cli(CliCommand::Theme(args)))
        .await
        .unwrap();

    let plan: serde_json::Value = serde_json::from_str(&read_to_string(&out)).unwrap();
    assert_eq!(plan["scheme"], "dark");
    assert_eq!(plan["preference"]["action"], "keep");
    assert_eq!(plan["icon"]["data"], "light");
    let kinds: Vec<_> = plan["notifications"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["call_method", "call_method", "post_message", "post_message"]);
}
